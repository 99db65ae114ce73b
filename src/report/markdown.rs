// src/report/markdown.rs

use std::fmt::Write;

use chrono::{DateTime, TimeZone};

use crate::sandbox::{ExecutionResult, CANCELLED_STATUS, LAUNCH_FAILURE_STATUS};

/// Structured-text report for one execution.
///
/// Contains the generation timestamp, an outcome summary, the duration when
/// the run succeeded, stdout verbatim when non-empty and, for failed runs,
/// stderr.
pub fn build_markdown<Tz>(result: &ExecutionResult, generated_at: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();

    out.push_str("# AutoLab Experimental Report\n\n");
    let _ = writeln!(out, "Generated at: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S"));
    out.push_str("## Analysis Results\n\n");
    let _ = writeln!(out, "{}\n", outcome_summary(result));
    let _ = writeln!(out, "Exit status: {}\n", result.exit_status);

    if result.succeeded {
        let _ = writeln!(out, "Execution time: {:.2} seconds\n", result.wall_clock_seconds);
    }

    if !result.stdout.trim().is_empty() {
        out.push_str("## Execution Log\n\n");
        push_fenced(&mut out, &result.stdout);
    }

    if !result.succeeded && !result.stderr.trim().is_empty() {
        out.push_str("## Errors\n\n");
        push_fenced(&mut out, &result.stderr);
    }

    out
}

fn outcome_summary(result: &ExecutionResult) -> String {
    if result.succeeded {
        return "Analysis completed successfully.".to_string();
    }
    if result.is_timeout() {
        return "Analysis did not finish: the execution time limit was exceeded.".to_string();
    }
    match result.exit_status {
        LAUNCH_FAILURE_STATUS => "Analysis could not be started.".to_string(),
        CANCELLED_STATUS => "Analysis was cancelled before completion.".to_string(),
        code => format!("Analysis failed (exit status {code})."),
    }
}

/// Fence `text` with more backticks than any run it contains.
fn push_fenced(out: &mut String, text: &str) {
    let longest = text
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);

    out.push_str(&fence);
    out.push('\n');
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&fence);
    out.push_str("\n\n");
}
