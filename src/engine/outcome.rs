// src/engine/outcome.rs

use std::path::PathBuf;

use serde::Serialize;

use crate::plan::PlanId;
use crate::report::ReportArtifact;
use crate::sandbox::ExecutionResult;
use crate::types::ExecutionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Captured process output in the caller-facing shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outputs {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

impl From<&ExecutionResult> for Outputs {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            returncode: result.exit_status,
        }
    }
}

/// Terminal payload handed back to the caller. The tracker keeps only
/// status and logs; this carries the result and report location.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    pub plan_id: PlanId,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Outputs>,
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notebook_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub result: Option<ExecutionResult>,
}

impl ExecutionOutcome {
    /// Outcome for an execution whose sandbox run completed.
    pub fn finished(
        execution_id: ExecutionId,
        plan_id: PlanId,
        result: ExecutionResult,
        notebook_path: PathBuf,
        report: ReportArtifact,
    ) -> Self {
        let status = if result.succeeded {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::Failed
        };
        let error = (!result.succeeded).then(|| failure_summary(&result));

        Self {
            execution_id,
            plan_id,
            status,
            outputs: Some(Outputs::from(&result)),
            execution_time: result.wall_clock_seconds,
            notebook_path: Some(notebook_path),
            report_path: Some(report.path().to_path_buf()),
            report: Some(report),
            error,
            result: Some(result),
        }
    }

    /// Outcome for an execution that faulted before producing a result.
    pub fn faulted(
        execution_id: ExecutionId,
        plan_id: PlanId,
        error: impl Into<String>,
        execution_time: f64,
    ) -> Self {
        Self {
            execution_id,
            plan_id,
            status: OutcomeStatus::Failed,
            outputs: None,
            execution_time,
            notebook_path: None,
            report_path: None,
            report: None,
            error: Some(error.into()),
            result: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

fn failure_summary(result: &ExecutionResult) -> String {
    let last_line = result
        .stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(str::trim);

    match last_line {
        Some(line) if result.exit_status < 0 => line.to_string(),
        Some(line) => format!("program exited with status {}: {}", result.exit_status, line),
        None => format!("program exited with status {}", result.exit_status),
    }
}
