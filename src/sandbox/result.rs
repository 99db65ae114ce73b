// src/sandbox/result.rs

use std::time::Duration;

use serde::Serialize;

/// Exit status reported when the program could not be started.
pub const LAUNCH_FAILURE_STATUS: i32 = -1;
/// Exit status reported when the wall-clock limit was hit.
pub const TIMEOUT_STATUS: i32 = -2;
/// Exit status reported when the execution was cancelled by id.
pub const CANCELLED_STATUS: i32 = -3;
/// Exit status reported when the process died from a signal.
pub const SIGNALLED_STATUS: i32 = -4;

pub const TIMEOUT_MARKER: &str = "Execution timeout";
pub const CANCELLED_MARKER: &str = "Execution cancelled";

/// Outcome of one sandboxed run. Produced exactly once per execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
    pub wall_clock_seconds: f64,
    pub succeeded: bool,
}

impl ExecutionResult {
    pub fn exited(stdout: String, stderr: String, code: Option<i32>, elapsed: Duration) -> Self {
        let exit_status = code.unwrap_or(SIGNALLED_STATUS);
        Self {
            stdout,
            stderr,
            exit_status,
            wall_clock_seconds: elapsed.as_secs_f64(),
            succeeded: exit_status == 0,
        }
    }

    pub fn timed_out(stdout: String, limit: Duration, elapsed: Duration) -> Self {
        Self {
            stdout,
            stderr: format!(
                "{TIMEOUT_MARKER}: exceeded {}s wall-clock limit",
                limit.as_secs()
            ),
            exit_status: TIMEOUT_STATUS,
            wall_clock_seconds: elapsed.as_secs_f64(),
            succeeded: false,
        }
    }

    pub fn cancelled(stdout: String, elapsed: Duration) -> Self {
        Self {
            stdout,
            stderr: CANCELLED_MARKER.to_string(),
            exit_status: CANCELLED_STATUS,
            wall_clock_seconds: elapsed.as_secs_f64(),
            succeeded: false,
        }
    }

    pub fn launch_failed(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: error.into(),
            exit_status: LAUNCH_FAILURE_STATUS,
            wall_clock_seconds: elapsed.as_secs_f64(),
            succeeded: false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_status == TIMEOUT_STATUS
    }
}
