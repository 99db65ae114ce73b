// src/tracker/record.rs

//! Per-execution status record, log entries and the polling snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ExecutionState, LogLevel};

/// One line in an execution's log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub step: Option<u32>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, step: Option<u32>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            step,
        }
    }
}

/// Tracked status of one execution. `current_step <= total_steps` always.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub state: ExecutionState,
    pub current_step: u32,
    pub total_steps: u32,
    pub estimated_remaining: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for ExecutionRecord {
    fn default() -> Self {
        Self {
            state: ExecutionState::Pending,
            current_step: 0,
            total_steps: 0,
            estimated_remaining: None,
            last_updated: Utc::now(),
        }
    }
}

impl ExecutionRecord {
    /// `100 * current / total`, or 0 when there are no steps.
    pub fn progress_percent(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        let pct = f64::from(self.current_step) / f64::from(self.total_steps) * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

/// Requested change to a record. Absent fields keep their previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub state: ExecutionState,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub estimated_remaining: Option<String>,
}

impl StatusUpdate {
    pub fn new(state: ExecutionState) -> Self {
        Self {
            state,
            current_step: None,
            total_steps: None,
            estimated_remaining: None,
        }
    }

    pub fn current_step(mut self, step: u32) -> Self {
        self.current_step = Some(step);
        self
    }

    pub fn total_steps(mut self, total: u32) -> Self {
        self.total_steps = Some(total);
        self
    }

    pub fn eta(mut self, eta: impl Into<String>) -> Self {
        self.estimated_remaining = Some(eta.into());
        self
    }
}

/// Result of a status poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Lowercase state name, or `"unknown"` for ids never written to.
    pub status: String,
    pub current_step: u32,
    pub total_steps: u32,
    /// Messages of the most recent log entries, oldest first.
    pub logs: Vec<String>,
    pub estimated_remaining: Option<String>,
    pub progress_percent: f64,
}

impl StatusSnapshot {
    pub fn unknown() -> Self {
        Self {
            status: "unknown".to_string(),
            current_step: 0,
            total_steps: 0,
            logs: Vec::new(),
            estimated_remaining: None,
            progress_percent: 0.0,
        }
    }
}
