// src/tracker/mod.rs

//! Execution tracker (monitor).
//!
//! Holds one status record and one bounded, append-only log per execution
//! id. It is the only state shared between concurrently running
//! executions: each id has a single writer (the orchestrator driving it)
//! while any number of callers may poll.
//!
//! Every write happens under one lock acquisition, so a concurrent reader
//! sees a record either before or after an update, never half-merged.
//! Bookkeeping never fails the caller: a poisoned lock is recovered and
//! logged.

pub mod record;

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, error};

use crate::config::TrackerSection;
use crate::logging::mirror_execution_log;
use crate::types::{ExecutionState, LogLevel};

pub use record::{ExecutionRecord, LogEntry, StatusSnapshot, StatusUpdate};

/// Number of most recent log messages returned by [`Tracker::get_status`].
pub const LOG_WINDOW: usize = 50;

#[derive(Debug, Default)]
struct TrackedExecution {
    record: ExecutionRecord,
    logs: VecDeque<LogEntry>,
}

#[derive(Debug)]
pub struct Tracker {
    executions: RwLock<HashMap<String, TrackedExecution>>,
    max_retained_logs: usize,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerSection::default().max_retained_logs)
    }
}

impl Tracker {
    /// `max_retained_logs` is raised to [`LOG_WINDOW`] if smaller.
    pub fn new(max_retained_logs: usize) -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
            max_retained_logs: max_retained_logs.max(LOG_WINDOW),
        }
    }

    pub fn from_config(cfg: &TrackerSection) -> Self {
        Self::new(cfg.max_retained_logs)
    }

    /// Merge `update` into the record for `id` and log the new state.
    ///
    /// Terminal records keep their state; the attempted transition is logged
    /// as a warning instead.
    pub fn update_status(&self, id: &str, update: StatusUpdate) {
        let message;
        let level;
        {
            let mut map = self.write();
            let tracked = map.entry(id.to_string()).or_default();
            let record = &mut tracked.record;

            if record.state.is_terminal() && record.state != update.state {
                level = LogLevel::Warning;
                message = format!(
                    "Ignored status update to {}: execution already {}",
                    update.state, record.state
                );
            } else {
                if let Some(total) = update.total_steps {
                    record.total_steps = total;
                }
                if let Some(step) = update.current_step {
                    record.current_step = step;
                }
                if record.current_step > record.total_steps {
                    debug!(
                        execution_id = id,
                        current_step = record.current_step,
                        total_steps = record.total_steps,
                        "clamping current_step to total_steps"
                    );
                    record.current_step = record.total_steps;
                }
                if update.estimated_remaining.is_some() {
                    record.estimated_remaining = update.estimated_remaining;
                }
                record.state = update.state;
                if record.state.is_terminal() {
                    record.estimated_remaining = None;
                }

                level = LogLevel::Info;
                message = format!("Status updated: {}", record.state);
            }
            record.last_updated = Utc::now();

            push_log(
                tracked,
                LogEntry::new(level, message.clone(), None),
                self.max_retained_logs,
            );
        }
        mirror_execution_log(id, level, &message, None);
    }

    /// Append a log line. Creates the execution entry if needed.
    pub fn append_log(&self, id: &str, level: LogLevel, message: impl Into<String>, step: Option<u32>) {
        let message = message.into();
        {
            let mut map = self.write();
            let tracked = map.entry(id.to_string()).or_default();
            push_log(
                tracked,
                LogEntry::new(level, message.clone(), step),
                self.max_retained_logs,
            );
        }
        mirror_execution_log(id, level, &message, step);
    }

    /// Record a finished step and move `current_step` to it.
    pub fn on_step_completed(&self, id: &str, step_number: u32, success: bool, output: Option<&str>) {
        self.step_finished(id, step_number, step_number, success, output, None);
    }

    /// Like [`Tracker::on_step_completed`], for plans whose step numbers are
    /// sparse: `position` is the 1-based ordinal of the step in plan order
    /// and becomes `current_step`. `eta` replaces the remaining-time
    /// estimate when given.
    pub fn step_finished(
        &self,
        id: &str,
        step_number: u32,
        position: u32,
        success: bool,
        output: Option<&str>,
        eta: Option<String>,
    ) {
        if success {
            self.append_log(
                id,
                LogLevel::Info,
                format!("Step {step_number} completed successfully"),
                Some(step_number),
            );
        } else {
            self.append_log(
                id,
                LogLevel::Error,
                format!("Step {step_number} failed"),
                Some(step_number),
            );
        }

        if let Some(output) = output.filter(|o| !o.trim().is_empty()) {
            self.append_log(id, LogLevel::Debug, output, Some(step_number));
        }

        let mut update = StatusUpdate::new(ExecutionState::Running).current_step(position);
        if let Some(eta) = eta {
            update = update.eta(eta);
        }
        self.update_status(id, update);
    }

    /// Poll an execution. Unknown ids yield [`StatusSnapshot::unknown`].
    pub fn get_status(&self, id: &str) -> StatusSnapshot {
        let map = self.read();
        let Some(tracked) = map.get(id) else {
            return StatusSnapshot::unknown();
        };

        let skip = tracked.logs.len().saturating_sub(LOG_WINDOW);
        StatusSnapshot {
            status: tracked.record.state.to_string(),
            current_step: tracked.record.current_step,
            total_steps: tracked.record.total_steps,
            logs: tracked.logs.iter().skip(skip).map(|e| e.message.clone()).collect(),
            estimated_remaining: tracked.record.estimated_remaining.clone(),
            progress_percent: tracked.record.progress_percent(),
        }
    }

    /// Full retained log for an execution, oldest first.
    pub fn logs(&self, id: &str) -> Vec<LogEntry> {
        self.read()
            .get(id)
            .map(|t| t.logs.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record(&self, id: &str) -> Option<ExecutionRecord> {
        self.read().get(id).map(|t| t.record.clone())
    }

    pub fn state(&self, id: &str) -> Option<ExecutionState> {
        self.read().get(id).map(|t| t.record.state)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TrackedExecution>> {
        self.executions.read().unwrap_or_else(|poisoned| {
            error!("tracker lock poisoned; continuing with recovered state");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TrackedExecution>> {
        self.executions.write().unwrap_or_else(|poisoned| {
            error!("tracker lock poisoned; continuing with recovered state");
            PoisonError::into_inner(poisoned)
        })
    }
}

fn push_log(tracked: &mut TrackedExecution, entry: LogEntry, max_retained: usize) {
    tracked.logs.push_back(entry);
    while tracked.logs.len() > max_retained {
        tracked.logs.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_reports_zero_progress_and_no_logs() {
        let tracker = Tracker::default();
        let status = tracker.get_status("nope");
        assert_eq!(status.status, "unknown");
        assert_eq!(status.progress_percent, 0.0);
        assert!(status.logs.is_empty());
    }

    #[test]
    fn update_merges_fields_and_logs_state() {
        let tracker = Tracker::default();
        tracker.update_status(
            "e1",
            StatusUpdate::new(ExecutionState::Running)
                .total_steps(4)
                .eta("~30s"),
        );
        tracker.update_status("e1", StatusUpdate::new(ExecutionState::Running).current_step(2));

        let status = tracker.get_status("e1");
        assert_eq!(status.status, "running");
        assert_eq!(status.total_steps, 4);
        assert_eq!(status.current_step, 2);
        assert_eq!(status.estimated_remaining.as_deref(), Some("~30s"));
        assert_eq!(status.progress_percent, 50.0);
        assert_eq!(status.logs, vec!["Status updated: running"; 2]);
    }

    #[test]
    fn append_log_creates_record_lazily() {
        let tracker = Tracker::default();
        tracker.append_log("late", LogLevel::Warning, "early bird", Some(3));

        let status = tracker.get_status("late");
        assert_eq!(status.status, "pending");
        assert_eq!(status.logs, vec!["early bird".to_string()]);
        assert_eq!(tracker.logs("late")[0].step, Some(3));
    }

    #[test]
    fn terminal_state_is_sticky() {
        let tracker = Tracker::default();
        tracker.update_status("e", StatusUpdate::new(ExecutionState::Running).total_steps(2));
        tracker.update_status("e", StatusUpdate::new(ExecutionState::Succeeded).current_step(2));
        tracker.update_status("e", StatusUpdate::new(ExecutionState::Running).current_step(1));

        let record = tracker.record("e").unwrap();
        assert_eq!(record.state, ExecutionState::Succeeded);
        assert_eq!(record.current_step, 2);
        let last = tracker.logs("e").pop().unwrap();
        assert_eq!(last.level, LogLevel::Warning);
        assert!(last.message.contains("already succeeded"));
    }

    #[test]
    fn current_step_never_exceeds_total() {
        let tracker = Tracker::default();
        tracker.update_status(
            "e",
            StatusUpdate::new(ExecutionState::Running).total_steps(3).current_step(9),
        );
        assert_eq!(tracker.record("e").unwrap().current_step, 3);
        assert_eq!(tracker.get_status("e").progress_percent, 100.0);
    }

    #[test]
    fn status_exposes_last_fifty_messages_in_order() {
        let tracker = Tracker::default();
        for i in 0..120 {
            tracker.append_log("e", LogLevel::Info, format!("line {i}"), None);
        }
        let status = tracker.get_status("e");
        assert_eq!(status.logs.len(), LOG_WINDOW);
        assert_eq!(status.logs.first().unwrap(), "line 70");
        assert_eq!(status.logs.last().unwrap(), "line 119");
        assert_eq!(tracker.logs("e").len(), 120);
    }

    #[test]
    fn retention_bound_evicts_oldest() {
        let tracker = Tracker::new(60);
        for i in 0..100 {
            tracker.append_log("e", LogLevel::Info, format!("line {i}"), None);
        }
        let logs = tracker.logs("e");
        assert_eq!(logs.len(), 60);
        assert_eq!(logs[0].message, "line 40");
    }

    #[test]
    fn step_completion_logs_and_advances() {
        let tracker = Tracker::default();
        tracker.update_status("e", StatusUpdate::new(ExecutionState::Running).total_steps(3));
        tracker.on_step_completed("e", 1, true, None);
        tracker.on_step_completed("e", 2, false, Some("KeyError: 'x'"));

        let status = tracker.get_status("e");
        assert_eq!(status.current_step, 2);
        assert!(status.logs.contains(&"Step 1 completed successfully".to_string()));
        assert!(status.logs.contains(&"Step 2 failed".to_string()));
        assert!(status.logs.contains(&"KeyError: 'x'".to_string()));

        let errors: Vec<_> = tracker
            .logs("e")
            .into_iter()
            .filter(|e| e.level == LogLevel::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, Some(2));
    }

    #[test]
    fn sparse_step_numbers_advance_by_position() {
        let tracker = Tracker::default();
        tracker.update_status("e", StatusUpdate::new(ExecutionState::Running).total_steps(2));
        tracker.step_finished("e", 10, 1, true, None, Some("~4s".into()));

        let status = tracker.get_status("e");
        assert_eq!(status.current_step, 1);
        assert_eq!(status.progress_percent, 50.0);
        assert_eq!(status.estimated_remaining.as_deref(), Some("~4s"));
        assert!(status.logs.contains(&"Step 10 completed successfully".to_string()));
    }
}
