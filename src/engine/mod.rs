// src/engine/mod.rs

//! Orchestration engine for autolab.
//!
//! The [`Orchestrator`] drives one execution end to end:
//! compile the plan → mark `Running` → run the document in the sandbox →
//! synthesize the report → mark `Succeeded` or `Failed`, reporting every
//! transition to the shared [`Tracker`](crate::tracker::Tracker).
//!
//! Executions run as independent Tokio tasks; the tracker is the only state
//! they share.

pub mod orchestrator;
pub mod outcome;

pub use orchestrator::Orchestrator;
pub use outcome::{ExecutionOutcome, OutcomeStatus, Outputs};
