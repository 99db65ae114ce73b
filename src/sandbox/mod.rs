// src/sandbox/mod.rs

//! Sandboxed execution of compiled documents.
//!
//! - [`result`] holds the immutable [`ExecutionResult`] and its sentinels.
//! - [`runner`] turns a `Document` into `analysis.py`, runs it as a child
//!   process under a wall-clock limit and captures both streams.
//! - [`backend`] provides the `SandboxBackend` trait the orchestrator talks
//!   to, so tests can substitute a fake that never spawns processes.

pub mod backend;
pub mod result;
pub mod runner;

/// Generated program file name inside the workspace.
pub const PROGRAM_FILE: &str = "analysis.py";

/// Serialized notebook file name inside the workspace.
pub const NOTEBOOK_FILE: &str = "analysis.ipynb";

pub use backend::{RunHooks, SandboxBackend};
pub use result::{
    ExecutionResult, CANCELLED_MARKER, CANCELLED_STATUS, LAUNCH_FAILURE_STATUS, SIGNALLED_STATUS,
    TIMEOUT_MARKER, TIMEOUT_STATUS,
};
pub use runner::SandboxRunner;
