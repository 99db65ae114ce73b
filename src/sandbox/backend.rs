// src/sandbox/backend.rs

//! Pluggable sandbox backend abstraction.
//!
//! The orchestrator talks to a `SandboxBackend` instead of spawning
//! processes itself. Production code uses [`SandboxRunner`]; tests can
//! provide a backend that returns canned [`ExecutionResult`]s and emits
//! progress without any child process.
//!
//! [`SandboxRunner`]: super::runner::SandboxRunner

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};

use crate::compile::Document;

use super::result::ExecutionResult;

/// Optional side channels for one run.
///
/// - `progress` receives the number of each step whose completion marker
///   appeared on stdout, in order.
/// - `cancel` kills the child process when it fires. A dropped sender is
///   treated as "never cancel".
#[derive(Debug, Default)]
pub struct RunHooks {
    pub progress: Option<mpsc::Sender<u32>>,
    pub cancel: Option<oneshot::Receiver<()>>,
}

/// Trait abstracting how compiled documents are executed.
///
/// Implementations must always return an `ExecutionResult`; failures are
/// encoded in the result rather than raised.
pub trait SandboxBackend: Send + Sync {
    fn execute<'a>(
        &'a self,
        document: &'a Document,
        work_dir: &'a Path,
        hooks: RunHooks,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>>;
}
