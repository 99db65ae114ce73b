#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use autolab::compile::{Block, BlockRole, Document};
use autolab::engine::Orchestrator;
use autolab::report::{DisabledRenderer, ReportSynthesizer};
use autolab::sandbox::{SandboxBackend, SandboxRunner};
use autolab::tracker::Tracker;

/// Document whose step blocks are shell snippets, numbered 1, 2, 3, ...
/// The comment lines `to_program` adds are valid `sh` as well.
pub fn shell_document(steps: &[&str]) -> Document {
    steps
        .iter()
        .zip(1u32..)
        .map(|(code, n)| Block::code(BlockRole::StepCode { step_number: n }, *code))
        .collect()
}

/// Runner that executes the generated program with `sh`.
pub fn sh_runner(timeout: Duration) -> SandboxRunner {
    SandboxRunner::new("sh", timeout)
}

/// Orchestrator over `sandbox` whose reports always fall back to markdown.
pub fn orchestrator_with(
    sandbox: impl SandboxBackend + 'static,
    workspace_root: &std::path::Path,
) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        Arc::new(Tracker::default()),
        Arc::new(sandbox),
        ReportSynthesizer::new(Arc::new(DisabledRenderer)),
        workspace_root,
    ))
}

/// Poll until `check` holds or the deadline passes.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
