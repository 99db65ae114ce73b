use std::future::{pending, Future};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use autolab::compile::{step_marker, Document};
use autolab::sandbox::{ExecutionResult, RunHooks, SandboxBackend};

#[derive(Debug, Clone)]
enum Behaviour {
    Succeed,
    FailAfter {
        steps: usize,
        exit_code: i32,
        stderr: String,
    },
    HangUntilCancelled,
}

/// One call to [`FakeSandbox::execute`].
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub work_dir: PathBuf,
    pub step_numbers: Vec<u32>,
}

/// A fake sandbox backend that never spawns a process:
/// - records which documents were "run" and where
/// - emits a progress marker for each step it pretends to complete
/// - returns a canned `ExecutionResult`.
#[derive(Debug, Clone)]
pub struct FakeSandbox {
    behaviour: Behaviour,
    step_delay: Duration,
    runs: Arc<Mutex<Vec<RecordedRun>>>,
}

impl FakeSandbox {
    /// Completes every step and exits 0.
    pub fn succeeding() -> Self {
        Self::with_behaviour(Behaviour::Succeed)
    }

    /// Completes the first `steps` steps, then exits with `exit_code`.
    pub fn failing_after(steps: usize, exit_code: i32, stderr: &str) -> Self {
        Self::with_behaviour(Behaviour::FailAfter {
            steps,
            exit_code,
            stderr: stderr.to_string(),
        })
    }

    /// Completes no steps and waits until the run is cancelled.
    pub fn hanging() -> Self {
        Self::with_behaviour(Behaviour::HangUntilCancelled)
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            step_delay: Duration::ZERO,
            runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long before reporting each step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl SandboxBackend for FakeSandbox {
    fn execute<'a>(
        &'a self,
        document: &'a Document,
        work_dir: &'a Path,
        hooks: RunHooks,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
        Box::pin(async move {
            let started = Instant::now();
            let step_numbers = document.step_numbers();
            self.runs.lock().unwrap().push(RecordedRun {
                work_dir: work_dir.to_path_buf(),
                step_numbers: step_numbers.clone(),
            });

            let RunHooks { progress, cancel } = hooks;
            let completes = match &self.behaviour {
                Behaviour::Succeed => step_numbers.len(),
                Behaviour::FailAfter { steps, .. } => (*steps).min(step_numbers.len()),
                Behaviour::HangUntilCancelled => 0,
            };

            let mut stdout = String::new();
            for n in step_numbers.iter().take(completes) {
                if !self.step_delay.is_zero() {
                    tokio::time::sleep(self.step_delay).await;
                }
                stdout.push_str(&step_marker(*n));
                stdout.push('\n');
                if let Some(tx) = &progress {
                    let _ = tx.send(*n).await;
                }
            }
            drop(progress);

            match &self.behaviour {
                Behaviour::Succeed => ExecutionResult::exited(
                    stdout,
                    String::new(),
                    Some(0),
                    started.elapsed(),
                ),
                Behaviour::FailAfter {
                    exit_code, stderr, ..
                } => ExecutionResult::exited(
                    stdout,
                    stderr.clone(),
                    Some(*exit_code),
                    started.elapsed(),
                ),
                Behaviour::HangUntilCancelled => {
                    match cancel {
                        Some(rx) => {
                            let _ = rx.await;
                        }
                        None => pending::<()>().await,
                    }
                    ExecutionResult::cancelled(stdout, started.elapsed())
                }
            }
        })
    }
}
