// src/engine/orchestrator.rs

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::compile::{compile_plan_with_diagnostics, Document};
use crate::config::ConfigFile;
use crate::errors::{AutolabError, Result};
use crate::plan::{Plan, PlanOverlay};
use crate::report::ReportSynthesizer;
use crate::sandbox::{NOTEBOOK_FILE, RunHooks, SandboxBackend, SandboxRunner};
use crate::tracker::{StatusUpdate, Tracker};
use crate::types::{ExecutionId, ExecutionState, LogLevel};

use super::outcome::ExecutionOutcome;

/// Capacity of the per-run progress channel. Markers are tiny and consumed
/// as they arrive, so this only absorbs bursts.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

type CancelRegistry = Mutex<HashMap<ExecutionId, oneshot::Sender<()>>>;

/// Drives executions from plan to report.
///
/// One orchestrator serves many concurrent executions. Each execution gets
/// its own workspace directory `<workspace_root>/<execution id>` and its
/// own cancel handle; the [`Tracker`] is the only shared mutable state.
pub struct Orchestrator {
    tracker: Arc<Tracker>,
    sandbox: Arc<dyn SandboxBackend>,
    reports: ReportSynthesizer,
    workspace_root: PathBuf,
    active: CancelRegistry,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workspace_root", &self.workspace_root)
            .field("reports", &self.reports)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        tracker: Arc<Tracker>,
        sandbox: Arc<dyn SandboxBackend>,
        reports: ReportSynthesizer,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tracker,
            sandbox,
            reports,
            workspace_root: workspace_root.into(),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Production wiring: a [`SandboxRunner`] and a report synthesizer
    /// built from `cfg`.
    pub fn from_config(cfg: &ConfigFile, tracker: Arc<Tracker>) -> Self {
        Self::new(
            tracker,
            Arc::new(SandboxRunner::from_config(&cfg.sandbox)),
            ReportSynthesizer::from_config(&cfg.report),
            cfg.sandbox.workspace_root.clone(),
        )
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    /// Workspace directory used for execution `id`.
    pub fn workspace_for(&self, id: &str) -> PathBuf {
        self.workspace_root.join(workspace_dir_name(id))
    }

    /// Run one execution to completion.
    ///
    /// Never fails: every fault is logged to the tracker, the execution is
    /// marked `Failed` and the returned outcome carries the error text.
    pub async fn execute(
        &self,
        id: &str,
        plan: &Plan,
        overlay: Option<&PlanOverlay>,
    ) -> ExecutionOutcome {
        let started = Instant::now();

        if id.is_empty() {
            warn!("refusing to start an execution with an empty id");
            return ExecutionOutcome::faulted(
                String::new(),
                plan.plan_id.clone(),
                "execution id must not be empty".to_string(),
                0.0,
            );
        }

        let Some(registration) = self.register(id) else {
            warn!(execution_id = id, "execution id already active; refusing to start");
            return ExecutionOutcome::faulted(
                id.to_string(),
                plan.plan_id.clone(),
                format!("execution {id} is already running"),
                0.0,
            );
        };

        info!(execution_id = id, plan_id = %plan.plan_id, steps = plan.len(), "execution started");

        // `registration` stays alive until return; its guard is the only
        // thing that unregisters `id`.
        match self.drive(id, plan, overlay, registration.cancel_rx).await {
            Ok(outcome) => {
                info!(
                    execution_id = id,
                    status = ?outcome.status,
                    execution_time = outcome.execution_time,
                    "execution finished"
                );
                outcome
            }
            Err(err) => self.fail(id, &plan.plan_id, &err.to_string(), started),
        }
    }

    /// Run an execution on its own Tokio task.
    ///
    /// A panic inside the execution is contained here: the tracker is marked
    /// `Failed` and the handle still resolves to an outcome.
    pub fn spawn(
        self: &Arc<Self>,
        id: ExecutionId,
        plan: Plan,
        overlay: Option<PlanOverlay>,
    ) -> JoinHandle<ExecutionOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let started = Instant::now();
            let plan_id = plan.plan_id.clone();
            let inner = {
                let this = Arc::clone(&this);
                let id = id.clone();
                tokio::spawn(async move { this.execute(&id, &plan, overlay.as_ref()).await })
            };

            match inner.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let message = format!("orchestration task aborted: {join_err}");
                    this.fail(&id, &plan_id, &message, started)
                }
            }
        })
    }

    /// Ask a running execution to stop. Returns `false` when `id` is not
    /// running (unknown, finished, or already cancelled).
    pub fn cancel(&self, id: &str) -> bool {
        let Some(sender) = self.registry().remove(id) else {
            debug!(execution_id = id, "cancel requested for inactive execution");
            return false;
        };

        let delivered = sender.send(()).is_ok();
        if delivered {
            self.tracker
                .append_log(id, LogLevel::Warning, "Cancellation requested", None);
        }
        delivered
    }

    async fn drive(
        &self,
        id: &str,
        plan: &Plan,
        overlay: Option<&PlanOverlay>,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Result<ExecutionOutcome> {
        plan.validate()?;
        let total_steps = u32::try_from(plan.len())
            .map_err(|_| AutolabError::PlanError("plan has too many steps".into()))?;

        self.tracker.append_log(
            id,
            LogLevel::Info,
            format!("Compiling plan {} ({} steps)", plan.plan_id, total_steps),
            None,
        );
        let compilation = compile_plan_with_diagnostics(plan, overlay);
        for (step_number, reason) in &compilation.degraded {
            self.tracker.append_log(
                id,
                LogLevel::Warning,
                format!("Step {step_number} compiled to a placeholder: {reason}"),
                Some(*step_number),
            );
        }
        let document = compilation.document;

        let work_dir = self.workspace_for(id);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .with_context(|| format!("creating workspace {}", work_dir.display()))?;
        let notebook_path = write_notebook(&document, &work_dir).await?;

        self.tracker.update_status(
            id,
            StatusUpdate::new(ExecutionState::Running)
                .total_steps(total_steps)
                .current_step(0),
        );

        let step_order = document.step_numbers();
        let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let hooks = RunHooks {
            progress: Some(progress_tx),
            cancel: Some(cancel_rx),
        };

        let run_started = Instant::now();
        let (result, completed) = tokio::join!(
            self.sandbox.execute(&document, &work_dir, hooks),
            self.follow_progress(id, progress_rx, &step_order, run_started),
        );

        if result.succeeded {
            self.tracker.append_log(
                id,
                LogLevel::Info,
                format!("Program finished in {:.2}s", result.wall_clock_seconds),
                None,
            );
        } else {
            if let Some(failed_step) = step_order.iter().find(|n| !completed.contains(n)) {
                self.tracker.step_finished(
                    id,
                    *failed_step,
                    completed_count(&completed),
                    false,
                    last_line(&result.stderr),
                    None,
                );
            }
            self.tracker.append_log(
                id,
                LogLevel::Error,
                format!("Program failed with exit status {}", result.exit_status),
                None,
            );
        }

        let report = self.reports.synthesize(&result, &work_dir).await?;
        if !report.is_rendered() {
            self.tracker.append_log(
                id,
                LogLevel::Warning,
                format!(
                    "Report rendering unavailable; wrote {}",
                    report.path().display()
                ),
                None,
            );
        }

        let final_update = if result.succeeded {
            StatusUpdate::new(ExecutionState::Succeeded).current_step(total_steps)
        } else {
            StatusUpdate::new(ExecutionState::Failed)
        };
        self.tracker.update_status(id, final_update);

        Ok(ExecutionOutcome::finished(
            id.to_string(),
            plan.plan_id.clone(),
            result,
            notebook_path,
            report,
        ))
    }

    /// Forward step markers to the tracker until the run drops its sender.
    /// Returns the step numbers seen, in arrival order.
    async fn follow_progress(
        &self,
        id: &str,
        mut progress: mpsc::Receiver<u32>,
        step_order: &[u32],
        run_started: Instant,
    ) -> Vec<u32> {
        let mut completed = Vec::with_capacity(step_order.len());

        while let Some(step_number) = progress.recv().await {
            if !step_order.contains(&step_number) {
                warn!(execution_id = id, step_number, "marker for a step not in the plan");
                continue;
            }
            if completed.contains(&step_number) {
                continue;
            }
            completed.push(step_number);

            let eta = estimate_remaining(run_started.elapsed(), completed.len(), step_order.len());
            self.tracker.step_finished(
                id,
                step_number,
                completed_count(&completed),
                true,
                None,
                eta,
            );
        }

        completed
    }

    fn fail(&self, id: &str, plan_id: &str, message: &str, started: Instant) -> ExecutionOutcome {
        error!(execution_id = id, error = %message, "execution faulted");
        self.tracker.append_log(
            id,
            LogLevel::Error,
            format!("Execution failed: {message}"),
            None,
        );
        self.tracker
            .update_status(id, StatusUpdate::new(ExecutionState::Failed));

        ExecutionOutcome::faulted(
            id.to_string(),
            plan_id.to_string(),
            message,
            started.elapsed().as_secs_f64(),
        )
    }

    fn register(&self, id: &str) -> Option<Registration<'_>> {
        let mut registry = self.registry();
        if registry.contains_key(id) {
            return None;
        }
        let (cancel_tx, cancel_rx) = oneshot::channel();
        registry.insert(id.to_string(), cancel_tx);

        Some(Registration {
            cancel_rx,
            _guard: RegistryGuard {
                registry: &self.active,
                id: id.to_string(),
            },
        })
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<ExecutionId, oneshot::Sender<()>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Registration<'a> {
    cancel_rx: oneshot::Receiver<()>,
    _guard: RegistryGuard<'a>,
}

/// Removes the cancel handle when the execution ends, including by panic.
struct RegistryGuard<'a> {
    registry: &'a CancelRegistry,
    id: String,
}

impl Drop for RegistryGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

async fn write_notebook(document: &Document, work_dir: &Path) -> Result<PathBuf> {
    let path = work_dir.join(NOTEBOOK_FILE);
    let json = serde_json::to_vec_pretty(&document.to_notebook())?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), "notebook written");
    Ok(path)
}

/// Directory name for an execution id. Bytes outside `[A-Za-z0-9_-]` are
/// written as `%XX`, so distinct ids never share a workspace and no id can
/// name a parent or absolute path.
fn workspace_dir_name(id: &str) -> String {
    let mut name = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "%{byte:02X}");
        }
    }
    name
}

fn completed_count(completed: &[u32]) -> u32 {
    u32::try_from(completed.len()).unwrap_or(u32::MAX)
}

/// Linear estimate from the mean time per completed step, e.g. `~12s`.
fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Option<String> {
    if done == 0 {
        return None;
    }
    let per_step = elapsed.as_secs_f64() / done as f64;
    let remaining = per_step * total.saturating_sub(done) as f64;
    Some(format!("~{}s", remaining.ceil() as u64))
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty())
}
