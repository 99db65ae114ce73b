// src/lib.rs

pub mod cli;
pub mod compile;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod plan;
pub mod report;
pub mod sandbox;
pub mod tracker;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::compile::compile_plan_with_diagnostics;
use crate::config::{default_config_path, load_and_validate, load_or_default, ConfigFile};
use crate::engine::{ExecutionOutcome, Orchestrator};
use crate::plan::{Plan, PlanOverlay};
use crate::tracker::Tracker;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - plan / overlay loading
/// - tracker, sandbox runner and report synthesizer
/// - Ctrl-C → cancellation of the running execution
///
/// Returns `None` for `--dry-run`, which only prints the generated program.
pub async fn run(args: CliArgs) -> Result<Option<ExecutionOutcome>> {
    let cfg = resolve_config(&args)?;

    let plan = Plan::load(&args.plan)
        .with_context(|| format!("loading plan {}", args.plan.display()))?;
    let overlay = args
        .overlay
        .as_ref()
        .map(|path| {
            PlanOverlay::load(path).with_context(|| format!("loading overlay {}", path.display()))
        })
        .transpose()?;

    if args.dry_run {
        print_dry_run(&plan, overlay.as_ref());
        return Ok(None);
    }

    let execution_id = args
        .execution_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let tracker = Arc::new(Tracker::from_config(&cfg.tracker));
    let orchestrator = Arc::new(Orchestrator::from_config(&cfg, tracker));
    info!(
        execution_id = %execution_id,
        plan_id = %plan.plan_id,
        workspace = %orchestrator.workspace_for(&execution_id).display(),
        "starting execution"
    );

    let handle = orchestrator.spawn(execution_id.clone(), plan, overlay);

    // Ctrl-C → cancel the execution; the handle still resolves to an outcome.
    {
        let orchestrator = Arc::clone(&orchestrator);
        let execution_id = execution_id.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!(execution_id = %execution_id, "Ctrl+C received; cancelling");
            orchestrator.cancel(&execution_id);
        });
    }

    let outcome = handle.await.context("execution task failed")?;
    let status = orchestrator.tracker().get_status(&execution_id);
    debug!(?status, "final tracker status");

    Ok(Some(outcome))
}

/// Load the config file and apply CLI overrides.
///
/// An explicit `--config` must exist; the default path may be absent.
fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut cfg = match &args.config {
        Some(path) => load_and_validate(path)?,
        None => load_or_default(default_config_path())?,
    };

    if let Some(dir) = &args.workspace {
        cfg.sandbox.workspace_root = dir.clone();
    }
    if let Some(secs) = args.timeout_secs {
        cfg.sandbox.timeout_secs = secs;
    }
    debug!(
        timeout = ?cfg.sandbox.timeout(),
        workspace_root = %cfg.sandbox.workspace_root.display(),
        "configuration resolved"
    );
    Ok(cfg)
}

/// Dry-run output: degraded steps, then the generated program.
fn print_dry_run(plan: &Plan, overlay: Option<&PlanOverlay>) {
    let compilation = compile_plan_with_diagnostics(plan, overlay);

    println!("# autolab dry-run: plan {} ({} steps)", plan.plan_id, plan.len());
    for (step_number, reason) in &compilation.degraded {
        println!("# step {step_number} compiles to a placeholder: {reason}");
    }
    println!();
    print!("{}", compilation.document.to_program());

    debug!("dry-run complete (no execution)");
}
