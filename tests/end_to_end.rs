// tests/end_to_end.rs
//
// Generated Python runs only where python3 with pandas and matplotlib is
// installed; those tests return early otherwise.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use autolab::compile::{compile_plan, step_marker, BlockKind, BlockRole};
use autolab::engine::{Orchestrator, OutcomeStatus};
use autolab::plan::{Action, Plan, Step};
use autolab::report::{DisabledRenderer, ReportSynthesizer};
use autolab::sandbox::SandboxRunner;
use autolab::tracker::Tracker;
use autolab_test_utils::builders::PlanBuilder;
use autolab_test_utils::{init_tracing, python_analysis_stack_available, with_timeout_secs};
use serde_json::json;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn python_orchestrator(root: &std::path::Path) -> Orchestrator {
    Orchestrator::new(
        Arc::new(Tracker::default()),
        Arc::new(SandboxRunner::new("python3", Duration::from_secs(120))),
        ReportSynthesizer::new(Arc::new(DisabledRenderer)),
        root,
    )
}

fn scenario_a_plan(csv: &std::path::Path) -> Plan {
    Plan::new(
        "scenario-a",
        vec![
            Step::new(1, "Load", Action::LoadData)
                .with_param("file_path", csv.to_string_lossy().into_owned()),
            Step::new(2, "Stats", Action::ComputeStatistics).with_param("columns", json!(["x"])),
        ],
    )
}

#[test]
fn scenario_a_compiles_to_six_blocks() {
    let doc = compile_plan(&scenario_a_plan(std::path::Path::new("t.csv")), None);

    let roles: Vec<_> = doc.blocks().iter().map(|b| b.role).collect();
    assert_eq!(
        roles,
        vec![
            BlockRole::Preamble,
            BlockRole::StepHeader { step_number: 1 },
            BlockRole::StepCode { step_number: 1 },
            BlockRole::StepHeader { step_number: 2 },
            BlockRole::StepCode { step_number: 2 },
            BlockRole::Closing,
        ]
    );
    assert_eq!(doc.blocks()[1].kind, BlockKind::Narrative);
    assert_eq!(doc.blocks()[2].kind, BlockKind::Code);
}

#[test]
fn scenario_b_empty_plan_compiles_to_two_blocks() {
    let doc = compile_plan(&Plan::new("empty", Vec::new()), None);
    assert_eq!(doc.len(), 2);
    assert_eq!(doc.blocks()[0].role, BlockRole::Preamble);
    assert_eq!(doc.blocks()[1].role, BlockRole::Closing);
}

#[test]
fn scenario_c_scatter_references_both_columns() {
    let plan = Plan::new(
        "scenario-c",
        vec![
            Step::new(1, "Scatter", "CreatePlot")
                .with_param("plot_type", "scatter")
                .with_param("x", "a")
                .with_param("y", "b"),
        ],
    );
    let doc = compile_plan(&plan, None);
    let code = &doc.step_code(1).expect("step 1 compiled").source;

    assert!(code.contains("\"a\""));
    assert!(code.contains("\"b\""));
    assert!(code.contains("plots/a_b_scatter.png"));
    assert!(code.contains(&step_marker(1)));
}

#[tokio::test]
async fn scenario_a_runs_against_one_column_csv() -> TestResult {
    if !python_analysis_stack_available() {
        eprintln!("skipping: python3 with pandas/matplotlib not available");
        return Ok(());
    }
    init_tracing();
    let data = tempdir()?;
    let csv = data.path().join("t.csv");
    std::fs::write(&csv, "x\n1\n2\n3\n4\n")?;
    let root = tempdir()?;
    let orchestrator = python_orchestrator(root.path());

    let outcome = with_timeout_secs(
        120,
        orchestrator.execute("scenario-a", &scenario_a_plan(&csv), None),
    )
    .await;

    let outputs = outcome.outputs.as_ref().ok_or("no outputs")?;
    assert_eq!(outcome.status, OutcomeStatus::Success, "stderr: {}", outputs.stderr);
    assert!(outputs.stdout.contains("Loaded 4 rows, 1 columns"));
    assert!(outputs.stdout.contains("Total execution time"));

    let status = orchestrator.tracker().get_status("scenario-a");
    assert_eq!(status.status, "succeeded");
    assert_eq!(status.progress_percent, 100.0);
    Ok(())
}

#[tokio::test]
async fn scenario_b_empty_plan_runs_successfully() -> TestResult {
    if !python_analysis_stack_available() {
        eprintln!("skipping: python3 with pandas/matplotlib not available");
        return Ok(());
    }
    init_tracing();
    let root = tempdir()?;
    let orchestrator = python_orchestrator(root.path());

    let outcome = with_timeout_secs(
        120,
        orchestrator.execute("scenario-b", &Plan::new("empty", Vec::new()), None),
    )
    .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    assert_eq!(orchestrator.tracker().get_status("scenario-b").progress_percent, 0.0);
    Ok(())
}

#[tokio::test]
async fn histogram_artifact_lands_in_plots_dir() -> TestResult {
    if !python_analysis_stack_available() {
        eprintln!("skipping: python3 with pandas/matplotlib not available");
        return Ok(());
    }
    init_tracing();
    let data = tempdir()?;
    let csv = data.path().join("t.csv");
    std::fs::write(&csv, "x,y\n1,2\n2,4\n3,7\n")?;
    let root = tempdir()?;
    let orchestrator = python_orchestrator(root.path());
    let plan = PlanBuilder::new("plots")
        .load_csv(&csv)
        .histogram("x")
        .scatter("x", "y")
        .build();

    let outcome = with_timeout_secs(120, orchestrator.execute("plots", &plan, None)).await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    let work_dir = orchestrator.workspace_for("plots");
    assert!(work_dir.join("plots/x_histogram.png").is_file());
    assert!(work_dir.join("plots/x_y_scatter.png").is_file());
    Ok(())
}

#[tokio::test]
async fn missing_column_fails_at_that_step() -> TestResult {
    if !python_analysis_stack_available() {
        eprintln!("skipping: python3 with pandas/matplotlib not available");
        return Ok(());
    }
    init_tracing();
    let data = tempdir()?;
    let csv = data.path().join("t.csv");
    std::fs::write(&csv, "x\n1\n2\n")?;
    let root = tempdir()?;
    let orchestrator = python_orchestrator(root.path());
    let plan = PlanBuilder::new("bad-column")
        .load_csv(&csv)
        .histogram("nope")
        .report()
        .build();

    let outcome = with_timeout_secs(120, orchestrator.execute("bad-column", &plan, None)).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    let outputs = outcome.outputs.as_ref().ok_or("no outputs")?;
    assert!(outputs.stderr.contains("KeyError"));
    assert!(outputs.returncode > 0);

    let status = orchestrator.tracker().get_status("bad-column");
    assert_eq!(status.status, "failed");
    assert_eq!(status.current_step, 1);
    assert!(status.logs.contains(&"Step 2 failed".to_string()));
    Ok(())
}
