use std::error::Error;

use autolab::cli::CliArgs;
use autolab::run;
use autolab_test_utils::init_tracing;
use clap::Parser;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

const PLAN_JSON: &str = r#"{
  "plan_id": "cli",
  "steps": [
    {"step_number": 2, "name": "Stats", "action": "compute_stats"},
    {"step_number": 1, "name": "Load", "action": "load_data",
     "parameters": {"file_path": "data.csv"}}
  ]
}"#;

#[tokio::test]
async fn dry_run_compiles_without_executing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let plan = dir.path().join("plan.json");
    std::fs::write(&plan, PLAN_JSON)?;
    let workspace = dir.path().join("ws");

    let args = CliArgs::try_parse_from([
        "autolab",
        "--plan",
        plan.to_str().ok_or("non-utf8 path")?,
        "--workspace",
        workspace.to_str().ok_or("non-utf8 path")?,
        "--dry-run",
    ])?;

    let outcome = run(args).await?;

    assert!(outcome.is_none());
    assert!(!workspace.exists());
    Ok(())
}

#[tokio::test]
async fn missing_plan_file_is_an_error() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let args = CliArgs::try_parse_from([
        "autolab",
        "--plan",
        dir.path().join("absent.json").to_str().ok_or("non-utf8 path")?,
        "--dry-run",
    ])?;

    let err = run(args).await.unwrap_err();
    assert!(format!("{err:#}").contains("loading plan"));
    Ok(())
}

#[tokio::test]
async fn invalid_plan_is_rejected_before_running() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let plan = dir.path().join("plan.json");
    std::fs::write(
        &plan,
        r#"{"steps": [{"step_number": 0, "name": "zero", "action": "load_data"}]}"#,
    )?;
    let args = CliArgs::try_parse_from([
        "autolab",
        "--plan",
        plan.to_str().ok_or("non-utf8 path")?,
        "--dry-run",
    ])?;

    let err = run(args).await.unwrap_err();
    assert!(format!("{err:#}").contains("step_number 0"));
    Ok(())
}

#[tokio::test]
async fn explicit_config_must_exist() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let plan = dir.path().join("plan.json");
    std::fs::write(&plan, PLAN_JSON)?;
    let args = CliArgs::try_parse_from([
        "autolab",
        "--plan",
        plan.to_str().ok_or("non-utf8 path")?,
        "--config",
        dir.path().join("missing.toml").to_str().ok_or("non-utf8 path")?,
        "--dry-run",
    ])?;

    assert!(run(args).await.is_err());
    Ok(())
}

#[tokio::test]
async fn launch_failure_yields_failed_outcome() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let plan = dir.path().join("plan.json");
    std::fs::write(&plan, PLAN_JSON)?;
    let config = dir.path().join("Autolab.toml");
    std::fs::write(
        &config,
        "[sandbox]\ninterpreter = \"autolab-no-such-interpreter\"\n\n[report]\nrender_cmd = []\n",
    )?;
    let workspace = dir.path().join("ws");

    let args = CliArgs::try_parse_from([
        "autolab",
        "--plan",
        plan.to_str().ok_or("non-utf8 path")?,
        "--config",
        config.to_str().ok_or("non-utf8 path")?,
        "--workspace",
        workspace.to_str().ok_or("non-utf8 path")?,
        "--execution-id",
        "cli-run",
    ])?;

    let outcome = run(args).await?.ok_or("expected an outcome")?;

    assert!(!outcome.is_success());
    assert_eq!(outcome.execution_id, "cli-run");
    assert_eq!(outcome.outputs.as_ref().map(|o| o.returncode), Some(-1));
    assert!(workspace.join("cli-run").join("report.md").is_file());
    assert!(workspace.join("cli-run").join("analysis.ipynb").is_file());

    let json = serde_json::to_value(&outcome)?;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["outputs"]["returncode"], -1);
    Ok(())
}
