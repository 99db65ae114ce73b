// src/main.rs

use autolab::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("autolab error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the execution succeeded.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let Some(outcome) = run(args).await? else {
        return Ok(true);
    };
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.is_success())
}
