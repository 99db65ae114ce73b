// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `autolab`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "autolab",
    version,
    about = "Compile a JSON analysis plan into a notebook, run it and write a report.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the analysis plan (JSON).
    #[arg(long, value_name = "PATH")]
    pub plan: PathBuf,

    /// Optional per-step overrides (JSON), merged over the plan at compile
    /// time. The plan file itself is never modified.
    #[arg(long, value_name = "PATH")]
    pub overlay: Option<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Autolab.toml` in the current working directory. A missing
    /// default file means "all defaults".
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Execution id. Defaults to a random UUID.
    #[arg(long, value_name = "ID")]
    pub execution_id: Option<String>,

    /// Root directory for per-execution workspaces (overrides
    /// `sandbox.workspace_root`).
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Wall-clock limit for the generated program, in seconds (overrides
    /// `sandbox.timeout_secs`).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AUTOLAB_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Compile the plan and print the generated program; nothing is run.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
