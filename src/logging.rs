// src/logging.rs

//! Logging setup for `autolab` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `AUTOLAB_LOG` environment variable, either a bare level ("debug") or
//!    full directives ("info,autolab::sandbox=debug")
//! 3. default to `info`
//!
//! Tracker entries are mirrored under the [`EXECUTION_TARGET`] target, so
//! `AUTOLAB_LOG=info,autolab::execution=warn` quiets per-step chatter
//! without hiding runner diagnostics.
//!
//! Logs are sent to STDERR so that the execution outcome printed on stdout
//! stays machine-readable.

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;
use crate::types::LogLevel as EntryLevel;

/// Target of the process-log events that mirror tracker entries.
pub const EXECUTION_TARGET: &str = "autolab::execution";

const ENV_VAR: &str = "AUTOLAB_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Initialise global logging subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(ENV_VAR).ok();
    let filter = build_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

/// Mirror one tracker entry to the process log.
pub fn mirror_execution_log(id: &str, level: EntryLevel, message: &str, step: Option<u32>) {
    match level {
        EntryLevel::Debug => {
            debug!(target: EXECUTION_TARGET, execution_id = id, ?step, "{message}")
        }
        EntryLevel::Info => info!(target: EXECUTION_TARGET, execution_id = id, ?step, "{message}"),
        EntryLevel::Warning => {
            warn!(target: EXECUTION_TARGET, execution_id = id, ?step, "{message}")
        }
        EntryLevel::Error => {
            error!(target: EXECUTION_TARGET, execution_id = id, ?step, "{message}")
        }
    }
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(directive_for(lvl));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => {
            let spec = normalise_level_word(spec);
            EnvFilter::try_new(&spec).unwrap_or_else(|e| {
                eprintln!("ignoring invalid {ENV_VAR} value '{spec}': {e}");
                EnvFilter::new(DEFAULT_DIRECTIVE)
            })
        }
        None => EnvFilter::new(DEFAULT_DIRECTIVE),
    }
}

fn directive_for(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Accept the tracker's spelling `warning` and any casing for a bare level.
fn normalise_level_word(spec: &str) -> String {
    let lower = spec.to_lowercase();
    match lower.as_str() {
        "warning" => "warn".to_string(),
        "error" | "warn" | "info" | "debug" | "trace" | "off" => lower,
        _ => spec.to_string(),
    }
}
