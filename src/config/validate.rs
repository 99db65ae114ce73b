// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AutolabError, Result};
use crate::tracker::LOG_WINDOW;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AutolabError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.sandbox, raw.report, raw.tracker))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_sandbox(cfg)?;
    validate_report(cfg)?;
    validate_tracker(cfg)?;
    Ok(())
}

fn validate_sandbox(cfg: &RawConfigFile) -> Result<()> {
    if cfg.sandbox.interpreter.trim().is_empty() {
        return Err(AutolabError::ConfigError(
            "[sandbox].interpreter must not be empty".to_string(),
        ));
    }

    if cfg.sandbox.timeout_secs == 0 {
        return Err(AutolabError::ConfigError(
            "[sandbox].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_report(cfg: &RawConfigFile) -> Result<()> {
    let cmd = &cfg.report.render_cmd;

    // An empty command disables rendering altogether.
    if !cmd.is_empty() {
        if cmd[0].trim().is_empty() {
            return Err(AutolabError::ConfigError(
                "[report].render_cmd program must not be empty".to_string(),
            ));
        }
        for placeholder in ["{input}", "{output}"] {
            if !cmd.iter().any(|arg| arg.contains(placeholder)) {
                return Err(AutolabError::ConfigError(format!(
                    "[report].render_cmd must reference {placeholder}"
                )));
            }
        }
    }

    if cfg.report.render_timeout_secs == 0 {
        return Err(AutolabError::ConfigError(
            "[report].render_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_tracker(cfg: &RawConfigFile) -> Result<()> {
    if cfg.tracker.max_retained_logs < LOG_WINDOW {
        return Err(AutolabError::ConfigError(format!(
            "[tracker].max_retained_logs must be >= {} (got {})",
            LOG_WINDOW, cfg.tracker.max_retained_logs
        )));
    }
    Ok(())
}
