// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [sandbox]
/// interpreter = "python3"
/// timeout_secs = 300
/// workspace_root = "workspace"
///
/// [report]
/// render_cmd = ["pandoc", "{input}", "-o", "{output}"]
///
/// [tracker]
/// max_retained_logs = 1000
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub sandbox: SandboxSection,

    #[serde(default)]
    pub report: ReportSection,

    #[serde(default)]
    pub tracker: TrackerSection,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `validate.rs`) or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub sandbox: SandboxSection,
    pub report: ReportSection,
    pub tracker: TrackerSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        sandbox: SandboxSection,
        report: ReportSection,
        tracker: TrackerSection,
    ) -> Self {
        Self {
            sandbox,
            report,
            tracker,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let raw = RawConfigFile::default();
        Self::new_unchecked(raw.sandbox, raw.report, raw.tracker)
    }
}

/// `[sandbox]` section: how generated programs are executed.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSection {
    /// Interpreter used to run `analysis.py`.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extra arguments placed before the program path.
    #[serde(default)]
    pub interpreter_args: Vec<String>,

    /// Hard wall-clock limit for one execution.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory under which one workspace per execution is created.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
}

impl SandboxSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("workspace")
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            workspace_root: default_workspace_root(),
        }
    }
}

/// `[report]` section: fixed-layout rendering of `report.md`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportSection {
    /// Renderer command line. `{input}` and `{output}` are replaced with the
    /// markdown and PDF paths. An empty list disables rendering.
    #[serde(default = "default_render_cmd")]
    pub render_cmd: Vec<String>,

    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
}

impl ReportSection {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

fn default_render_cmd() -> Vec<String> {
    ["pandoc", "{input}", "-o", "{output}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_render_timeout_secs() -> u64 {
    60
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            render_cmd: default_render_cmd(),
            render_timeout_secs: default_render_timeout_secs(),
        }
    }
}

/// `[tracker]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSection {
    /// Upper bound on stored log entries per execution; oldest are evicted.
    #[serde(default = "default_max_retained_logs")]
    pub max_retained_logs: usize,
}

fn default_max_retained_logs() -> usize {
    1000
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            max_retained_logs: default_max_retained_logs(),
        }
    }
}
