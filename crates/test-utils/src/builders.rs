use std::path::Path;

use autolab::config::{ConfigFile, RawConfigFile};
use autolab::plan::{Action, Plan, Step};
use serde_json::json;

/// Builder for `Plan` that numbers steps 1, 2, 3, ... in call order.
pub struct PlanBuilder {
    plan_id: String,
    steps: Vec<Step>,
}

impl PlanBuilder {
    pub fn new(plan_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            steps: Vec::new(),
        }
    }

    fn next_number(&self) -> u32 {
        self.steps.iter().map(|s| s.step_number).max().unwrap_or(0) + 1
    }

    /// Add a step as-is, keeping its own `step_number`.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn action(self, name: &str, action: impl Into<Action>) -> Self {
        let n = self.next_number();
        self.step(Step::new(n, name, action))
    }

    pub fn load_csv(self, path: impl AsRef<Path>) -> Self {
        let n = self.next_number();
        let path = path.as_ref().to_string_lossy().into_owned();
        self.step(Step::new(n, "Load data", Action::LoadData).with_param("file_path", path))
    }

    pub fn stats(self) -> Self {
        self.action("Summary statistics", Action::ComputeStatistics)
    }

    pub fn stats_for(self, columns: &[&str]) -> Self {
        let n = self.next_number();
        self.step(
            Step::new(n, "Summary statistics", Action::ComputeStatistics)
                .with_param("columns", json!(columns)),
        )
    }

    pub fn histogram(self, column: &str) -> Self {
        let n = self.next_number();
        self.step(
            Step::new(n, format!("Histogram of {column}"), Action::CreatePlot)
                .with_param("plot_type", "histogram")
                .with_param("column", column),
        )
    }

    pub fn scatter(self, x: &str, y: &str) -> Self {
        let n = self.next_number();
        self.step(
            Step::new(n, format!("{x} vs {y}"), Action::CreatePlot)
                .with_param("plot_type", "scatter")
                .with_param("x", x)
                .with_param("y", y),
        )
    }

    pub fn correlations(self) -> Self {
        self.action("Correlations", Action::ComputeCorrelations)
    }

    pub fn report(self) -> Self {
        self.action("Report", Action::GenerateReport)
    }

    pub fn build(self) -> Plan {
        Plan::new(self.plan_id, self.steps)
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.config.sandbox.interpreter = interpreter.to_string();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.config.sandbox.timeout_secs = secs;
        self
    }

    pub fn with_workspace_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.sandbox.workspace_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_render_cmd(mut self, argv: &[&str]) -> Self {
        self.config.report.render_cmd = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Disable fixed-layout rendering so reports always fall back to markdown.
    pub fn without_renderer(mut self) -> Self {
        self.config.report.render_cmd.clear();
        self
    }

    pub fn with_max_retained_logs(mut self, max: usize) -> Self {
        self.config.tracker.max_retained_logs = max;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
