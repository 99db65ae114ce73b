// src/plan/model.rs

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AutolabError, Result};

pub type PlanId = String;

/// Free-form step parameters. Which keys are required depends on the action.
pub type Parameters = Map<String, Value>;

/// Kind of work a step performs.
///
/// Names are matched case-insensitively with `_` and `-` ignored, so
/// `load_data`, `LoadData` and `load-data` are the same action. Anything else
/// is kept verbatim in `Unrecognized` and compiles to a no-op placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    LoadData,
    ComputeStatistics,
    CreatePlot,
    ComputeCorrelations,
    GenerateReport,
    Unrecognized(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::LoadData => "load_data",
            Action::ComputeStatistics => "compute_stats",
            Action::CreatePlot => "create_plot",
            Action::ComputeCorrelations => "compute_correlations",
            Action::GenerateReport => "generate_report",
            Action::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for Action {
    fn from(raw: String) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "loaddata" => Action::LoadData,
            "computestats" | "computestatistics" => Action::ComputeStatistics,
            "createplot" => Action::CreatePlot,
            "computecorrelations" => Action::ComputeCorrelations,
            "generatereport" => Action::GenerateReport,
            _ => Action::Unrecognized(raw),
        }
    }
}

impl From<&str> for Action {
    fn from(raw: &str) -> Self {
        Action::from(raw.to_string())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Unrecognized(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declarative unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Defines execution order; unique within a plan, not necessarily dense.
    pub step_number: u32,

    #[serde(default)]
    pub name: String,

    pub action: Action,

    #[serde(default)]
    pub parameters: Parameters,

    /// Advisory only.
    #[serde(default)]
    pub expected_output: String,

    /// Advisory only; never enforced.
    #[serde(default)]
    pub estimated_time: String,
}

impl Step {
    pub fn new(step_number: u32, name: impl Into<String>, action: impl Into<Action>) -> Self {
        Self {
            step_number,
            name: name.into(),
            action: action.into(),
            parameters: Parameters::new(),
            expected_output: String::new(),
            estimated_time: String::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

fn default_plan_id() -> PlanId {
    "plan".to_string()
}

/// An ordered set of steps. Treated as immutable once handed to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default = "default_plan_id")]
    pub plan_id: PlanId,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(plan_id: impl Into<PlanId>, steps: Vec<Step>) -> Self {
        Self {
            plan_id: plan_id.into(),
            steps,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and validate a plan from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let plan = Self::from_json_str(&contents)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check step-number invariants: every number is >= 1 and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.step_number == 0 {
                return Err(AutolabError::PlanError(format!(
                    "step '{}' has step_number 0 (numbers start at 1)",
                    step.name
                )));
            }
            if !seen.insert(step.step_number) {
                return Err(AutolabError::PlanError(format!(
                    "duplicate step_number {} in plan '{}'",
                    step.step_number, self.plan_id
                )));
            }
        }
        Ok(())
    }

    /// Steps in ascending `step_number` order, independent of input order.
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_number);
        steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
