// src/plan/overlay.rs

//! User edits applied to individual steps without regenerating the plan.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::plan::model::{Action, Parameters, Step};

/// Partial step: every present field replaces the original one.
///
/// `parameters` is replaced as a whole, not merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

impl StepPatch {
    pub fn apply(&self, step: &Step) -> Step {
        let mut merged = step.clone();
        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(action) = &self.action {
            merged.action = action.clone();
        }
        if let Some(parameters) = &self.parameters {
            merged.parameters = parameters.clone();
        }
        if let Some(expected) = &self.expected_output {
            merged.expected_output = expected.clone();
        }
        if let Some(estimated) = &self.estimated_time {
            merged.estimated_time = estimated.clone();
        }
        merged
    }
}

/// Overlay keyed by step number (never by array position).
///
/// JSON form: `{"steps": {"2": {"parameters": {...}}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOverlay {
    #[serde(default)]
    pub steps: BTreeMap<u32, StepPatch>,
}

impl PlanOverlay {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn with_patch(mut self, step_number: u32, patch: StepPatch) -> Self {
        self.steps.insert(step_number, patch);
        self
    }

    /// Return the step with its patch applied, borrowing when untouched.
    pub fn apply<'a>(&self, step: &'a Step) -> Cow<'a, Step> {
        match self.steps.get(&step.step_number) {
            Some(patch) => Cow::Owned(patch.apply(step)),
            None => Cow::Borrowed(step),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
