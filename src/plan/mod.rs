// src/plan/mod.rs

//! Declarative analysis plans as supplied by the plan-generation service.
//!
//! - [`model`] holds `Plan`, `Step` and the closed `Action` set.
//! - [`overlay`] holds the per-step user edits applied before compilation.

pub mod model;
pub mod overlay;

pub use model::{Action, Parameters, Plan, PlanId, Step};
pub use overlay::{PlanOverlay, StepPatch};
