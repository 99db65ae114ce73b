// src/compile/mod.rs

//! Plan → Document compilation.
//!
//! - [`step`] compiles a single step into a code fragment (pure, infallible).
//! - [`plan`] assembles preamble, per-step header/code pairs and the closing
//!   summary into a [`Document`].
//! - [`document`] defines the block model and its notebook/program forms.
//! - [`literal`] keeps parameter text inert inside generated code.

pub mod document;
pub mod literal;
pub mod plan;
pub mod step;

/// Workspace subdirectory that generated programs write images into.
pub const PLOTS_DIR: &str = "plots";

pub use document::{Block, BlockKind, BlockRole, Document};
pub use plan::{
    compile_plan, compile_plan_with_diagnostics, parse_step_marker, step_marker, Compilation,
};
pub use step::{compile_step, CodeFragment, Degradation, PlotKind, StepKind};
