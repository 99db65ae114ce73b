// src/compile/plan.rs

//! Plan compiler.
//!
//! Layout of the produced document:
//!
//! 1. preamble (title + environment setup)
//! 2. for each step in ascending `step_number`: a narrative header block and
//!    a code block holding the step fragment followed by a progress marker
//! 3. closing summary (reports total wall-clock time)
//!
//! An empty plan yields only blocks 1 and 3.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::compile::document::{Block, BlockRole, Document};
use crate::compile::literal::{comment_text, quoted};
use crate::compile::step::{compile_step, Degradation};
use crate::compile::PLOTS_DIR;
use crate::plan::{Plan, PlanOverlay};

const PREAMBLE_TITLE: &str = "# AutoLab Analysis Report\nGenerated automatically from experimental data";

const CLOSING_TITLE: &str = "## Report Summary";

const CLOSING_CODE: &str = "# Generate summary\n\
print(\"Analysis completed successfully!\")\n\
execution_time = time.perf_counter() - _autolab_started\n\
print(f\"Total execution time: {execution_time:.2f} seconds\")\n";

static STEP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[autolab\] step (\d+) completed\s*$").expect("step marker pattern is valid")
});

/// Line printed on stdout once a step's fragment has run to the end.
pub fn step_marker(step_number: u32) -> String {
    format!("[autolab] step {step_number} completed")
}

/// Inverse of [`step_marker`]: the step number if `line` is a marker.
pub fn parse_step_marker(line: &str) -> Option<u32> {
    STEP_MARKER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Document plus the steps that compiled to placeholders.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub document: Document,
    pub degraded: Vec<(u32, Degradation)>,
}

/// Compile a plan, applying `overlay` per step number first.
pub fn compile_plan(plan: &Plan, overlay: Option<&PlanOverlay>) -> Document {
    compile_plan_with_diagnostics(plan, overlay).document
}

pub fn compile_plan_with_diagnostics(plan: &Plan, overlay: Option<&PlanOverlay>) -> Compilation {
    let steps = plan.ordered_steps();
    let mut blocks = Vec::with_capacity(steps.len() * 2 + 2);
    let mut degraded = Vec::new();

    if let Some(overlay) = overlay {
        for number in overlay.steps.keys() {
            if !steps.iter().any(|s| s.step_number == *number) {
                warn!(
                    plan_id = %plan.plan_id,
                    step = number,
                    "overlay targets a step number that is not in the plan; ignoring"
                );
            }
        }
    }

    blocks.push(Block::code(BlockRole::Preamble, preamble_code()).with_title(PREAMBLE_TITLE));

    for original in steps {
        let step = match overlay {
            Some(overlay) => overlay.apply(original),
            None => std::borrow::Cow::Borrowed(original),
        };
        let number = step.step_number;

        blocks.push(Block::narrative(
            BlockRole::StepHeader {
                step_number: number,
            },
            format!("## Step {}: {}", number, comment_text(&step.name)),
        ));

        let fragment = compile_step(&step);
        if let Some(reason) = fragment.degradation {
            warn!(
                plan_id = %plan.plan_id,
                step = number,
                reason = %reason,
                "step compiled to placeholder"
            );
            degraded.push((number, reason));
        }

        let mut source = fragment.source;
        source.push_str(&format!("print({}, flush=True)\n", quoted(&step_marker(number))));

        blocks.push(Block::code(
            BlockRole::StepCode {
                step_number: number,
            },
            source,
        ));
    }

    blocks.push(Block::code(BlockRole::Closing, CLOSING_CODE).with_title(CLOSING_TITLE));

    debug!(
        plan_id = %plan.plan_id,
        steps = plan.len(),
        blocks = blocks.len(),
        degraded = degraded.len(),
        "plan compiled"
    );

    Compilation {
        document: Document::from_blocks(blocks),
        degraded,
    }
}

fn preamble_code() -> String {
    format!(
        "# Standard data science imports\n\
         import os\n\
         import time\n\
         import warnings\n\
         \n\
         import numpy as np\n\
         import pandas as pd\n\
         import matplotlib\n\
         matplotlib.use(\"Agg\")\n\
         import matplotlib.pyplot as plt\n\
         \n\
         try:\n\
         \x20   import seaborn as sns\n\
         \x20   sns.set_palette(\"husl\")\n\
         except ImportError:\n\
         \x20   sns = None\n\
         \n\
         warnings.filterwarnings(\"ignore\")\n\
         os.makedirs({plots}, exist_ok=True)\n\
         _autolab_started = time.perf_counter()\n",
        plots = quoted(PLOTS_DIR),
    )
}
