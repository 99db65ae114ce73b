// src/report/mod.rs

//! Report synthesis: execution result → `report.md` → (best effort)
//! `report.pdf`.
//!
//! The structured-text report is always written. Fixed-layout rendering is
//! attempted afterwards; when it fails the markdown file itself becomes the
//! deliverable and the outcome says so via [`ReportArtifact::FallbackPlain`].

pub mod markdown;
pub mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ReportSection;
use crate::errors::Result;
use crate::sandbox::ExecutionResult;

pub use markdown::build_markdown;
pub use render::{CommandRenderer, DisabledRenderer, ReportRenderer};

pub const MARKDOWN_FILE: &str = "report.md";
pub const RENDERED_FILE: &str = "report.pdf";

/// Which branch of the two-stage synthesis produced the deliverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportArtifact {
    Rendered { path: PathBuf, markdown_path: PathBuf },
    FallbackPlain { path: PathBuf, reason: String },
}

impl ReportArtifact {
    /// The deliverable: the PDF, or the markdown on fallback.
    pub fn path(&self) -> &Path {
        match self {
            ReportArtifact::Rendered { path, .. } => path,
            ReportArtifact::FallbackPlain { path, .. } => path,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, ReportArtifact::Rendered { .. })
    }
}

/// Builds reports for finished executions.
#[derive(Clone)]
pub struct ReportSynthesizer {
    renderer: Arc<dyn ReportRenderer>,
}

impl std::fmt::Debug for ReportSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSynthesizer")
            .field("renderer", &self.renderer.name())
            .finish()
    }
}

impl ReportSynthesizer {
    pub fn new(renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { renderer }
    }

    /// Renderer from `[report]`: an empty `render_cmd` disables rendering.
    pub fn from_config(cfg: &ReportSection) -> Self {
        let renderer: Arc<dyn ReportRenderer> = if cfg.render_cmd.is_empty() {
            Arc::new(DisabledRenderer)
        } else {
            Arc::new(CommandRenderer::new(
                cfg.render_cmd.clone(),
                cfg.render_timeout(),
            ))
        };
        Self::new(renderer)
    }

    /// Write `report.md`, then try to render `report.pdf`.
    ///
    /// Only a failure to write the markdown is an error; render failures
    /// produce `FallbackPlain`.
    pub async fn synthesize(
        &self,
        result: &ExecutionResult,
        work_dir: &Path,
    ) -> Result<ReportArtifact> {
        let markdown_path = work_dir.join(MARKDOWN_FILE);
        let text = build_markdown(result, Local::now());

        tokio::fs::write(&markdown_path, text)
            .await
            .with_context(|| format!("writing {}", markdown_path.display()))?;

        let rendered_path = work_dir.join(RENDERED_FILE);
        let artifact = match self.renderer.render(&markdown_path, &rendered_path).await {
            Ok(()) => ReportArtifact::Rendered {
                path: rendered_path,
                markdown_path,
            },
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(
                    renderer = self.renderer.name(),
                    reason = %reason,
                    "fixed-layout rendering failed; using markdown report"
                );
                ReportArtifact::FallbackPlain {
                    path: markdown_path,
                    reason,
                }
            }
        };

        info!(path = %artifact.path().display(), rendered = artifact.is_rendered(), "report generated");
        Ok(artifact)
    }
}
