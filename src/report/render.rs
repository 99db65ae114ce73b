// src/report/render.rs

//! Fixed-layout renderers for `report.md`.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Converts a markdown file into a print-ready document.
pub trait ReportRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn render<'a>(
        &'a self,
        markdown: &'a Path,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Used when `[report].render_cmd` is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

impl ReportRenderer for DisabledRenderer {
    fn name(&self) -> &str {
        "disabled"
    }

    fn render<'a>(
        &'a self,
        _markdown: &'a Path,
        _output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async { Err(anyhow!("fixed-layout rendering is disabled")) })
    }
}

/// Runs an external converter, e.g. `pandoc {input} -o {output}`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    fn expand(&self, markdown: &Path, output: &Path) -> Vec<String> {
        let input = markdown.to_string_lossy();
        let output = output.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }

    async fn render_inner(&self, markdown: &Path, output: &Path) -> Result<()> {
        let argv = self.expand(markdown, output);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("render command is empty"))?;

        debug!(program = %program, ?args, "rendering report");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning renderer '{program}'"))?;

        // Dropping the future on timeout kills the renderer (kill_on_drop).
        let out = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("renderer timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("waiting for renderer '{program}'"))?;

        if !out.status.success() {
            bail!(
                "renderer '{}' exited with {}: {}",
                program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            bail!("renderer '{}' did not produce {}", program, output.display());
        }

        Ok(())
    }
}

impl ReportRenderer for CommandRenderer {
    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("command")
    }

    fn render<'a>(
        &'a self,
        markdown: &'a Path,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.render_inner(markdown, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted_per_argument() {
        let renderer = CommandRenderer::new(
            vec![
                "pandoc".into(),
                "{input}".into(),
                "-o".into(),
                "{output}".into(),
            ],
            Duration::from_secs(1),
        );
        let argv = renderer.expand(Path::new("w/report.md"), Path::new("w/report.pdf"));
        assert_eq!(argv, vec!["pandoc", "w/report.md", "-o", "w/report.pdf"]);
        assert_eq!(renderer.name(), "pandoc");
    }
}
