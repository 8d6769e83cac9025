//! Headless render tool invocation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{PipelineError, Render, Result};

/// Extra wall-clock allowance beyond the tool's own timeout budget, covering
/// process startup and page setup before the tool's timer starts.
const WAIT_GRACE: Duration = Duration::from_secs(10);

/// Renders pages with the rasterize script under a headless browser.
///
/// Invocation contract: `<command> <script> <url> <output> <timeout_ms>`.
/// The script prints `Done` on success; any other output is a failure even
/// on a zero exit code.
#[derive(Debug, Clone)]
pub struct RasterizeRenderer {
    command: PathBuf,
    script: PathBuf,
    timeout: Duration,
}

impl RasterizeRenderer {
    pub fn new(command: impl Into<PathBuf>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        RasterizeRenderer {
            command: command.into(),
            script: script.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Render for RasterizeRenderer {
    async fn render(&self, url: &str, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(&self.script)
            .arg(url)
            .arg(output)
            .arg(self.timeout.as_millis().to_string())
            .kill_on_drop(true);

        debug!(url = %url, output = %output.display(), "Invoking render tool");

        let wait = self.timeout + WAIT_GRACE;
        let run = super::run_tool("render", &mut cmd);
        let tool_output = tokio::time::timeout(wait, run)
            .await
            .map_err(|_| PipelineError::RenderTimeout(wait))??;

        let stdout = String::from_utf8_lossy(&tool_output.stdout);
        if stdout.trim() != "Done" {
            return Err(PipelineError::ToolFailed {
                tool: "render",
                diagnostic: stdout.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // These tests drive the renderer with small shell stand-ins for the real
    // tool, exercising the invocation contract without a headless browser.

    fn script_renderer(dir: &Path, body: &str, timeout: Duration) -> RasterizeRenderer {
        let script = dir.join("fake-rasterize.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        RasterizeRenderer::new("sh", script, timeout)
    }

    #[tokio::test]
    async fn done_output_is_success() {
        let dir = tempdir().unwrap();
        let renderer = script_renderer(
            dir.path(),
            "touch \"$2\"; echo Done",
            Duration::from_secs(5),
        );

        let out = dir.path().join("shot.png");
        renderer.render("http://unused", &out).await.unwrap();
        assert!(out.exists());
    }

    #[tokio::test]
    async fn non_done_output_is_failure() {
        let dir = tempdir().unwrap();
        let renderer = script_renderer(
            dir.path(),
            "echo 'Unable to load'",
            Duration::from_secs(5),
        );

        let result = renderer.render("http://unused", &dir.path().join("x.png")).await;
        assert!(matches!(
            result,
            Err(PipelineError::ToolFailed { tool: "render", .. })
        ));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let dir = tempdir().unwrap();
        let renderer = script_renderer(dir.path(), "exit 3", Duration::from_secs(5));

        let result = renderer.render("http://unused", &dir.path().join("x.png")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tool_receives_timeout_in_millis() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("args.txt");
        let renderer = script_renderer(
            dir.path(),
            &format!("echo \"$3\" > {}; echo Done", marker.display()),
            Duration::from_secs(20),
        );

        renderer
            .render("http://unused", &dir.path().join("x.png"))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "20000");
    }
}
