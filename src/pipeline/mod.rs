//! The per-artifact pipeline: render, transform, publish.
//!
//! Each external tool sits behind a small capability trait with a typed
//! success/failure outcome, so the worker can be tested against fakes and
//! all tools share uniform timeout and error handling. An artifact is
//! processed as an independently-failable unit: the pipeline returns one
//! result per artifact and never touches its siblings.

mod publish;
mod render;
mod transform;

pub use publish::S3Publisher;
pub use render::RasterizeRenderer;
pub use transform::MagickTransformer;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::ArtifactId;

/// Errors from pipeline steps.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The external tool exited unsuccessfully or broke its output contract.
    #[error("{tool} failed: {diagnostic}")]
    ToolFailed { tool: &'static str, diagnostic: String },

    /// The render tool did not finish within its bounded wait.
    #[error("render timed out after {0:?}")]
    RenderTimeout(Duration),

    /// The tool reported success but the expected output file is missing.
    #[error("expected output file missing: {0}")]
    MissingOutput(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Renders a page at a URL into an image file.
#[async_trait]
pub trait Render: Send + Sync {
    async fn render(&self, url: &str, output: &Path) -> Result<()>;
}

/// Produces the square thumbnail for a rendered image.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Uploads an image under a storage key with public-read visibility.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, file: &Path, key: &str) -> Result<()>;
}

/// Pipeline settings shared across artifacts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for rendered and resized images.
    pub output_dir: PathBuf,

    /// Base URL of this daemon's exercise-file route; the render tool loads
    /// `<base_url>/exercises/<name>.html` so it sees exactly the
    /// checked-out mirror state.
    pub base_url: String,

    /// Edge length of the square thumbnail, also used in its file name.
    pub thumbnail_dimension: u32,
}

/// The render → transform → publish sequence for one artifact.
pub struct ArtifactPipeline<R, T, P> {
    config: PipelineConfig,
    render: R,
    transform: T,
    publish: P,
}

impl<R: Render, T: Transform, P: Publish> ArtifactPipeline<R, T, P> {
    pub fn new(config: PipelineConfig, render: R, transform: T, publish: P) -> Self {
        ArtifactPipeline {
            config,
            render,
            transform,
            publish,
        }
    }

    /// Regenerates and publishes one artifact.
    ///
    /// Re-running this for an already-published artifact re-uploads the same
    /// keys, which is harmless; the worker relies on that for crash
    /// recovery.
    pub async fn process(&self, artifact: &ArtifactId) -> Result<()> {
        let dim = self.config.thumbnail_dimension;
        let url = format!(
            "{}/exercises/{}.html",
            self.config.base_url.trim_end_matches('/'),
            artifact
        );
        let image_name = format!("{}.png", artifact);
        let thumb_name = format!("{}_{}.png", artifact, dim);
        let image_path = self.config.output_dir.join(&image_name);
        let thumb_path = self.config.output_dir.join(&thumb_name);

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        debug!(artifact = %artifact, url = %url, "Rendering");
        self.render.render(&url, &image_path).await?;
        if !image_path.exists() {
            return Err(PipelineError::MissingOutput(image_path));
        }

        self.transform.transform(&image_path, &thumb_path).await?;

        self.publish.publish(&image_path, &image_name).await?;
        self.publish.publish(&thumb_path, &thumb_name).await?;

        info!(artifact = %artifact, "Published screenshot and thumbnail");
        Ok(())
    }
}

/// Runs an external tool to completion, mapping failure to
/// [`PipelineError::ToolFailed`] with the tool's stderr as the diagnostic.
pub(crate) async fn run_tool(
    tool: &'static str,
    command: &mut tokio::process::Command,
) -> Result<std::process::Output> {
    let output = command.output().await?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(PipelineError::ToolFailed {
            tool,
            diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakePipeline, fake_pipeline};

    fn test_config(output_dir: PathBuf) -> PipelineConfig {
        PipelineConfig {
            output_dir,
            base_url: "http://127.0.0.1:5000/exercise-screens/exercise-file".to_string(),
            thumbnail_dimension: 256,
        }
    }

    #[tokio::test]
    async fn process_runs_all_steps_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, log) = fake_pipeline(test_config(dir.path().to_path_buf()));

        pipeline.process(&ArtifactId::new("addition")).await.unwrap();

        let events = log.events();
        assert_eq!(
            events,
            vec![
                "render addition".to_string(),
                "transform addition_256.png".to_string(),
                "publish addition.png".to_string(),
                "publish addition_256.png".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn process_builds_url_from_base() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, log) = fake_pipeline(test_config(dir.path().to_path_buf()));

        pipeline.process(&ArtifactId::new("addition")).await.unwrap();

        assert_eq!(
            log.rendered_urls(),
            vec![
                "http://127.0.0.1:5000/exercise-screens/exercise-file/exercises/addition.html"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn render_failure_stops_before_publish() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, log): (FakePipeline, _) = fake_pipeline(test_config(dir.path().to_path_buf()));
        log.fail_render("addition");

        let result = pipeline.process(&ArtifactId::new("addition")).await;

        assert!(result.is_err());
        assert!(log.events().iter().all(|e| !e.starts_with("publish")));
    }

    #[tokio::test]
    async fn missing_render_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, log) = fake_pipeline(test_config(dir.path().to_path_buf()));
        log.skip_render_output();

        let result = pipeline.process(&ArtifactId::new("addition")).await;

        assert!(matches!(result, Err(PipelineError::MissingOutput(_))));
    }
}
