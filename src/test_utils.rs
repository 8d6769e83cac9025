//! Shared test fixtures: a throwaway upstream repository and fake pipeline
//! capabilities that record their invocations.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::pipeline::{
    ArtifactPipeline, PipelineConfig, PipelineError, Publish, Render, Transform,
};
use crate::repo::{run_git, run_git_stdout};
use crate::types::CommitId;

/// A real git repository in a temp directory, standing in for the upstream.
pub struct TestUpstream {
    dir: TempDir,
    branch: String,
}

impl TestUpstream {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create upstream tempdir");
        run_git(dir.path(), &["init"]).expect("git init");
        run_git(dir.path(), &["config", "user.email", "test@example.com"]).unwrap();
        run_git(dir.path(), &["config", "user.name", "Test"]).unwrap();
        let branch = run_git_stdout(dir.path(), &["symbolic-ref", "--short", "HEAD"])
            .expect("read default branch");
        TestUpstream { dir, branch }
    }

    /// Clone URL: the repository's path on disk.
    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn default_branch(&self) -> &str {
        &self.branch
    }

    /// Writes (or overwrites) a file and commits it, returning the new head.
    pub fn commit_file(&self, path: &str, contents: &str, message: &str) -> CommitId {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, contents).unwrap();
        run_git(self.dir.path(), &["add", path]).unwrap();
        run_git(self.dir.path(), &["commit", "-m", message]).unwrap();
        self.head()
    }

    /// Removes a file and commits the deletion, returning the new head.
    pub fn delete_file(&self, path: &str, message: &str) -> CommitId {
        run_git(self.dir.path(), &["rm", path]).unwrap();
        run_git(self.dir.path(), &["commit", "-m", message]).unwrap();
        self.head()
    }

    /// The current head commit.
    pub fn head(&self) -> CommitId {
        let head = run_git_stdout(self.dir.path(), &["rev-parse", "HEAD"]).unwrap();
        CommitId::parse(head).unwrap()
    }
}

#[derive(Default)]
struct LogInner {
    events: Vec<String>,
    rendered_urls: Vec<String>,
    fail_render: HashSet<String>,
    skip_render_output: bool,
}

/// Shared record of what the fake pipeline did, with failure injection.
#[derive(Clone, Default)]
pub struct PipelineLog(Arc<Mutex<LogInner>>);

impl PipelineLog {
    /// Every step invocation, in order: `render <artifact>`,
    /// `transform <file>`, `publish <key>`.
    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().events.clone()
    }

    /// URLs handed to the render step, in order.
    pub fn rendered_urls(&self) -> Vec<String> {
        self.0.lock().unwrap().rendered_urls.clone()
    }

    /// Artifact names handed to the render step, in order.
    pub fn rendered_artifacts(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix("render ").map(String::from))
            .collect()
    }

    /// Makes renders of the named artifact fail.
    pub fn fail_render(&self, artifact: &str) {
        self.0.lock().unwrap().fail_render.insert(artifact.to_string());
    }

    /// Makes the fake renderer report success without writing its output
    /// file.
    pub fn skip_render_output(&self) {
        self.0.lock().unwrap().skip_render_output = true;
    }

    fn record(&self, event: String) {
        self.0.lock().unwrap().events.push(event);
    }
}

/// Derives the artifact name from a render URL's last path segment.
fn artifact_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".html")
        .to_string()
}

pub struct FakeRender(PipelineLog);

#[async_trait]
impl Render for FakeRender {
    async fn render(&self, url: &str, output: &Path) -> Result<(), PipelineError> {
        let artifact = artifact_from_url(url);
        let (failing, skip_output) = {
            let mut inner = self.0.0.lock().unwrap();
            inner.events.push(format!("render {}", artifact));
            inner.rendered_urls.push(url.to_string());
            (
                inner.fail_render.contains(&artifact),
                inner.skip_render_output,
            )
        };

        if failing {
            return Err(PipelineError::ToolFailed {
                tool: "render",
                diagnostic: "injected render failure".to_string(),
            });
        }
        if !skip_output {
            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(output, b"png").await?;
        }
        Ok(())
    }
}

pub struct FakeTransform(PipelineLog);

#[async_trait]
impl Transform for FakeTransform {
    async fn transform(&self, _input: &Path, output: &Path) -> Result<(), PipelineError> {
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.0.record(format!("transform {}", name));
        tokio::fs::write(output, b"thumb").await?;
        Ok(())
    }
}

pub struct FakePublish(PipelineLog);

#[async_trait]
impl Publish for FakePublish {
    async fn publish(&self, _file: &Path, key: &str) -> Result<(), PipelineError> {
        self.0.record(format!("publish {}", key));
        Ok(())
    }
}

/// The fake pipeline assembly used across worker and pipeline tests.
pub type FakePipeline = Arc<ArtifactPipeline<FakeRender, FakeTransform, FakePublish>>;

/// Builds a pipeline whose capabilities only record what they were asked to
/// do.
pub fn fake_pipeline(config: PipelineConfig) -> (FakePipeline, PipelineLog) {
    let log = PipelineLog::default();
    let pipeline = Arc::new(ArtifactPipeline::new(
        config,
        FakeRender(log.clone()),
        FakeTransform(log.clone()),
        FakePublish(log.clone()),
    ));
    (pipeline, log)
}
