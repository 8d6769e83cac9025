//! The single consumer that drains the job queue.
//!
//! Per dequeued range: sync the mirror, resolve the endpoints, classify the
//! diff, execute the plan, advance the checkpoint. Only one range is in
//! flight at a time, so the mirror and the checkpoint are exclusively owned
//! here and ordering races cannot occur.
//!
//! # Failure scoping
//!
//! A per-artifact failure (render timeout, transform error, upload error) is
//! logged and counted; sibling artifacts and the checkpoint advance are
//! unaffected. A git or checkpoint failure means the mirror or durable state
//! is in an unknown condition: the range is abandoned, the error propagates
//! out of the run loop, and the process exits visibly rather than retrying.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::classify::{ClassifierRules, InvalidationPlan, classify};
use crate::pipeline::{ArtifactPipeline, Publish, Render, Transform};
use crate::repo::{GitError, Mirror};
use crate::types::{CommitRange, ResolvedRange};
use crate::worker::JobQueue;

/// Errors that abort a range and terminate the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Version-control operation failed; the mirror state is unknown.
    #[error("repository sync failed: {0}")]
    Git(#[from] GitError),

    /// The checkpoint could not be read or written durably.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// What happened to one fully-attempted range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOutcome {
    /// The range with both endpoints resolved.
    pub range: ResolvedRange,
    /// Artifacts the plan selected.
    pub attempted: usize,
    /// Artifacts whose pipeline failed; already logged individually.
    pub failed: usize,
}

/// The processing worker.
pub struct ScreenshotWorker<R, T, P> {
    mirror: Mirror,
    rules: ClassifierRules,
    checkpoint: CheckpointStore,
    pipeline: Arc<ArtifactPipeline<R, T, P>>,
    concurrency: usize,
}

impl<R, T, P> ScreenshotWorker<R, T, P>
where
    R: Render + 'static,
    T: Transform + 'static,
    P: Publish + 'static,
{
    pub fn new(
        mirror: Mirror,
        rules: ClassifierRules,
        checkpoint: CheckpointStore,
        pipeline: Arc<ArtifactPipeline<R, T, P>>,
        concurrency: usize,
    ) -> Self {
        ScreenshotWorker {
            mirror,
            rules,
            checkpoint,
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs the worker loop until shutdown is requested or the queue closes.
    ///
    /// Git and checkpoint errors end the loop with an error; the caller
    /// turns that into a process-level failure.
    pub async fn run(self, mut queue: JobQueue, shutdown: CancellationToken) -> Result<()> {
        info!("Worker loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping worker");
                    break;
                }

                job = queue.recv() => {
                    let Some(range) = job else {
                        info!("Job queue closed");
                        break;
                    };
                    match self.process_range(range).await {
                        Ok(outcome) => {
                            info!(
                                range = %outcome.range,
                                attempted = outcome.attempted,
                                failed = outcome.failed,
                                "Range complete"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Range aborted, stopping worker");
                            return Err(e);
                        }
                    }
                }
            }
        }

        info!("Worker loop stopped");
        Ok(())
    }

    /// Processes one commit range end to end.
    pub async fn process_range(&self, range: CommitRange) -> Result<RangeOutcome> {
        info!(range = %range, "Processing range");

        self.mirror.sync()?;
        let resolved = self.mirror.resolve(&range)?;

        // Operate on the range's end state: enumeration and static serving
        // must see artifacts added mid-range.
        self.mirror.checkout_detached(&resolved.to)?;

        let known = self.mirror.enumerate_artifacts(&self.rules)?;
        let changes = self.mirror.diff(&resolved)?;
        let plan = classify(&self.rules, &changes, &known);
        if matches!(plan, InvalidationPlan::Full) {
            info!(range = %resolved, "Global change detected, rebuilding everything");
        }
        let targets = plan.expand(&known);

        let attempted = targets.len();
        let mut failed = 0;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for artifact in targets {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = pipeline.process(&artifact).await;
                (artifact, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((artifact, Err(e))) => {
                    failed += 1;
                    warn!(artifact = %artifact, error = %e, "Artifact update failed");
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "Artifact task panicked");
                }
            }
        }

        // Every artifact has been attempted; the range counts as processed
        // even when individual artifacts failed.
        self.checkpoint.save(&resolved.to)?;

        Ok(RangeOutcome {
            range: resolved,
            attempted,
            failed,
        })
    }
}
