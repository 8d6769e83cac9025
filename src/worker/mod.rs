//! The job queue and the processing worker.

mod queue;
mod worker;

pub use queue::{JobQueue, JobSender, job_queue};
pub use worker::{RangeOutcome, ScreenshotWorker, WorkerError};
