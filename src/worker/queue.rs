//! FIFO mailbox of commit-range jobs.
//!
//! Producers (the webhook handler, the startup backfill) enqueue from any
//! task; exactly one consumer — the worker — dequeues. Strict FIFO, no
//! deduplication: overlapping ranges queued back-to-back are both processed
//! in order, which is safe because classification is idempotent and the
//! checkpoint always reflects the most recently completed range.

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::CommitRange;

/// Creates the queue, returning the producer and consumer halves.
pub fn job_queue() -> (JobSender, JobQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobSender(tx), JobQueue(rx))
}

/// Producer half; cheap to clone, one per enqueue site.
#[derive(Debug, Clone)]
pub struct JobSender(mpsc::UnboundedSender<CommitRange>);

impl JobSender {
    /// Appends a range to the queue.
    ///
    /// Returns `false` when the worker has shut down and the job cannot be
    /// accepted.
    pub fn enqueue(&self, range: CommitRange) -> bool {
        match self.0.send(range) {
            Ok(()) => true,
            Err(e) => {
                warn!(range = %e.0, "Worker gone, dropping job");
                false
            }
        }
    }
}

/// Consumer half, owned by the worker.
#[derive(Debug)]
pub struct JobQueue(mpsc::UnboundedReceiver<CommitRange>);

impl JobQueue {
    /// Waits for the next job. Returns `None` once every sender has been
    /// dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<CommitRange> {
        self.0.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommitId;

    fn range(from: char, to: char) -> CommitRange {
        CommitRange::new(
            CommitId::new(String::from(from).repeat(40)),
            CommitId::new(String::from(to).repeat(40)),
        )
    }

    #[tokio::test]
    async fn jobs_arrive_in_fifo_order() {
        let (tx, mut rx) = job_queue();

        assert!(tx.enqueue(range('a', 'b')));
        assert!(tx.enqueue(range('b', 'c')));
        assert!(tx.enqueue(range('c', 'd')));

        assert_eq!(rx.recv().await, Some(range('a', 'b')));
        assert_eq!(rx.recv().await, Some(range('b', 'c')));
        assert_eq!(rx.recv().await, Some(range('c', 'd')));
    }

    #[tokio::test]
    async fn overlapping_ranges_are_not_deduplicated() {
        let (tx, mut rx) = job_queue();

        tx.enqueue(range('a', 'b'));
        tx.enqueue(range('a', 'b'));
        drop(tx);

        assert_eq!(rx.recv().await, Some(range('a', 'b')));
        assert_eq!(rx.recv().await, Some(range('a', 'b')));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn recv_returns_none_after_all_senders_drop() {
        let (tx, mut rx) = job_queue();
        let tx2 = tx.clone();

        drop(tx);
        tx2.enqueue(range('a', 'b'));
        drop(tx2);

        assert_eq!(rx.recv().await, Some(range('a', 'b')));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn enqueue_reports_closed_queue() {
        let (tx, rx) = job_queue();
        drop(rx);
        assert!(!tx.enqueue(range('a', 'b')));
    }
}
