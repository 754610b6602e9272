//! Bounded hand-off from the audio thread to the planning worker

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::voice::Utterance;

/// One utterance waiting to be planned
#[derive(Debug)]
pub struct PipelineJob {
    pub id: Uuid,
    pub utterance: Utterance,
}

impl PipelineJob {
    #[must_use]
    pub fn new(utterance: Utterance) -> Self {
        Self {
            id: Uuid::new_v4(),
            utterance,
        }
    }
}

/// Producer half; never blocks
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<PipelineJob>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half, owned by the worker
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<PipelineJob>,
}

/// Create a command queue holding up to `capacity` jobs
///
/// # Panics
///
/// Panics if `capacity` is zero; configuration validation rejects that
#[must_use]
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        CommandSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        CommandReceiver { rx },
    )
}

impl CommandSender {
    /// Enqueue without waiting
    ///
    /// Returns `false` when the utterance was dropped because the queue is
    /// full or the worker is gone.
    pub fn try_send(&self, utterance: Utterance) -> bool {
        let job = PipelineJob::new(utterance);
        let id = job.id;

        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::debug!(job_id = %id, "utterance queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    job_id = %job.id,
                    samples = job.utterance.len(),
                    dropped = total,
                    "command queue full, dropping utterance"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    job_id = %job.id,
                    dropped = total,
                    "planning worker stopped, dropping utterance"
                );
                false
            }
        }
    }

    /// Utterances dropped so far
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared drop counter, for status reporting
    #[must_use]
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

impl CommandReceiver {
    /// Wait for the next job; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<PipelineJob> {
        self.rx.recv().await
    }

    /// Next job if one is already waiting
    pub fn try_recv(&mut self) -> Option<PipelineJob> {
        self.rx.try_recv().ok()
    }

    /// Jobs currently waiting
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(tag: i16) -> Utterance {
        Utterance::new(vec![tag; 4], 16_000)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = command_queue(4);
        assert!(tx.try_send(utterance(1)));
        assert!(tx.try_send(utterance(2)));

        assert_eq!(rx.recv().await.unwrap().utterance.samples()[0], 1);
        assert_eq!(rx.recv().await.unwrap().utterance.samples()[0], 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (tx, mut rx) = command_queue(2);
        assert!(tx.try_send(utterance(1)));
        assert!(tx.try_send(utterance(2)));
        assert!(!tx.try_send(utterance(3)));
        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.len(), 2);

        assert_eq!(rx.recv().await.unwrap().utterance.samples()[0], 1);
        assert_eq!(rx.recv().await.unwrap().utterance.samples()[0], 2);
        assert!(rx.is_empty());
    }

    #[test]
    fn test_closed_queue_counts_drop() {
        let (tx, rx) = command_queue(1);
        drop(rx);
        assert!(!tx.try_send(utterance(1)));
        assert_eq!(tx.dropped(), 1);
    }

    #[test]
    fn test_job_ids_unique() {
        assert_ne!(PipelineJob::new(utterance(0)).id, PipelineJob::new(utterance(0)).id);
    }
}
