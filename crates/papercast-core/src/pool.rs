//! Bounded worker pool for per-item processing.
//!
//! Jobs go through one async-channel queue; each worker pulls a job, runs it
//! against the shared [`PipelineContext`] and answers on the job's oneshot.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{AudioTurn, ItemReport, PipelineContext, process_item};
use crate::{InputItem, PipelineError, ProgressEvent};

/// `Ok(None)` means the item was skipped without producing a summary.
pub type ItemResult = Result<Option<ItemReport>, PipelineError>;

/// One item submitted to the pool.
pub struct ItemJob {
    pub item: InputItem,
    pub index: usize,
    pub total: usize,
    pub topics: Arc<Vec<String>>,
    pub turn: AudioTurn,
    pub result_tx: oneshot::Sender<ItemResult>,
    pub progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

pub struct ItemPool {
    job_tx: async_channel::Sender<ItemJob>,
    pool_handle: JoinHandle<()>,
}

impl ItemPool {
    /// Spawn `num_workers` workers (at least one) sharing `ctx`.
    pub fn new(ctx: Arc<PipelineContext>, cancel: CancellationToken, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<ItemJob>();

        let pool_handle = tokio::spawn(async move {
            let workers: Vec<_> = (0..num_workers.max(1))
                .map(|_| tokio::spawn(worker_loop(job_rx.clone(), ctx.clone(), cancel.clone())))
                .collect();
            drop(job_rx);

            for w in workers {
                if let Err(e) = w.await {
                    tracing::error!(error = %e, "pipeline worker panicked");
                }
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    pub async fn submit(&self, job: ItemJob) {
        // Only fails when every worker is gone; the dropped oneshot reports that.
        let _ = self.job_tx.send(job).await;
    }

    /// Stop accepting jobs and wait for the workers to drain the queue.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

async fn worker_loop(
    job_rx: async_channel::Receiver<ItemJob>,
    ctx: Arc<PipelineContext>,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        let ItemJob {
            item,
            index,
            total,
            topics,
            turn,
            result_tx,
            progress,
        } = job;

        let result = if cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            tokio::select! {
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                r = process_item(&ctx, &item, index, total, &topics, turn, progress.as_ref()) => r,
            }
        };

        let _ = result_tx.send(result);
    }
}
