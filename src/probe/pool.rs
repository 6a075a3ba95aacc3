//! Bounded worker pool for probe and ingestion tasks.
//!
//! Submission never blocks: tasks queue on an internal semaphore and at most
//! `workers` of them run at once. Once the pool's cancellation token fires,
//! `submit` refuses new work and queued tasks that have not yet acquired a
//! permit return without running. Callers must not treat submission failure
//! during shutdown as fatal.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool is shutting down")]
    Closed,
}

pub struct WorkerPool {
    limiter: Arc<Semaphore>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(workers.max(1))),
            tasks: JoinSet::new(),
            cancel,
        }
    }

    /// Queue a task. The task waits for a permit inside the pool, so
    /// submission only fails once the pool is shutting down.
    pub fn submit<F>(&mut self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(PoolError::Closed);
        }
        let limiter = self.limiter.clone();
        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let permit = tokio::select! {
                _ = cancel.cancelled() => return,
                permit = limiter.acquire_owned() => permit,
            };
            // The semaphore is never closed explicitly; a failed acquire
            // means the pool is being torn down.
            let Ok(_permit) = permit else { return };
            if cancel.is_cancelled() {
                return;
            }
            task.await;
        });
        Ok(())
    }

    /// Number of tasks submitted and not yet joined.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every queued task. Returns promptly after cancellation
    /// because tasks observe the token cooperatively.
    pub async fn join(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}
