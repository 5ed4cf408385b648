//! Fixed-size worker pool with a bounded submission backlog.
//!
//! Every submitted job becomes a task in a [`JoinSet`]. A job waits for one
//! of `size` worker permits before it runs. The submitter only waits once
//! `size * BACKLOG_PER_WORKER` jobs are pending or running, so reading the
//! input stays ahead of the network without holding millions of tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::error::RunError;

/// Jobs allowed in flight per worker before submission blocks.
pub const BACKLOG_PER_WORKER: usize = 64;

/// Bounded pool of async workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Arc<Semaphore>,
    backlog: Arc<Semaphore>,
    tasks: JoinSet<()>,
    size: usize,
    panicked: usize,
}

impl WorkerPool {
    /// Creates a pool running at most `size` jobs at once (minimum 1).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            workers: Arc::new(Semaphore::new(size)),
            backlog: Arc::new(Semaphore::new(size.saturating_mul(BACKLOG_PER_WORKER))),
            tasks: JoinSet::new(),
            size,
            panicked: 0,
        }
    }

    /// Number of concurrent workers.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs submitted and not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Queues `job`. Waits only when the backlog is full.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::SemaphoreClosed`] if the backlog semaphore closed.
    pub async fn submit<F>(&mut self, job: F) -> Result<(), RunError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slot = Arc::clone(&self.backlog)
            .acquire_owned()
            .await
            .map_err(|_| RunError::SemaphoreClosed)?;
        let workers = Arc::clone(&self.workers);

        self.tasks.spawn(async move {
            let _slot = slot;
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            job.await;
        });
        self.reap();
        Ok(())
    }

    /// Collects finished tasks without waiting. Returns how many were reaped.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(result) = self.tasks.try_join_next() {
            self.observe(result);
            reaped += 1;
        }
        reaped
    }

    /// Waits for every submitted job to finish. No timeout is applied.
    ///
    /// Returns the number of jobs that panicked over the pool's lifetime.
    pub async fn drain(mut self) -> usize {
        debug!(in_flight = self.tasks.len(), "draining worker pool");
        while let Some(result) = self.tasks.join_next().await {
            self.observe(result);
        }
        self.panicked
    }

    fn observe(&mut self, result: Result<(), tokio::task::JoinError>) {
        if let Err(e) = result {
            self.panicked += 1;
            error!(error = %e, "worker task failed");
        }
    }
}
