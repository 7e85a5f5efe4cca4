//! Bounded background execution for order pipelines.
//!
//! The webhook acknowledges an update before its pipeline runs. Jobs submitted
//! here wait on a semaphore, so at most `capacity` orders are in flight and
//! the rest queue in submission order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker pool is closed")]
    Closed,
}

#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { permits: Arc::new(Semaphore::new(capacity)), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Spawns `job` once a permit is free. The permit is held until the job
    /// finishes, including when it panics.
    pub fn submit<F>(&self, job: F) -> JoinHandle<Result<F::Output, WorkerError>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!(
                    event_name = "pipeline.order.dropped",
                    "worker pool closed before the job started; job dropped"
                );
                return Err(WorkerError::Closed);
            };
            Ok(job.await)
        })
    }

    /// Submits a job nobody awaits. A job that panics is logged here, and a
    /// job dropped by a closed pool is logged by `submit`.
    pub fn submit_detached<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.submit(job);
        tokio::spawn(async move {
            if let Err(failure) = handle.await {
                error!(
                    event_name = "pipeline.order.panicked",
                    error = %failure,
                    "order job panicked"
                );
            }
        });
    }

    /// Waits until every running job has released its permit, or `timeout`
    /// elapses. Returns whether the pool went idle in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let Ok(capacity) = u32::try_from(self.capacity) else {
            return false;
        };

        // Bound first so a timed-out acquire gives back its partial permits
        // before `in_flight` is read.
        let acquired = tokio::time::timeout(timeout, self.permits.acquire_many(capacity)).await;
        match acquired {
            Ok(Ok(_all)) => {
                info!(event_name = "system.workers.drained", capacity = self.capacity, "worker pool idle");
                true
            }
            Ok(Err(_)) => true,
            Err(_) => {
                warn!(
                    event_name = "system.workers.drain_timeout",
                    in_flight = self.in_flight(),
                    "worker pool still busy at shutdown deadline"
                );
                false
            }
        }
    }

    /// Rejects queued and future jobs. Running jobs are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }
}
