//! Bounded background work queue.
//!
//! Cart mutations hand follow-up work (suggestion refreshes, monitoring
//! notifications) to a fixed pool of workers through a bounded channel.
//! Submission never waits: when the queue is full the job is dropped and a
//! warning is logged, so a slow recommendation service cannot stall cart
//! writes.
//!
//! Workers are spawned on a [`TaskTracker`]. On shutdown the caller cancels
//! the [`CancellationToken`]; workers then drain whatever is already queued
//! and exit, and the caller awaits the tracker with a grace timeout.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use cartwise_core::UserId;

/// Work items accepted by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundJob {
    /// Ask the recommendation service for fresh suggestions and store them.
    RefreshSuggestions { user_id: UserId },
    /// Post the user's current cart to the monitoring relay.
    NotifyCartChange { user_id: UserId },
}

impl BackgroundJob {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RefreshSuggestions { .. } => "refresh_suggestions",
            Self::NotifyCartChange { .. } => "notify_cart_change",
        }
    }

    /// The user the job concerns.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::RefreshSuggestions { user_id } | Self::NotifyCartChange { user_id } => *user_id,
        }
    }
}

/// Executes jobs pulled off the queue.
///
/// Handlers own their error reporting; nothing is returned to the worker.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: BackgroundJob);
}

/// Sending half of the queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct BackgroundQueue {
    sender: mpsc::Sender<BackgroundJob>,
}

/// Receiving half of the queue, consumed by [`spawn_workers`].
#[derive(Debug)]
pub struct JobReceiver {
    inner: mpsc::Receiver<BackgroundJob>,
}

impl JobReceiver {
    /// Take the next queued job without waiting.
    ///
    /// Useful in tests that assert what was enqueued without running workers.
    pub fn try_next(&mut self) -> Option<BackgroundJob> {
        self.inner.try_recv().ok()
    }
}

impl BackgroundQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, JobReceiver) {
        let (sender, inner) = mpsc::channel(capacity.max(1));
        (Self { sender }, JobReceiver { inner })
    }

    /// Enqueue a job without waiting. Returns whether it was accepted.
    pub fn submit(&self, job: BackgroundJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!(job = job.kind(), user_id = %job.user_id(), "Background job queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(job = job.kind(), user_id = %job.user_id(), "Background queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(job = job.kind(), user_id = %job.user_id(), "Background queue closed, dropping job");
                false
            }
        }
    }
}

/// Spawn `workers` tasks on `tracker` that feed queued jobs to `handler`.
///
/// Workers exit once `cancel` fires and the queue is empty, or when every
/// [`BackgroundQueue`] handle has been dropped.
pub fn spawn_workers(
    receiver: JobReceiver,
    handler: Arc<dyn JobHandler>,
    workers: usize,
    tracker: &TaskTracker,
    cancel: &CancellationToken,
) {
    let receiver = Arc::new(Mutex::new(receiver.inner));

    for worker in 0..workers.max(1) {
        let receiver = Arc::clone(&receiver);
        let handler = Arc::clone(&handler);
        let cancel = cancel.clone();

        tracker.spawn(async move {
            debug!(worker, "Background worker started");
            while let Some(job) = next_job(&receiver, &cancel).await {
                handler.handle(job).await;
            }
            debug!(worker, "Background worker stopped");
        });
    }

    info!(workers = workers.max(1), "Background workers started");
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn next_job(
    receiver: &Mutex<mpsc::Receiver<BackgroundJob>>,
    cancel: &CancellationToken,
) -> Option<BackgroundJob> {
    let mut receiver = receiver.lock().await;
    if cancel.is_cancelled() {
        return receiver.try_recv().ok();
    }

    tokio::select! {
        biased;
        job = receiver.recv() => job,
        () = cancel.cancelled() => receiver.try_recv().ok(),
    }
}
