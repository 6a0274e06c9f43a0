use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Process-wide run flag plus every worker spawned under it.
///
/// The flag only ever goes from running to stopped. Connection close signals
/// are children of it, so stopping also releases every session.
#[derive(Clone, Default)]
pub struct Shutdown {
    run: CancellationToken,
    workers: TaskTracker,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        !self.run.is_cancelled()
    }

    /// Flips the run flag. Calling it again is a no-op.
    pub fn trigger(&self) {
        self.run.cancel();
    }

    pub async fn stopped(&self) {
        self.run.cancelled().await
    }

    /// Sleeps for `delay` unless the server stops first. Returns whether it is still running.
    pub async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.run.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// A close signal that fires on its own or when the whole server stops.
    pub fn child(&self) -> CancellationToken {
        self.run.child_token()
    }

    pub fn spawn<F>(&self, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.workers.spawn(worker);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting new workers and waits for the spawned ones to finish.
    pub async fn join_all(&self) {
        self.workers.close();
        self.workers.wait().await;
    }
}
