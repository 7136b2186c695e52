//! Self-rescheduling background loops with their own cancellation handle.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// A spawned loop plus the handle that stops it.
///
/// Dropping a `ScheduledTask` does not stop the loop; call [`ScheduledTask::stop`].
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    stop: Shutdown,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `body`, handing it the receiver it must select on.
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let stop = Shutdown::new();
        let handle = tokio::spawn(body(stop.subscribe()));
        tracing::debug!(task = name, "Scheduled task started");
        Self { name, stop, handle }
    }

    /// Spawn a loop that runs `cycle`, then sleeps `interval`, until stopped.
    ///
    /// The delay starts after the cycle completes, so a slow cycle pushes the
    /// next one back instead of overlapping it.
    pub fn every<F, Fut>(name: &'static str, interval: Duration, mut cycle: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(name, move |mut stop| async move {
            loop {
                tokio::select! {
                    _ = cycle() => {}
                    _ = stop.recv() => break,
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.recv() => break,
                }
            }
            tracing::info!(task = name, "Scheduled task stopped");
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        self.stop.trigger();
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, error = %e, "Scheduled task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_runs_until_stopped() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let task = ScheduledTask::every("counter", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        task.stop().await;
        let after_stop = runs.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several cycles, got {}", after_stop);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_sleep() {
        let task = ScheduledTask::every("slow", Duration::from_secs(3600), || async {});
        tokio::time::sleep(Duration::from_millis(10)).await;
        tokio::time::timeout(Duration::from_secs(1), task.stop())
            .await
            .expect("stop should not wait for the sleep to elapse");
    }
}
