//! Cancellable background task handle.

use parking_lot::Mutex;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A spawned loop bound to a cancellation token.
///
/// Dropping the handle signals the loop to stop without waiting for it.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    /// Spawn `body` with a child token of `parent`.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let handle = tokio::spawn(body(cancel.clone()));
        tracing::debug!(task = name, "Background task started");
        Self { name, cancel, handle: Mutex::new(Some(handle)) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Signal the loop and wait for it to exit. Later calls return immediately.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::error!(task = self.name, error = %err, "Background task panicked");
                }
            }
            tracing::debug!(task = self.name, "Background task stopped");
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_waits() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let root = CancellationToken::new();
        let task = BackgroundTask::spawn("ticker", &root, move |cancel| async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => { counter.fetch_add(1, Ordering::SeqCst); },
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(task.is_running());
        task.stop().await;
        task.stop().await;
        assert!(!task.is_running());

        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_parent_cancel_stops_child() {
        let root = CancellationToken::new();
        let task = BackgroundTask::spawn("waiter", &root, |cancel| async move {
            cancel.cancelled().await;
        });
        root.cancel();
        task.stop().await;
        assert!(!task.is_running());
    }
}
