//! Detached work registered against an event's lifetime.
//!
//! Cache writes on the response path are spawned here instead of awaited.
//! The host calls [`BackgroundWork::settle`] before tearing down, the way a
//! browser keeps a worker alive until every `waitUntil` promise settles.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

/// Tracks detached tasks. Cloning shares the same set.
#[derive(Clone, Default)]
pub struct BackgroundWork {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl std::fmt::Debug for BackgroundWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundWork").field("pending", &self.pending()).finish()
    }
}

impl BackgroundWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` detached; its outcome never reaches the caller.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(work);
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every registered task, including tasks registered by tasks
    /// that were already running.
    pub async fn settle(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.lock());
            if batch.is_empty() {
                return;
            }
            while let Some(joined) = batch.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "background cache task aborted");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_settle_waits_for_tasks() {
        let work = BackgroundWork::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            work.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        work.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(work.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_follows_nested_registrations() {
        let work = BackgroundWork::new();
        let done = Arc::new(AtomicUsize::new(0));

        let inner_work = work.clone();
        let inner_done = done.clone();
        work.wait_until(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            inner_work.wait_until(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                inner_done.fetch_add(1, Ordering::SeqCst);
            });
        });

        work.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settle_survives_panicking_task() {
        let work = BackgroundWork::new();
        work.wait_until(async { panic!("storage exploded") });
        work.settle().await;
        assert_eq!(work.pending(), 0);
    }

    #[tokio::test]
    async fn test_settle_empty() {
        BackgroundWork::new().settle().await;
    }
}
