//! Tracked background work.
//!
//! Cache writes that must not delay a response are spawned here instead of
//! being detached, so the host and tests can wait for them to finish.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

/// Set of in-flight background tasks.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task onto the current runtime and track it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        reap_finished(&mut set);
        set.spawn(task);
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        reap_finished(&mut set);
        set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every tracked task, including ones spawned while waiting,
    /// has finished. Returns how many were still outstanding.
    pub async fn settle(&self) -> usize {
        let mut reaped = 0;
        loop {
            let mut set = {
                let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *guard)
            };
            if set.is_empty() {
                return reaped;
            }
            while let Some(result) = set.join_next().await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "background task failed");
                }
                reaped += 1;
            }
        }
    }
}

/// Drop tasks that already completed so a long-lived set stays bounded.
fn reap_finished(set: &mut JoinSet<()>) {
    while let Some(result) = set.try_join_next() {
        if let Err(e) = result {
            tracing::warn!(error = %e, "background task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_settle_waits_for_all() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn(async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(tasks.settle().await, 3);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_settle_reaps_nested_spawns() {
        let tasks = BackgroundTasks::new();
        let inner = tasks.clone();
        tasks.spawn(async move {
            inner.spawn(async {});
        });

        assert_eq!(tasks.settle().await, 2);
    }

    #[tokio::test]
    async fn test_settle_survives_panicking_task() {
        let tasks = BackgroundTasks::new();
        tasks.spawn(async { panic!("boom") });
        assert_eq!(tasks.settle().await, 1);
    }

    #[tokio::test]
    async fn test_finished_tasks_are_reaped_without_settle() {
        let tasks = BackgroundTasks::new();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();

        for _ in 0..1000 {
            let done_tx = done_tx.clone();
            tasks.spawn(async move {
                let _ = done_tx.send(());
            });
        }
        drop(done_tx);
        while done_rx.recv().await.is_some() {}
        tokio::task::yield_now().await;

        assert_eq!(tasks.len(), 0);
        assert_eq!(tasks.settle().await, 0);
    }

    #[tokio::test]
    async fn test_running_task_stays_tracked() {
        let tasks = BackgroundTasks::new();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        tasks.spawn(async move {
            let _ = release_rx.await;
        });
        tasks.spawn(async {});
        tokio::task::yield_now().await;

        assert_eq!(tasks.len(), 1);
        let _ = release_tx.send(());
        assert_eq!(tasks.settle().await, 1);
    }

    #[tokio::test]
    async fn test_settle_empty() {
        assert_eq!(BackgroundTasks::new().settle().await, 0);
    }
}
