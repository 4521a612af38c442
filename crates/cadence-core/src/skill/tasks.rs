//! Tracking for fire-and-forget executions.
//!
//! Every background task is registered under a fresh id together with a
//! cancellation token, so shutdown can wait for stragglers and then cancel
//! whatever is left.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct TrackedTask {
    skill: String,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Set of in-flight background tasks.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<Uuid, TrackedTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `make(cancel)` as a tracked task under `id`.
    ///
    /// The task removes itself from the registry when it finishes.
    pub fn spawn<F, Fut>(&self, id: Uuid, skill: &str, make: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        self.tasks.insert(
            id,
            TrackedTask {
                skill: skill.to_string(),
                cancel: cancel.clone(),
                handle: None,
            },
        );

        let fut = make(cancel.clone());
        let tasks = Arc::clone(&self.tasks);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task_id = %id, "background task cancelled");
                }
                _ = fut => {}
            }
            tasks.remove(&id);
        });

        // The task may already have finished and removed itself.
        if let Some(mut tracked) = self.tasks.get_mut(&id) {
            tracked.handle = Some(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Skill names of running tasks, keyed by task id.
    pub fn running(&self) -> Vec<(Uuid, String)> {
        self.tasks
            .iter()
            .map(|entry| (*entry.key(), entry.value().skill.clone()))
            .collect()
    }

    /// Cancel one task. Returns false when no such task is running.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.tasks.get(id) {
            Some(tracked) => {
                tracked.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait up to `grace` for tasks to finish, then cancel the rest.
    ///
    /// Returns the number of tasks that had to be cancelled.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + grace;
        let mut cancelled = 0;

        let ids: Vec<Uuid> = self.tasks.iter().map(|e| *e.key()).collect();
        for id in ids {
            let handle = self
                .tasks
                .get_mut(&id)
                .and_then(|mut tracked| tracked.handle.take());
            let Some(mut handle) = handle else {
                continue;
            };

            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                if let Some((_, tracked)) = self.tasks.remove(&id) {
                    tracing::warn!(task_id = %id, skill = %tracked.skill, "background task still running at shutdown, cancelling");
                    tracked.cancel.cancel();
                }
                let _ = handle.await;
                cancelled += 1;
            }
        }

        // Tasks registered before their handle was attached.
        for entry in self.tasks.iter() {
            entry.value().cancel.cancel();
        }
        self.tasks.clear();
        cancelled
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("running", &self.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_task_removes_itself_when_done() {
        let registry = TaskRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        registry.spawn(Uuid::new_v4(), "echo", |_cancel| async move {
            let _ = rx.await;
        });
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.running()[0].1, "echo");

        tx.send(()).unwrap();
        for _ in 0..50 {
            if registry.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_single_task() {
        let registry = TaskRegistry::new();
        let id = Uuid::new_v4();
        registry.spawn(id, "slow", |_cancel| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert!(registry.cancel(&id));
        assert!(!registry.cancel(&Uuid::new_v4()));
        assert_eq!(registry.shutdown(Duration::from_secs(1)).await, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_after_grace() {
        let registry = TaskRegistry::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        registry.spawn(Uuid::new_v4(), "stuck", |_cancel| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let cancelled = registry.shutdown(Duration::from_secs(5)).await;
        assert_eq!(cancelled, 1);
        assert!(registry.is_empty());
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_quick_tasks() {
        let registry = TaskRegistry::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        registry.spawn(Uuid::new_v4(), "quick", |_cancel| async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert_eq!(registry.shutdown(Duration::from_secs(5)).await, 0);
        assert!(finished.load(Ordering::SeqCst));
    }
}
