//! # TaskGroup: bounded set of cooperative tasks with a join barrier.
//!
//! A [`TaskGroup`] wraps a [`JoinSet`] and an optional [`Semaphore`] that caps how
//! many tasks run at once.
//!
//! ## Lifecycle
//! ```text
//! start(task) ──► acquire permit (if limited) ──► JoinSet::spawn(task + permit)
//!                                                        │
//! join_next() / reap() / join() ◄── finished tasks ◄─────┘
//!
//! drop(group) ──► JoinSet aborts every task still running
//! ```
//!
//! ## Rules
//! - **Scoped**: dropping the group aborts everything it still tracks, so an early
//!   return or a cancelled owner never leaves a task orphaned.
//! - **Failures are kept**: errors and panics are reported by `join_next`/`reap`/`join`.
//! - **Not failures**: tasks that end with [`StreamError::Cancelled`] or were aborted.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::config::Config;
use crate::error::{from_panic, StreamError};

type TaskResult = Result<(), StreamError>;

/// Tracks in-flight tasks started by an operator.
///
/// # Example
/// ```
/// use streamvisor::{StreamError, TaskGroup};
///
/// # tokio_test::block_on(async {
/// let mut group = TaskGroup::with_limit(2);
/// for i in 0..4 {
///     group.start(async move {
///         if i == 3 { Err(StreamError::msg("task 3 failed")) } else { Ok(()) }
///     }).await?;
/// }
/// let err = group.join().await.unwrap_err();
/// assert_eq!(err.to_string(), "upstream failure: task 3 failed");
/// assert!(group.is_empty());
/// # Ok::<_, StreamError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct TaskGroup {
    set: JoinSet<TaskResult>,
    semaphore: Option<Arc<Semaphore>>,
}

impl TaskGroup {
    /// Creates a group without a concurrency limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group running at most `limit` tasks at once (`0` = unlimited).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            set: JoinSet::new(),
            semaphore: match limit {
                0 => None,
                n => Some(Arc::new(Semaphore::new(n))),
            },
        }
    }

    /// Creates a group honoring [`Config::max_concurrent`].
    pub fn from_config(cfg: &Config) -> Self {
        Self::with_limit(cfg.concurrency_limit().unwrap_or(0))
    }

    /// Starts `task` on the current runtime and tracks it.
    ///
    /// With a limit configured, waits until a running task finishes first.
    pub async fn start<F>(&mut self, task: F) -> Result<(), StreamError>
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let permit = match &self.semaphore {
            Some(sem) => Some(
                Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|_| StreamError::Closed)?,
            ),
            None => None,
        };

        self.set.spawn(async move {
            let _permit = permit;
            task.await
        });
        Ok(())
    }

    /// Waits for the next task to finish and returns its outcome.
    ///
    /// Returns `None` when no task is tracked.
    pub async fn join_next(&mut self) -> Option<TaskResult> {
        let res = self.set.join_next().await?;
        Some(settle(res))
    }

    /// Collects the tasks that already finished, without waiting.
    ///
    /// Returns the first failure found; later finished tasks stay queued.
    pub fn reap(&mut self) -> TaskResult {
        while let Some(res) = self.set.try_join_next() {
            settle(res)?;
        }
        Ok(())
    }

    /// Waits for every tracked task, then returns the first failure, if any.
    pub async fn join(&mut self) -> TaskResult {
        let mut first = None;
        while let Some(res) = self.join_next().await {
            if let Err(err) = res {
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Waits for tracked tasks until one fails; aborts the rest on failure.
    pub async fn try_join(&mut self) -> TaskResult {
        while let Some(res) = self.join_next().await {
            if let Err(err) = res {
                self.abort_all();
                return Err(err);
            }
        }
        Ok(())
    }

    /// Requests cancellation of every tracked task.
    ///
    /// Aborted tasks still have to be joined (they report as not failed).
    pub fn abort_all(&mut self) {
        self.set.abort_all();
    }

    /// Returns the number of tracked tasks (running or finished but not joined).
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns `true` when no task is tracked.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Maps a joined task onto the group's failure semantics.
fn settle(res: Result<TaskResult, JoinError>) -> TaskResult {
    match res {
        Ok(Err(err)) if !err.is_cancellation() => Err(err),
        Ok(_) => Ok(()),
        Err(join_err) => match join_err.try_into_panic() {
            Ok(panic) => {
                let err = from_panic(panic);
                tracing::error!(error = %err, "task panicked");
                Err(err)
            }
            Err(_cancelled) => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test(start_paused = true)]
    async fn test_join_waits_for_every_task() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();

        for ms in [30u64, 10, 20] {
            let done = Arc::clone(&done);
            group
                .start(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        assert_eq!(group.len(), 3);

        group.join().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(group.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_reports_first_failure_after_all_finished() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();

        group
            .start(async { Err(StreamError::msg("first")) })
            .await
            .unwrap();
        let slow = Arc::clone(&done);
        group
            .start(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                slow.fetch_add(1, Ordering::SeqCst);
                Err(StreamError::msg("second"))
            })
            .await
            .unwrap();

        let err = group.join().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream failure: first");
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_join_fails_fast() {
        let mut group = TaskGroup::new();
        group
            .start(async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await
            .unwrap();
        group
            .start(async { Err(StreamError::msg("fast")) })
            .await
            .unwrap();

        let err = group.try_join().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream failure: fast");
        group.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_and_abort_are_not_failures() {
        let mut group = TaskGroup::new();
        group.start(async { Err(StreamError::Cancelled) }).await.unwrap();
        group
            .start(async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await
            .unwrap();

        group.abort_all();
        group.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let mut group = TaskGroup::new();
        group
            .start(async {
                if true {
                    panic!("kaboom");
                }
                Ok(())
            })
            .await
            .unwrap();

        let err = group.join().await.unwrap_err();
        assert_eq!(err.to_string(), "upstream failure: panicked: kaboom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_holds_back_start() {
        let mut group = TaskGroup::with_limit(1);
        let (release, wait) = oneshot::channel::<()>();
        group
            .start(async move {
                let _ = wait.await;
                Ok(())
            })
            .await
            .unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(10), group.start(async { Ok(()) }));
        assert!(blocked.await.is_err(), "second start must wait for a permit");

        release.send(()).unwrap();
        group.start(async { Ok(()) }).await.unwrap();
        group.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_reap_surfaces_finished_failures() {
        let mut group = TaskGroup::new();
        group
            .start(async { Err(StreamError::msg("early")) })
            .await
            .unwrap();
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let err = group.reap().unwrap_err();
        assert_eq!(err.to_string(), "upstream failure: early");
        assert!(group.reap().is_ok());
    }

    #[tokio::test]
    async fn test_drop_aborts_running_tasks() {
        struct Flag(Arc<AtomicUsize>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new();
        let flag = Flag(Arc::clone(&dropped));
        group
            .start(async move {
                let _flag = flag;
                std::future::pending::<()>().await;
                Ok(())
            })
            .await
            .unwrap();
        tokio::task::yield_now().await;

        drop(group);
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}
