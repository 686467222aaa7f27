// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded executor for fire-and-forget post-processing.
//!
//! Tasks run detached from the submitting worker. Each is bounded by a
//! timeout and isolated from panics. Outcomes are logged and counted but
//! never reported back to the submitter.
//!
//! There is no queue: a task submitted while every slot is busy is dropped
//! and counted as `rejected`, so the timeout of an accepted task starts at
//! submission.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parley_core::ParleyError;
use tokio::sync::{Semaphore, TryAcquireError};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

pub struct BackgroundExecutor {
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    default_timeout: Duration,
}

impl BackgroundExecutor {
    pub fn new(max_tasks: usize, default_timeout: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_tasks.max(1))),
            tracker: TaskTracker::new(),
            default_timeout,
        }
    }

    /// Submits `fut` under the default timeout.
    pub fn spawn<F>(&self, task: &'static str, fut: F)
    where
        F: Future<Output = Result<(), ParleyError>> + Send + 'static,
    {
        self.spawn_with_timeout(task, self.default_timeout, fut);
    }

    pub fn spawn_with_timeout<F>(&self, task: &'static str, timeout: Duration, fut: F)
    where
        F: Future<Output = Result<(), ParleyError>> + Send + 'static,
    {
        let permit = match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                warn!(task, in_flight = self.tracker.len(), "background executor saturated, task dropped");
                parley_prometheus::record_background_task(task, "rejected");
                return;
            }
            Err(TryAcquireError::Closed) => {
                warn!(task, "background executor closed, task dropped");
                parley_prometheus::record_background_task(task, "rejected");
                return;
            }
        };
        self.tracker.spawn(async move {
            let _permit = permit;
            let status = match tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
                Ok(Ok(Ok(()))) => {
                    debug!(task, "background task completed");
                    "ok"
                }
                Ok(Ok(Err(e))) => {
                    warn!(task, error = %e, kind = e.kind(), "background task failed");
                    "error"
                }
                Ok(Err(panic)) => {
                    error!(task, panic = %panic_message(&*panic), "background task panicked");
                    "panic"
                }
                Err(_) => {
                    warn!(task, timeout_secs = timeout.as_secs_f64(), "background task timed out");
                    "timeout"
                }
            };
            parley_prometheus::record_background_task(task, status);
        });
    }

    /// Tasks accepted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until no tasks are in flight. Tasks may submit further tasks;
    /// those are waited for too, since a child is tracked before its parent
    /// finishes.
    ///
    /// The tracker is closed for the wait and reopened afterwards, so this
    /// must not run concurrently with [`shutdown`](Self::shutdown).
    pub async fn settle(&self) {
        let was_closed = self.tracker.is_closed();
        self.tracker.close();
        self.tracker.wait().await;
        if !was_closed {
            self.tracker.reopen();
        }
    }

    /// Stops accepting work and waits up to `timeout` for in-flight tasks.
    pub async fn shutdown(&self, timeout: Duration) {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.tracker.len(),
                "background tasks still running at shutdown"
            );
        }
        self.semaphore.close();
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn explode() -> Result<(), ParleyError> {
        panic!("task exploded")
    }

    #[tokio::test]
    async fn failures_panics_and_timeouts_do_not_escape() {
        let executor = BackgroundExecutor::new(4, Duration::from_millis(50));
        let done = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&done);
        executor.spawn("ok", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        executor.spawn("fails", async { Err(ParleyError::Internal("boom".into())) });
        executor.spawn("panics", async { explode() });
        executor.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        });

        executor.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test]
    async fn saturated_executor_rejects_instead_of_queueing() {
        let executor = BackgroundExecutor::new(2, Duration::from_secs(1));
        let started = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let started = Arc::clone(&started);
            executor.spawn("bounded", async move {
                started.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            });
        }
        assert_eq!(executor.in_flight(), 2);
        executor.settle().await;
        assert_eq!(started.load(Ordering::SeqCst), 2);

        let counter = Arc::clone(&started);
        executor.spawn("after_drain", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        executor.settle().await;
        assert_eq!(started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_counts_from_submission() {
        let executor = BackgroundExecutor::new(1, Duration::from_secs(5));
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&finished);
        executor.spawn_with_timeout("slow", Duration::from_millis(50), async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let started = tokio::time::Instant::now();
        executor.settle().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn settle_waits_for_tasks_spawned_by_tasks() {
        let executor = Arc::new(BackgroundExecutor::new(4, Duration::from_secs(1)));
        let done = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&executor);
        let counter = Arc::clone(&done);
        executor.spawn("parent", async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            inner.spawn("child", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });
        executor.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(!executor.tracker.is_closed());
    }

    #[tokio::test]
    async fn shutdown_drains_in_flight_tasks() {
        let executor = BackgroundExecutor::new(1, Duration::from_secs(1));
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        executor.spawn("drain", async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        executor.shutdown(Duration::from_secs(1)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
    }
}
