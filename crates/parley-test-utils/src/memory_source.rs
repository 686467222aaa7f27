// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory event source standing in for the broker.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use parley_core::types::{AdapterType, Delivery, HealthStatus, now_timestamp};
use parley_core::{EventSource, ParleyError, PluginAdapter};

/// A single-partition in-memory broker.
///
/// Payloads pushed with [`push`](Self::push) are handed out by `fetch()` in
/// order; commits are recorded so tests can wait for the pool to drain.
pub struct MemoryEventSource {
    topic: String,
    group: String,
    pending: Arc<Mutex<VecDeque<Delivery>>>,
    committed: Arc<Mutex<Vec<Delivery>>>,
    next_offset: AtomicI64,
    commit_notify: Arc<Notify>,
}

impl MemoryEventSource {
    pub fn new(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            committed: Arc::new(Mutex::new(Vec::new())),
            next_offset: AtomicI64::new(0),
            commit_notify: Arc::new(Notify::new()),
        }
    }

    /// Enqueue a raw payload and return its offset.
    pub async fn push(&self, payload: impl Into<String>) -> i64 {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().await.push_back(Delivery {
            topic: self.topic.clone(),
            partition: 0,
            offset,
            payload: payload.into(),
            enqueued_at: Some(now_timestamp()),
        });
        offset
    }

    /// Offsets committed so far, in commit order.
    pub async fn committed_offsets(&self) -> Vec<i64> {
        self.committed.lock().await.iter().map(|d| d.offset).collect()
    }

    /// Number of payloads not yet fetched.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Wait until at least `count` deliveries are committed.
    ///
    /// Returns `false` when `timeout` elapses first.
    pub async fn wait_for_commits(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.commit_notify.notified();
                if self.committed.lock().await.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[async_trait]
impl PluginAdapter for MemoryEventSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::EventSource
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group(&self) -> &str {
        &self.group
    }

    async fn fetch(&self) -> Result<Option<Delivery>, ParleyError> {
        Ok(self.pending.lock().await.pop_front())
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), ParleyError> {
        self.committed.lock().await.push(delivery.clone());
        self.commit_notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_is_fifo_and_commits_are_tracked() {
        let source = MemoryEventSource::new("chat.events", "g");
        source.push("a").await;
        source.push("b").await;

        let first = source.fetch().await.unwrap().unwrap();
        assert_eq!(first.payload, "a");
        assert_eq!(first.offset, 0);
        source.commit(&first).await.unwrap();

        assert_eq!(source.pending_count().await, 1);
        assert_eq!(source.committed_offsets().await, vec![0]);
        assert!(source.wait_for_commits(1, Duration::from_millis(10)).await);
        assert!(!source.wait_for_commits(2, Duration::from_millis(10)).await);
    }
}
