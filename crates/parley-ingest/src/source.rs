// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event source backed by the store's durable queue table.
//!
//! One queue name is one topic with a single partition; the row id is the
//! offset. A fetched row stays locked for the redelivery timeout, after which
//! an uncommitted row is handed out again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::types::{AdapterType, Delivery, HealthStatus};
use parley_core::{EventSource, ParleyError, PluginAdapter, StorageAdapter};
use tracing::debug;

pub struct QueueEventSource {
    storage: Arc<dyn StorageAdapter>,
    topic: String,
    group: String,
    redelivery_timeout: Duration,
}

impl QueueEventSource {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        topic: impl Into<String>,
        group: impl Into<String>,
        redelivery_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            topic: topic.into(),
            group: group.into(),
            redelivery_timeout,
        }
    }

    /// Appends a raw event to the topic. Returns its offset.
    pub async fn publish(&self, payload: &str) -> Result<i64, ParleyError> {
        let offset = self.storage.enqueue(&self.topic, payload).await?;
        debug!(topic = %self.topic, offset, "event published");
        Ok(offset)
    }
}

#[async_trait]
impl PluginAdapter for QueueEventSource {
    fn name(&self) -> &str {
        "sqlite-queue"
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
impl EventSource for QueueEventSource {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group(&self) -> &str {
        &self.group
    }

    async fn fetch(&self) -> Result<Option<Delivery>, ParleyError> {
        let entry = self
            .storage
            .dequeue(&self.topic, self.redelivery_timeout.as_secs().max(1))
            .await?;
        Ok(entry.map(|entry| {
            if entry.attempts > 1 {
                debug!(topic = %self.topic, offset = entry.id, attempts = entry.attempts, "redelivering event");
            }
            Delivery {
                topic: entry.queue_name,
                partition: 0,
                offset: entry.id,
                payload: entry.payload,
                enqueued_at: Some(entry.created_at),
            }
        }))
    }

    async fn commit(&self, delivery: &Delivery) -> Result<(), ParleyError> {
        self.storage.ack(delivery.offset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_test_utils::TestHarness;

    #[tokio::test]
    async fn fetch_claims_in_order_and_commit_removes() {
        let harness = TestHarness::builder().build().await.unwrap();
        let source = QueueEventSource::new(
            Arc::clone(&harness.storage),
            "chat.events",
            "g",
            Duration::from_secs(300),
        );
        let first = source.publish(r#"{"n":1}"#).await.unwrap();
        source.publish(r#"{"n":2}"#).await.unwrap();

        let a = source.fetch().await.unwrap().unwrap();
        assert_eq!(a.offset, first);
        assert_eq!(a.topic, "chat.events");
        assert!(a.enqueued_at.is_some());
        let b = source.fetch().await.unwrap().unwrap();
        assert_eq!(b.payload, r#"{"n":2}"#);
        // Both rows are locked now.
        assert!(source.fetch().await.unwrap().is_none());

        source.commit(&a).await.unwrap();
        source.commit(&b).await.unwrap();
        assert!(source.fetch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let harness = TestHarness::builder().build().await.unwrap();
        let events = QueueEventSource::new(Arc::clone(&harness.storage), "events", "g", Duration::from_secs(60));
        let other = QueueEventSource::new(Arc::clone(&harness.storage), "other", "g", Duration::from_secs(60));
        events.publish("{}").await.unwrap();
        assert!(other.fetch().await.unwrap().is_none());
        assert!(events.fetch().await.unwrap().is_some());
    }
}
