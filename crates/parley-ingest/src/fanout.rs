// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and fan-out.
//!
//! `persist` is synchronous with the caller. Everything after it (unread
//! counters, offline-sync events, broadcast, vendor delivery) runs on the
//! [`BackgroundExecutor`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_core::types::{
    BroadcastEvent, Conversation, DeliveryStatus, EventName, Message, MessageEvent, VendorMessage,
    format_timestamp, vendor_id_attribute,
};
use parley_core::{Broadcaster, ParleyError, StorageAdapter};
use tracing::{debug, info, warn};

use crate::executor::BackgroundExecutor;
use crate::registry::VendorRegistry;

#[derive(Clone)]
pub struct MessageStore {
    storage: Arc<dyn StorageAdapter>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    vendors: Arc<VendorRegistry>,
    executor: Arc<BackgroundExecutor>,
    platform: String,
    event_ttl: Duration,
}

impl MessageStore {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        broadcaster: Option<Arc<dyn Broadcaster>>,
        vendors: Arc<VendorRegistry>,
        executor: Arc<BackgroundExecutor>,
        platform: impl Into<String>,
        event_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            broadcaster,
            vendors,
            executor,
            platform: platform.into(),
            event_ttl,
        }
    }

    /// Stores `message`. Returns the stored row and whether it was new; a
    /// replay of a known external id returns the existing row.
    pub async fn persist(&self, message: &Message) -> Result<(Message, bool), ParleyError> {
        self.storage.insert_message(message).await
    }

    /// Queues fan-out of a freshly persisted message.
    pub fn schedule_fanout(&self, message: Message) {
        let store = self.clone();
        self.executor
            .spawn("fanout", async move { store.fan_out(&message).await });
    }

    /// Queues vendor delivery of an outbound message.
    pub fn schedule_delivery(&self, message: Message, conversation: Conversation) {
        let store = self.clone();
        self.executor.spawn("vendor_delivery", async move {
            store.deliver(&message, &conversation).await
        });
    }

    /// Unread counters and conversation summary in one write, then one
    /// offline-sync event per member, then the broadcast addressed to each
    /// member's user id.
    pub async fn fan_out(&self, message: &Message) -> Result<(), ParleyError> {
        self.storage.apply_message_fanout(message).await?;

        let members = self.storage.list_members(&message.conversation_id).await?;
        let payload = serde_json::to_value(message)
            .map_err(|e| ParleyError::Internal(format!("message serialization: {e}")))?;
        let created_at = format_timestamp(Utc::now());
        let expires_at = self.expiry_from(&created_at)?;

        let mut events = Vec::with_capacity(members.len());
        let mut broadcasts = Vec::with_capacity(members.len());
        for member in &members {
            let event_name = if member.user_id == message.sender_id {
                EventName::MessageSent
            } else {
                EventName::MessageReceived
            };
            events.push(MessageEvent {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: member.user_id.clone(),
                conversation_id: message.conversation_id.clone(),
                message_id: message.id.clone(),
                event_name,
                payload: payload.to_string(),
                created_at: created_at.clone(),
                expires_at: expires_at.clone(),
            });
            broadcasts.push(BroadcastEvent {
                user_id: member.user_id.clone(),
                platform: self.platform.clone(),
                event_name,
                data: payload.clone(),
            });
        }
        self.storage.insert_message_events(&events).await?;

        if let Some(broadcaster) = &self.broadcaster
            && !broadcasts.is_empty()
        {
            let result = broadcaster.send_events(broadcasts).await?;
            if !result.success {
                return Err(ParleyError::Broadcast {
                    message: result
                        .error
                        .unwrap_or_else(|| "broadcaster reported failure".to_string()),
                    source: None,
                });
            }
        }
        debug!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            recipients = members.len(),
            "message fanned out"
        );
        Ok(())
    }

    /// Forwards an outbound message to its vendor and records the outcome
    /// as `delivered` or `failed`.
    pub async fn deliver(
        &self,
        message: &Message,
        conversation: &Conversation,
    ) -> Result<(), ParleyError> {
        let result = self.send_to_vendor(message, conversation).await;
        let status = if result.is_ok() {
            DeliveryStatus::Delivered
        } else {
            DeliveryStatus::Failed
        };
        self.storage.update_delivery_status(&message.id, status).await?;
        match &result {
            Ok(()) => info!(message_id = %message.id, vendor = %conversation.vendor_name, "message delivered to vendor"),
            Err(e) => warn!(message_id = %message.id, vendor = %conversation.vendor_name, error = %e, "vendor delivery failed"),
        }
        result
    }

    async fn send_to_vendor(
        &self,
        message: &Message,
        conversation: &Conversation,
    ) -> Result<(), ParleyError> {
        let vendor = self.vendors.get(&conversation.vendor_name)?;
        let key = vendor_id_attribute(&conversation.vendor_name);
        let external_sender_id = self
            .storage
            .get_user_attributes(&message.sender_id)
            .await?
            .into_iter()
            .find(|a| a.key == key)
            .map(|a| a.value)
            .ok_or_else(|| {
                ParleyError::Resolution(format!(
                    "user {} has no {} identity",
                    message.sender_id, conversation.vendor_name
                ))
            })?;
        vendor
            .send_message(VendorMessage {
                external_conversation_id: conversation.external_id.clone(),
                external_sender_id,
                content: message.content.clone(),
            })
            .await
    }

    /// Resets the member's unread counter and records the read position.
    /// Returns `false` when the user is not a member.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        message_id: &str,
    ) -> Result<bool, ParleyError> {
        let message = self
            .storage
            .get_message(message_id)
            .await?
            .filter(|m| m.conversation_id == conversation_id)
            .ok_or_else(|| {
                ParleyError::Resolution(format!(
                    "message {message_id} not found in conversation {conversation_id}"
                ))
            })?;
        self.storage.mark_read(conversation_id, user_id, &message.id).await
    }

    fn expiry_from(&self, created_at: &str) -> Result<String, ParleyError> {
        let start: DateTime<Utc> = DateTime::parse_from_rfc3339(created_at)
            .map_err(|e| ParleyError::Internal(format!("bad timestamp {created_at}: {e}")))?
            .with_timezone(&Utc);
        let ttl = chrono::Duration::from_std(self.event_ttl)
            .map_err(|e| ParleyError::Internal(format!("event ttl out of range: {e}")))?;
        Ok(format_timestamp(start + ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{MessageDirection, timestamp_from_unix};
    use parley_test_utils::{MockVendorGateway, TestHarness};

    struct Setup {
        harness: TestHarness,
        store: MessageStore,
        executor: Arc<BackgroundExecutor>,
    }

    async fn setup() -> Setup {
        let harness = TestHarness::builder()
            .with_vendor(MockVendorGateway::new("marketplace"))
            .build()
            .await
            .unwrap();
        for (id, ext, internal) in [("a", "a-1", false), ("b", "b-1", true), ("c", "c-1", false)] {
            harness.seed_user(id, ext, internal).await.unwrap();
        }
        harness
            .seed_conversation("c1", "ch-1", &[("a", "buyer"), ("b", "seller"), ("c", "buyer")])
            .await
            .unwrap();
        let mut vendors = VendorRegistry::new();
        vendors.register(harness.vendor.clone());
        let executor = Arc::new(BackgroundExecutor::new(4, Duration::from_secs(5)));
        let store = MessageStore::new(
            Arc::clone(&harness.storage),
            Some(harness.broadcaster.clone() as Arc<dyn Broadcaster>),
            Arc::new(vendors),
            Arc::clone(&executor),
            "web",
            Duration::from_secs(60),
        );
        Setup {
            harness,
            store,
            executor,
        }
    }

    fn message(sender: &str, direction: MessageDirection) -> Message {
        Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: "c1".into(),
            sender_id: sender.into(),
            content: "hello".into(),
            external_message_id: None,
            vendor_name: None,
            direction,
            delivery_status: DeliveryStatus::Sent,
            metadata: None,
            created_at: timestamp_from_unix(1_700_000_000),
        }
    }

    async fn unread(harness: &TestHarness, user: &str) -> i64 {
        harness
            .storage
            .list_members("c1")
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.user_id == user)
            .unwrap()
            .unread_count
    }

    #[tokio::test]
    async fn fan_out_counts_unread_for_everyone_but_the_sender() {
        let s = setup().await;
        let (stored, inserted) = s.store.persist(&message("a", MessageDirection::Inbound)).await.unwrap();
        assert!(inserted);
        s.store.fan_out(&stored).await.unwrap();

        assert_eq!(unread(&s.harness, "a").await, 0);
        assert_eq!(unread(&s.harness, "b").await, 1);
        assert_eq!(unread(&s.harness, "c").await, 1);

        let conversation = s.harness.storage.get_conversation("c1").await.unwrap().unwrap();
        assert_eq!(conversation.last_message_content.as_deref(), Some("hello"));

        let sent = s.harness.broadcaster.events_for("a").await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_name, EventName::MessageSent);
        assert_eq!(sent[0].platform, "web");
        let received = s.harness.broadcaster.events_for("b").await;
        assert_eq!(received[0].event_name, EventName::MessageReceived);
        assert_eq!(received[0].data["id"], stored.id);

        let offline = s
            .harness
            .storage
            .list_message_events("c", "2000-01-01T00:00:00.000Z", &parley_core::types::now_timestamp())
            .await
            .unwrap();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].event_name, EventName::MessageReceived);
    }

    #[tokio::test]
    async fn mark_read_resets_the_counter() {
        let s = setup().await;
        let (stored, _) = s.store.persist(&message("a", MessageDirection::Inbound)).await.unwrap();
        s.store.fan_out(&stored).await.unwrap();

        assert!(s.store.mark_read("c1", "b", &stored.id).await.unwrap());
        let member = s
            .harness
            .storage
            .list_members("c1")
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.user_id == "b")
            .unwrap();
        assert_eq!(member.unread_count, 0);
        assert_eq!(member.last_read_message_id.as_deref(), Some(stored.id.as_str()));
        assert!(member.last_read_at.is_some());
        assert_eq!(unread(&s.harness, "c").await, 1);

        assert!(!s.store.mark_read("c1", "outsider", &stored.id).await.unwrap());
        assert!(s.store.mark_read("c1", "b", "missing").await.is_err());
    }

    #[tokio::test]
    async fn broadcast_failure_is_reported_after_counters_commit() {
        let s = setup().await;
        s.harness.broadcaster.set_failing(true);
        let (stored, _) = s.store.persist(&message("a", MessageDirection::Inbound)).await.unwrap();

        assert!(matches!(
            s.store.fan_out(&stored).await,
            Err(ParleyError::Broadcast { .. })
        ));
        assert_eq!(unread(&s.harness, "b").await, 1);
    }

    #[tokio::test]
    async fn delivery_outcome_is_recorded() {
        let s = setup().await;
        let conversation = s.harness.storage.get_conversation("c1").await.unwrap().unwrap();

        let (ok, _) = s.store.persist(&message("b", MessageDirection::Outbound)).await.unwrap();
        s.store.schedule_delivery(ok.clone(), conversation.clone());
        s.executor.settle().await;
        let stored = s.harness.storage.get_message(&ok.id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Delivered);
        let sent = s.harness.vendor.sent_messages().await;
        assert_eq!(sent[0].external_sender_id, "b-1");
        assert_eq!(sent[0].external_conversation_id, "ch-1");

        s.harness.vendor.set_fail_sends(true);
        let (failed, _) = s.store.persist(&message("b", MessageDirection::Outbound)).await.unwrap();
        s.store.schedule_delivery(failed.clone(), conversation);
        s.executor.settle().await;
        let stored = s.harness.storage.get_message(&failed.id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Failed);
    }
}
