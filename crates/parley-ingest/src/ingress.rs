// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Locally originated sends: agent replies and internal tooling.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::types::{
    DeliveryStatus, Message, MessageDirection, OutboundRequest, now_timestamp,
};
use parley_core::{Outbox, ParleyError, StorageAdapter};
use tracing::info;

use crate::fanout::MessageStore;
use crate::resolver::Resolver;

/// Persists outbound messages, fans them out and forwards them to the vendor.
pub struct LocalIngress {
    storage: Arc<dyn StorageAdapter>,
    resolver: Arc<Resolver>,
    store: MessageStore,
    vendor_name: String,
}

impl LocalIngress {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        resolver: Arc<Resolver>,
        store: MessageStore,
        vendor_name: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            resolver,
            store,
            vendor_name: vendor_name.into(),
        }
    }

    /// Sends by vendor ids, as the internal HTTP ingress receives them.
    pub async fn send_external(
        &self,
        channel_id: &str,
        sender_id: &str,
        content: &str,
        skip_partner: bool,
    ) -> Result<Message, ParleyError> {
        let conversation = self
            .resolver
            .resolve_conversation(&self.vendor_name, channel_id)
            .await?;
        let sender = self.resolver.resolve_user(&self.vendor_name, sender_id).await?;
        self.resolver
            .ensure_member(&conversation.id, &sender.id, "participant")
            .await?;
        self.send(OutboundRequest {
            conversation_id: conversation.id,
            sender_id: sender.id,
            content: content.to_string(),
            skip_partner,
        })
        .await
    }
}

#[async_trait]
impl Outbox for LocalIngress {
    async fn send(&self, request: OutboundRequest) -> Result<Message, ParleyError> {
        if request.content.trim().is_empty() {
            return Err(ParleyError::MalformedEvent("message content is empty".to_string()));
        }
        let conversation = self
            .storage
            .get_conversation(&request.conversation_id)
            .await?
            .ok_or_else(|| {
                ParleyError::Resolution(format!(
                    "conversation {} not found",
                    request.conversation_id
                ))
            })?;

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation.id.clone(),
            sender_id: request.sender_id,
            content: request.content,
            external_message_id: None,
            vendor_name: Some(conversation.vendor_name.clone()),
            direction: MessageDirection::Outbound,
            delivery_status: DeliveryStatus::Sent,
            metadata: None,
            created_at: now_timestamp(),
        };
        let (message, _) = self.store.persist(&message).await?;
        info!(
            message_id = %message.id,
            conversation_id = %conversation.id,
            skip_partner = request.skip_partner,
            "outbound message stored"
        );

        self.store.schedule_fanout(message.clone());
        if !request.skip_partner {
            self.store.schedule_delivery(message.clone(), conversation);
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parley_core::Broadcaster;
    use parley_test_utils::{MockVendorGateway, TestHarness};

    use crate::executor::BackgroundExecutor;
    use crate::registry::VendorRegistry;

    async fn setup() -> (TestHarness, LocalIngress, Arc<BackgroundExecutor>) {
        let vendor = MockVendorGateway::new("marketplace");
        vendor
            .add_conversation("ch-1", "Order 1", &[("buyer-1", "buyer"), ("seller-1", "seller")])
            .await;
        vendor.add_user("buyer-1", "Bea").await;
        let harness = TestHarness::builder().with_vendor(vendor).build().await.unwrap();

        let mut vendors = VendorRegistry::new();
        vendors.register(harness.vendor.clone());
        let vendors = Arc::new(vendors);
        let resolver = Arc::new(Resolver::new(Arc::clone(&harness.storage), Arc::clone(&vendors)));
        resolver
            .provision_internal_user("marketplace", "seller-1", "Shop", None)
            .await
            .unwrap();
        let executor = Arc::new(BackgroundExecutor::new(4, Duration::from_secs(5)));
        let store = MessageStore::new(
            Arc::clone(&harness.storage),
            Some(harness.broadcaster.clone() as Arc<dyn Broadcaster>),
            vendors,
            Arc::clone(&executor),
            "web",
            Duration::from_secs(60),
        );
        let ingress = LocalIngress::new(Arc::clone(&harness.storage), resolver, store, "marketplace");
        (harness, ingress, executor)
    }

    #[tokio::test]
    async fn external_send_resolves_persists_and_delivers() {
        let (harness, ingress, executor) = setup().await;

        let message = ingress
            .send_external("ch-1", "seller-1", "Your order shipped", false)
            .await
            .unwrap();
        assert_eq!(message.direction, MessageDirection::Outbound);
        executor.settle().await;

        let stored = harness.storage.get_message(&message.id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Delivered);
        let sent = harness.vendor.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].external_sender_id, "seller-1");
        assert!(!harness.broadcaster.events().await.is_empty());
    }

    #[tokio::test]
    async fn skip_partner_stores_without_vendor_delivery() {
        let (harness, ingress, executor) = setup().await;

        let message = ingress
            .send_external("ch-1", "seller-1", "internal note", true)
            .await
            .unwrap();
        executor.settle().await;

        let stored = harness.storage.get_message(&message.id).await.unwrap().unwrap();
        assert_eq!(stored.delivery_status, DeliveryStatus::Sent);
        assert!(harness.vendor.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_and_empty_content_are_rejected() {
        let (_harness, ingress, _executor) = setup().await;
        let err = ingress
            .send(OutboundRequest {
                conversation_id: "missing".into(),
                sender_id: "x".into(),
                content: "hi".into(),
                skip_partner: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Resolution(_)));

        let err = ingress
            .send_external("ch-1", "seller-1", "  ", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::MalformedEvent(_)));
    }
}
