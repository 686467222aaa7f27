// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles a temp SQLite store with the mock adapters and
//! offers seeding helpers for users, conversations and messages.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_config::model::StorageConfig;
use parley_core::types::{
    ChatMode, Conversation, DeliveryStatus, Message, MessageDirection, NewMember,
    OutboundRequest, User, now_timestamp, vendor_id_attribute,
};
use parley_core::{Outbox, ParleyError, StorageAdapter};
use parley_storage::SqliteStorage;

use crate::memory_source::MemoryEventSource;
use crate::mock_broadcaster::MockBroadcaster;
use crate::mock_model::MockModelRunner;
use crate::mock_vendor::MockVendorGateway;

/// Vendor name used by the harness.
pub const VENDOR: &str = "marketplace";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    model: Option<MockModelRunner>,
    vendor: Option<MockVendorGateway>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            model: None,
            vendor: None,
        }
    }

    /// Use a preconfigured model runner.
    pub fn with_model(mut self, model: MockModelRunner) -> Self {
        self.model = Some(model);
        self
    }

    /// Use a preconfigured vendor gateway.
    pub fn with_vendor(mut self, vendor: MockVendorGateway) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir = tempfile::TempDir::new().map_err(ParleyError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
            ..StorageConfig::default()
        });
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        Ok(TestHarness {
            outbox: Arc::new(StoreOutbox::new(Arc::clone(&storage))),
            storage,
            model: Arc::new(self.model.unwrap_or_default()),
            vendor: Arc::new(self.vendor.unwrap_or_else(|| MockVendorGateway::new(VENDOR))),
            broadcaster: Arc::new(MockBroadcaster::new()),
            source: Arc::new(MemoryEventSource::new("chat.events", "parley-test")),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub model: Arc<MockModelRunner>,
    pub vendor: Arc<MockVendorGateway>,
    pub broadcaster: Arc<MockBroadcaster>,
    pub source: Arc<MemoryEventSource>,
    /// Persist-only outbox for tests that do not need fan-out.
    pub outbox: Arc<StoreOutbox>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Insert a user linked to `external_id` under the harness vendor.
    pub async fn seed_user(
        &self,
        id: &str,
        external_id: &str,
        internal: bool,
    ) -> Result<User, ParleyError> {
        let user = User {
            id: id.to_string(),
            name: id.to_string(),
            email: None,
            is_active: true,
            is_internal: internal,
            created_at: now_timestamp(),
        };
        self.storage
            .create_linked_user(&user, &vendor_id_attribute(VENDOR), external_id)
            .await
    }

    /// Insert a conversation with the given `(user_id, role)` members.
    pub async fn seed_conversation(
        &self,
        id: &str,
        external_id: &str,
        members: &[(&str, &str)],
    ) -> Result<Conversation, ParleyError> {
        let conversation = Conversation {
            id: id.to_string(),
            vendor_name: VENDOR.to_string(),
            external_id: external_id.to_string(),
            name: format!("Conversation {external_id}"),
            context: None,
            metadata: Some(r#"{"order_id":"o-42"}"#.to_string()),
            last_message_at: None,
            last_message_content: None,
            created_at: now_timestamp(),
        };
        let members: Vec<NewMember> = members
            .iter()
            .map(|(user_id, role)| NewMember {
                user_id: user_id.to_string(),
                role: role.to_string(),
            })
            .collect();
        self.storage.create_conversation(&conversation, &members).await
    }

    /// Insert an inbound message with the given creation time.
    pub async fn seed_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<Message, ParleyError> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            external_message_id: Some(uuid::Uuid::new_v4().to_string()),
            vendor_name: Some(VENDOR.to_string()),
            direction: MessageDirection::Inbound,
            delivery_status: DeliveryStatus::Received,
            metadata: None,
            created_at: created_at.to_string(),
        };
        let (message, _) = self.storage.insert_message(&message).await?;
        Ok(message)
    }
}

/// Outbox that only persists messages and remembers every request.
pub struct StoreOutbox {
    storage: Arc<dyn StorageAdapter>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl StoreOutbox {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            storage,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Outbox for StoreOutbox {
    async fn send(&self, request: OutboundRequest) -> Result<Message, ParleyError> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: request.conversation_id.clone(),
            sender_id: request.sender_id.clone(),
            content: request.content.clone(),
            external_message_id: None,
            vendor_name: None,
            direction: MessageDirection::Outbound,
            delivery_status: DeliveryStatus::Sent,
            metadata: None,
            created_at: now_timestamp(),
        };
        let (message, _) = self.storage.insert_message(&message).await?;
        self.sent.lock().await.push(request);
        Ok(message)
    }
}

/// A runnable chat mode with an always-open condition.
pub fn chat_mode(name: &str, tools: &[&str], max_iterations: u32) -> ChatMode {
    ChatMode {
        name: name.to_string(),
        prompt_template: "You sell on behalf of {{ conversation.name }}.".to_string(),
        condition: String::new(),
        model: "test-model".to_string(),
        tools: tools.iter().map(|t| t.to_string()).collect(),
        max_iterations,
        max_prompt_tokens: None,
        max_response_tokens: None,
    }
}
