// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for the tool tests: a temp store with one conversation and session.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_config::model::StorageConfig;
use parley_core::types::{
    Conversation, DeliveryStatus, Message, MessageDirection, NewMember, OutboundRequest, Session,
    SessionStatus, User,
};
use parley_core::{Outbox, ParleyError, StorageAdapter};
use parley_storage::SqliteStorage;

use crate::context::SessionContext;

/// Records outbound requests and stores them as messages.
pub struct RecordingOutbox {
    pub storage: Arc<dyn StorageAdapter>,
    pub sent: Mutex<Vec<OutboundRequest>>,
}

#[async_trait]
impl Outbox for RecordingOutbox {
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
            created_at: parley_core::types::now_timestamp(),
        };
        let (message, _) = self.storage.insert_message(&message).await?;
        self.sent.lock().unwrap().push(request);
        Ok(message)
    }
}

fn user(id: &str, internal: bool) -> User {
    User {
        id: id.into(),
        name: id.into(),
        email: None,
        is_active: true,
        is_internal: internal,
        created_at: "2026-01-01T00:00:00.000Z".into(),
    }
}

/// Seeds `buyer`, `merchant`, conversation `c1` and active session `s1`.
pub async fn context() -> (Arc<SessionContext>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("tools.db").to_str().unwrap().to_string(),
        wal_mode: true,
        sweep_interval_secs: 300,
    });
    storage.initialize().await.unwrap();
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    for (u, ext) in [(user("buyer", false), "b-1"), (user("merchant", true), "m-1")] {
        storage
            .create_linked_user(&u, "vendor:marketplace:id", ext)
            .await
            .unwrap();
    }
    storage
        .create_conversation(
            &Conversation {
                id: "c1".into(),
                vendor_name: "marketplace".into(),
                external_id: "ext-1".into(),
                name: "Order 42".into(),
                context: None,
                metadata: None,
                last_message_at: None,
                last_message_content: None,
                created_at: "2026-01-01T00:00:00.000Z".into(),
            },
            &[
                NewMember {
                    user_id: "buyer".into(),
                    role: "buyer".into(),
                },
                NewMember {
                    user_id: "merchant".into(),
                    role: "seller".into(),
                },
            ],
        )
        .await
        .unwrap();
    storage
        .create_session(&Session {
            id: "s1".into(),
            conversation_id: "c1".into(),
            chat_mode: "sales".into(),
            status: SessionStatus::Active,
            started_at: "2026-01-01T00:00:00.000Z".into(),
            ended_at: None,
            next_poll_at: None,
            next_poll_message_id: None,
        })
        .await
        .unwrap();

    let outbox = Arc::new(RecordingOutbox {
        storage: Arc::clone(&storage),
        sent: Mutex::new(Vec::new()),
    });
    let ctx = SessionContext {
        session_id: "s1".into(),
        conversation_id: "c1".into(),
        chat_mode: "sales".into(),
        merchant_id: "merchant".into(),
        buyer_id: "buyer".into(),
        storage,
        outbox,
    };
    (Arc::new(ctx), dir)
}

/// Inserts an inbound message at `at`.
pub async fn message(ctx: &SessionContext, id: &str, sender: &str, at: &str) {
    ctx.storage
        .insert_message(&Message {
            id: id.into(),
            conversation_id: ctx.conversation_id.clone(),
            sender_id: sender.into(),
            content: format!("text {id}"),
            external_message_id: Some(format!("x-{id}")),
            vendor_name: Some("marketplace".into()),
            direction: MessageDirection::Inbound,
            delivery_status: DeliveryStatus::Received,
            metadata: None,
            created_at: at.into(),
        })
        .await
        .unwrap();
}
