// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the durable store.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChatMode, Conversation, ConversationMember, DedupRecord, DeliveryStatus, HistoryCursor,
    Message, MessageEvent, NewMember, QueueEntry, Session, SessionStatus, ToolActivity, User,
    UserAttribute,
};

/// Adapter for the durable store holding users, conversations, messages,
/// dedup records, sessions and the broker queue.
///
/// Operations that must hold under concurrent workers are atomic at the store
/// level: dedup insert-if-absent, conversation create-or-get, unread increments.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), ParleyError>;

    // --- Users ---

    async fn get_user(&self, id: &str) -> Result<Option<User>, ParleyError>;

    /// Finds the user holding attribute `key = value`.
    async fn find_user_by_attribute(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Option<User>, ParleyError>;

    /// Inserts `user` linked through attribute `key = value`, unless another user
    /// already holds that link. Returns whichever user holds the link afterwards.
    async fn create_linked_user(
        &self,
        user: &User,
        key: &str,
        value: &str,
    ) -> Result<User, ParleyError>;

    /// Inserts or replaces the attribute for `(user_id, key)`.
    async fn upsert_user_attribute(&self, attribute: &UserAttribute) -> Result<(), ParleyError>;

    async fn get_user_attributes(&self, user_id: &str) -> Result<Vec<UserAttribute>, ParleyError>;

    // --- Conversations ---

    async fn find_conversation(
        &self,
        vendor_name: &str,
        external_id: &str,
    ) -> Result<Option<Conversation>, ParleyError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ParleyError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ParleyError>;

    /// Inserts the conversation with its members unless one already exists for the
    /// same vendor + external ID. Returns the stored conversation either way.
    async fn create_conversation(
        &self,
        conversation: &Conversation,
        members: &[NewMember],
    ) -> Result<Conversation, ParleyError>;

    /// Adds a member if absent. Returns `true` when a row was inserted.
    async fn add_member(
        &self,
        conversation_id: &str,
        member: &NewMember,
    ) -> Result<bool, ParleyError>;

    async fn list_members(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMember>, ParleyError>;

    // --- Messages ---

    /// Inserts a message, idempotent on `(external_message_id, conversation_id, vendor_name)`.
    ///
    /// Returns the stored message and `true` when this call created it.
    async fn insert_message(&self, message: &Message) -> Result<(Message, bool), ParleyError>;

    async fn get_message(&self, id: &str) -> Result<Option<Message>, ParleyError>;

    /// Returns up to `limit` most recent messages in chronological order,
    /// optionally leaving out one message ID.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Message>, ParleyError>;

    /// Returns up to `limit` messages ordered strictly before `cursor`, chronological.
    async fn messages_before(
        &self,
        conversation_id: &str,
        cursor: &HistoryCursor,
        limit: i64,
    ) -> Result<Vec<Message>, ParleyError>;

    async fn update_delivery_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), ParleyError>;

    /// In one transaction: increments `unread_count` for every member except the
    /// sender and updates the conversation's last-message fields.
    async fn apply_message_fanout(&self, message: &Message) -> Result<(), ParleyError>;

    /// Resets the member's unread count and records the read message.
    /// Returns `false` when the user is not a member.
    async fn mark_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        message_id: &str,
    ) -> Result<bool, ParleyError>;

    // --- Deduplication ---

    /// Insert-if-absent. Returns `true` when this call recorded the event.
    /// An expired record counts as absent.
    async fn try_insert_dedup(&self, record: &DedupRecord) -> Result<bool, ParleyError>;

    async fn purge_expired_dedup(&self, now: &str) -> Result<usize, ParleyError>;

    // --- Offline-sync events ---

    async fn insert_message_events(&self, events: &[MessageEvent]) -> Result<(), ParleyError>;

    /// Unexpired events for a user created after `since`, oldest first.
    async fn list_message_events(
        &self,
        user_id: &str,
        since: &str,
        now: &str,
    ) -> Result<Vec<MessageEvent>, ParleyError>;

    async fn purge_expired_events(&self, now: &str) -> Result<usize, ParleyError>;

    // --- Chat modes ---

    async fn upsert_chat_mode(&self, mode: &ChatMode) -> Result<(), ParleyError>;

    async fn get_chat_mode(&self, name: &str) -> Result<Option<ChatMode>, ParleyError>;

    async fn list_chat_modes(&self) -> Result<Vec<ChatMode>, ParleyError>;

    // --- Sessions ---

    async fn create_session(&self, session: &Session) -> Result<(), ParleyError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, ParleyError>;

    async fn list_sessions(
        &self,
        conversation_id: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, ParleyError>;

    /// Moves an active session to `ended`. Ended sessions are left untouched.
    async fn end_session(&self, id: &str, ended_at: &str) -> Result<(), ParleyError>;

    async fn set_next_poll(&self, id: &str, cursor: &HistoryCursor) -> Result<(), ParleyError>;

    // --- Tool activity ---

    async fn record_tool_activity(&self, activity: &ToolActivity) -> Result<(), ParleyError>;

    async fn list_tool_activities(
        &self,
        session_id: Option<&str>,
    ) -> Result<Vec<ToolActivity>, ParleyError>;

    // --- Broker queue ---

    async fn enqueue(&self, queue_name: &str, payload: &str) -> Result<i64, ParleyError>;

    /// Claims the oldest pending entry, or a processing entry whose lock expired.
    async fn dequeue(
        &self,
        queue_name: &str,
        lock_secs: u64,
    ) -> Result<Option<QueueEntry>, ParleyError>;

    async fn ack(&self, id: i64) -> Result<(), ParleyError>;
}
