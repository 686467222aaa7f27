// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::types::{
    ChatMode, Conversation, ConversationMember, DedupRecord, DeliveryStatus, HistoryCursor,
    Message, MessageEvent, NewMember, QueueEntry, Session, SessionStatus, ToolActivity, User,
    UserAttribute,
};
use parley_core::{AdapterType, HealthStatus, ParleyError, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](StorageAdapter::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Users ---

    async fn get_user(&self, id: &str) -> Result<Option<User>, ParleyError> {
        queries::users::get_user(self.db()?, id).await
    }

    async fn find_user_by_attribute(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Option<User>, ParleyError> {
        queries::users::find_user_by_attribute(self.db()?, key, value).await
    }

    async fn create_linked_user(
        &self,
        user: &User,
        key: &str,
        value: &str,
    ) -> Result<User, ParleyError> {
        queries::users::create_linked_user(self.db()?, user, key, value).await
    }

    async fn upsert_user_attribute(&self, attribute: &UserAttribute) -> Result<(), ParleyError> {
        queries::users::upsert_user_attribute(self.db()?, attribute).await
    }

    async fn get_user_attributes(&self, user_id: &str) -> Result<Vec<UserAttribute>, ParleyError> {
        queries::users::get_user_attributes(self.db()?, user_id).await
    }

    // --- Conversations ---

    async fn find_conversation(
        &self,
        vendor_name: &str,
        external_id: &str,
    ) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::find_conversation(self.db()?, vendor_name, external_id).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ParleyError> {
        queries::conversations::list_conversations(self.db()?).await
    }

    async fn create_conversation(
        &self,
        conversation: &Conversation,
        members: &[NewMember],
    ) -> Result<Conversation, ParleyError> {
        queries::conversations::create_conversation(self.db()?, conversation, members).await
    }

    async fn add_member(
        &self,
        conversation_id: &str,
        member: &NewMember,
    ) -> Result<bool, ParleyError> {
        queries::conversations::add_member(self.db()?, conversation_id, member).await
    }

    async fn list_members(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationMember>, ParleyError> {
        queries::conversations::list_members(self.db()?, conversation_id).await
    }

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<(Message, bool), ParleyError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, ParleyError> {
        queries::messages::get_message(self.db()?, id).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Message>, ParleyError> {
        queries::messages::recent_messages(self.db()?, conversation_id, limit, exclude_id).await
    }

    async fn messages_before(
        &self,
        conversation_id: &str,
        cursor: &HistoryCursor,
        limit: i64,
    ) -> Result<Vec<Message>, ParleyError> {
        queries::messages::messages_before(self.db()?, conversation_id, cursor, limit).await
    }

    async fn update_delivery_status(
        &self,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<(), ParleyError> {
        queries::messages::update_delivery_status(self.db()?, message_id, status).await
    }

    async fn apply_message_fanout(&self, message: &Message) -> Result<(), ParleyError> {
        queries::messages::apply_message_fanout(self.db()?, message).await
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        user_id: &str,
        message_id: &str,
    ) -> Result<bool, ParleyError> {
        queries::messages::mark_read(self.db()?, conversation_id, user_id, message_id).await
    }

    // --- Deduplication ---

    async fn try_insert_dedup(&self, record: &DedupRecord) -> Result<bool, ParleyError> {
        queries::dedup::try_insert_dedup(self.db()?, record).await
    }

    async fn purge_expired_dedup(&self, now: &str) -> Result<usize, ParleyError> {
        queries::dedup::purge_expired_dedup(self.db()?, now).await
    }

    // --- Offline-sync events ---

    async fn insert_message_events(&self, events: &[MessageEvent]) -> Result<(), ParleyError> {
        queries::events::insert_message_events(self.db()?, events).await
    }

    async fn list_message_events(
        &self,
        user_id: &str,
        since: &str,
        now: &str,
    ) -> Result<Vec<MessageEvent>, ParleyError> {
        queries::events::list_message_events(self.db()?, user_id, since, now).await
    }

    async fn purge_expired_events(&self, now: &str) -> Result<usize, ParleyError> {
        queries::events::purge_expired_events(self.db()?, now).await
    }

    // --- Chat modes ---

    async fn upsert_chat_mode(&self, mode: &ChatMode) -> Result<(), ParleyError> {
        queries::chat_modes::upsert_chat_mode(self.db()?, mode).await
    }

    async fn get_chat_mode(&self, name: &str) -> Result<Option<ChatMode>, ParleyError> {
        queries::chat_modes::get_chat_mode(self.db()?, name).await
    }

    async fn list_chat_modes(&self) -> Result<Vec<ChatMode>, ParleyError> {
        queries::chat_modes::list_chat_modes(self.db()?).await
    }

    // --- Sessions ---

    async fn create_session(&self, session: &Session) -> Result<(), ParleyError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, ParleyError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn list_sessions(
        &self,
        conversation_id: Option<&str>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, ParleyError> {
        queries::sessions::list_sessions(self.db()?, conversation_id, status).await
    }

    async fn end_session(&self, id: &str, ended_at: &str) -> Result<(), ParleyError> {
        queries::sessions::end_session(self.db()?, id, ended_at).await
    }

    async fn set_next_poll(&self, id: &str, cursor: &HistoryCursor) -> Result<(), ParleyError> {
        queries::sessions::set_next_poll(self.db()?, id, cursor).await
    }

    // --- Tool activity ---

    async fn record_tool_activity(&self, activity: &ToolActivity) -> Result<(), ParleyError> {
        queries::activities::record_tool_activity(self.db()?, activity).await
    }

    async fn list_tool_activities(
        &self,
        session_id: Option<&str>,
    ) -> Result<Vec<ToolActivity>, ParleyError> {
        queries::activities::list_tool_activities(self.db()?, session_id).await
    }

    // --- Broker queue ---

    async fn enqueue(&self, queue_name: &str, payload: &str) -> Result<i64, ParleyError> {
        queries::queue::enqueue(self.db()?, queue_name, payload).await
    }

    async fn dequeue(
        &self,
        queue_name: &str,
        lock_secs: u64,
    ) -> Result<Option<QueueEntry>, ParleyError> {
        queries::queue::dequeue(self.db()?, queue_name, lock_secs).await
    }

    async fn ack(&self, id: i64) -> Result<(), ParleyError> {
        queries::queue::ack(self.db()?, id).await
    }
}
