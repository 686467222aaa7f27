// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session state handed to every tool invocation.

use std::sync::Arc;

use parley_core::types::{HistoryCursor, Session, ToolActivity, ToolCall, now_timestamp};
use parley_core::{Outbox, ParleyError, StorageAdapter};
use tracing::warn;

use crate::tool::ToolOutput;

/// Everything a tool may know or touch about the session it runs in.
///
/// Built by the orchestrator once per session and shared by all bound tools.
/// Session termination is not a field here: tools request it by returning
/// [`ToolSignal::Stop`](crate::ToolSignal::Stop).
pub struct SessionContext {
    pub session_id: String,
    pub conversation_id: String,
    pub chat_mode: String,
    /// Internal party of the conversation.
    pub merchant_id: String,
    /// External party whose message triggered the session.
    pub buyer_id: String,
    pub storage: Arc<dyn StorageAdapter>,
    pub outbox: Arc<dyn Outbox>,
}

impl SessionContext {
    /// Reads the session row back from the store.
    pub async fn session(&self) -> Result<Session, ParleyError> {
        self.storage
            .get_session(&self.session_id)
            .await?
            .ok_or_else(|| ParleyError::Internal(format!("session {} vanished", self.session_id)))
    }

    /// The history watermark: messages at or after it were already shown to the model.
    pub async fn next_poll(&self) -> Result<Option<HistoryCursor>, ParleyError> {
        Ok(self.session().await?.history_cursor())
    }

    /// Moves the history watermark.
    pub async fn set_next_poll(&self, cursor: &HistoryCursor) -> Result<(), ParleyError> {
        self.storage.set_next_poll(&self.session_id, cursor).await
    }

    /// Writes the audit record of one tool call, successful or not.
    ///
    /// A failed write is logged and otherwise ignored.
    pub async fn record_activity(&self, call: &ToolCall, output: &ToolOutput) {
        let activity = ToolActivity {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: self.session_id.clone(),
            conversation_id: self.conversation_id.clone(),
            action: call.name.clone(),
            data: serde_json::json!({
                "call_id": call.id,
                "arguments": call.arguments,
                "output": output.content,
                "signal": output.signal,
            })
            .to_string(),
            is_error: output.is_error,
            executed_at: now_timestamp(),
        };
        if let Err(e) = self.storage.record_tool_activity(&activity).await {
            warn!(tool = %call.name, error = %e, "failed to record tool activity");
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("conversation_id", &self.conversation_id)
            .field("chat_mode", &self.chat_mode)
            .field("merchant_id", &self.merchant_id)
            .field("buyer_id", &self.buyer_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use parley_core::types::HistoryCursor;

    use crate::test_support::context;

    #[tokio::test]
    async fn watermark_round_trips_through_store() {
        let (ctx, _dir) = context().await;
        assert_eq!(ctx.next_poll().await.unwrap(), None);
        let cursor = HistoryCursor {
            created_at: "2026-01-01T00:00:00.000Z".into(),
            message_id: Some("m1".into()),
        };
        ctx.set_next_poll(&cursor).await.unwrap();
        assert_eq!(ctx.next_poll().await.unwrap(), Some(cursor));
    }
}
