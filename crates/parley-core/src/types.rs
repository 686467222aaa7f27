// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the adapter traits and pipeline crates.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with millisecond
//! precision (`2026-01-01T00:00:00.000Z`) so they order lexicographically in
//! SQLite exactly as they order in time.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Timestamp format used for every persisted time value.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a UTC datetime in the persisted timestamp format.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current time in the persisted timestamp format.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Converts unix seconds into the persisted timestamp format.
///
/// Out-of-range values fall back to the current time.
pub fn timestamp_from_unix(secs: i64) -> String {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(at) => format_timestamp(at),
        None => now_timestamp(),
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter implementing [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Vendor,
    Broadcaster,
    Model,
    EventSource,
    Observability,
}

// --- Identity ---

/// Internal identity, possibly mapped to several vendor IDs via attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    /// Operator or bot identity. Messages from internal users never reach the agent.
    pub is_internal: bool,
    pub created_at: String,
}

/// Arbitrary key/value/tags attached to a user. Unique per `(user_id, key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttribute {
    pub user_id: String,
    pub key: String,
    pub value: String,
    pub tags: Vec<String>,
}

/// Attribute key linking a user to their ID on one vendor.
pub fn vendor_id_attribute(vendor_name: &str) -> String {
    format!("vendor:{vendor_name}:id")
}

// --- Conversations ---

/// Internal record of one external chat room, bound to one vendor + external ID pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub vendor_name: String,
    pub external_id: String,
    pub name: String,
    pub context: Option<String>,
    /// JSON object supplied by the vendor.
    pub metadata: Option<String>,
    pub last_message_at: Option<String>,
    pub last_message_content: Option<String>,
    pub created_at: String,
}

/// A user's participation in a conversation plus denormalized read state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMember {
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub unread_count: i64,
    pub last_message_at: Option<String>,
    pub last_read_at: Option<String>,
    pub last_read_message_id: Option<String>,
}

/// A member to attach when a conversation is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub user_id: String,
    pub role: String,
}

// --- Messages ---

/// Whether a message entered from the vendor or was sent by this system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Delivery state of a message. Outbound messages move `sent -> delivered | failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Received,
    Sent,
    Delivered,
    Failed,
}

/// One chat message in internal canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub external_message_id: Option<String>,
    pub vendor_name: Option<String>,
    pub direction: MessageDirection,
    pub delivery_status: DeliveryStatus,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Idempotency marker keyed by `(external_message_id, conversation_key, vendor_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub external_message_id: String,
    /// External conversation ID: admission runs before conversation resolution.
    pub conversation_key: String,
    pub vendor_name: String,
    pub content_hash: String,
    pub processed_at: String,
    pub expires_at: String,
}

// --- Real-time events ---

/// Event names understood by the broadcaster and the offline-sync log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    MessageReceived,
    MessageSent,
    UserTypingStart,
    UserTypingStop,
    UserJoined,
    UserLeft,
}

/// One real-time event addressed to a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    pub user_id: String,
    pub platform: String,
    pub event_name: EventName,
    pub data: serde_json::Value,
}

/// Broadcaster reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Offline-sync record polled by clients that missed the real-time event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub event_name: EventName,
    /// JSON payload, identical to the broadcast `data`.
    pub payload: String,
    pub created_at: String,
    pub expires_at: String,
}

// --- Agent ---

/// Declarative agent configuration selecting a model, prompt, gate, tools and budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMode {
    pub name: String,
    pub prompt_template: String,
    #[serde(default)]
    pub condition: String,
    pub model: String,
    #[serde(default)]
    pub tools: Vec<String>,
    pub max_iterations: u32,
    #[serde(default)]
    pub max_prompt_tokens: Option<u32>,
    #[serde(default)]
    pub max_response_tokens: Option<u32>,
}

/// Session status. Monotonic: `active -> ended`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// One run of the agent loop for one triggering message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub conversation_id: String,
    pub chat_mode: String,
    pub status: SessionStatus,
    pub started_at: String,
    pub ended_at: Option<String>,
    /// History watermark: messages at or after this instant were already shown to the model.
    pub next_poll_at: Option<String>,
    /// Message at the watermark. Breaks ties between messages sharing `next_poll_at`.
    pub next_poll_message_id: Option<String>,
}

impl Session {
    /// The history watermark as a paging cursor.
    pub fn history_cursor(&self) -> Option<HistoryCursor> {
        self.next_poll_at.as_ref().map(|at| HistoryCursor {
            created_at: at.clone(),
            message_id: self.next_poll_message_id.clone(),
        })
    }
}

/// Position in a conversation's history, ordered by `(created_at, insertion order)`.
///
/// Without a `message_id` every message created at `created_at` counts as
/// already seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCursor {
    pub created_at: String,
    pub message_id: Option<String>,
}

impl HistoryCursor {
    /// Cursor positioned at `message`.
    pub fn at(message: &Message) -> Self {
        Self {
            created_at: message.created_at.clone(),
            message_id: Some(message.id.clone()),
        }
    }
}

/// Audit record of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolActivity {
    pub id: String,
    pub session_id: String,
    pub conversation_id: String,
    pub action: String,
    /// JSON document with the arguments and the output.
    pub data: String,
    pub is_error: bool,
    pub executed_at: String,
}

// --- Vendor contract ---

/// Participant listed by the vendor for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub external_user_id: String,
    pub role: String,
}

/// Canonical conversation info returned by a vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationInfo {
    pub name: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// Canonical user profile returned by a vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorUser {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Message handed to a vendor for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorMessage {
    pub external_conversation_id: String,
    pub external_sender_id: String,
    pub content: String,
}

// --- Model runner contract ---

/// Role of one turn in a model conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    System,
    User,
    Model,
    Tool,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One turn sent to the model runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ModelMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(ModelRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(ModelRole::User, content)
    }

    pub fn model(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(ModelRole::Model, content)
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            is_error: Some(is_error),
            ..Self::plain(ModelRole::Tool, content)
        }
    }

    fn plain(role: ModelRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: None,
        }
    }
}

/// Tool description offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One generation turn request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prompt_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_tokens: Option<u32>,
}

/// One generation turn result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl GenerateResponse {
    /// A final answer with no tool requests.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A response requesting a single tool call.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            text: None,
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
        }
    }
}

// --- Broker ---

/// One record fetched from the broker, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: String,
    /// When the broker accepted the record; used for lag reporting.
    pub enqueued_at: Option<String>,
}

/// Queue row backing the SQLite event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

// --- Outbound sends ---

/// A locally originated message (agent reply or internal tooling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    /// When set, the message is stored and fanned out but not forwarded to the vendor.
    pub skip_partner: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = timestamp_from_unix(1_700_000_000);
        let b = timestamp_from_unix(1_700_000_001);
        assert_eq!(a, "2023-11-14T22:13:20.000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn enums_use_snake_case_strings() {
        assert_eq!(EventName::MessageReceived.to_string(), "message_received");
        assert_eq!(EventName::from_str("user_typing_stop").unwrap(), EventName::UserTypingStop);
        assert_eq!(DeliveryStatus::Delivered.to_string(), "delivered");
        assert_eq!(SessionStatus::from_str("ended").unwrap(), SessionStatus::Ended);
        let json = serde_json::to_string(&EventName::MessageSent).unwrap();
        assert_eq!(json, "\"message_sent\"");
    }

    #[test]
    fn vendor_attribute_key_includes_vendor() {
        assert_eq!(vendor_id_attribute("marketplace"), "vendor:marketplace:id");
    }

    #[test]
    fn chat_mode_rejects_unknown_fields() {
        let json = r#"{"name":"a","prompt_template":"p","model":"m","max_iterations":1,"bogus":1}"#;
        assert!(serde_json::from_str::<ChatMode>(json).is_err());
    }

    #[test]
    fn tool_message_carries_call_id() {
        let msg = ModelMessage::tool("call-1", "done", false);
        assert_eq!(msg.role, ModelRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("tool_calls").is_none());
    }

    proptest::proptest! {
        #[test]
        fn unix_timestamp_order_is_preserved(a in 0i64..4_000_000_000, b in 0i64..4_000_000_000) {
            let (ta, tb) = (timestamp_from_unix(a), timestamp_from_unix(b));
            proptest::prop_assert_eq!(a.cmp(&b), ta.cmp(&tb));
        }
    }
}
