// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker event envelope and the chat message it carries.
//!
//! ```json
//! {"pattern": "message.sent",
//!  "data": {"channel_id": "ext-1", "sender_id": "buyer-1",
//!           "created_at": 1700000000, "message": "hi", "metadata": {"seller_id": "s-1"}}}
//! ```

use parley_core::ParleyError;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// The only routing pattern that is admitted.
pub const MESSAGE_SENT_PATTERN: &str = "message.sent";

/// Raw broker envelope. `data` stays untyped until the pattern is known.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerEvent {
    pub pattern: String,
    #[serde(default)]
    pub data: Value,
}

impl BrokerEvent {
    pub fn parse(payload: &str) -> Result<Self, ParleyError> {
        serde_json::from_str(payload)
            .map_err(|e| ParleyError::MalformedEvent(format!("invalid envelope: {e}")))
    }

    pub fn is_message_sent(&self) -> bool {
        self.pattern == MESSAGE_SENT_PATTERN
    }

    /// Decodes `data` as a chat message.
    pub fn chat_event(&self) -> Result<ChatEvent, ParleyError> {
        let raw: RawMessageData = serde_json::from_value(self.data.clone())
            .map_err(|e| ParleyError::MalformedEvent(format!("invalid message data: {e}")))?;
        ChatEvent::from_raw(raw)
    }
}

#[derive(Debug, Deserialize)]
struct RawMessageData {
    channel_id: Value,
    sender_id: Value,
    created_at: Value,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    tenant_id: Option<String>,
    #[serde(default)]
    message_id: Option<Value>,
}

/// A decoded `message.sent` event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    /// External conversation id.
    pub channel_id: String,
    /// External user id of the sender.
    pub sender_id: String,
    /// Unix seconds.
    pub created_at: i64,
    pub message: String,
    pub kind: Option<String>,
    pub metadata: Value,
    pub tenant_id: Option<String>,
    pub external_message_id: String,
    pub content_hash: String,
}

impl ChatEvent {
    fn from_raw(raw: RawMessageData) -> Result<Self, ParleyError> {
        let channel_id = id_string("channel_id", &raw.channel_id)?;
        let sender_id = id_string("sender_id", &raw.sender_id)?;
        let created_at = match &raw.created_at {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            ParleyError::MalformedEvent(format!(
                "created_at must be unix seconds, got {}",
                raw.created_at
            ))
        })?;

        let tenant_id = raw
            .tenant_id
            .filter(|t| !t.is_empty())
            .or_else(|| metadata_str(&raw.metadata, "tenant_id"))
            .or_else(|| metadata_str(&raw.metadata, "seller_id"));

        let external_message_id = match raw.message_id.as_ref().map(|v| id_string("message_id", v)) {
            Some(Ok(id)) => id,
            _ => sha256_hex(&format!(
                "{channel_id}|{sender_id}|{created_at}|{}",
                raw.message
            )),
        };

        Ok(Self {
            content_hash: sha256_hex(&raw.message),
            channel_id,
            sender_id,
            created_at,
            message: raw.message,
            kind: raw.kind,
            metadata: raw.metadata,
            tenant_id,
            external_message_id,
        })
    }

    /// Metadata as stored on the message row, `None` when absent.
    pub fn metadata_json(&self) -> Option<String> {
        match &self.metadata {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Vendors send ids as strings or numbers.
fn id_string(field: &str, value: &Value) -> Result<String, ParleyError> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if id.is_empty() {
        return Err(ParleyError::MalformedEvent(format!("{field} is missing")));
    }
    Ok(id)
}

fn metadata_str(metadata: &Value, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
