// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pages backwards through conversation history.
//!
//! Each call returns messages older than the session's watermark and then
//! moves the watermark to the oldest message returned, so repeated calls
//! never show the model the same message twice. The watermark carries the
//! message id, so messages sharing a timestamp are paged one by one.

use async_trait::async_trait;
use parley_core::ParleyError;
use parley_core::types::{HistoryCursor, now_timestamp};

use crate::context::SessionContext;
use crate::tool::{Tool, ToolOutput};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 50;

pub struct FetchHistoryTool;

#[async_trait]
impl Tool for FetchHistoryTool {
    fn name(&self) -> &str {
        "fetch_history"
    }

    fn description(&self) -> &str {
        "Fetch older messages of this conversation that are not yet in context"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "default": DEFAULT_LIMIT,
                    "description": "Maximum number of messages to return"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SessionContext,
    ) -> Result<ToolOutput, ParleyError> {
        let limit = args["limit"]
            .as_i64()
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);
        let before = match ctx.next_poll().await? {
            Some(cursor) => cursor,
            None => HistoryCursor {
                created_at: now_timestamp(),
                message_id: None,
            },
        };

        let messages = ctx
            .storage
            .messages_before(&ctx.conversation_id, &before, limit)
            .await?;
        let Some(oldest) = messages.first() else {
            return Ok(ToolOutput::ok("no older messages"));
        };
        ctx.set_next_poll(&HistoryCursor::at(oldest)).await?;

        let entries: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let from = if m.sender_id == ctx.buyer_id {
                    "buyer"
                } else if m.sender_id == ctx.merchant_id {
                    "merchant"
                } else {
                    "other"
                };
                serde_json::json!({
                    "id": m.id,
                    "from": from,
                    "content": m.content,
                    "created_at": m.created_at,
                })
            })
            .collect();
        Ok(ToolOutput::ok(serde_json::Value::Array(entries).to_string()))
    }
}
