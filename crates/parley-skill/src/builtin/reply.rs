// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sends a chat message as the merchant.

use async_trait::async_trait;
use parley_core::ParleyError;
use parley_core::types::OutboundRequest;

use crate::context::SessionContext;
use crate::tool::{Tool, ToolOutput};

pub struct SendReplyTool;

#[async_trait]
impl Tool for SendReplyTool {
    fn name(&self) -> &str {
        "send_reply"
    }

    fn description(&self) -> &str {
        "Send a chat message to the buyer on behalf of the merchant"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Message text to send"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SessionContext,
    ) -> Result<ToolOutput, ParleyError> {
        let content = args["content"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ParleyError::Tool {
                tool: self.name().to_string(),
                message: "missing required 'content' parameter".to_string(),
            })?;
        let message = ctx
            .outbox
            .send(OutboundRequest {
                conversation_id: ctx.conversation_id.clone(),
                sender_id: ctx.merchant_id.clone(),
                content: content.to_string(),
                skip_partner: false,
            })
            .await?;
        Ok(ToolOutput::ok(format!("message {} sent", message.id)))
    }
}
