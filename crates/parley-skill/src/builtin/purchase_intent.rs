// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Marks the buyer as showing purchase intent.

use async_trait::async_trait;
use parley_core::ParleyError;
use parley_core::types::{UserAttribute, now_timestamp};

use crate::context::SessionContext;
use crate::tool::{Tool, ToolOutput};

/// Attribute key written on the buyer.
pub const PURCHASE_INTENT_KEY: &str = "purchase_intent";

pub struct FlagPurchaseIntentTool;

#[async_trait]
impl Tool for FlagPurchaseIntentTool {
    fn name(&self) -> &str {
        "flag_purchase_intent"
    }

    fn description(&self) -> &str {
        "Record that the buyer intends to purchase, optionally naming the product"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "product": {
                    "type": "string",
                    "description": "Product the buyer wants"
                },
                "note": {
                    "type": "string",
                    "description": "Free-form note for the merchant"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SessionContext,
    ) -> Result<ToolOutput, ParleyError> {
        let value = serde_json::json!({
            "product": args["product"].as_str(),
            "note": args["note"].as_str(),
            "conversation_id": ctx.conversation_id,
            "session_id": ctx.session_id,
            "flagged_at": now_timestamp(),
        });
        ctx.storage
            .upsert_user_attribute(&UserAttribute {
                user_id: ctx.buyer_id.clone(),
                key: PURCHASE_INTENT_KEY.to_string(),
                value: value.to_string(),
                tags: vec![
                    PURCHASE_INTENT_KEY.to_string(),
                    format!("chat_mode:{}", ctx.chat_mode),
                ],
            })
            .await?;
        Ok(ToolOutput::ok("purchase intent recorded"))
    }
}
