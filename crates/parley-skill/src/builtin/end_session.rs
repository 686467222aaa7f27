// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lets the model close the session once the buyer is served.

use async_trait::async_trait;
use parley_core::ParleyError;

use crate::context::SessionContext;
use crate::tool::{Tool, ToolOutput};

pub struct EndSessionTool;

#[async_trait]
impl Tool for EndSessionTool {
    fn name(&self) -> &str {
        "end_session"
    }

    fn description(&self) -> &str {
        "End the current session. Call this when no further action is needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Why the session is ending"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SessionContext,
    ) -> Result<ToolOutput, ParleyError> {
        let reason = args["reason"].as_str().unwrap_or("done");
        tracing::info!(session_id = %ctx.session_id, reason, "session end requested by tool");
        Ok(ToolOutput::stop(format!("session ended: {reason}")))
    }
}
