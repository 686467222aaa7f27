// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait, registry and session-bound tool handles.
//!
//! The [`Tool`] trait is the capability interface every agent tool implements.
//! The [`ToolRegistry`] is built once at startup, then shared immutably; the
//! orchestrator resolves a chat mode's tool names into [`BoundTool`]s tied to
//! one [`SessionContext`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parley_core::ParleyError;
use parley_core::types::{ToolCall, ToolDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::SessionContext;

/// Whether the agent loop continues after a tool turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSignal {
    #[default]
    Continue,
    /// End the session after this tool turn.
    Stop,
}

/// Output from a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The content returned by the tool (text output, JSON, etc.).
    pub content: String,
    /// Whether the tool invocation resulted in an error.
    pub is_error: bool,
    #[serde(default)]
    pub signal: ToolSignal,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            signal: ToolSignal::Continue,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            signal: ToolSignal::Continue,
        }
    }

    /// A successful output that ends the session.
    pub fn stop(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            signal: ToolSignal::Stop,
        }
    }
}

/// Unified trait for all agent tools.
///
/// Every tool provides a name, description, JSON Schema for its parameters,
/// and an async `execute` method receiving the model's arguments and the
/// session the call belongs to.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's unique name (used for lookup and in model requests).
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema describing the tool's input parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Executes the tool for one session.
    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &SessionContext,
    ) -> Result<ToolOutput, ParleyError>;
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool. The tool is indexed by its `name()`.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "tool registered twice, keeping the latest");
        }
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns (name, description) pairs for all registered tools.
    pub fn list(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .tools
            .values()
            .map(|t| (t.name(), t.description()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    /// Returns definitions for all registered tools, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| definition(t.as_ref())).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Binds the named tools to a session, in the order given.
    ///
    /// Fails with [`ParleyError::ToolNotFound`] on the first unregistered name.
    pub fn resolve_for_names(
        &self,
        names: &[String],
        ctx: Arc<SessionContext>,
    ) -> Result<Vec<BoundTool>, ParleyError> {
        names
            .iter()
            .map(|name| {
                let tool = self
                    .get(name)
                    .ok_or_else(|| ParleyError::ToolNotFound(name.clone()))?;
                Ok(BoundTool {
                    tool,
                    ctx: Arc::clone(&ctx),
                })
            })
            .collect()
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn definition(tool: &dyn Tool) -> ToolDefinition {
    ToolDefinition {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

/// A tool bound to one session.
pub struct BoundTool {
    tool: Arc<dyn Tool>,
    ctx: Arc<SessionContext>,
}

impl BoundTool {
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    pub fn definition(&self) -> ToolDefinition {
        definition(self.tool.as_ref())
    }

    /// Runs the tool for `call` and records a [`ToolActivity`](parley_core::types::ToolActivity).
    ///
    /// Tool errors become failed outputs so the model can react to them.
    /// A failure to write the audit record is logged and does not change the output.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let output = match self.tool.execute(call.arguments.clone(), &self.ctx).await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    tool = %call.name,
                    session_id = %self.ctx.session_id,
                    error = %e,
                    "tool execution failed"
                );
                ToolOutput::error(e.to_string())
            }
        };

        self.ctx.record_activity(call, &output).await;
        debug!(
            tool = %call.name,
            is_error = output.is_error,
            signal = ?output.signal,
            "tool executed"
        );
        output
    }
}
