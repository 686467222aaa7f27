// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt and condition rendering with minijinja.
//!
//! Templates see `conversation`, `message` and `metadata` (the conversation's
//! vendor metadata parsed as JSON). Undefined variables are errors, so a typo
//! in a chat mode fails loudly instead of rendering an empty prompt.

use minijinja::{Environment, UndefinedBehavior};
use parley_core::ParleyError;
use parley_core::types::{Conversation, Message};
use serde::Serialize;

/// Variables available to chat mode templates.
#[derive(Debug, Serialize)]
pub struct TemplateContext<'a> {
    pub conversation: &'a Conversation,
    pub message: &'a Message,
    pub metadata: serde_json::Value,
}

impl<'a> TemplateContext<'a> {
    pub fn new(conversation: &'a Conversation, message: &'a Message) -> Self {
        let metadata = conversation
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| serde_json::json!({}));
        Self {
            conversation,
            message,
            metadata,
        }
    }
}

/// Renders chat mode prompt templates and condition gates.
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders `template` against `ctx`.
    pub fn render(&self, template: &str, ctx: &TemplateContext<'_>) -> Result<String, ParleyError> {
        self.env
            .render_str(template, ctx)
            .map_err(|e| ParleyError::Template(e.to_string()))
    }

    /// Evaluates a condition gate. An empty condition always passes; otherwise
    /// the trimmed output must be exactly `true`.
    pub fn condition_holds(
        &self,
        condition: &str,
        ctx: &TemplateContext<'_>,
    ) -> Result<bool, ParleyError> {
        if condition.trim().is_empty() {
            return Ok(true);
        }
        Ok(self.render(condition, ctx)?.trim() == "true")
    }
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}
