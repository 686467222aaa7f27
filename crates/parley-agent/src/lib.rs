// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-scoped agent orchestration for the Parley pipeline.
//!
//! The [`Orchestrator`] turns one admitted message into at most one agent
//! session: it validates the chat mode, evaluates the condition gate, renders
//! the system prompt, then drives a bounded tool-calling loop against the
//! model runner.

pub mod orchestrator;
pub mod template;

pub use orchestrator::{
    AgentState, Orchestrator, Parties, Termination, TriggerOutcome, TriggerSkip,
    validate_chat_mode,
};
pub use template::{PromptRenderer, TemplateContext};
