// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait, registry, session context and built-in tools for the Parley agent.
//!
//! This crate provides the [`Tool`] capability interface, the [`ToolRegistry`]
//! that resolves a chat mode's tool names into session-bound [`BoundTool`]s,
//! and the [`SessionContext`] every tool receives.
//!
//! Built-in tools include:
//! - [`builtin::FetchHistoryTool`] -- Page through older conversation messages
//! - [`builtin::SendReplyTool`] -- Reply to the buyer as the merchant
//! - [`builtin::FlagPurchaseIntentTool`] -- Tag the buyer with purchase intent
//! - [`builtin::EndSessionTool`] -- Stop the agent loop

pub mod builtin;
pub mod context;
pub mod tool;

#[cfg(test)]
mod test_support;

pub use context::SessionContext;
pub use tool::{BoundTool, Tool, ToolOutput, ToolRegistry, ToolSignal};
