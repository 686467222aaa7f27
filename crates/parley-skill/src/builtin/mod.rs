// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools for the Parley agent.
//!
//! These tools are always registered; a chat mode opts into them by name.

pub mod end_session;
pub mod history;
pub mod purchase_intent;
pub mod reply;

pub use end_session::EndSessionTool;
pub use history::FetchHistoryTool;
pub use purchase_intent::FlagPurchaseIntentTool;
pub use reply::SendReplyTool;

use crate::ToolRegistry;
use std::sync::Arc;

/// Registers all built-in tools into the given registry.
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(FetchHistoryTool));
    registry.register(Arc::new(SendReplyTool));
    registry.register(Arc::new(FlagPurchaseIntentTool));
    registry.register(Arc::new(EndSessionTool));
}
