// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vendor gateway trait for external chat platform integrations.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationInfo, VendorMessage, VendorUser};

/// Per-vendor adapter exposing canonical conversation and user lookups plus delivery.
///
/// New vendors are added by registering another implementation; nothing in the
/// pipeline branches on the vendor name.
#[async_trait]
pub trait VendorGateway: PluginAdapter {
    /// Fetches conversation metadata and its participant list.
    async fn get_conversation_info(&self, external_id: &str)
    -> Result<ConversationInfo, ParleyError>;

    /// Fetches a single user profile.
    async fn get_user_info(&self, external_user_id: &str) -> Result<VendorUser, ParleyError>;

    /// Delivers a message to the vendor.
    async fn send_message(&self, message: VendorMessage) -> Result<(), ParleyError>;
}
