// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbox trait for locally originated messages.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{Message, OutboundRequest};

/// Persists, fans out and forwards a locally originated message.
///
/// Implemented by the message store; consumed by agent tools and the HTTP ingress.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Stores the message and schedules its fan-out and vendor delivery.
    ///
    /// Returns once the message is persisted; delivery happens in the background.
    async fn send(&self, request: OutboundRequest) -> Result<Message, ParleyError>;
}
