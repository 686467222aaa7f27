// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broadcaster trait for real-time fan-out to connected clients.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{BroadcastEvent, BroadcastResult};

/// Pushes real-time events to connected clients.
///
/// Events are always addressed per recipient user, never to a room.
#[async_trait]
pub trait Broadcaster: PluginAdapter {
    /// Sends a batch of events.
    async fn send_events(&self, events: Vec<BroadcastEvent>)
    -> Result<BroadcastResult, ParleyError>;
}
