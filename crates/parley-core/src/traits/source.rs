// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event source trait for broker consumers.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::Delivery;

/// A broker cursor shared by the ingestion workers.
///
/// Delivery is at-least-once: a record fetched but never committed is handed
/// out again after the consumer restarts.
#[async_trait]
pub trait EventSource: PluginAdapter {
    /// Topic this source reads from (metrics label).
    fn topic(&self) -> &str;

    /// Consumer group this source belongs to (metrics label).
    fn group(&self) -> &str;

    /// Fetches the next record, or `None` when nothing is available right now.
    async fn fetch(&self) -> Result<Option<Delivery>, ParleyError>;

    /// Commits a fetched record so it is never delivered again.
    async fn commit(&self, delivery: &Delivery) -> Result<(), ParleyError>;
}
