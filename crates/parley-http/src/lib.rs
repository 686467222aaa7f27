// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP adapters for Parley's external collaborators.
//!
//! Each adapter wraps a [`JsonClient`], which retries once on 429/500/502/503
//! and maps failures into the adapter's own error variant.

pub mod broadcaster;
pub mod client;
pub mod model;
pub mod vendor;

pub use broadcaster::HttpBroadcaster;
pub use client::{ClientError, JsonClient};
pub use model::HttpModelRunner;
pub use vendor::HttpVendorGateway;
