// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley ingestion pipeline.
//!
//! This crate provides the trait definitions, error type, and domain types
//! shared throughout the workspace. Every external collaborator (store, vendor,
//! broadcaster, model runner, broker) is reached through a trait defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ParleyError;
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    Broadcaster, EventSource, ModelRunner, Outbox, PluginAdapter, StorageAdapter, VendorGateway,
};
