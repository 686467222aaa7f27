// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the external collaborators of the pipeline.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod broadcaster;
pub mod model;
pub mod outbox;
pub mod source;
pub mod storage;
pub mod vendor;

pub use adapter::PluginAdapter;
pub use broadcaster::Broadcaster;
pub use model::ModelRunner;
pub use outbox::Outbox;
pub use source::EventSource;
pub use storage::StorageAdapter;
pub use vendor::VendorGateway;
