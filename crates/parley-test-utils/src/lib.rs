// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a broker, vendor or model.
//!
//! # Components
//!
//! - [`MockModelRunner`] - Model runner with queued responses and request capture
//! - [`MockVendorGateway`] - Vendor with seeded conversations and users, captures sends
//! - [`MockBroadcaster`] - Captures broadcast events, can be told to fail
//! - [`MemoryEventSource`] - In-memory broker with commit tracking
//! - [`TestHarness`] - Temp SQLite store plus the mocks and seeding helpers

pub mod harness;
pub mod memory_source;
pub mod mock_broadcaster;
pub mod mock_model;
pub mod mock_vendor;

pub use harness::{StoreOutbox, TestHarness, chat_mode};
pub use memory_source::MemoryEventSource;
pub use mock_broadcaster::MockBroadcaster;
pub use mock_model::MockModelRunner;
pub use mock_vendor::MockVendorGateway;
