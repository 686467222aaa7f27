// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker ingestion for the Parley pipeline.
//!
//! The [`WorkerPool`] pulls deliveries from an [`EventSource`] and hands each
//! one to the [`IngestPipeline`], which:
//! - Admits or skips the event (pattern, tenant, dedup, loop prevention)
//! - Resolves the vendor conversation and sender to local records
//! - Persists the message exactly once
//! - Queues fan-out and the agent trigger on the [`BackgroundExecutor`]
//!
//! [`EventSource`]: parley_core::EventSource

pub mod admission;
pub mod event;
pub mod executor;
pub mod fanout;
pub mod ingress;
pub mod locks;
pub mod pipeline;
pub mod pool;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod sweeper;

pub use admission::{Admission, AdmissionGuard, SkipReason, TenantAllowList};
pub use event::{BrokerEvent, ChatEvent, MESSAGE_SENT_PATTERN};
pub use executor::BackgroundExecutor;
pub use fanout::MessageStore;
pub use ingress::LocalIngress;
pub use locks::KeyedLocks;
pub use pipeline::{IngestOutcome, IngestPipeline};
pub use pool::{EventHandler, EventStatus, WorkerPool, process_delivery};
pub use registry::VendorRegistry;
pub use resolver::Resolver;
pub use source::QueueEventSource;
pub use sweeper::{SweepReport, run_sweeper, sweep_once};
