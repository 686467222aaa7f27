// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal HTTP ingress for the Parley pipeline.
//!
//! Locally originated sends enter through `POST /internal/messages` and take
//! the same persist, fan-out and vendor delivery path as agent replies.

pub mod handlers;
pub mod server;

pub use handlers::{ErrorResponse, HealthResponse, SendMessageRequest, SendMessageResponse};
pub use server::{GatewayState, HealthState, bind, router, serve};
