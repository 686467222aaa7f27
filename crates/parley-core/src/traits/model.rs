// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model runner trait for LLM generation turns.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerateRequest, GenerateResponse};

/// Executes one LLM generation turn given messages, tools and a model identifier.
#[async_trait]
pub trait ModelRunner: PluginAdapter {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ParleyError>;
}
