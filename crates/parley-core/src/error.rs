// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley pipeline.

use thiserror::Error;

/// The primary error type used across all Parley adapter traits and pipeline stages.
///
/// Skip conditions (duplicate event, internal sender, false condition gate) are
/// not errors and never appear here; they are modelled as outcome values.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, bad chat mode file).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Broker payload could not be decoded into an event.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Vendor gateway call failed.
    #[error("vendor {vendor} error: {message}")]
    Vendor {
        vendor: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An external identity or conversation could not be mapped to internal records.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Broadcaster call failed.
    #[error("broadcast error: {message}")]
    Broadcast {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Model runner call failed.
    #[error("model error: {message}")]
    Model {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Prompt or condition template failed to render.
    #[error("template error: {0}")]
    Template(String),

    /// Chat mode is missing or lacks a required field.
    #[error("invalid chat mode `{name}`: {reason}")]
    InvalidChatMode { name: String, reason: String },

    /// A chat mode names a tool that is not registered.
    #[error("tool not registered: {0}")]
    ToolNotFound(String),

    /// A tool failed while executing.
    #[error("tool {tool} failed: {message}")]
    Tool { tool: String, message: String },

    /// Requested adapter was not found in a registry.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Wraps any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ParleyError::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a vendor error without an underlying source.
    pub fn vendor(vendor: impl Into<String>, message: impl Into<String>) -> Self {
        ParleyError::Vendor {
            vendor: vendor.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ParleyError::Config(_) => "config",
            ParleyError::Storage { .. } => "storage",
            ParleyError::MalformedEvent(_) => "malformed_event",
            ParleyError::Vendor { .. } => "vendor",
            ParleyError::Resolution(_) => "resolution",
            ParleyError::Broadcast { .. } => "broadcast",
            ParleyError::Model { .. } => "model",
            ParleyError::Template(_) => "template",
            ParleyError::InvalidChatMode { .. } => "invalid_chat_mode",
            ParleyError::ToolNotFound(_) => "tool_not_found",
            ParleyError::Tool { .. } => "tool",
            ParleyError::AdapterNotFound { .. } => "adapter_not_found",
            ParleyError::Timeout { .. } => "timeout",
            ParleyError::Internal(_) => "internal",
        }
    }
}
