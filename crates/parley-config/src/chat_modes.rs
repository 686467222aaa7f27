// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat mode definitions loaded from a static YAML file.
//!
//! ```yaml
//! - name: sales
//!   prompt_template: "You answer buyers of {{ conversation.name }}."
//!   condition: "{{ message.content | length > 0 }}"
//!   model: small-chat
//!   tools: [send_reply, end_session]
//!   max_iterations: 3
//! ```

use std::collections::HashSet;
use std::path::Path;

use parley_core::types::ChatMode;

use crate::diagnostic::ConfigError;

/// Parses a YAML list of chat modes, rejecting duplicate names.
pub fn parse_chat_modes(origin: &str, yaml: &str) -> Result<Vec<ChatMode>, ConfigError> {
    let modes: Vec<ChatMode> =
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ChatModes {
            path: origin.to_string(),
            message: e.to_string(),
        })?;

    let mut seen = HashSet::new();
    for mode in &modes {
        if !seen.insert(mode.name.as_str()) {
            return Err(ConfigError::ChatModes {
                path: origin.to_string(),
                message: format!("duplicate chat mode name `{}`", mode.name),
            });
        }
    }
    Ok(modes)
}

/// Reads and parses the chat mode file at `path`.
pub fn load_chat_modes(path: &Path) -> Result<Vec<ChatMode>, ConfigError> {
    let origin = path.display().to_string();
    let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::ChatModes {
        path: origin.clone(),
        message: e.to_string(),
    })?;
    let modes = parse_chat_modes(&origin, &yaml)?;
    tracing::debug!(path = %origin, count = modes.len(), "chat modes parsed");
    Ok(modes)
}
