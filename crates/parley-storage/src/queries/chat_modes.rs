// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat mode persistence. Tool lists are stored as JSON arrays.

use parley_core::ParleyError;
use parley_core::types::ChatMode;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const CHAT_MODE_COLUMNS: &str = "name, prompt_template, condition, model, tools, max_iterations,
     max_prompt_tokens, max_response_tokens";

fn row_to_chat_mode(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMode> {
    let tools: String = row.get(4)?;
    Ok(ChatMode {
        name: row.get(0)?,
        prompt_template: row.get(1)?,
        condition: row.get(2)?,
        model: row.get(3)?,
        tools: serde_json::from_str(&tools).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        max_iterations: row.get(5)?,
        max_prompt_tokens: row.get(6)?,
        max_response_tokens: row.get(7)?,
    })
}

/// Insert or replace a chat mode by name.
pub async fn upsert_chat_mode(db: &Database, mode: &ChatMode) -> Result<(), ParleyError> {
    let mode = mode.clone();
    let tools = serde_json::to_string(&mode.tools)
        .map_err(|e| ParleyError::Internal(format!("failed to encode chat mode tools: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chat_modes (name, prompt_template, condition, model, tools,
                     max_iterations, max_prompt_tokens, max_response_tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (name) DO UPDATE SET
                     prompt_template = excluded.prompt_template,
                     condition = excluded.condition,
                     model = excluded.model,
                     tools = excluded.tools,
                     max_iterations = excluded.max_iterations,
                     max_prompt_tokens = excluded.max_prompt_tokens,
                     max_response_tokens = excluded.max_response_tokens",
                params![
                    mode.name,
                    mode.prompt_template,
                    mode.condition,
                    mode.model,
                    tools,
                    mode.max_iterations,
                    mode.max_prompt_tokens,
                    mode.max_response_tokens,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a chat mode by name.
pub async fn get_chat_mode(db: &Database, name: &str) -> Result<Option<ChatMode>, ParleyError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CHAT_MODE_COLUMNS} FROM chat_modes WHERE name = ?1"),
                params![name],
                row_to_chat_mode,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List all chat modes by name.
pub async fn list_chat_modes(db: &Database) -> Result<Vec<ChatMode>, ParleyError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHAT_MODE_COLUMNS} FROM chat_modes ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map([], row_to_chat_mode)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
