// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent session operations.

use parley_core::ParleyError;
use parley_core::types::{HistoryCursor, Session, SessionStatus};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

const SESSION_COLUMNS: &str =
    "id, conversation_id, chat_mode, status, started_at, ended_at, next_poll_at, next_poll_message_id";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        chat_mode: row.get(2)?,
        status: parse_column(row, 3)?,
        started_at: row.get(4)?,
        ended_at: row.get(5)?,
        next_poll_at: row.get(6)?,
        next_poll_message_id: row.get(7)?,
    })
}

/// Create a new session.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), ParleyError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, conversation_id, chat_mode, status, started_at,
                     ended_at, next_poll_at, next_poll_message_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session.id,
                    session.conversation_id,
                    session.chat_mode,
                    session.status.to_string(),
                    session.started_at,
                    session.ended_at,
                    session.next_poll_at,
                    session.next_poll_message_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by ID.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List sessions, newest first, optionally filtered by conversation and status.
pub async fn list_sessions(
    db: &Database,
    conversation_id: Option<&str>,
    status: Option<SessionStatus>,
) -> Result<Vec<Session>, ParleyError> {
    let conversation_id = conversation_id.map(str::to_string);
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE (?1 IS NULL OR conversation_id = ?1) AND (?2 IS NULL OR status = ?2)
                 ORDER BY started_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, status], row_to_session)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Ends an active session. Already-ended sessions keep their original `ended_at`.
pub async fn end_session(db: &Database, id: &str, ended_at: &str) -> Result<(), ParleyError> {
    let id = id.to_string();
    let ended_at = ended_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET status = 'ended', ended_at = ?2
                 WHERE id = ?1 AND status = 'active'",
                params![id, ended_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Records the history watermark of a session.
pub async fn set_next_poll(
    db: &Database,
    id: &str,
    cursor: &HistoryCursor,
) -> Result<(), ParleyError> {
    let id = id.to_string();
    let cursor = cursor.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET next_poll_at = ?2, next_poll_message_id = ?3 WHERE id = ?1",
                params![id, cursor.created_at, cursor.message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
