// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Offline-sync message events.

use parley_core::ParleyError;
use parley_core::types::MessageEvent;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

/// Insert a batch of events in one transaction.
pub async fn insert_message_events(
    db: &Database,
    events: &[MessageEvent],
) -> Result<(), ParleyError> {
    if events.is_empty() {
        return Ok(());
    }
    let events = events.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO message_events (id, user_id, conversation_id, message_id,
                         event_name, payload, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )?;
                for event in &events {
                    stmt.execute(params![
                        event.id,
                        event.user_id,
                        event.conversation_id,
                        event.message_id,
                        event.event_name.to_string(),
                        event.payload,
                        event.created_at,
                        event.expires_at,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Unexpired events for `user_id` created after `since`, oldest first.
pub async fn list_message_events(
    db: &Database,
    user_id: &str,
    since: &str,
    now: &str,
) -> Result<Vec<MessageEvent>, ParleyError> {
    let user_id = user_id.to_string();
    let since = since.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, conversation_id, message_id, event_name, payload,
                        created_at, expires_at
                 FROM message_events
                 WHERE user_id = ?1 AND created_at > ?2 AND expires_at > ?3
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![user_id, since, now], |row| {
                Ok(MessageEvent {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    conversation_id: row.get(2)?,
                    message_id: row.get(3)?,
                    event_name: parse_column(row, 4)?,
                    payload: row.get(5)?,
                    created_at: row.get(6)?,
                    expires_at: row.get(7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes events that expired at or before `now`.
pub async fn purge_expired_events(db: &Database, now: &str) -> Result<usize, ParleyError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM message_events WHERE expires_at <= ?1",
                params![now],
            )
        })
        .await
        .map_err(map_tr_err)
}
