// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations backing the SQLite event source.
//!
//! A claimed entry is locked for `lock_secs`. Entries that are never acked
//! become claimable again once the lock expires, giving at-least-once delivery.

use parley_core::ParleyError;
use parley_core::types::QueueEntry;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Enqueue a new item. Returns the auto-generated queue entry ID.
pub async fn enqueue(db: &Database, queue_name: &str, payload: &str) -> Result<i64, ParleyError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload) VALUES (?1, ?2)",
                params![queue_name, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next entry of the named queue.
///
/// Atomically selects the oldest pending entry (or a processing entry whose
/// lock expired), marks it as "processing" and bumps its attempt counter.
/// Returns `None` if nothing is claimable.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    lock_secs: u64,
) -> Result<Option<QueueEntry>, ParleyError> {
    let queue_name = queue_name.to_string();
    let lock_modifier = format!("+{lock_secs} seconds");
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let entry = tx
                .query_row(
                    "SELECT id, queue_name, payload, status, attempts, created_at, updated_at,
                            locked_until
                     FROM queue
                     WHERE queue_name = ?1
                       AND (status = 'pending'
                            OR (status = 'processing'
                                AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                     ORDER BY id ASC
                     LIMIT 1",
                    params![queue_name],
                    |row| {
                        Ok(QueueEntry {
                            id: row.get(0)?,
                            queue_name: row.get(1)?,
                            payload: row.get(2)?,
                            status: row.get(3)?,
                            attempts: row.get(4)?,
                            created_at: row.get(5)?,
                            updated_at: row.get(6)?,
                            locked_until: row.get(7)?,
                        })
                    },
                )
                .optional()?;

            let Some(entry) = entry else {
                tx.commit()?;
                return Ok(None);
            };

            let (updated_at, locked_until): (String, String) = tx.query_row(
                "UPDATE queue SET status = 'processing', attempts = attempts + 1,
                     locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1
                 RETURNING updated_at, locked_until",
                params![entry.id, lock_modifier],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            tx.commit()?;

            Ok(Some(QueueEntry {
                status: "processing".to_string(),
                attempts: entry.attempts + 1,
                updated_at,
                locked_until: Some(locked_until),
                ..entry
            }))
        })
        .await
        .map_err(map_tr_err)
}

/// Acknowledge processing of a queue entry. Marks the entry as "completed".
pub async fn ack(db: &Database, id: i64) -> Result<(), ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
