// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotency records for admitted broker events.

use parley_core::ParleyError;
use parley_core::types::DedupRecord;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Records the event unless an unexpired record already exists.
///
/// A single statement decides the race: the upsert only overwrites a row whose
/// `expires_at` has passed, so exactly one concurrent caller sees a change.
pub async fn try_insert_dedup(db: &Database, record: &DedupRecord) -> Result<bool, ParleyError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO dedup_records (external_message_id, conversation_key, vendor_name,
                     content_hash, processed_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (external_message_id, conversation_key, vendor_name) DO UPDATE SET
                     content_hash = excluded.content_hash,
                     processed_at = excluded.processed_at,
                     expires_at = excluded.expires_at
                 WHERE dedup_records.expires_at <= excluded.processed_at",
                params![
                    record.external_message_id,
                    record.conversation_key,
                    record.vendor_name,
                    record.content_hash,
                    record.processed_at,
                    record.expires_at,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes dedup records that expired at or before `now`.
pub async fn purge_expired_dedup(db: &Database, now: &str) -> Result<usize, ParleyError> {
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM dedup_records WHERE expires_at <= ?1",
                params![now],
            )
        })
        .await
        .map_err(map_tr_err)
}
