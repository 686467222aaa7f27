// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations and the unread-count fan-out.

use parley_core::ParleyError;
use parley_core::types::{DeliveryStatus, HistoryCursor, Message};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, external_message_id,
     vendor_name, direction, delivery_status, metadata, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        external_message_id: row.get(4)?,
        vendor_name: row.get(5)?,
        direction: parse_column(row, 6)?,
        delivery_status: parse_column(row, 7)?,
        metadata: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Insert a message, idempotent on the external ID triple.
///
/// Returns the stored row and whether this call created it.
pub async fn insert_message(
    db: &Database,
    message: &Message,
) -> Result<(Message, bool), ParleyError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, content, external_message_id,
                     vendor_name, direction, delivery_status, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT DO NOTHING",
                params![
                    message.id,
                    message.conversation_id,
                    message.sender_id,
                    message.content,
                    message.external_message_id,
                    message.vendor_name,
                    message.direction.to_string(),
                    message.delivery_status.to_string(),
                    message.metadata,
                    message.created_at,
                ],
            )?;
            if inserted == 1 {
                tx.commit()?;
                return Ok((message, true));
            }
            let existing = tx.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE external_message_id IS ?1 AND conversation_id = ?2 AND vendor_name IS ?3"
                ),
                params![
                    message.external_message_id,
                    message.conversation_id,
                    message.vendor_name
                ],
                row_to_message,
            )?;
            tx.commit()?;
            Ok((existing, false))
        })
        .await
        .map_err(map_tr_err)
}

/// Get a message by ID.
pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The `limit` most recent messages, returned oldest first.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &str,
    limit: i64,
    exclude_id: Option<&str>,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    let exclude_id = exclude_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND (?2 IS NULL OR id != ?2)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![conversation_id, exclude_id, limit], row_to_message)?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Up to `limit` messages ordered before `cursor` by `(created_at, rowid)`,
/// oldest first. Same-instant messages inserted before the cursor's message
/// are included.
pub async fn messages_before(
    db: &Database,
    conversation_id: &str,
    cursor: &HistoryCursor,
    limit: i64,
) -> Result<Vec<Message>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    let cursor = cursor.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                   AND (created_at < ?2
                        OR (created_at = ?2
                            AND rowid < (SELECT rowid FROM messages WHERE id = ?3)))
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?4"
            ))?;
            let rows = stmt.query_map(
                params![conversation_id, cursor.created_at, cursor.message_id, limit],
                row_to_message,
            )?;
            let mut messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            messages.reverse();
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Update the delivery status of a message.
pub async fn update_delivery_status(
    db: &Database,
    message_id: &str,
    status: DeliveryStatus,
) -> Result<(), ParleyError> {
    let message_id = message_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET delivery_status = ?1 WHERE id = ?2",
                params![status, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Bumps unread counters for everyone but the sender and records the
/// conversation's last message, in one transaction.
pub async fn apply_message_fanout(db: &Database, message: &Message) -> Result<(), ParleyError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE conversation_members
                 SET unread_count = unread_count + 1, last_message_at = ?3
                 WHERE conversation_id = ?1 AND user_id != ?2",
                params![message.conversation_id, message.sender_id, message.created_at],
            )?;
            tx.execute(
                "UPDATE conversation_members SET last_message_at = ?3
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![message.conversation_id, message.sender_id, message.created_at],
            )?;
            tx.execute(
                "UPDATE conversations SET last_message_at = ?2, last_message_content = ?3
                 WHERE id = ?1 AND (last_message_at IS NULL OR last_message_at <= ?2)",
                params![message.conversation_id, message.created_at, message.content],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Resets the member's unread count. Returns `false` for non-members.
pub async fn mark_read(
    db: &Database,
    conversation_id: &str,
    user_id: &str,
    message_id: &str,
) -> Result<bool, ParleyError> {
    let conversation_id = conversation_id.to_string();
    let user_id = user_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE conversation_members
                 SET unread_count = 0, last_read_message_id = ?3,
                     last_read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE conversation_id = ?1 AND user_id = ?2",
                params![conversation_id, user_id, message_id],
            )?;
            Ok(updated == 1)
        })
        .await
        .map_err(map_tr_err)
}
