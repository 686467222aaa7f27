// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation and membership operations.

use parley_core::ParleyError;
use parley_core::types::{Conversation, ConversationMember, NewMember};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const CONVERSATION_COLUMNS: &str = "id, vendor_name, external_id, name, context, metadata,
     last_message_at, last_message_content, created_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        vendor_name: row.get(1)?,
        external_id: row.get(2)?,
        name: row.get(3)?,
        context: row.get(4)?,
        metadata: row.get(5)?,
        last_message_at: row.get(6)?,
        last_message_content: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn select_by_external(
    conn: &rusqlite::Connection,
    vendor_name: &str,
    external_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE vendor_name = ?1 AND external_id = ?2"
        ),
        params![vendor_name, external_id],
        row_to_conversation,
    )
    .optional()
}

/// Find a conversation by its vendor binding.
pub async fn find_conversation(
    db: &Database,
    vendor_name: &str,
    external_id: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let vendor_name = vendor_name.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| select_by_external(conn, &vendor_name, &external_id))
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by internal ID.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List conversations, most recently active first.
pub async fn list_conversations(db: &Database) -> Result<Vec<Conversation>, ParleyError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 ORDER BY COALESCE(last_message_at, created_at) DESC"
            ))?;
            let rows = stmt.query_map([], row_to_conversation)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Create-or-get on `(vendor_name, external_id)`.
///
/// Members are only attached when this call inserted the conversation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
    members: &[NewMember],
) -> Result<Conversation, ParleyError> {
    let conversation = conversation.clone();
    let members = members.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO conversations (id, vendor_name, external_id, name, context, metadata,
                     last_message_at, last_message_content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (vendor_name, external_id) DO NOTHING",
                params![
                    conversation.id,
                    conversation.vendor_name,
                    conversation.external_id,
                    conversation.name,
                    conversation.context,
                    conversation.metadata,
                    conversation.last_message_at,
                    conversation.last_message_content,
                    conversation.created_at,
                ],
            )?;
            if inserted == 1 {
                for member in &members {
                    tx.execute(
                        "INSERT INTO conversation_members (conversation_id, user_id, role)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT (conversation_id, user_id) DO NOTHING",
                        params![conversation.id, member.user_id, member.role],
                    )?;
                }
            }
            let stored =
                select_by_external(&tx, &conversation.vendor_name, &conversation.external_id)?
                    .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(stored)
        })
        .await
        .map_err(map_tr_err)
}

/// Add a member if absent. Returns `true` when a row was inserted.
pub async fn add_member(
    db: &Database,
    conversation_id: &str,
    member: &NewMember,
) -> Result<bool, ParleyError> {
    let conversation_id = conversation_id.to_string();
    let member = member.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO conversation_members (conversation_id, user_id, role)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (conversation_id, user_id) DO NOTHING",
                params![conversation_id, member.user_id, member.role],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// List members of a conversation in user ID order.
pub async fn list_members(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<ConversationMember>, ParleyError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, user_id, role, unread_count, last_message_at,
                        last_read_at, last_read_message_id
                 FROM conversation_members WHERE conversation_id = ?1
                 ORDER BY user_id ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(ConversationMember {
                    conversation_id: row.get(0)?,
                    user_id: row.get(1)?,
                    role: row.get(2)?,
                    unread_count: row.get(3)?,
                    last_message_at: row.get(4)?,
                    last_read_at: row.get(5)?,
                    last_read_message_id: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
