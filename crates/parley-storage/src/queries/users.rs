// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User and user attribute operations.

use parley_core::ParleyError;
use parley_core::types::{User, UserAttribute};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const USER_COLUMNS: &str = "u.id, u.name, u.email, u.is_active, u.is_internal, u.created_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get(3)?,
        is_internal: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn find_by_attribute(
    conn: &rusqlite::Connection,
    key: &str,
    value: &str,
) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT {USER_COLUMNS} FROM users u
             JOIN user_attributes a ON a.user_id = u.id
             WHERE a.key = ?1 AND a.value = ?2
             ORDER BY u.created_at ASC
             LIMIT 1"
        ),
        params![key, value],
        row_to_user,
    )
    .optional()
}

/// Get a user by ID.
pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Find the user linked through attribute `key = value`.
pub async fn find_user_by_attribute(
    db: &Database,
    key: &str,
    value: &str,
) -> Result<Option<User>, ParleyError> {
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| find_by_attribute(conn, &key, &value))
        .await
        .map_err(map_tr_err)
}

/// Insert a user together with its linking attribute, unless another user
/// already holds the link. Check and insert share one transaction.
pub async fn create_linked_user(
    db: &Database,
    user: &User,
    key: &str,
    value: &str,
) -> Result<User, ParleyError> {
    let user = user.clone();
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if let Some(existing) = find_by_attribute(&tx, &key, &value)? {
                tx.commit()?;
                return Ok(existing);
            }
            tx.execute(
                "INSERT INTO users (id, name, email, is_active, is_internal, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.is_active,
                    user.is_internal,
                    user.created_at,
                ],
            )?;
            tx.execute(
                "INSERT INTO user_attributes (user_id, key, value, tags) VALUES (?1, ?2, ?3, '[]')",
                params![user.id, key, value],
            )?;
            tx.commit()?;
            Ok(user)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace the attribute for `(user_id, key)`.
pub async fn upsert_user_attribute(
    db: &Database,
    attribute: &UserAttribute,
) -> Result<(), ParleyError> {
    let attribute = attribute.clone();
    let tags = serde_json::to_string(&attribute.tags)
        .map_err(|e| ParleyError::Internal(format!("failed to encode attribute tags: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO user_attributes (user_id, key, value, tags) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = excluded.value, tags = excluded.tags",
                params![attribute.user_id, attribute.key, attribute.value, tags],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List all attributes of a user, ordered by key.
pub async fn get_user_attributes(
    db: &Database,
    user_id: &str,
) -> Result<Vec<UserAttribute>, ParleyError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, key, value, tags FROM user_attributes
                 WHERE user_id = ?1 ORDER BY key ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                let tags: String = row.get(3)?;
                Ok(UserAttribute {
                    user_id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    tags: serde_json::from_str(&tags).unwrap_or_default(),
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
