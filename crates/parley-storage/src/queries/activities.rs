// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool activity audit log.

use parley_core::ParleyError;
use parley_core::types::ToolActivity;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn record_tool_activity(
    db: &Database,
    activity: &ToolActivity,
) -> Result<(), ParleyError> {
    let activity = activity.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tool_activities (id, session_id, conversation_id, action, data,
                     is_error, executed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    activity.id,
                    activity.session_id,
                    activity.conversation_id,
                    activity.action,
                    activity.data,
                    activity.is_error,
                    activity.executed_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Activities in execution order, optionally for one session.
pub async fn list_tool_activities(
    db: &Database,
    session_id: Option<&str>,
) -> Result<Vec<ToolActivity>, ParleyError> {
    let session_id = session_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, conversation_id, action, data, is_error, executed_at
                 FROM tool_activities
                 WHERE ?1 IS NULL OR session_id = ?1
                 ORDER BY executed_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok(ToolActivity {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    conversation_id: row.get(2)?,
                    action: row.get(3)?,
                    data: row.get(4)?,
                    is_error: row.get(5)?,
                    executed_at: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
