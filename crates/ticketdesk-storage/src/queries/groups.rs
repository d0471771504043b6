// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group activation records.

use rusqlite::{params, Connection, OptionalExtension};
use ticketdesk_core::types::GroupActivation;
use ticketdesk_core::DeskError;

use crate::database::{map_tr_err, Database};
use crate::models::group_from_row;

const SELECT_GROUP: &str = "SELECT group_id, title, active FROM group_activation WHERE group_id = ?1";

pub async fn get_group(db: &Database, group_id: i64) -> Result<Option<GroupActivation>, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(SELECT_GROUP, params![group_id], group_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an active record for `group_id` if none exists.
///
/// An existing record keeps its activation flag; a non-empty `title`
/// replaces the stored one.
pub async fn register_group(
    db: &Database,
    group_id: i64,
    title: &str,
) -> Result<GroupActivation, DeskError> {
    let title = title.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO group_activation (group_id, title, active) VALUES (?1, ?2, 1)
                 ON CONFLICT(group_id) DO UPDATE SET
                     title = CASE WHEN excluded.title <> '' THEN excluded.title ELSE title END",
                params![group_id, title],
            )?;
            fetch(conn, group_id)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_group_active(
    db: &Database,
    group_id: i64,
    active: bool,
) -> Result<GroupActivation, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO group_activation (group_id, title, active) VALUES (?1, '', ?2)
                 ON CONFLICT(group_id) DO UPDATE SET active = excluded.active",
                params![group_id, active],
            )?;
            fetch(conn, group_id)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_groups(db: &Database) -> Result<Vec<GroupActivation>, DeskError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn
                .prepare("SELECT group_id, title, active FROM group_activation ORDER BY group_id")?;
            let rows = stmt.query_map([], group_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

fn fetch(conn: &Connection, group_id: i64) -> rusqlite::Result<GroupActivation> {
    conn.query_row(SELECT_GROUP, params![group_id], group_from_row)
}
