// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quota record operations.

use rusqlite::{params, OptionalExtension, Transaction};
use ticketdesk_core::traits::QuotaUpdate;
use ticketdesk_core::{DeskError, QuotaRecord};

use crate::database::{map_tr_err, Database};
use crate::models::{format_ts, quota_from_row, QUOTA_COLUMNS};

/// Read one user's record without modifying it.
pub async fn get_quota(db: &Database, user_id: i64) -> Result<Option<QuotaRecord>, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {QUOTA_COLUMNS} FROM quota WHERE user_id = ?1"),
                params![user_id],
                quota_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply `update` to the user's record inside one transaction.
///
/// The closure runs on the writer thread, so concurrent updates for the same
/// user are applied one after another and none is lost.
pub async fn update_quota(
    db: &Database,
    user_id: i64,
    update: QuotaUpdate,
) -> Result<Option<QuotaRecord>, DeskError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let current = tx
                .query_row(
                    &format!("SELECT {QUOTA_COLUMNS} FROM quota WHERE user_id = ?1"),
                    params![user_id],
                    quota_from_row,
                )
                .optional()?;
            let next = update(current.clone());
            if let Some(record) = &next
                && next != current
            {
                upsert(&tx, record)?;
            }
            tx.commit()?;
            Ok(next)
        })
        .await
        .map_err(map_tr_err)
}

fn upsert(tx: &Transaction<'_>, record: &QuotaRecord) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO quota (user_id, count, last_reset, group_id, display_name)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
             count = excluded.count,
             last_reset = excluded.last_reset,
             group_id = excluded.group_id,
             display_name = excluded.display_name",
        params![
            record.user_id,
            record.count,
            format_ts(record.last_reset),
            record.group_id,
            record.display_name,
        ],
    )?;
    Ok(())
}
