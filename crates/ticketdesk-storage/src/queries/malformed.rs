// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling count of malformed request attempts.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use ticketdesk_core::DeskError;

use crate::database::{map_tr_err, Database};
use crate::models::format_ts;

/// Record an attempt at `at` and return the user's attempts inside `window`.
///
/// Attempts that fell out of the window are deleted in the same transaction,
/// for every user, so users who never return do not leave rows behind.
pub async fn record_malformed(
    db: &Database,
    user_id: i64,
    at: DateTime<Utc>,
    window: Duration,
) -> Result<u32, DeskError> {
    let now = format_ts(at);
    let cutoff = format_ts(at - window);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM malformed_attempts WHERE attempted_at <= ?1",
                params![cutoff],
            )?;
            tx.execute(
                "INSERT INTO malformed_attempts (user_id, attempted_at) VALUES (?1, ?2)",
                params![user_id, now],
            )?;
            let count: u32 = tx.query_row(
                "SELECT COUNT(*) FROM malformed_attempts WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}
