// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite and the core record types.
//!
//! Timestamps are stored as fixed-width UTC text so that lexical order is
//! chronological order.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use ticketdesk_core::types::{
    Disposition, GroupActivation, HistoryRecord, MessageHandle, PendingTicket, QuotaRecord,
    TicketNumber,
};

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub(crate) fn format_ts(at: DateTime<Utc>) -> String {
    at.format(TS_FORMAT).to_string()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) const QUOTA_COLUMNS: &str = "user_id, count, last_reset, group_id, display_name";

pub(crate) fn quota_from_row(row: &Row<'_>) -> rusqlite::Result<QuotaRecord> {
    Ok(QuotaRecord {
        user_id: row.get(0)?,
        count: row.get(1)?,
        last_reset: ts_column(row, 2)?,
        group_id: row.get(3)?,
        display_name: row.get(4)?,
    })
}

pub(crate) const PENDING_COLUMNS: &str = "number, source_group_id, source_group_title, thread_id, \
     requester_id, requester_display_name, message_text, request_message_id, \
     posted_chat_id, posted_message_id, created_at, priority";

pub(crate) fn pending_from_row(row: &Row<'_>) -> rusqlite::Result<PendingTicket> {
    let posted_chat: Option<i64> = row.get(8)?;
    let posted_message: Option<i32> = row.get(9)?;
    Ok(PendingTicket {
        number: TicketNumber(row.get(0)?),
        source_group_id: row.get(1)?,
        source_group_title: row.get(2)?,
        thread_id: row.get(3)?,
        requester_id: row.get(4)?,
        requester_display_name: row.get(5)?,
        message_text: row.get(6)?,
        request_message_id: row.get(7)?,
        posted_message: posted_chat
            .zip(posted_message)
            .map(|(chat_id, message_id)| MessageHandle {
                chat_id,
                message_id,
            }),
        created_at: ts_column(row, 10)?,
        priority: row.get(11)?,
    })
}

pub(crate) const HISTORY_COLUMNS: &str = "number, source_group_id, source_group_title, thread_id, \
     requester_id, requester_display_name, message_text, request_message_id, \
     created_at, priority, disposition, resolved_at, resolving_admin, attached_url";

pub(crate) fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let disposition: String = row.get(10)?;
    Ok(HistoryRecord {
        number: TicketNumber(row.get(0)?),
        source_group_id: row.get(1)?,
        source_group_title: row.get(2)?,
        thread_id: row.get(3)?,
        requester_id: row.get(4)?,
        requester_display_name: row.get(5)?,
        message_text: row.get(6)?,
        request_message_id: row.get(7)?,
        created_at: ts_column(row, 8)?,
        priority: row.get(9)?,
        disposition: Disposition::from_str(&disposition).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e))
        })?,
        resolved_at: ts_column(row, 11)?,
        resolving_admin: row.get(12)?,
        attached_url: row.get(13)?,
    })
}

pub(crate) fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupActivation> {
    Ok(GroupActivation {
        group_id: row.get(0)?,
        title: row.get(1)?,
        active: row.get(2)?,
    })
}
