// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket allocation, pending tickets and resolution history.
//!
//! Numbers come from the single-row `ticket_sequence` table. Every allocation
//! takes the maximum of the stored high-water mark and the largest number in
//! either ticket table, so numbers stay unique even for rows inserted under
//! caller-chosen numbers.

use rusqlite::{params, OptionalExtension, Transaction};
use ticketdesk_core::types::{
    HistoryRecord, MessageHandle, NewTicket, PendingTicket, Resolution, TicketNumber,
};
use ticketdesk_core::DeskError;

use crate::database::{map_tr_err, Database};
use crate::models::{
    format_ts, history_from_row, pending_from_row, HISTORY_COLUMNS, PENDING_COLUMNS,
};

/// Outcome of a write that can collide with existing rows.
enum Write<T> {
    Done(T),
    Duplicate,
    AlreadyResolved,
    Missing,
}

fn allocate(tx: &Transaction<'_>) -> rusqlite::Result<i64> {
    tx.query_row(
        "UPDATE ticket_sequence SET last_number = MAX(
             last_number,
             (SELECT COALESCE(MAX(number), 0) FROM pending_tickets),
             (SELECT COALESCE(MAX(number), 0) FROM history)
         ) + 1
         WHERE id = 1
         RETURNING last_number",
        [],
        |row| row.get(0),
    )
}

fn number_in_use(tx: &Transaction<'_>, number: i64) -> rusqlite::Result<bool> {
    tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM pending_tickets WHERE number = ?1)
             OR EXISTS(SELECT 1 FROM history WHERE number = ?1)",
        params![number],
        |row| row.get(0),
    )
}

fn insert_row(tx: &Transaction<'_>, ticket: &PendingTicket) -> rusqlite::Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO pending_tickets ({PENDING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            ticket.number.0,
            ticket.source_group_id,
            ticket.source_group_title,
            ticket.thread_id,
            ticket.requester_id,
            ticket.requester_display_name,
            ticket.message_text,
            ticket.request_message_id,
            ticket.posted_message.map(|h| h.chat_id),
            ticket.posted_message.map(|h| h.message_id),
            format_ts(ticket.created_at),
            ticket.priority,
        ],
    )?;
    // Keep the high-water mark at or above every number ever stored.
    tx.execute(
        "UPDATE ticket_sequence SET last_number = MAX(last_number, ?1) WHERE id = 1",
        params![ticket.number.0],
    )?;
    Ok(())
}

/// Allocate the next ticket number without creating a ticket.
pub async fn next_ticket_number(db: &Database) -> Result<TicketNumber, DeskError> {
    db.connection()
        .call(|conn| {
            let tx = conn.transaction()?;
            let number = allocate(&tx)?;
            tx.commit()?;
            Ok(TicketNumber(number))
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a pending ticket under its own number.
pub async fn insert_pending(db: &Database, ticket: &PendingTicket) -> Result<(), DeskError> {
    let ticket = ticket.clone();
    let number = ticket.number;
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if number_in_use(&tx, ticket.number.0)? {
                return Ok(Write::Duplicate);
            }
            insert_row(&tx, &ticket)?;
            tx.commit()?;
            Ok(Write::Done(()))
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        Write::Done(()) => Ok(()),
        _ => Err(DeskError::DuplicateTicket(number)),
    }
}

/// Allocate a number and insert the ticket in one transaction.
pub async fn open_ticket(db: &Database, new: NewTicket) -> Result<PendingTicket, DeskError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let number = allocate(&tx)?;
            let ticket = PendingTicket::from_new(TicketNumber(number), new);
            insert_row(&tx, &ticket)?;
            tx.commit()?;
            Ok(ticket)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_pending(
    db: &Database,
    number: TicketNumber,
) -> Result<Option<PendingTicket>, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {PENDING_COLUMNS} FROM pending_tickets WHERE number = ?1"),
                params![number.0],
                pending_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Every pending ticket, priority first, then oldest number first.
pub async fn list_pending(db: &Database) -> Result<Vec<PendingTicket>, DeskError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PENDING_COLUMNS} FROM pending_tickets ORDER BY priority DESC, number ASC"
            ))?;
            let rows = stmt.query_map([], pending_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_posted_message(
    db: &Database,
    number: TicketNumber,
    handle: MessageHandle,
) -> Result<(), DeskError> {
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE pending_tickets SET posted_chat_id = ?2, posted_message_id = ?3
                 WHERE number = ?1",
                params![number.0, handle.chat_id, handle.message_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(DeskError::ticket_not_found(number));
    }
    Ok(())
}

pub async fn set_priority(
    db: &Database,
    number: TicketNumber,
    priority: bool,
) -> Result<bool, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE pending_tickets SET priority = ?2 WHERE number = ?1",
                params![number.0, priority],
            )
            .map(|changed| changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a pending ticket. Returns `false` if there was nothing to remove.
pub async fn delete_pending(db: &Database, number: TicketNumber) -> Result<bool, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM pending_tickets WHERE number = ?1",
                params![number.0],
            )
            .map(|changed| changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a pending ticket into history.
///
/// The history insert and the pending delete share one transaction, so the
/// ticket is never observed in both tables or in neither.
pub async fn resolve_ticket(
    db: &Database,
    number: TicketNumber,
    resolution: Resolution,
) -> Result<HistoryRecord, DeskError> {
    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let resolved: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM history WHERE number = ?1)",
                params![number.0],
                |row| row.get(0),
            )?;
            if resolved {
                return Ok(Write::AlreadyResolved);
            }

            let pending = tx
                .query_row(
                    &format!("SELECT {PENDING_COLUMNS} FROM pending_tickets WHERE number = ?1"),
                    params![number.0],
                    pending_from_row,
                )
                .optional()?;
            let Some(pending) = pending else {
                return Ok(Write::Missing);
            };

            let record = HistoryRecord::from_pending(pending, resolution);
            tx.execute(
                &format!(
                    "INSERT INTO history ({HISTORY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    record.number.0,
                    record.source_group_id,
                    record.source_group_title,
                    record.thread_id,
                    record.requester_id,
                    record.requester_display_name,
                    record.message_text,
                    record.request_message_id,
                    format_ts(record.created_at),
                    record.priority,
                    record.disposition.as_ref(),
                    format_ts(record.resolved_at),
                    record.resolving_admin,
                    record.attached_url,
                ],
            )?;
            tx.execute(
                "DELETE FROM pending_tickets WHERE number = ?1",
                params![number.0],
            )?;
            tx.commit()?;
            Ok(Write::Done(record))
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        Write::Done(record) => Ok(record),
        Write::AlreadyResolved => Err(DeskError::AlreadyResolved(number)),
        Write::Missing | Write::Duplicate => Err(DeskError::ticket_not_found(number)),
    }
}

pub async fn get_history(
    db: &Database,
    number: TicketNumber,
) -> Result<Option<HistoryRecord>, DeskError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {HISTORY_COLUMNS} FROM history WHERE number = ?1"),
                params![number.0],
                history_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recently resolved first.
pub async fn recent_history(db: &Database, limit: usize) -> Result<Vec<HistoryRecord>, DeskError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM history ORDER BY resolved_at DESC, number DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], history_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
