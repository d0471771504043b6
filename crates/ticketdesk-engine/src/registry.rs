// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket numbering, pending tickets and the pending → history handoff.

use std::sync::Arc;

use ticketdesk_core::types::{
    HistoryRecord, MessageHandle, NewTicket, PendingTicket, Resolution,
};
use ticketdesk_core::{Clock, DeskError, Disposition, StorageAdapter, TicketNumber};
use tracing::info;

use crate::retry::retry_read;

/// One page of the pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub tickets: Vec<PendingTicket>,
    /// Zero-based, clamped to the last page.
    pub index: usize,
    pub count: usize,
    pub total: usize,
}

impl Page {
    pub fn has_previous(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.count
    }
}

/// Where a ticket number currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Pending(PendingTicket),
    Resolved(HistoryRecord),
    Unknown,
}

pub struct TicketRegistry {
    store: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
}

impl TicketRegistry {
    pub fn new(store: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn next_ticket_number(&self) -> Result<TicketNumber, DeskError> {
        self.store.next_ticket_number().await
    }

    /// Insert a ticket under a number obtained from [`Self::next_ticket_number`].
    pub async fn create_pending(
        &self,
        number: TicketNumber,
        new: NewTicket,
    ) -> Result<PendingTicket, DeskError> {
        let ticket = PendingTicket::from_new(number, new);
        self.store.insert_pending(&ticket).await?;
        Ok(ticket)
    }

    /// Allocate and insert in one step.
    pub async fn open(&self, new: NewTicket) -> Result<PendingTicket, DeskError> {
        let ticket = self.store.open_ticket(new).await?;
        info!(
            ticket = ticket.number.0,
            user_id = ticket.requester_id,
            group_id = ticket.source_group_id,
            "ticket opened"
        );
        Ok(ticket)
    }

    pub async fn get_pending(
        &self,
        number: TicketNumber,
    ) -> Result<Option<PendingTicket>, DeskError> {
        retry_read("get_pending", || self.store.get_pending(number)).await
    }

    /// Idempotent: removing an absent ticket is not an error.
    pub async fn delete_pending(&self, number: TicketNumber) -> Result<(), DeskError> {
        if self.store.delete_pending(number).await? {
            info!(ticket = number.0, "pending ticket discarded");
        }
        Ok(())
    }

    /// Write the history record and remove the pending ticket, exactly once.
    pub async fn resolve(
        &self,
        number: TicketNumber,
        disposition: Disposition,
        admin_id: i64,
        url: Option<String>,
    ) -> Result<HistoryRecord, DeskError> {
        let record = self
            .store
            .resolve_ticket(
                number,
                Resolution {
                    disposition,
                    admin_id,
                    url,
                    resolved_at: self.clock.now(),
                },
            )
            .await?;
        info!(
            ticket = number.0,
            admin_id,
            decision = %disposition,
            "ticket resolved"
        );
        Ok(record)
    }

    pub async fn get_history(
        &self,
        number: TicketNumber,
    ) -> Result<Option<HistoryRecord>, DeskError> {
        retry_read("get_history", || self.store.get_history(number)).await
    }

    pub async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, DeskError> {
        retry_read("recent_history", || self.store.recent_history(limit)).await
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingTicket>, DeskError> {
        retry_read("list_pending", || self.store.list_pending()).await
    }

    /// Slice the priority-ordered queue. Out-of-range pages clamp to the last one.
    pub async fn page(&self, index: usize, page_size: usize) -> Result<Page, DeskError> {
        let all = self.list_pending().await?;
        Ok(paginate(all, index, page_size))
    }

    pub async fn lookup(&self, number: TicketNumber) -> Result<Lookup, DeskError> {
        if let Some(ticket) = self.get_pending(number).await? {
            return Ok(Lookup::Pending(ticket));
        }
        Ok(match self.get_history(number).await? {
            Some(record) => Lookup::Resolved(record),
            None => Lookup::Unknown,
        })
    }

    pub async fn set_posted_message(
        &self,
        number: TicketNumber,
        handle: MessageHandle,
    ) -> Result<(), DeskError> {
        self.store.set_posted_message(number, handle).await
    }

    /// Flip the priority flag and return its new value.
    pub async fn toggle_priority(&self, number: TicketNumber) -> Result<bool, DeskError> {
        let ticket = self
            .get_pending(number)
            .await?
            .ok_or_else(|| DeskError::ticket_not_found(number))?;
        let priority = !ticket.priority;
        if !self.store.set_priority(number, priority).await? {
            return Err(DeskError::ticket_not_found(number));
        }
        info!(ticket = number.0, priority, "ticket priority changed");
        Ok(priority)
    }
}

pub(crate) fn paginate(all: Vec<PendingTicket>, index: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total = all.len();
    let count = total.div_ceil(page_size).max(1);
    let index = index.min(count - 1);
    let tickets = all
        .into_iter()
        .skip(index * page_size)
        .take(page_size)
        .collect();
    Page {
        tickets,
        index,
        count,
        total,
    }
}
