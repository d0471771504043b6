// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persistent record store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::DeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    GroupActivation, HistoryRecord, MessageHandle, NewTicket, PendingTicket, QuotaRecord,
    Resolution, TicketNumber,
};

/// A read-modify-write step applied to one user's quota record.
///
/// Receives the stored record (if any) and returns the record to keep. A
/// returned record that differs from the input is persisted; `None` leaves
/// the store untouched.
pub type QuotaUpdate = Box<dyn FnOnce(Option<QuotaRecord>) -> Option<QuotaRecord> + Send>;

/// Durable storage for quota, pending tickets, history and group activation.
///
/// Every method is atomic on its own: implementations must guarantee that a
/// quota update, a ticket number allocation, and a resolution are each
/// observed as a single step by concurrent callers.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), DeskError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), DeskError>;

    // --- Quota ---

    /// Applies `update` to the user's record as one atomic step.
    async fn update_quota(
        &self,
        user_id: i64,
        update: QuotaUpdate,
    ) -> Result<Option<QuotaRecord>, DeskError>;

    // --- Tickets ---

    /// Allocates a number above every number ever used.
    async fn next_ticket_number(&self) -> Result<TicketNumber, DeskError>;

    /// Inserts a pending ticket under a caller-chosen number.
    ///
    /// Fails with [`DeskError::DuplicateTicket`] if the number is in use by a
    /// pending or history record.
    async fn insert_pending(&self, ticket: &PendingTicket) -> Result<(), DeskError>;

    /// Allocates a number and inserts the pending ticket in one transaction.
    async fn open_ticket(&self, new: NewTicket) -> Result<PendingTicket, DeskError>;

    async fn get_pending(&self, number: TicketNumber) -> Result<Option<PendingTicket>, DeskError>;

    /// All pending tickets, priority first, then by ascending number.
    async fn list_pending(&self) -> Result<Vec<PendingTicket>, DeskError>;

    async fn set_posted_message(
        &self,
        number: TicketNumber,
        handle: MessageHandle,
    ) -> Result<(), DeskError>;

    /// Sets the priority flag. Returns `false` if the ticket is not pending.
    async fn set_priority(&self, number: TicketNumber, priority: bool) -> Result<bool, DeskError>;

    /// Removes a pending ticket. Returns `false` if it was already absent.
    async fn delete_pending(&self, number: TicketNumber) -> Result<bool, DeskError>;

    /// Writes the history record and deletes the pending ticket atomically.
    ///
    /// Fails with [`DeskError::AlreadyResolved`] if history already exists and
    /// with [`DeskError::NotFound`] if the ticket was never opened.
    async fn resolve_ticket(
        &self,
        number: TicketNumber,
        resolution: Resolution,
    ) -> Result<HistoryRecord, DeskError>;

    async fn get_history(&self, number: TicketNumber) -> Result<Option<HistoryRecord>, DeskError>;

    /// Most recently resolved tickets first.
    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, DeskError>;

    // --- Groups ---

    async fn get_group(&self, group_id: i64) -> Result<Option<GroupActivation>, DeskError>;

    /// Creates an active record for an unseen group; returns the stored record.
    async fn register_group(&self, group_id: i64, title: &str)
    -> Result<GroupActivation, DeskError>;

    /// Sets the activation flag, creating the record if needed.
    async fn set_group_active(
        &self,
        group_id: i64,
        active: bool,
    ) -> Result<GroupActivation, DeskError>;

    async fn list_groups(&self) -> Result<Vec<GroupActivation>, DeskError>;

    // --- Malformed request tracking ---

    /// Records a malformed attempt and returns the user's attempts within `window`.
    async fn record_malformed(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<u32, DeskError>;
}
