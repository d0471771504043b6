// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every ticketdesk crate.

use thiserror::Error;

use crate::types::TicketNumber;

/// The primary error type used across adapter traits and engine operations.
///
/// Expected admission outcomes (quota exceeded, suspended group, misrouted
/// request) are not errors; they are returned as ordinary decision values.
#[derive(Debug, Error)]
pub enum DeskError {
    /// Configuration errors (missing token, invalid timezone, bad bindings).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed user input: bad ticket reference, invalid URL, non-numeric argument.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A ticket number was allocated twice.
    #[error("ticket {0} already exists")]
    DuplicateTicket(TicketNumber),

    /// The ticket already has a history record.
    #[error("ticket {0} was already handled")]
    AlreadyResolved(TicketNumber),

    /// Storage backend errors (connection, query failure, constraint violation).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (send, edit, delete failures).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeskError {
    /// Shorthand for a [`DeskError::NotFound`] on a ticket.
    pub fn ticket_not_found(number: TicketNumber) -> Self {
        DeskError::NotFound {
            entity: "ticket",
            key: number.to_string(),
        }
    }

    /// Whether the failure is an I/O fault that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeskError::Storage { .. } | DeskError::Channel { .. } | DeskError::Timeout { .. }
        )
    }
}
