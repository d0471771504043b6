// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for ticketdesk.
//!
//! This crate provides the trait definitions, error types, and domain types
//! used throughout the workspace. Channel and storage adapters implement the
//! traits defined here; the engine consumes them.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::DeskError;
pub use types::{
    AdapterType, Disposition, HealthStatus, MessageHandle, QuotaRecord, TicketNumber,
};

pub use traits::{ChannelAdapter, Clock, PluginAdapter, StorageAdapter, SystemClock};
