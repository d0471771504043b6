// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for ticketdesk integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChannel`] - Mock messaging channel with update injection and capture
//! - [`ManualClock`] - Settable time source
//! - [`MemoryStorage`] - In-memory store with injectable failures
//! - [`TestHarness`] - A full desk over a temporary SQLite database

pub mod clock;
pub mod harness;
pub mod memory;
pub mod mock_channel;

pub use clock::ManualClock;
pub use harness::TestHarness;
pub use memory::MemoryStorage;
pub use mock_channel::MockChannel;
