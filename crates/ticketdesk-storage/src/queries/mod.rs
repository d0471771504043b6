// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the persisted entities.

pub mod groups;
pub mod malformed;
pub mod quota;
pub mod tickets;
