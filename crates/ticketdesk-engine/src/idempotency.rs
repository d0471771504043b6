// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Suppression of re-delivered inbound events.
//!
//! Markers live only in memory: a restart forgets them. Entries older than the
//! configured horizon are evicted by [`IdempotencyFilter::evict_expired`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ticketdesk_core::Clock;

pub struct IdempotencyFilter {
    seen: DashMap<String, DateTime<Utc>>,
    horizon: Duration,
    clock: Arc<dyn Clock>,
}

impl IdempotencyFilter {
    pub fn new(horizon: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            seen: DashMap::new(),
            horizon,
            clock,
        }
    }

    /// Returns `true` the first time `event_id` is seen, `false` afterwards.
    pub fn admit(&self, event_id: &str) -> bool {
        match self.seen.entry(event_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(self.clock.now());
                true
            }
        }
    }

    /// Drops markers older than the horizon. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let cutoff = self.clock.now() - self.horizon;
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| *seen_at > cutoff);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
