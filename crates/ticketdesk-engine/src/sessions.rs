// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Review sessions keyed by admin and conversation.
//!
//! Sessions are UI bookkeeping only. Dropping one, by timeout or otherwise,
//! never touches ticket data. Map guards are released before returning, so no
//! caller can hold one across an await.
//!
//! At most one input per session is processed at a time. A caller takes a
//! [`Claim`] before reading the session and keeps it until the new state is
//! saved; an input arriving while the claim is held is dropped, not queued.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ticketdesk_core::{Clock, MessageHandle};

use crate::review::ReviewState;

/// `(admin_id, chat_id)`.
pub type SessionKey = (i64, i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSession {
    pub state: ReviewState,
    /// The menu message the session renders into.
    pub menu: Option<MessageHandle>,
    /// Thread the menu lives in, for follow-up posts.
    pub thread_id: Option<i32>,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Live(ReviewSession),
    /// Idle past the timeout; already removed.
    Expired(ReviewSession),
    Missing,
}

pub struct SessionStore {
    sessions: DashMap<SessionKey, ReviewSession>,
    busy: DashMap<SessionKey, ()>,
    idle: Duration,
    clock: Arc<dyn Clock>,
}

/// Exclusive right to advance one session. Released on drop.
#[derive(Debug)]
pub struct Claim<'a> {
    busy: &'a DashMap<SessionKey, ()>,
    key: SessionKey,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.busy.remove(&self.key);
    }
}

impl SessionStore {
    pub fn new(idle: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            busy: DashMap::new(),
            idle,
            clock,
        }
    }

    fn is_idle(&self, session: &ReviewSession, now: DateTime<Utc>) -> bool {
        now - session.last_active >= self.idle
    }

    /// Claim `key` for one input, or `None` while another input holds it.
    ///
    /// This is a flag, not a lock: nobody waits on it, so holding it across
    /// store and channel calls cannot stall other sessions or handlers.
    pub fn claim(&self, key: SessionKey) -> Option<Claim<'_>> {
        match self.busy.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Claim {
                    busy: &self.busy,
                    key,
                })
            }
        }
    }

    /// Snapshot of the session, expiring it on access if idle.
    pub fn lookup(&self, key: SessionKey) -> SessionLookup {
        let now = self.clock.now();
        match self.sessions.get(&key) {
            None => return SessionLookup::Missing,
            Some(entry) if !self.is_idle(&entry, now) => {
                return SessionLookup::Live(entry.value().clone());
            }
            Some(_) => {}
        }
        if let Some((_, session)) = self
            .sessions
            .remove_if(&key, |_, s| self.is_idle(s, now))
        {
            return SessionLookup::Expired(session);
        }
        // Refreshed concurrently between the two map accesses.
        self.sessions
            .get(&key)
            .map(|entry| SessionLookup::Live(entry.value().clone()))
            .unwrap_or(SessionLookup::Missing)
    }

    /// Store `state` for `key`, stamping it active now. Terminal states remove it.
    pub fn save(
        &self,
        key: SessionKey,
        state: ReviewState,
        menu: Option<MessageHandle>,
        thread_id: Option<i32>,
    ) {
        if state.is_terminal() {
            self.sessions.remove(&key);
            return;
        }
        self.sessions.insert(
            key,
            ReviewSession {
                state,
                menu,
                thread_id,
                last_active: self.clock.now(),
            },
        );
    }

    pub fn remove(&self, key: SessionKey) -> Option<ReviewSession> {
        self.sessions.remove(&key).map(|(_, session)| session)
    }

    /// Remove every idle session and return them, so their menus can be cleaned up.
    pub fn sweep(&self) -> Vec<(SessionKey, ReviewSession)> {
        let now = self.clock.now();
        let idle: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|entry| self.is_idle(entry.value(), now))
            .map(|entry| *entry.key())
            .collect();
        idle.into_iter()
            .filter_map(|key| self.sessions.remove_if(&key, |_, s| self.is_idle(s, now)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use ticketdesk_core::TicketNumber;
    use ticketdesk_test_utils::ManualClock;

    use super::*;

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2026, 4, 2, 10, 0, 0).unwrap(),
        ));
        (SessionStore::new(Duration::hours(1), clock.clone()), clock)
    }

    const KEY: SessionKey = (1, -900);

    #[test]
    fn live_sessions_are_returned() {
        let (store, clock) = store();
        store.save(KEY, ReviewState::List { page: 1 }, None, None);
        clock.advance(Duration::minutes(59));
        assert!(matches!(store.lookup(KEY), SessionLookup::Live(s) if s.state == ReviewState::List { page: 1 }));
        assert_eq!(store.lookup((2, -900)), SessionLookup::Missing);
    }

    #[test]
    fn idle_sessions_expire_on_access() {
        let (store, clock) = store();
        let state = ReviewState::AwaitUrl {
            ticket: TicketNumber(4),
            page: 0,
        };
        store.save(KEY, state.clone(), None, None);
        clock.advance(Duration::hours(1));
        assert!(matches!(store.lookup(KEY), SessionLookup::Expired(s) if s.state == state));
        assert_eq!(store.lookup(KEY), SessionLookup::Missing);
    }

    #[test]
    fn terminal_state_removes_session() {
        let (store, _) = store();
        store.save(KEY, ReviewState::List { page: 0 }, None, None);
        store.save(KEY, ReviewState::Terminal, None, None);
        assert!(store.is_empty());
    }

    #[test]
    fn claims_are_exclusive_per_session() {
        let (store, _) = store();
        let claim = store.claim(KEY).unwrap();
        assert!(store.claim(KEY).is_none());
        assert!(store.claim((2, -900)).is_some());
        drop(claim);
        assert!(store.claim(KEY).is_some());
    }

    #[test]
    fn sweep_returns_only_idle_sessions() {
        let (store, clock) = store();
        store.save(KEY, ReviewState::List { page: 0 }, None, None);
        clock.advance(Duration::minutes(40));
        store.save((2, -900), ReviewState::List { page: 0 }, None, None);
        clock.advance(Duration::minutes(30));

        let swept = store.sweep();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].0, KEY);
        assert_eq!(store.len(), 1);
    }
}
