// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `StorageAdapter` with the same contract as the SQLite store.
//!
//! All state sits behind one mutex, so each trait method is trivially atomic.
//! Individual operations can be told to fail with a storage error to exercise
//! "try again" paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ticketdesk_core::traits::QuotaUpdate;
use ticketdesk_core::types::{
    GroupActivation, HistoryRecord, MessageHandle, NewTicket, PendingTicket, Resolution,
};
use ticketdesk_core::{
    AdapterType, DeskError, HealthStatus, PluginAdapter, QuotaRecord, StorageAdapter,
    TicketNumber,
};

#[derive(Default)]
struct State {
    quota: HashMap<i64, QuotaRecord>,
    pending: BTreeMap<TicketNumber, PendingTicket>,
    history: BTreeMap<TicketNumber, HistoryRecord>,
    groups: BTreeMap<i64, GroupActivation>,
    malformed: HashMap<i64, Vec<DateTime<Utc>>>,
    last_number: i64,
}

impl State {
    fn allocate(&mut self) -> TicketNumber {
        let used = self
            .pending
            .keys()
            .chain(self.history.keys())
            .map(|n| n.0)
            .max()
            .unwrap_or(0);
        self.last_number = self.last_number.max(used) + 1;
        TicketNumber(self.last_number)
    }

    fn insert(&mut self, ticket: PendingTicket) -> Result<(), DeskError> {
        let number = ticket.number;
        if self.pending.contains_key(&number) || self.history.contains_key(&number) {
            return Err(DeskError::DuplicateTicket(number));
        }
        self.last_number = self.last_number.max(number.0);
        self.pending.insert(number, ticket);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
    failing: Mutex<HashSet<&'static str>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named trait method (e.g. `"open_ticket"`) fail until cleared.
    pub fn fail_on(&self, op: &'static str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op);
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn state(&self, op: &'static str) -> Result<MutexGuard<'_, State>, DeskError> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(op);
        if failing {
            return Err(DeskError::Storage {
                source: format!("injected {op} failure").into(),
            });
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskError> {
        Ok(match self.state("health_check") {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), DeskError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), DeskError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DeskError> {
        Ok(())
    }

    async fn update_quota(
        &self,
        user_id: i64,
        update: QuotaUpdate,
    ) -> Result<Option<QuotaRecord>, DeskError> {
        let mut state = self.state("update_quota")?;
        let current = state.quota.get(&user_id).cloned();
        let next = update(current.clone());
        if let Some(record) = &next
            && next != current
        {
            state.quota.insert(user_id, record.clone());
        }
        Ok(next)
    }

    async fn next_ticket_number(&self) -> Result<TicketNumber, DeskError> {
        Ok(self.state("next_ticket_number")?.allocate())
    }

    async fn insert_pending(&self, ticket: &PendingTicket) -> Result<(), DeskError> {
        self.state("insert_pending")?.insert(ticket.clone())
    }

    async fn open_ticket(&self, new: NewTicket) -> Result<PendingTicket, DeskError> {
        let mut state = self.state("open_ticket")?;
        let number = state.allocate();
        let ticket = PendingTicket::from_new(number, new);
        state.insert(ticket.clone())?;
        Ok(ticket)
    }

    async fn get_pending(&self, number: TicketNumber) -> Result<Option<PendingTicket>, DeskError> {
        Ok(self.state("get_pending")?.pending.get(&number).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<PendingTicket>, DeskError> {
        let mut all: Vec<PendingTicket> =
            self.state("list_pending")?.pending.values().cloned().collect();
        all.sort_by_key(|t| (!t.priority, t.number));
        Ok(all)
    }

    async fn set_posted_message(
        &self,
        number: TicketNumber,
        handle: MessageHandle,
    ) -> Result<(), DeskError> {
        let mut state = self.state("set_posted_message")?;
        let ticket = state
            .pending
            .get_mut(&number)
            .ok_or_else(|| DeskError::ticket_not_found(number))?;
        ticket.posted_message = Some(handle);
        Ok(())
    }

    async fn set_priority(&self, number: TicketNumber, priority: bool) -> Result<bool, DeskError> {
        let mut state = self.state("set_priority")?;
        Ok(match state.pending.get_mut(&number) {
            Some(ticket) => {
                ticket.priority = priority;
                true
            }
            None => false,
        })
    }

    async fn delete_pending(&self, number: TicketNumber) -> Result<bool, DeskError> {
        Ok(self
            .state("delete_pending")?
            .pending
            .remove(&number)
            .is_some())
    }

    async fn resolve_ticket(
        &self,
        number: TicketNumber,
        resolution: Resolution,
    ) -> Result<HistoryRecord, DeskError> {
        let mut state = self.state("resolve_ticket")?;
        if state.history.contains_key(&number) {
            return Err(DeskError::AlreadyResolved(number));
        }
        let pending = state
            .pending
            .remove(&number)
            .ok_or_else(|| DeskError::ticket_not_found(number))?;
        let record = HistoryRecord::from_pending(pending, resolution);
        state.history.insert(number, record.clone());
        Ok(record)
    }

    async fn get_history(&self, number: TicketNumber) -> Result<Option<HistoryRecord>, DeskError> {
        Ok(self.state("get_history")?.history.get(&number).cloned())
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, DeskError> {
        let mut all: Vec<HistoryRecord> =
            self.state("recent_history")?.history.values().cloned().collect();
        all.sort_by(|a, b| {
            b.resolved_at
                .cmp(&a.resolved_at)
                .then_with(|| b.number.cmp(&a.number))
        });
        all.truncate(limit);
        Ok(all)
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<GroupActivation>, DeskError> {
        Ok(self.state("get_group")?.groups.get(&group_id).cloned())
    }

    async fn register_group(
        &self,
        group_id: i64,
        title: &str,
    ) -> Result<GroupActivation, DeskError> {
        let mut state = self.state("register_group")?;
        let record = state
            .groups
            .entry(group_id)
            .or_insert_with(|| GroupActivation {
                group_id,
                title: String::new(),
                active: true,
            });
        if !title.is_empty() {
            record.title = title.to_string();
        }
        Ok(record.clone())
    }

    async fn set_group_active(
        &self,
        group_id: i64,
        active: bool,
    ) -> Result<GroupActivation, DeskError> {
        let mut state = self.state("set_group_active")?;
        let record = state
            .groups
            .entry(group_id)
            .or_insert_with(|| GroupActivation {
                group_id,
                title: String::new(),
                active,
            });
        record.active = active;
        Ok(record.clone())
    }

    async fn list_groups(&self) -> Result<Vec<GroupActivation>, DeskError> {
        Ok(self.state("list_groups")?.groups.values().cloned().collect())
    }

    async fn record_malformed(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<u32, DeskError> {
        let mut state = self.state("record_malformed")?;
        let cutoff = at - window;
        state.malformed.retain(|_, attempts| {
            attempts.retain(|t| *t > cutoff);
            !attempts.is_empty()
        });
        let attempts = state.malformed.entry(user_id).or_default();
        attempts.push(at);
        Ok(u32::try_from(attempts.len()).unwrap_or(u32::MAX))
    }
}
