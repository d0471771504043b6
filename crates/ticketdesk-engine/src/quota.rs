// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user daily allowance.
//!
//! Every read-modify-write goes through [`StorageAdapter::update_quota`], which
//! applies the closure atomically per user. The rolling reset is evaluated
//! lazily inside the same step, so a reset and an increment can never
//! interleave with another request from the same user.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ticketdesk_core::{Clock, DeskError, QuotaRecord, StorageAdapter};
use tracing::debug;

/// Result of an admission-time quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaCheck {
    /// The request was counted.
    Consumed(QuotaRecord),
    /// The user is at the ceiling; nothing was counted.
    Exceeded(QuotaRecord),
}

pub struct QuotaTracker {
    store: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    ceiling: u32,
    window: Duration,
}

impl QuotaTracker {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        ceiling: u32,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ceiling,
            window,
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// When the user's current window ends.
    pub fn resets_at(&self, record: &QuotaRecord) -> DateTime<Utc> {
        record.resets_at(self.window)
    }

    /// Current record, with any due reset applied and persisted.
    ///
    /// Users without a record get a zero record that is not stored.
    pub async fn get(&self, user_id: i64) -> Result<QuotaRecord, DeskError> {
        let now = self.clock.now();
        let window = self.window;
        let record = self
            .store
            .update_quota(
                user_id,
                Box::new(move |current| {
                    current.map(|mut record| {
                        record.reset_if_due(now, window);
                        record
                    })
                }),
            )
            .await?;
        Ok(record.unwrap_or_else(|| QuotaRecord::zero(user_id, now)))
    }

    /// Count one admitted request, regardless of the ceiling.
    pub async fn increment(
        &self,
        user_id: i64,
        group_id: Option<i64>,
        display_name: &str,
    ) -> Result<QuotaRecord, DeskError> {
        self.adjust(user_id, 1, group_id, display_name).await
    }

    /// Add `delta` to the count, clamping at zero.
    pub async fn adjust(
        &self,
        user_id: i64,
        delta: i64,
        group_id: Option<i64>,
        display_name: &str,
    ) -> Result<QuotaRecord, DeskError> {
        let now = self.clock.now();
        let window = self.window;
        let name = display_name.to_string();
        let record = self
            .store
            .update_quota(
                user_id,
                Box::new(move |current| {
                    let mut record = current.unwrap_or_else(|| QuotaRecord::zero(user_id, now));
                    record.reset_if_due(now, window);
                    record.count = clamp_count(i64::from(record.count).saturating_add(delta));
                    touch(&mut record, group_id, name);
                    Some(record)
                }),
            )
            .await?;
        let record = record.ok_or_else(|| DeskError::Internal("quota update dropped".into()))?;
        debug!(user_id, delta, count = record.count, "quota adjusted");
        Ok(record)
    }

    /// Count a request only if the user is below the ceiling.
    ///
    /// `exempt` users are always counted, so their usage stays visible.
    pub async fn try_consume(
        &self,
        user_id: i64,
        group_id: Option<i64>,
        display_name: &str,
        exempt: bool,
    ) -> Result<QuotaCheck, DeskError> {
        let now = self.clock.now();
        let window = self.window;
        let ceiling = self.ceiling;
        let name = display_name.to_string();
        let exceeded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exceeded);

        let record = self
            .store
            .update_quota(
                user_id,
                Box::new(move |current| {
                    let mut record = current.unwrap_or_else(|| QuotaRecord::zero(user_id, now));
                    record.reset_if_due(now, window);
                    if !exempt && record.count >= ceiling {
                        flag.store(true, Ordering::SeqCst);
                        return Some(record);
                    }
                    record.count = record.count.saturating_add(1);
                    touch(&mut record, group_id, name);
                    Some(record)
                }),
            )
            .await?
            .ok_or_else(|| DeskError::Internal("quota update dropped".into()))?;

        if exceeded.load(Ordering::SeqCst) {
            Ok(QuotaCheck::Exceeded(record))
        } else {
            Ok(QuotaCheck::Consumed(record))
        }
    }

    /// Give back one request, e.g. when ticket creation failed after counting.
    pub async fn refund(&self, user_id: i64) -> Result<QuotaRecord, DeskError> {
        self.adjust(user_id, -1, None, "").await
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn touch(record: &mut QuotaRecord, group_id: Option<i64>, display_name: String) {
    if group_id.is_some() {
        record.group_id = group_id;
    }
    if !display_name.is_empty() {
        record.display_name = display_name;
    }
}
