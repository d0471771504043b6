// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control for inbound requests.
//!
//! Rules are evaluated in a fixed order and the first match wins: channel
//! binding, group activation, quota. Admission outcomes are [`Decision`]
//! values; only store faults surface as errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ticketdesk_config::model::{AdmissionConfig, GroupBinding};
use ticketdesk_core::types::{InboundEvent, NewTicket, PendingTicket};
use ticketdesk_core::{Clock, DeskError, QuotaRecord, StorageAdapter};
use tracing::{error, info, warn};

use crate::quota::{QuotaCheck, QuotaTracker};
use crate::registry::TicketRegistry;

/// Outcome of evaluating one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not a request; nothing to do.
    Ignored,
    /// A request posted outside the group's request thread.
    Misrouted { expected_thread: Option<i32> },
    /// The group is deactivated.
    Suspended,
    /// The requester is at the ceiling for the current window.
    QuotaExceeded {
        record: QuotaRecord,
        resets_at: DateTime<Utc>,
    },
    /// Looks like a request but does not use the request form.
    Malformed { attempts: u32, escalated: bool },
    Admitted {
        ticket: PendingTicket,
        quota: QuotaRecord,
    },
}

impl Decision {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Decision::Ignored => "ignored",
            Decision::Misrouted { .. } => "misrouted",
            Decision::Suspended => "suspended",
            Decision::QuotaExceeded { .. } => "quota_exceeded",
            Decision::Malformed { .. } => "malformed",
            Decision::Admitted { .. } => "admitted",
        }
    }
}

/// How a message relates to the request form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape<'a> {
    /// Starts with the request tag; carries the text after it.
    Request(&'a str),
    /// Mentions request keywords without the tag.
    Resembles,
    Other,
}

pub struct AdmissionController {
    store: Arc<dyn StorageAdapter>,
    quota: Arc<QuotaTracker>,
    registry: Arc<TicketRegistry>,
    clock: Arc<dyn Clock>,
    bindings: HashMap<i64, GroupBinding>,
    admins: HashSet<i64>,
    request_tag: String,
    keywords: Vec<String>,
    malformed_window: Duration,
    escalation_threshold: u32,
    /// Soft copy of the activation flags; the store is authoritative.
    activation: DashMap<i64, bool>,
}

impl AdmissionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        quota: Arc<QuotaTracker>,
        registry: Arc<TicketRegistry>,
        clock: Arc<dyn Clock>,
        bindings: &[GroupBinding],
        admins: HashSet<i64>,
        config: &AdmissionConfig,
    ) -> Self {
        Self {
            store,
            quota,
            registry,
            clock,
            bindings: bindings.iter().map(|b| (b.group_id, b.clone())).collect(),
            admins,
            request_tag: config.request_tag.to_lowercase(),
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            malformed_window: Duration::hours(i64::from(config.malformed_window_hours)),
            escalation_threshold: config.malformed_escalation_threshold,
            activation: DashMap::new(),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn binding(&self, group_id: i64) -> Option<&GroupBinding> {
        self.bindings.get(&group_id)
    }

    /// Classify `text` against the request tag and keywords.
    pub fn shape<'a>(&self, text: &'a str) -> Shape<'a> {
        let trimmed = text.trim();
        let tag_len = self.request_tag.len();
        let head = trimmed.get(..tag_len).map(str::to_lowercase);
        if head.as_deref() == Some(self.request_tag.as_str()) {
            let rest = &trimmed[tag_len..];
            // `#requests` is not the tag.
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Shape::Request(rest.trim());
            }
        }
        let lower = trimmed.to_lowercase();
        if self.keywords.iter().any(|k| lower.contains(k.as_str())) {
            Shape::Resembles
        } else {
            Shape::Other
        }
    }

    /// Whether `thread_id` in `group_id` is where requests belong.
    ///
    /// Groups without a binding, or bound without a thread, accept requests
    /// anywhere.
    pub fn in_request_channel(&self, group_id: i64, thread_id: Option<i32>) -> bool {
        match self.bindings.get(&group_id).and_then(|b| b.request_thread_id) {
            Some(expected) => thread_id == Some(expected),
            None => true,
        }
    }

    /// Activation flag, registering unseen groups as active.
    pub async fn is_active(&self, group_id: i64, title: Option<&str>) -> Result<bool, DeskError> {
        if let Some(active) = self.activation.get(&group_id).map(|entry| *entry) {
            return Ok(active);
        }
        let record = match self.store.get_group(group_id).await? {
            Some(record) => record,
            None => {
                let title = title
                    .map(str::to_string)
                    .or_else(|| self.bindings.get(&group_id).and_then(|b| b.title.clone()))
                    .unwrap_or_default();
                info!(group_id, title = %title, "registering new group");
                self.store.register_group(group_id, &title).await?
            }
        };
        self.activation.insert(group_id, record.active);
        Ok(record.active)
    }

    /// Persist an activation change and refresh the cache.
    ///
    /// Returns whether the group had been seen before.
    pub async fn set_active(&self, group_id: i64, active: bool) -> Result<bool, DeskError> {
        let known = self.store.get_group(group_id).await?.is_some();
        let record = self.store.set_group_active(group_id, active).await?;
        self.activation.insert(group_id, record.active);
        info!(group_id, active, known, "group activation changed");
        Ok(known)
    }

    /// Run the admission rules against one inbound message.
    pub async fn evaluate(&self, event: &InboundEvent) -> Result<Decision, DeskError> {
        let decision = self.decide(event).await;
        match &decision {
            Ok(d) => info!(
                user_id = event.user_id,
                group_id = event.source_group_id,
                decision = d.name(),
                "admission decision"
            ),
            Err(e) => error!(
                user_id = event.user_id,
                group_id = event.source_group_id,
                error = %e,
                "admission failed"
            ),
        }
        decision
    }

    async fn decide(&self, event: &InboundEvent) -> Result<Decision, DeskError> {
        let shape = self.shape(&event.text);
        if shape == Shape::Other {
            return Ok(Decision::Ignored);
        }

        let group_id = event.source_group_id;
        let in_channel = self.in_request_channel(group_id, event.thread_id);
        if !in_channel {
            return Ok(match shape {
                Shape::Request(_) => Decision::Misrouted {
                    expected_thread: self.bindings.get(&group_id).and_then(|b| b.request_thread_id),
                },
                _ => Decision::Ignored,
            });
        }

        let active = self.is_active(group_id, event.group_title.as_deref()).await?;
        let body = match shape {
            Shape::Request(body) if !body.is_empty() => body,
            _ if !active => {
                return Ok(match shape {
                    Shape::Request(_) => Decision::Suspended,
                    _ => Decision::Ignored,
                });
            }
            _ => return self.malformed(event).await,
        };
        if !active {
            return Ok(Decision::Suspended);
        }

        let exempt = self.is_admin(event.user_id);
        let quota = match self
            .quota
            .try_consume(event.user_id, Some(group_id), &event.display_name, exempt)
            .await?
        {
            QuotaCheck::Exceeded(record) => {
                let resets_at = self.quota.resets_at(&record);
                return Ok(Decision::QuotaExceeded { record, resets_at });
            }
            QuotaCheck::Consumed(record) => record,
        };

        let new = NewTicket {
            source_group_id: group_id,
            source_group_title: self.group_title(event),
            thread_id: event.thread_id,
            requester_id: event.user_id,
            requester_display_name: event.display_name.clone(),
            message_text: body.to_string(),
            request_message_id: event.message_id,
            created_at: self.clock.now(),
            priority: false,
        };
        match self.registry.open(new).await {
            Ok(ticket) => Ok(Decision::Admitted { ticket, quota }),
            Err(e) => {
                // The request was counted but no ticket exists; give it back.
                if let Err(refund) = self.quota.refund(event.user_id).await {
                    warn!(user_id = event.user_id, error = %refund, "quota refund failed");
                }
                Err(e)
            }
        }
    }

    async fn malformed(&self, event: &InboundEvent) -> Result<Decision, DeskError> {
        let attempts = self
            .store
            .record_malformed(event.user_id, self.clock.now(), self.malformed_window)
            .await?;
        Ok(Decision::Malformed {
            attempts,
            escalated: attempts > self.escalation_threshold,
        })
    }

    fn group_title(&self, event: &InboundEvent) -> String {
        event
            .group_title
            .clone()
            .or_else(|| {
                self.bindings
                    .get(&event.source_group_id)
                    .and_then(|b| b.title.clone())
            })
            .unwrap_or_else(|| event.source_group_id.to_string())
    }
}
