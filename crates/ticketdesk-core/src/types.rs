// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and the engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Unique, monotonically increasing ticket identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketNumber(pub i64);

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for TicketNumber {
    type Err = std::num::ParseIntError;

    /// Accepts both `42` and `#42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits.parse::<i64>().map(TicketNumber)
    }
}

/// Reference to a message posted through a channel adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
}

/// Terminal outcome of a ticket.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Accepted,
    Rejected,
    Deleted,
    QuotaExceeded,
}

impl Disposition {
    /// Whether the requester is told about this outcome.
    pub fn notifies_requester(self) -> bool {
        !matches!(self, Disposition::Deleted)
    }
}

/// Per-user daily allowance bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub user_id: i64,
    /// Requests admitted since `last_reset`.
    pub count: u32,
    pub last_reset: DateTime<Utc>,
    pub group_id: Option<i64>,
    pub display_name: String,
}

impl QuotaRecord {
    /// The conceptual record of a user who has never made a request.
    pub fn zero(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            count: 0,
            last_reset: now,
            group_id: None,
            display_name: String::new(),
        }
    }

    /// Resets the counter if a full window has elapsed since the last reset.
    ///
    /// Returns `true` when a reset happened.
    pub fn reset_if_due(&mut self, now: DateTime<Utc>, window: Duration) -> bool {
        if now - self.last_reset >= window {
            self.count = 0;
            self.last_reset = now;
            true
        } else {
            false
        }
    }

    /// When the current window ends.
    pub fn resets_at(&self, window: Duration) -> DateTime<Utc> {
        self.last_reset + window
    }

    /// Requests left before hitting `ceiling`.
    pub fn remaining(&self, ceiling: u32) -> u32 {
        ceiling.saturating_sub(self.count)
    }
}

/// Fields supplied by admission when opening a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub source_group_id: i64,
    pub source_group_title: String,
    pub thread_id: Option<i32>,
    pub requester_id: i64,
    pub requester_display_name: String,
    pub message_text: String,
    /// Id of the requester's original message, for threaded replies.
    pub request_message_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub priority: bool,
}

/// An open request awaiting admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTicket {
    pub number: TicketNumber,
    pub source_group_id: i64,
    pub source_group_title: String,
    pub thread_id: Option<i32>,
    pub requester_id: i64,
    pub requester_display_name: String,
    pub message_text: String,
    pub request_message_id: Option<i32>,
    /// The queue post shown to admins, once it has been sent.
    pub posted_message: Option<MessageHandle>,
    pub created_at: DateTime<Utc>,
    pub priority: bool,
}

impl PendingTicket {
    pub fn from_new(number: TicketNumber, new: NewTicket) -> Self {
        Self {
            number,
            source_group_id: new.source_group_id,
            source_group_title: new.source_group_title,
            thread_id: new.thread_id,
            requester_id: new.requester_id,
            requester_display_name: new.requester_display_name,
            message_text: new.message_text,
            request_message_id: new.request_message_id,
            posted_message: None,
            created_at: new.created_at,
            priority: new.priority,
        }
    }
}

/// Input to a resolution: who decided what, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub disposition: Disposition,
    pub admin_id: i64,
    pub url: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Immutable record of a resolved ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub number: TicketNumber,
    pub source_group_id: i64,
    pub source_group_title: String,
    pub thread_id: Option<i32>,
    pub requester_id: i64,
    pub requester_display_name: String,
    pub message_text: String,
    pub request_message_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub priority: bool,
    pub disposition: Disposition,
    pub resolved_at: DateTime<Utc>,
    pub resolving_admin: i64,
    pub attached_url: Option<String>,
}

impl HistoryRecord {
    /// Builds the successor record of `pending`. The queue post handle is dropped.
    pub fn from_pending(pending: PendingTicket, resolution: Resolution) -> Self {
        Self {
            number: pending.number,
            source_group_id: pending.source_group_id,
            source_group_title: pending.source_group_title,
            thread_id: pending.thread_id,
            requester_id: pending.requester_id,
            requester_display_name: pending.requester_display_name,
            message_text: pending.message_text,
            request_message_id: pending.request_message_id,
            created_at: pending.created_at,
            priority: pending.priority,
            disposition: resolution.disposition,
            resolved_at: resolution.resolved_at,
            resolving_admin: resolution.admin_id,
            attached_url: resolution.url,
        }
    }
}

/// Whether a group's members may currently submit requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupActivation {
    pub group_id: i64,
    pub title: String,
    pub active: bool,
}

/// A text message delivered by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Channel-unique identifier used for duplicate suppression.
    pub event_id: String,
    pub source_group_id: i64,
    pub group_title: Option<String>,
    pub thread_id: Option<i32>,
    pub message_id: Option<i32>,
    pub user_id: i64,
    pub display_name: String,
    pub text: String,
    /// True when the message arrived in the admin chat.
    pub is_admin_context: bool,
}

/// A button press on a previously sent menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub event_id: String,
    pub user_id: i64,
    pub chat_id: i64,
    pub thread_id: Option<i32>,
    /// The menu message carrying the pressed button.
    pub message: Option<MessageHandle>,
    pub data: String,
}

/// Anything a channel hands to the desk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundUpdate {
    Message(InboundEvent),
    Callback(CallbackEvent),
}

impl InboundUpdate {
    pub fn event_id(&self) -> &str {
        match self {
            InboundUpdate::Message(m) => &m.event_id,
            InboundUpdate::Callback(c) => &c.event_id,
        }
    }
}

/// How an outbound text should be interpreted by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    Html,
}

/// One labeled choice presented with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    /// Opaque payload returned in [`CallbackEvent::data`] when picked.
    pub data: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// An outbound message to be posted via a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub thread_id: Option<i32>,
    pub text: String,
    pub format: TextFormat,
    /// Rows of choices; empty for a plain message.
    pub choices: Vec<Vec<Choice>>,
    pub reply_to: Option<i32>,
}

impl OutboundMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            thread_id: None,
            text: text.into(),
            format: TextFormat::Plain,
            choices: Vec::new(),
            reply_to: None,
        }
    }

    pub fn in_thread(mut self, thread_id: Option<i32>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn replying_to(mut self, message_id: Option<i32>) -> Self {
        self.reply_to = message_id;
        self
    }

    pub fn with_choices(mut self, choices: Vec<Vec<Choice>>) -> Self {
        self.choices = choices;
        self
    }

    pub fn html(mut self) -> Self {
        self.format = TextFormat::Html;
        self
    }
}
