// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket lifecycle and admin review engine for ticketdesk.
//!
//! The [`Desk`] is the central coordinator that:
//! - Filters duplicate deliveries
//! - Runs admission for request messages and opens tickets
//! - Executes slash commands
//! - Drives per-admin review sessions from menu callbacks
//! - Sweeps idle sessions and old idempotency markers

pub mod admission;
pub mod commands;
pub mod idempotency;
mod menu;
pub mod notifier;
pub mod quota;
pub mod registry;
pub mod retry;
pub mod review;
pub mod sessions;
pub mod shutdown;
pub mod texts;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ticketdesk_config::model::DeskConfig;
use ticketdesk_core::types::{Choice, InboundEvent, InboundUpdate, OutboundMessage};
use ticketdesk_core::{ChannelAdapter, Clock, DeskError, StorageAdapter};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionController, Decision};
use crate::commands::Command;
use crate::idempotency::IdempotencyFilter;
use crate::notifier::Notifier;
use crate::quota::QuotaTracker;
use crate::registry::TicketRegistry;
use crate::review::ReviewEvent;
use crate::sessions::SessionStore;

/// How long in-flight handlers get to finish after shutdown is requested.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// What [`Desk::handle`] did with an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The event id was seen before; nothing ran.
    Duplicate,
    Admission(Decision),
    Command,
    Review,
    /// An admin-only action from a non-admin.
    Denied,
    Ignored,
}

/// Counts from one [`Desk::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: usize,
    pub markers: usize,
}

/// The request desk: admission, commands and admin review over one store.
pub struct Desk {
    clock: Arc<dyn Clock>,
    store: Arc<dyn StorageAdapter>,
    channel: Arc<dyn ChannelAdapter>,
    quota: Arc<QuotaTracker>,
    registry: Arc<TicketRegistry>,
    admission: AdmissionController,
    sessions: SessionStore,
    idempotency: IdempotencyFilter,
    notifier: Notifier,
    admin_chat_id: i64,
    admin_thread_id: Option<i32>,
    page_size: usize,
    request_tag: String,
    sweep_interval: Duration,
}

impl Desk {
    /// Wires the engine components from configuration.
    ///
    /// Fails with [`DeskError::Config`] when no admin chat is configured.
    pub fn new(
        config: &DeskConfig,
        store: Arc<dyn StorageAdapter>,
        channel: Arc<dyn ChannelAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DeskError> {
        let admin_chat_id = config
            .bot
            .admin_chat_id
            .ok_or_else(|| DeskError::Config("bot.admin_chat_id is required".into()))?;

        let quota = Arc::new(QuotaTracker::new(
            store.clone(),
            clock.clone(),
            config.quota.daily_limit,
            chrono::Duration::hours(i64::from(config.quota.window_hours)),
        ));
        let registry = Arc::new(TicketRegistry::new(store.clone(), clock.clone()));
        let admins: HashSet<i64> = config.bot.admins.iter().copied().collect();
        let admission = AdmissionController::new(
            store.clone(),
            quota.clone(),
            registry.clone(),
            clock.clone(),
            &config.groups,
            admins,
            &config.admission,
        );
        let sessions = SessionStore::new(
            secs(config.review.session_idle_secs),
            clock.clone(),
        );
        let idempotency =
            IdempotencyFilter::new(secs(config.idempotency.horizon_secs), clock.clone());

        info!(
            name = config.bot.name.as_str(),
            admin_chat_id,
            groups = config.groups.len(),
            "desk initialized"
        );

        Ok(Self {
            clock,
            store,
            notifier: Notifier::new(channel.clone()),
            channel,
            quota,
            registry,
            admission,
            sessions,
            idempotency,
            admin_chat_id,
            admin_thread_id: config.bot.admin_thread_id,
            page_size: config.review.page_size,
            request_tag: config.admission.request_tag.clone(),
            sweep_interval: Duration::from_secs(config.review.sweep_interval_secs.max(1)),
        })
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn registry(&self) -> &TicketRegistry {
        &self.registry
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<dyn StorageAdapter> {
        &self.store
    }

    /// Process one inbound update end to end.
    pub async fn handle(&self, update: InboundUpdate) -> Result<Handled, DeskError> {
        if !self.idempotency.admit(update.event_id()) {
            debug!(event_id = update.event_id(), "duplicate delivery dropped");
            return Ok(Handled::Duplicate);
        }
        match update {
            InboundUpdate::Message(event) => self.handle_message(&event).await,
            InboundUpdate::Callback(cb) => self.review_callback(&cb).await,
        }
    }

    async fn handle_message(&self, event: &InboundEvent) -> Result<Handled, DeskError> {
        let admin = self.admission.is_admin(event.user_id);
        let command = Command::parse(&event.text);

        if command.is_none() && event.is_admin_context && admin {
            let key = (event.user_id, event.source_group_id);
            if let Some(handled) = self.review_text(key, &event.text).await? {
                return Ok(handled);
            }
        }

        if let Some(command) = command {
            let reply = match command {
                Ok(command) => match self.run_command(command, event).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        if e.is_transient() {
                            error!(user_id = event.user_id, error = %e, "command failed");
                        }
                        Some(texts::error_reply(&e))
                    }
                },
                Err(e) => Some(texts::error_reply(&e)),
            };
            if let Some(reply) = reply {
                self.reply(event, reply).await;
            }
            return Ok(Handled::Command);
        }

        if event.is_admin_context {
            return Ok(Handled::Ignored);
        }

        let decision = match self.admission.evaluate(event).await {
            Ok(decision) => decision,
            Err(e) => {
                self.reply(event, texts::try_again()).await;
                return Err(e);
            }
        };
        self.announce(event, &decision).await;
        Ok(Handled::Admission(decision))
    }

    /// Relay an admission decision to the requester and, when needed, the admins.
    async fn announce(&self, event: &InboundEvent, decision: &Decision) {
        match decision {
            Decision::Ignored => {}
            Decision::Misrouted { .. } => {
                self.reply(event, texts::misrouted(&self.request_tag)).await;
            }
            Decision::Suspended => self.reply(event, texts::suspended()).await,
            Decision::QuotaExceeded { record, resets_at } => {
                let text = texts::quota_exceeded(
                    self.clock.as_ref(),
                    record,
                    self.quota.ceiling(),
                    *resets_at,
                );
                self.reply(event, text).await;
            }
            Decision::Malformed {
                attempts,
                escalated,
            } => {
                self.reply(
                    event,
                    texts::malformed(&self.request_tag, *attempts, *escalated),
                )
                .await;
                if *escalated {
                    let title = event.group_title.as_deref().unwrap_or_default();
                    self.post_admin(texts::malformed_report(
                        event.user_id,
                        &event.display_name,
                        title,
                        *attempts,
                    ))
                    .await;
                }
            }
            Decision::Admitted { ticket, quota } => {
                let select = review::encode(&ReviewEvent::Select(ticket.number));
                let post = OutboundMessage::text(self.admin_chat_id, texts::queue_post(ticket))
                    .in_thread(self.admin_thread_id)
                    .with_choices(vec![vec![Choice::new("Review", select)]]);
                if let Some(handle) = self.notifier.post(post).await
                    && let Err(e) = self.registry.set_posted_message(ticket.number, handle).await
                {
                    warn!(ticket = ticket.number.0, error = %e, "failed to record queue post");
                }
                self.reply(
                    event,
                    texts::admitted(ticket, quota, self.quota.ceiling()),
                )
                .await;
            }
        }
    }

    async fn reply(&self, event: &InboundEvent, text: String) {
        let msg = OutboundMessage::text(event.source_group_id, text)
            .in_thread(event.thread_id)
            .replying_to(event.message_id);
        self.notifier.post(msg).await;
    }

    async fn post_admin(&self, text: String) {
        let msg = OutboundMessage::text(self.admin_chat_id, text).in_thread(self.admin_thread_id);
        self.notifier.post(msg).await;
    }

    /// Drop idle review sessions and expired idempotency markers.
    pub async fn sweep(&self) -> SweepReport {
        let expired = self.sessions.sweep();
        for (_, session) in &expired {
            if let Some(menu) = session.menu {
                self.notifier.delete(menu).await;
            }
        }
        let markers = self.idempotency.evict_expired();
        let report = SweepReport {
            sessions: expired.len(),
            markers,
        };
        if report != SweepReport::default() {
            debug!(
                sessions = report.sessions,
                markers = report.markers,
                "sweep completed"
            );
        }
        report
    }

    /// Receives updates until `cancel` fires, handling each on its own task.
    ///
    /// In-flight handlers are drained before returning.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), DeskError> {
        info!("desk running");
        let tracker = TaskTracker::new();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                update = self.channel.receive() => {
                    match update {
                        Ok(update) => {
                            let desk = Arc::clone(&self);
                            tracker.spawn(async move {
                                if let Err(e) = desk.handle(update).await {
                                    error!(error = %e, "failed to handle update");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "channel receive error");
                            if matches!(e, DeskError::Channel { .. }) && e.to_string().contains("closed") {
                                break;
                            }
                        }
                    }
                }
                _ = sweep.tick() => {
                    self.sweep().await;
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping desk");
                    break;
                }
            }
        }

        shutdown::drain(&tracker, DRAIN_TIMEOUT).await;
        info!("desk stopped");
        Ok(())
    }
}

fn secs(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
