// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash commands: parsing and execution.
//!
//! A command is a message whose first token starts with `/`, optionally
//! addressed as `/name@botname`. Unknown commands are not ours and are left
//! alone; known commands with bad arguments are validation errors.

use std::str::FromStr;

use strum::IntoStaticStr;
use ticketdesk_core::types::{InboundEvent, OutboundMessage};
use ticketdesk_core::{DeskError, Disposition, TicketNumber};
use tracing::{info, warn};

use crate::registry::Lookup;
use crate::{Desk, texts};

/// How many resolved tickets `/history` shows.
const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    Help,
    Quota,
    Cancel(TicketNumber),
    Review,
    /// One-based page number.
    Pending(usize),
    History,
    Search(TicketNumber),
    Priority(TicketNumber),
    Adjust { user_id: i64, delta: i64 },
    Activate(Vec<i64>),
    Deactivate(Vec<i64>),
}

impl Command {
    /// Parse `text` as a command.
    ///
    /// Returns `None` when the text is not a command this desk knows.
    pub fn parse(text: &str) -> Option<Result<Command, DeskError>> {
        let mut tokens = text.split_whitespace();
        let head = tokens.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<&str> = tokens.collect();

        let command = match name.as_str() {
            "help" | "start" => Ok(Command::Help),
            "quota" => Ok(Command::Quota),
            "review" => Ok(Command::Review),
            "history" | "show_history" => Ok(Command::History),
            "cancel" => ticket_arg(&args).map(Command::Cancel),
            "search" => ticket_arg(&args).map(Command::Search),
            "priority" => ticket_arg(&args).map(Command::Priority),
            "pending" | "list_pending" => page_arg(&args).map(Command::Pending),
            "adjust" => adjust_args(&args),
            "activate" => group_args(&args).map(Command::Activate),
            "deactivate" => group_args(&args).map(Command::Deactivate),
            _ => return None,
        };
        Some(command)
    }

    /// Commands only administrators may run.
    pub fn admin_only(&self) -> bool {
        !matches!(self, Command::Help | Command::Quota | Command::Cancel(_))
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }
}

fn ticket_arg(args: &[&str]) -> Result<TicketNumber, DeskError> {
    match args {
        [raw] => TicketNumber::from_str(raw)
            .map_err(|_| DeskError::Validation(format!("`{raw}` is not a ticket number"))),
        _ => Err(DeskError::Validation("expected one ticket number".into())),
    }
}

fn page_arg(args: &[&str]) -> Result<usize, DeskError> {
    match args {
        [] => Ok(1),
        [raw] => match raw.parse::<usize>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => Err(DeskError::Validation(format!("`{raw}` is not a page number"))),
        },
        _ => Err(DeskError::Validation("expected at most one page number".into())),
    }
}

fn adjust_args(args: &[&str]) -> Result<Command, DeskError> {
    let [user, delta] = args else {
        return Err(DeskError::Validation(
            "usage: /adjust <user id> <+n|-n>".into(),
        ));
    };
    let user_id = user
        .parse()
        .map_err(|_| DeskError::Validation(format!("`{user}` is not a user id")))?;
    let delta: i64 = delta
        .parse()
        .map_err(|_| DeskError::Validation(format!("`{delta}` is not a whole number")))?;
    if delta.unsigned_abs() > u64::from(u32::MAX) {
        return Err(DeskError::Validation(format!(
            "adjustment must be between -{max} and +{max}",
            max = u32::MAX
        )));
    }
    Ok(Command::Adjust { user_id, delta })
}

fn group_args(args: &[&str]) -> Result<Vec<i64>, DeskError> {
    if args.is_empty() {
        return Err(DeskError::Validation("expected at least one group id".into()));
    }
    args.iter()
        .map(|raw| {
            raw.trim_end_matches(',')
                .parse()
                .map_err(|_| DeskError::Validation(format!("`{raw}` is not a group id")))
        })
        .collect()
}

impl Desk {
    /// Run `command` for the sender of `event`; the reply is posted by the caller.
    pub(crate) async fn run_command(
        &self,
        command: Command,
        event: &InboundEvent,
    ) -> Result<Option<String>, DeskError> {
        let admin = self.admission.is_admin(event.user_id);
        if command.admin_only() && !admin {
            warn!(
                user_id = event.user_id,
                command = command.name(),
                "permission denied"
            );
            return Err(DeskError::PermissionDenied(format!(
                "/{} is for admins",
                command.name()
            )));
        }
        info!(
            user_id = event.user_id,
            command = command.name(),
            "running command"
        );

        match command {
            Command::Help => Ok(Some(texts::help(&self.request_tag, admin))),
            Command::Quota => {
                let record = self.quota.get(event.user_id).await?;
                let resets_at = self.quota.resets_at(&record);
                Ok(Some(texts::quota_status(
                    self.clock.as_ref(),
                    &record,
                    self.quota.ceiling(),
                    resets_at,
                    admin,
                )))
            }
            Command::Cancel(number) => self.cancel(number, event.user_id).await.map(Some),
            Command::Review => {
                if !event.is_admin_context {
                    warn!(user_id = event.user_id, "review requested outside admin chat");
                    return Err(DeskError::PermissionDenied(
                        "the review menu is only available in the admin chat".into(),
                    ));
                }
                let key = (event.user_id, event.source_group_id);
                self.open_review(key, event.thread_id).await?;
                Ok(None)
            }
            Command::Pending(page) => {
                let page = self
                    .registry
                    .page(page.saturating_sub(1), self.page_size)
                    .await?;
                Ok(Some(texts::pending_listing(&page)))
            }
            Command::History => {
                let records = self.registry.recent_history(HISTORY_LIMIT).await?;
                Ok(Some(texts::history_listing(self.clock.as_ref(), &records)))
            }
            Command::Search(number) => match self.registry.lookup(number).await? {
                Lookup::Pending(ticket) => {
                    Ok(Some(texts::pending_summary(self.clock.as_ref(), &ticket)))
                }
                Lookup::Resolved(record) => {
                    Ok(Some(texts::history_summary(self.clock.as_ref(), &record)))
                }
                Lookup::Unknown => Err(DeskError::ticket_not_found(number)),
            },
            Command::Priority(number) => {
                let priority = self.registry.toggle_priority(number).await?;
                Ok(Some(texts::priority_changed(number, priority)))
            }
            Command::Adjust { user_id, delta } => {
                let record = self.quota.adjust(user_id, delta, None, "").await?;
                info!(admin_id = event.user_id, user_id, delta, "quota adjusted by admin");
                Ok(Some(texts::quota_adjusted(
                    user_id,
                    &record,
                    self.quota.ceiling(),
                )))
            }
            Command::Activate(groups) => self.set_activation(&groups, true).await.map(Some),
            Command::Deactivate(groups) => self.set_activation(&groups, false).await.map(Some),
        }
    }

    /// Withdraw a pending ticket on behalf of its requester.
    async fn cancel(&self, number: TicketNumber, user_id: i64) -> Result<String, DeskError> {
        let ticket = match self.registry.lookup(number).await? {
            Lookup::Pending(ticket) => ticket,
            Lookup::Resolved(_) => return Err(DeskError::AlreadyResolved(number)),
            Lookup::Unknown => return Err(DeskError::ticket_not_found(number)),
        };
        if ticket.requester_id != user_id {
            warn!(ticket = number.0, user_id, "cancel by non-owner refused");
            return Err(DeskError::PermissionDenied(format!(
                "{number} is not your request"
            )));
        }
        self.registry
            .resolve(number, Disposition::Deleted, user_id, None)
            .await?;
        if let Some(handle) = ticket.posted_message {
            self.notifier.delete(handle).await;
        }
        Ok(texts::cancelled(number))
    }

    async fn set_activation(&self, groups: &[i64], active: bool) -> Result<String, DeskError> {
        let mut unknown = Vec::new();
        for &group_id in groups {
            if !self.admission.set_active(group_id, active).await? {
                unknown.push(group_id);
            }
            let thread_id = self
                .admission
                .binding(group_id)
                .and_then(|b| b.request_thread_id);
            self.notifier
                .post(
                    OutboundMessage::text(group_id, texts::activation_notice(active))
                        .in_thread(thread_id),
                )
                .await;
        }
        Ok(texts::activation_result(active, groups, &unknown))
    }
}
