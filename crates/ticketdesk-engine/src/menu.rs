// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the review machine against a live session.
//!
//! [`Desk::drive`] feeds one event through [`review::transition`], executes
//! the returned effects in order and renders the last view into the
//! session's menu message. An effect may answer with a follow-up event
//! (the ticket vanished, the resolution was refused), which is fed back
//! into the machine before anything is rendered.

use ticketdesk_core::types::{CallbackEvent, Choice, OutboundMessage};
use ticketdesk_core::{DeskError, Disposition, MessageHandle, TicketNumber};
use tracing::{debug, error, info, warn};

use crate::registry::Page;
use crate::review::{self, Effect, ReviewEvent, ReviewState, Transition};
use crate::sessions::{ReviewSession, SessionKey, SessionLookup};
use crate::{Desk, Handled, texts};

/// Follow-up events allowed per input; the machine never chains more than one.
const MAX_HOPS: usize = 4;

/// Text plus choice rows, rendered into the menu message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct View {
    pub text: String,
    pub choices: Vec<Vec<Choice>>,
}

impl View {
    fn plain(text: String) -> Self {
        Self {
            text,
            choices: Vec::new(),
        }
    }
}

enum Step {
    Show(View),
    Quiet,
    /// Feed `event` back into the machine, prefixing the next view with `notice`.
    Follow {
        event: ReviewEvent,
        notice: String,
    },
    /// Keep the state from before this input and show `View`.
    Abort(View),
}

fn button(label: &str, event: ReviewEvent) -> Choice {
    Choice::new(label, review::encode(&event))
}

fn list_view(page: &Page) -> View {
    let mut choices: Vec<Vec<Choice>> = page
        .tickets
        .iter()
        .map(|t| vec![button(&texts::list_entry(t), ReviewEvent::Select(t.number))])
        .collect();
    let mut nav = Vec::new();
    if page.has_previous() {
        nav.push(button("« Previous", ReviewEvent::Page(page.index - 1)));
    }
    if page.has_next() {
        nav.push(button("Next »", ReviewEvent::Page(page.index + 1)));
    }
    if !nav.is_empty() {
        choices.push(nav);
    }
    choices.push(vec![button("Close", ReviewEvent::Close)]);
    View {
        text: texts::list_header(page),
        choices,
    }
}

fn detail_choices(ticket: TicketNumber) -> Vec<Vec<Choice>> {
    let choose = |label: &str, d: Disposition| button(label, ReviewEvent::Choose(ticket, d));
    vec![
        vec![
            choose("Accept", Disposition::Accepted),
            choose("Reject", Disposition::Rejected),
        ],
        vec![
            choose("Over quota", Disposition::QuotaExceeded),
            choose("Delete", Disposition::Deleted),
        ],
        vec![button("Back", ReviewEvent::Back)],
    ]
}

fn try_again_view() -> View {
    View {
        text: texts::try_again(),
        choices: vec![vec![
            button("Back", ReviewEvent::Back),
            button("Close", ReviewEvent::Close),
        ]],
    }
}

impl Desk {
    /// Start a fresh review session, replacing any previous menu.
    pub(crate) async fn open_review(
        &self,
        key: SessionKey,
        thread_id: Option<i32>,
    ) -> Result<(), DeskError> {
        let Some(_claim) = self.sessions.claim(key) else {
            debug!(admin_id = key.0, "review session busy, open dropped");
            return Ok(());
        };
        if let Some(previous) = self.sessions.remove(key)
            && let Some(menu) = previous.menu
        {
            self.notifier.delete(menu).await;
        }
        self.drive(
            key,
            ReviewState::List { page: 0 },
            None,
            thread_id,
            ReviewEvent::Open,
        )
        .await
    }

    /// Handle a pressed review button.
    pub(crate) async fn review_callback(&self, cb: &CallbackEvent) -> Result<Handled, DeskError> {
        let event = match review::decode(&cb.data) {
            Ok(event) => event,
            Err(e) => {
                warn!(user_id = cb.user_id, error = %e, "undecodable menu action");
                self.expire_menu(cb.message).await;
                return Ok(Handled::Ignored);
            }
        };
        if !self.admission.is_admin(cb.user_id) {
            warn!(user_id = cb.user_id, data = %cb.data, "permission denied: review action by non-admin");
            return Ok(Handled::Denied);
        }

        let key = (cb.user_id, cb.chat_id);
        if event == ReviewEvent::Open {
            self.open_review(key, cb.thread_id).await?;
            return Ok(Handled::Review);
        }

        // A second tap landing while the first is still running is a double tap.
        let Some(_claim) = self.sessions.claim(key) else {
            debug!(admin_id = cb.user_id, data = %cb.data, "review session busy, tap dropped");
            return Ok(Handled::Ignored);
        };

        let from_menu = |s: &ReviewSession| cb.message.is_none() || cb.message == s.menu;
        match self.sessions.lookup(key) {
            SessionLookup::Live(session) if from_menu(&session) => {
                self.drive(key, session.state, session.menu, session.thread_id, event)
                    .await?;
            }
            lookup => {
                // Queue posts start a new session; any other old menu is dead.
                let stale_menu = match &lookup {
                    SessionLookup::Live(s) | SessionLookup::Expired(s) => s.menu,
                    SessionLookup::Missing => None,
                };
                if let ReviewEvent::Select(_) = event {
                    if let SessionLookup::Live(_) = lookup {
                        self.sessions.remove(key);
                    }
                    if let Some(menu) = stale_menu {
                        self.notifier.delete(menu).await;
                    }
                    self.drive(
                        key,
                        ReviewState::List { page: 0 },
                        None,
                        cb.thread_id,
                        event,
                    )
                    .await?;
                } else {
                    debug!(admin_id = cb.user_id, "action on an expired menu");
                    self.expire_menu(cb.message.or(stale_menu)).await;
                }
            }
        }
        Ok(Handled::Review)
    }

    /// Route admin free text to a session waiting for it.
    ///
    /// Returns `None` when no session wants the text.
    pub(crate) async fn review_text(
        &self,
        key: SessionKey,
        text: &str,
    ) -> Result<Option<Handled>, DeskError> {
        let event = ReviewEvent::Text(text.to_string());
        let Some(_claim) = self.sessions.claim(key) else {
            debug!(admin_id = key.0, "review session busy, text dropped");
            return Ok(Some(Handled::Ignored));
        };
        match self.sessions.lookup(key) {
            SessionLookup::Live(session) if review::accepts(&session.state, &event) => {
                self.drive(key, session.state, session.menu, session.thread_id, event)
                    .await?;
                Ok(Some(Handled::Review))
            }
            SessionLookup::Expired(session) => {
                self.expire_menu(session.menu).await;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    async fn expire_menu(&self, menu: Option<MessageHandle>) {
        if let Some(menu) = menu {
            self.notifier
                .edit(menu, &texts::menu_expired(), Vec::new())
                .await;
        }
    }

    /// Feed `event` through the machine and persist the resulting session.
    pub(crate) async fn drive(
        &self,
        key: SessionKey,
        state: ReviewState,
        mut menu: Option<MessageHandle>,
        thread_id: Option<i32>,
        event: ReviewEvent,
    ) -> Result<(), DeskError> {
        let admin_id = key.0;
        let mut state = state;
        let mut next = Some(event);
        let mut notice: Option<String> = None;
        let mut view: Option<View> = None;
        let mut hops = 0;

        'events: while let Some(event) = next.take() {
            hops += 1;
            if hops > MAX_HOPS {
                warn!(admin_id, "review follow-up chain cut short");
                break;
            }
            let prior = state.clone();
            let Transition {
                state: after,
                effects,
            } = review::transition(state, event);
            state = after;

            for effect in effects {
                let step = match self.apply(admin_id, effect).await {
                    Ok(step) => step,
                    Err(e) => {
                        error!(admin_id, error = %e, "review step failed");
                        Step::Abort(try_again_view())
                    }
                };
                match step {
                    Step::Show(v) => view = Some(v),
                    Step::Quiet => {}
                    Step::Follow { event, notice: n } => {
                        notice = Some(n);
                        next = Some(event);
                        continue 'events;
                    }
                    Step::Abort(v) => {
                        state = prior;
                        view = Some(v);
                        break 'events;
                    }
                }
            }
        }

        if let Some(mut view) = view {
            if let Some(notice) = notice {
                view.text = format!("{notice}\n\n{}", view.text);
            }
            let msg = OutboundMessage::text(key.1, view.text)
                .in_thread(thread_id)
                .with_choices(view.choices);
            menu = self.notifier.edit_or_post(menu, msg).await.or(menu);
        }
        self.sessions.save(key, state, menu, thread_id);
        Ok(())
    }

    async fn apply(&self, admin_id: i64, effect: Effect) -> Result<Step, DeskError> {
        match effect {
            Effect::ShowList { page } => {
                let page = self.registry.page(page, self.page_size).await?;
                Ok(Step::Show(list_view(&page)))
            }
            Effect::ShowTicket { ticket } => match self.registry.get_pending(ticket).await? {
                Some(pending) => Ok(Step::Show(View {
                    text: texts::ticket_detail(self.clock.as_ref(), &pending),
                    choices: detail_choices(ticket),
                })),
                None => Ok(Step::Follow {
                    event: ReviewEvent::TicketGone,
                    notice: texts::no_longer_pending(ticket),
                }),
            },
            Effect::AskUrlChoice { ticket } => Ok(Step::Show(View {
                text: texts::url_choice(ticket),
                choices: vec![
                    vec![
                        button("With link", ReviewEvent::UrlChoice(ticket, true)),
                        button("Without link", ReviewEvent::UrlChoice(ticket, false)),
                    ],
                    vec![button("Back", ReviewEvent::Back)],
                ],
            })),
            Effect::PromptUrl { ticket, retry } => Ok(Step::Show(View {
                text: texts::prompt_url(ticket, retry),
                choices: vec![vec![button("Back", ReviewEvent::Back)]],
            })),
            Effect::AskConfirm {
                ticket,
                disposition,
                url,
            } => Ok(Step::Show(View {
                text: texts::confirm(ticket, disposition, url.as_deref()),
                choices: vec![vec![
                    button("Confirm", ReviewEvent::Confirm(ticket, true)),
                    button("Cancel", ReviewEvent::Confirm(ticket, false)),
                ]],
            })),
            Effect::Resolve {
                ticket,
                disposition,
                url,
            } => self.resolve(admin_id, ticket, disposition, url).await,
            Effect::AskNotify {
                ticket,
                disposition,
            } => Ok(Step::Show(View {
                text: texts::ask_notify(ticket, disposition),
                choices: vec![vec![
                    button("Notify", ReviewEvent::Notify(ticket, true)),
                    button("Skip", ReviewEvent::Notify(ticket, false)),
                ]],
            })),
            Effect::NotifyRequester { ticket } => {
                match self.registry.get_history(ticket).await? {
                    Some(record) => {
                        let msg = OutboundMessage::text(
                            record.source_group_id,
                            texts::requester_outcome(&record),
                        )
                        .in_thread(record.thread_id)
                        .replying_to(record.request_message_id);
                        if self.notifier.post(msg).await.is_some() {
                            info!(ticket = ticket.0, admin_id, "requester notified");
                        }
                    }
                    None => warn!(ticket = ticket.0, "no history to notify about"),
                }
                Ok(Step::Quiet)
            }
            Effect::Finish { ticket } => Ok(Step::Show(View::plain(texts::finished(ticket)))),
            Effect::AlreadyHandled { ticket } => {
                if self.registry.get_history(ticket).await?.is_some() {
                    debug!(ticket = ticket.0, admin_id, "repeat resolution press on a resolved ticket");
                    Ok(Step::Follow {
                        event: ReviewEvent::Redisplay,
                        notice: texts::already_handled(ticket),
                    })
                } else {
                    debug!(admin_id, "review action does not apply to the current step");
                    Ok(Step::Quiet)
                }
            }
            Effect::Stale => {
                debug!(admin_id, "review action does not apply to the current step");
                Ok(Step::Quiet)
            }
        }
    }

    async fn resolve(
        &self,
        admin_id: i64,
        ticket: TicketNumber,
        disposition: Disposition,
        url: Option<String>,
    ) -> Result<Step, DeskError> {
        // Read first: the queue post handle does not survive into history.
        let posted = self
            .registry
            .get_pending(ticket)
            .await?
            .and_then(|p| p.posted_message);
        match self
            .registry
            .resolve(ticket, disposition, admin_id, url)
            .await
        {
            Ok(record) => {
                if let Some(handle) = posted {
                    self.notifier
                        .edit(
                            handle,
                            &texts::queue_resolved(self.clock.as_ref(), &record),
                            Vec::new(),
                        )
                        .await;
                }
                Ok(Step::Quiet)
            }
            Err(DeskError::AlreadyResolved(_) | DeskError::NotFound { .. }) => {
                warn!(ticket = ticket.0, admin_id, "resolution refused: already handled");
                Ok(Step::Follow {
                    event: ReviewEvent::ResolveFailed,
                    notice: texts::already_handled(ticket),
                })
            }
            Err(e) => {
                error!(ticket = ticket.0, admin_id, error = %e, "resolution failed");
                Ok(Step::Abort(try_again_view()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use ticketdesk_core::types::PendingTicket;

    use super::*;

    fn pending(number: i64, priority: bool) -> PendingTicket {
        PendingTicket {
            number: TicketNumber(number),
            source_group_id: -1,
            source_group_title: "Films".into(),
            thread_id: None,
            requester_id: 5,
            requester_display_name: "Ana".into(),
            message_text: format!("film {number}"),
            request_message_id: None,
            posted_message: None,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            priority,
        }
    }

    #[test]
    fn list_view_has_one_row_per_ticket_plus_navigation() {
        let page = Page {
            tickets: vec![pending(3, true), pending(1, false)],
            index: 1,
            count: 3,
            total: 12,
        };
        let view = list_view(&page);
        assert_eq!(view.text, "Pending tickets: 12 (page 2/3)");
        assert_eq!(view.choices.len(), 4);
        assert_eq!(view.choices[0][0].data, "rv:s:3");
        assert!(view.choices[0][0].label.starts_with("★ #3"));
        let nav: Vec<&str> = view.choices[2].iter().map(|c| c.data.as_str()).collect();
        assert_eq!(nav, ["rv:p:0", "rv:p:2"]);
        assert_eq!(view.choices[3][0].data, "rv:x");
    }

    #[test]
    fn empty_queue_only_offers_close() {
        let page = Page {
            tickets: Vec::new(),
            index: 0,
            count: 1,
            total: 0,
        };
        let view = list_view(&page);
        assert_eq!(view.text, "No pending tickets.");
        assert_eq!(view.choices, vec![vec![button("Close", ReviewEvent::Close)]]);
    }

    #[test]
    fn detail_offers_every_disposition() {
        let data: Vec<String> = detail_choices(TicketNumber(8))
            .into_iter()
            .flatten()
            .map(|c| c.data)
            .collect();
        assert_eq!(
            data,
            [
                "rv:d:8:accepted",
                "rv:d:8:rejected",
                "rv:d:8:quota_exceeded",
                "rv:d:8:deleted",
                "rv:b"
            ]
        );
    }
}
