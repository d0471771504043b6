// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin review state machine.
//!
//! [`transition`] is a pure function from `(state, event)` to the next state
//! plus a list of [`Effect`]s. The desk executes the effects (store writes,
//! menu rendering, notifications); the machine never performs I/O itself.
//!
//! ```text
//! List ──select──▶ TicketDetail ──accept──▶ UrlChoice ──with url──▶ AwaitUrl ──valid url──▶ Resolved
//!                       │                       └──without url──▶ Confirm                       │
//!                       └──reject/quota/delete──▶ Confirm ──confirm──▶ Resolved ──notify/skip──▶ Terminal
//!                                                   └──cancel──▶ List
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use ticketdesk_core::{DeskError, Disposition, TicketNumber};

/// Prefix shared by every review callback payload.
pub const CALLBACK_PREFIX: &str = "rv:";

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"']+"#).unwrap());

/// First URL found in `text`, if any.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_PATTERN.find(text).map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    List {
        page: usize,
    },
    TicketDetail {
        ticket: TicketNumber,
        page: usize,
    },
    UrlChoice {
        ticket: TicketNumber,
        page: usize,
    },
    AwaitUrl {
        ticket: TicketNumber,
        page: usize,
    },
    Confirm {
        ticket: TicketNumber,
        page: usize,
        disposition: Disposition,
        url: Option<String>,
    },
    /// Resolution written; waiting for the notify/skip answer.
    Resolved {
        ticket: TicketNumber,
        disposition: Disposition,
    },
    Terminal,
}

impl ReviewState {
    /// The ticket under review, if any.
    pub fn ticket(&self) -> Option<TicketNumber> {
        match self {
            ReviewState::TicketDetail { ticket, .. }
            | ReviewState::UrlChoice { ticket, .. }
            | ReviewState::AwaitUrl { ticket, .. }
            | ReviewState::Confirm { ticket, .. }
            | ReviewState::Resolved { ticket, .. } => Some(*ticket),
            ReviewState::List { .. } | ReviewState::Terminal => None,
        }
    }

    fn page(&self) -> usize {
        match self {
            ReviewState::List { page }
            | ReviewState::TicketDetail { page, .. }
            | ReviewState::UrlChoice { page, .. }
            | ReviewState::AwaitUrl { page, .. }
            | ReviewState::Confirm { page, .. } => *page,
            ReviewState::Resolved { .. } | ReviewState::Terminal => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewState::Terminal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewEvent {
    /// Entry point: show the first page.
    Open,
    Page(usize),
    Select(TicketNumber),
    Choose(TicketNumber, Disposition),
    /// `true` to attach a URL to the acceptance.
    UrlChoice(TicketNumber, bool),
    /// Free text typed by the admin.
    Text(String),
    /// `true` confirms, `false` cancels.
    Confirm(TicketNumber, bool),
    /// `true` notifies the requester, `false` skips.
    Notify(TicketNumber, bool),
    Back,
    Close,
    /// The selected ticket is no longer pending.
    TicketGone,
    /// The resolution write was refused (already handled elsewhere).
    ResolveFailed,
    /// Show the current step again without moving.
    Redisplay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    ShowList {
        page: usize,
    },
    ShowTicket {
        ticket: TicketNumber,
    },
    AskUrlChoice {
        ticket: TicketNumber,
    },
    PromptUrl {
        ticket: TicketNumber,
        retry: bool,
    },
    AskConfirm {
        ticket: TicketNumber,
        disposition: Disposition,
        url: Option<String>,
    },
    Resolve {
        ticket: TicketNumber,
        disposition: Disposition,
        url: Option<String>,
    },
    AskNotify {
        ticket: TicketNumber,
        disposition: Disposition,
    },
    NotifyRequester {
        ticket: TicketNumber,
    },
    /// Replace the menu with a closing line; the session ends.
    Finish {
        ticket: Option<TicketNumber>,
    },
    /// A resolution press for a ticket that is no longer at that step.
    AlreadyHandled {
        ticket: TicketNumber,
    },
    /// The event does not apply to the current state.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ReviewState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: ReviewState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    fn stale(state: ReviewState) -> Self {
        Self {
            state,
            effects: vec![Effect::Stale],
        }
    }
}

/// Whether `event` is consumed by a session in `state`.
///
/// Free text only matters while waiting for a URL; elsewhere it is left to
/// the command parser.
pub fn accepts(state: &ReviewState, event: &ReviewEvent) -> bool {
    match event {
        ReviewEvent::Text(_) => matches!(state, ReviewState::AwaitUrl { .. }),
        _ => true,
    }
}

/// Compute the next state and the effects to run.
pub fn transition(state: ReviewState, event: ReviewEvent) -> Transition {
    use ReviewEvent as E;
    use ReviewState as S;

    match (state, event) {
        (_, E::Open) => Transition::to(S::List { page: 0 }, vec![Effect::ShowList { page: 0 }]),
        (_, E::Close) | (S::Terminal, _) => {
            Transition::to(S::Terminal, vec![Effect::Finish { ticket: None }])
        }
        (_, E::ResolveFailed) => {
            Transition::to(S::List { page: 0 }, vec![Effect::ShowList { page: 0 }])
        }

        (S::List { .. }, E::Page(page)) => {
            Transition::to(S::List { page }, vec![Effect::ShowList { page }])
        }
        (state @ (S::List { .. } | S::TicketDetail { .. }), E::Select(ticket)) => {
            let page = state.page();
            Transition::to(
                S::TicketDetail { ticket, page },
                vec![Effect::ShowTicket { ticket }],
            )
        }
        (state, E::TicketGone) | (state, E::Back)
            if !matches!(state, S::List { .. } | S::Resolved { .. }) =>
        {
            let page = state.page();
            Transition::to(S::List { page }, vec![Effect::ShowList { page }])
        }

        (S::TicketDetail { ticket, page }, E::Choose(chosen, disposition)) if chosen == ticket => {
            match disposition {
                Disposition::Accepted => Transition::to(
                    S::UrlChoice { ticket, page },
                    vec![Effect::AskUrlChoice { ticket }],
                ),
                _ => Transition::to(
                    S::Confirm {
                        ticket,
                        page,
                        disposition,
                        url: None,
                    },
                    vec![Effect::AskConfirm {
                        ticket,
                        disposition,
                        url: None,
                    }],
                ),
            }
        }

        (S::UrlChoice { ticket, page }, E::UrlChoice(chosen, true)) if chosen == ticket => {
            Transition::to(
                S::AwaitUrl { ticket, page },
                vec![Effect::PromptUrl {
                    ticket,
                    retry: false,
                }],
            )
        }
        (S::UrlChoice { ticket, page }, E::UrlChoice(chosen, false)) if chosen == ticket => {
            Transition::to(
                S::Confirm {
                    ticket,
                    page,
                    disposition: Disposition::Accepted,
                    url: None,
                },
                vec![Effect::AskConfirm {
                    ticket,
                    disposition: Disposition::Accepted,
                    url: None,
                }],
            )
        }

        (S::AwaitUrl { ticket, page }, E::Text(text)) => match extract_url(&text) {
            Some(url) => resolved(ticket, Disposition::Accepted, Some(url.to_string())),
            None => Transition::to(
                S::AwaitUrl { ticket, page },
                vec![Effect::PromptUrl {
                    ticket,
                    retry: true,
                }],
            ),
        },

        (
            S::Confirm {
                ticket,
                disposition,
                url,
                ..
            },
            E::Confirm(chosen, true),
        ) if chosen == ticket => resolved(ticket, disposition, url),
        (S::Confirm { ticket, page, .. }, E::Confirm(chosen, false)) if chosen == ticket => {
            Transition::to(S::List { page }, vec![Effect::ShowList { page }])
        }

        (S::Resolved { ticket, .. }, E::Notify(chosen, notify)) if chosen == ticket => {
            let mut effects = Vec::new();
            if notify {
                effects.push(Effect::NotifyRequester { ticket });
            }
            effects.push(Effect::Finish {
                ticket: Some(ticket),
            });
            Transition::to(S::Terminal, effects)
        }

        (state, E::Redisplay) => {
            let effect = redisplay(&state);
            Transition::to(state, vec![effect])
        }
        (state, E::Confirm(ticket, true) | E::Choose(ticket, _)) => {
            Transition::to(state, vec![Effect::AlreadyHandled { ticket }])
        }
        (state, _) => Transition::stale(state),
    }
}

fn redisplay(state: &ReviewState) -> Effect {
    match state {
        ReviewState::List { page } => Effect::ShowList { page: *page },
        ReviewState::TicketDetail { ticket, .. } => Effect::ShowTicket { ticket: *ticket },
        ReviewState::UrlChoice { ticket, .. } => Effect::AskUrlChoice { ticket: *ticket },
        ReviewState::AwaitUrl { ticket, .. } => Effect::PromptUrl {
            ticket: *ticket,
            retry: false,
        },
        ReviewState::Confirm {
            ticket,
            disposition,
            url,
            ..
        } => Effect::AskConfirm {
            ticket: *ticket,
            disposition: *disposition,
            url: url.clone(),
        },
        ReviewState::Resolved {
            ticket,
            disposition,
        } => Effect::AskNotify {
            ticket: *ticket,
            disposition: *disposition,
        },
        ReviewState::Terminal => Effect::Stale,
    }
}

fn resolved(ticket: TicketNumber, disposition: Disposition, url: Option<String>) -> Transition {
    let resolve = Effect::Resolve {
        ticket,
        disposition,
        url,
    };
    if disposition.notifies_requester() {
        Transition::to(
            ReviewState::Resolved {
                ticket,
                disposition,
            },
            vec![
                resolve,
                Effect::AskNotify {
                    ticket,
                    disposition,
                },
            ],
        )
    } else {
        Transition::to(
            ReviewState::Terminal,
            vec![
                resolve,
                Effect::Finish {
                    ticket: Some(ticket),
                },
            ],
        )
    }
}

/// Encodes a button event as a compact callback payload.
///
/// Only events an admin can trigger by pressing a button have an encoding.
pub struct Callback<'a>(pub &'a ReviewEvent);

impl fmt::Display for Callback<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yn = |b: bool| if b { 'y' } else { 'n' };
        match self.0 {
            ReviewEvent::Open => write!(f, "{CALLBACK_PREFIX}o"),
            ReviewEvent::Page(page) => write!(f, "{CALLBACK_PREFIX}p:{page}"),
            ReviewEvent::Select(t) => write!(f, "{CALLBACK_PREFIX}s:{}", t.0),
            ReviewEvent::Choose(t, d) => write!(f, "{CALLBACK_PREFIX}d:{}:{}", t.0, d.as_ref()),
            ReviewEvent::UrlChoice(t, b) => write!(f, "{CALLBACK_PREFIX}u:{}:{}", t.0, yn(*b)),
            ReviewEvent::Confirm(t, b) => write!(f, "{CALLBACK_PREFIX}c:{}:{}", t.0, yn(*b)),
            ReviewEvent::Notify(t, b) => write!(f, "{CALLBACK_PREFIX}n:{}:{}", t.0, yn(*b)),
            ReviewEvent::Back => write!(f, "{CALLBACK_PREFIX}b"),
            ReviewEvent::Close => write!(f, "{CALLBACK_PREFIX}x"),
            ReviewEvent::Text(_)
            | ReviewEvent::TicketGone
            | ReviewEvent::ResolveFailed
            | ReviewEvent::Redisplay => {
                write!(f, "{CALLBACK_PREFIX}?")
            }
        }
    }
}

/// Encode `event` as callback data.
pub fn encode(event: &ReviewEvent) -> String {
    Callback(event).to_string()
}

/// Decode callback data produced by [`encode`].
pub fn decode(data: &str) -> Result<ReviewEvent, DeskError> {
    let invalid = || DeskError::Validation(format!("unrecognized menu action `{data}`"));
    let body = data.strip_prefix(CALLBACK_PREFIX).ok_or_else(invalid)?;
    let parts: Vec<&str> = body.split(':').collect();

    let ticket = |raw: &str| raw.parse::<i64>().map(TicketNumber).map_err(|_| invalid());
    let flag = |raw: &str| match raw {
        "y" => Ok(true),
        "n" => Ok(false),
        _ => Err(invalid()),
    };

    match parts.as_slice() {
        ["o"] => Ok(ReviewEvent::Open),
        ["b"] => Ok(ReviewEvent::Back),
        ["x"] => Ok(ReviewEvent::Close),
        ["p", page] => page.parse().map(ReviewEvent::Page).map_err(|_| invalid()),
        ["s", t] => Ok(ReviewEvent::Select(ticket(*t)?)),
        ["d", t, d] => Ok(ReviewEvent::Choose(
            ticket(*t)?,
            Disposition::from_str(d).map_err(|_| invalid())?,
        )),
        ["u", t, b] => Ok(ReviewEvent::UrlChoice(ticket(*t)?, flag(*b)?)),
        ["c", t, b] => Ok(ReviewEvent::Confirm(ticket(*t)?, flag(*b)?)),
        ["n", t, b] => Ok(ReviewEvent::Notify(ticket(*t)?, flag(*b)?)),
        _ => Err(invalid()),
    }
}
