// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User- and admin-facing message texts.

use chrono::{DateTime, Utc};
use ticketdesk_core::types::{HistoryRecord, PendingTicket};
use ticketdesk_core::{Clock, DeskError, Disposition, QuotaRecord, TicketNumber};

use crate::registry::Page;

/// Longest excerpt of a request shown on a list button.
const EXCERPT_CHARS: usize = 32;

pub fn format_time(clock: &dyn Clock, at: DateTime<Utc>) -> String {
    clock.local(at).format("%Y-%m-%d %H:%M %Z").to_string()
}

pub fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= EXCERPT_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(EXCERPT_CHARS - 1).collect();
    format!("{}…", cut.trim_end())
}

pub fn disposition_label(disposition: Disposition) -> &'static str {
    match disposition {
        Disposition::Accepted => "accepted",
        Disposition::Rejected => "rejected",
        Disposition::Deleted => "deleted",
        Disposition::QuotaExceeded => "declined (over quota)",
    }
}

// --- Requester ---

pub fn admitted(ticket: &PendingTicket, quota: &QuotaRecord, ceiling: u32) -> String {
    format!(
        "Request received. Your ticket is {}.\nRequests used today: {}/{}.",
        ticket.number, quota.count, ceiling
    )
}

pub fn misrouted(request_tag: &str) -> String {
    format!("{request_tag} messages belong in this group's request topic. Please post it there.")
}

pub fn suspended() -> String {
    "Requests are paused in this group for now.".to_string()
}

pub fn quota_exceeded(
    clock: &dyn Clock,
    record: &QuotaRecord,
    ceiling: u32,
    resets_at: DateTime<Utc>,
) -> String {
    format!(
        "You have used {}/{} requests. Your allowance resets at {}.",
        record.count,
        ceiling,
        format_time(clock, resets_at)
    )
}

pub fn malformed(request_tag: &str, attempts: u32, escalated: bool) -> String {
    if escalated {
        format!(
            "You have sent {attempts} messages that look like requests without {request_tag}. \
             Repeated misuse is reported to the admins."
        )
    } else {
        format!(
            "To make a request, start your message with {request_tag} followed by what you are looking for."
        )
    }
}

pub fn requester_outcome(record: &HistoryRecord) -> String {
    let number = record.number;
    match (record.disposition, record.attached_url.as_deref()) {
        (Disposition::Accepted, Some(url)) => {
            format!("Your request {number} has been fulfilled: {url}")
        }
        (Disposition::Accepted, None) => format!("Your request {number} has been accepted."),
        (Disposition::Rejected, _) => format!("Your request {number} has been rejected."),
        (Disposition::QuotaExceeded, _) => format!(
            "Your request {number} was declined because you were over the daily limit."
        ),
        (Disposition::Deleted, _) => format!("Your request {number} has been removed."),
    }
}

pub fn cancelled(number: TicketNumber) -> String {
    format!("Ticket {number} cancelled.")
}

pub fn quota_status(
    clock: &dyn Clock,
    record: &QuotaRecord,
    ceiling: u32,
    resets_at: DateTime<Utc>,
    admin: bool,
) -> String {
    if admin {
        return format!(
            "You have made {} requests in the current window. Admins are not limited.",
            record.count
        );
    }
    format!(
        "You have {} of {} requests left. Your allowance resets at {}.",
        record.remaining(ceiling),
        ceiling,
        format_time(clock, resets_at)
    )
}

pub fn activation_notice(active: bool) -> String {
    if active {
        "Requests are open again in this group.".to_string()
    } else {
        "Requests are paused in this group until further notice.".to_string()
    }
}

pub fn help(request_tag: &str, admin: bool) -> String {
    let mut text = format!(
        "Start a message with {request_tag} to make a request.\n\
         /quota - your remaining requests\n\
         /cancel <ticket> - withdraw one of your pending requests"
    );
    if admin {
        text.push_str(
            "\n\nAdmin:\n\
             /review - open the review menu\n\
             /pending [page] - list pending tickets\n\
             /history - recently resolved tickets\n\
             /search <ticket> - look up a ticket\n\
             /priority <ticket> - toggle priority\n\
             /adjust <user> <+n|-n> - correct a user's quota\n\
             /activate <group...>, /deactivate <group...>",
        );
    }
    text
}

// --- Admin ---

pub fn queue_post(ticket: &PendingTicket) -> String {
    format!(
        "New request {}\nFrom: {} ({})\nGroup: {}\n\n{}",
        ticket.number,
        ticket.requester_display_name,
        ticket.requester_id,
        ticket.source_group_title,
        ticket.message_text
    )
}

pub fn queue_resolved(clock: &dyn Clock, record: &HistoryRecord) -> String {
    let mut text = format!(
        "Request {} from {}: {}\n\n{}\n\nMarked {} by {} at {}",
        record.number,
        record.requester_display_name,
        record.source_group_title,
        record.message_text,
        disposition_label(record.disposition),
        record.resolving_admin,
        format_time(clock, record.resolved_at)
    );
    if let Some(url) = &record.attached_url {
        text.push_str(&format!("\nLink: {url}"));
    }
    text
}

pub fn malformed_report(
    user_id: i64,
    display_name: &str,
    group_title: &str,
    attempts: u32,
) -> String {
    format!(
        "{display_name} ({user_id}) sent {attempts} request-like messages without the tag in {group_title} within a day."
    )
}

pub fn list_header(page: &Page) -> String {
    if page.total == 0 {
        return "No pending tickets.".to_string();
    }
    format!(
        "Pending tickets: {} (page {}/{})",
        page.total,
        page.index + 1,
        page.count
    )
}

pub fn list_entry(ticket: &PendingTicket) -> String {
    let star = if ticket.priority { "★ " } else { "" };
    format!(
        "{star}{} {}: {}",
        ticket.number,
        ticket.requester_display_name,
        excerpt(&ticket.message_text)
    )
}

pub fn pending_listing(page: &Page) -> String {
    let mut text = list_header(page);
    for ticket in &page.tickets {
        text.push('\n');
        text.push_str(&list_entry(ticket));
    }
    text
}

pub fn ticket_detail(clock: &dyn Clock, ticket: &PendingTicket) -> String {
    let priority = if ticket.priority { " (priority)" } else { "" };
    format!(
        "Ticket {}{priority}\nFrom: {} ({})\nGroup: {}\nOpened: {}\n\n{}",
        ticket.number,
        ticket.requester_display_name,
        ticket.requester_id,
        ticket.source_group_title,
        format_time(clock, ticket.created_at),
        ticket.message_text
    )
}

pub fn history_entry(clock: &dyn Clock, record: &HistoryRecord) -> String {
    format!(
        "{} {} ({}) {} at {}",
        record.number,
        record.requester_display_name,
        excerpt(&record.message_text),
        disposition_label(record.disposition),
        format_time(clock, record.resolved_at)
    )
}

pub fn history_listing(clock: &dyn Clock, records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "No resolved tickets yet.".to_string();
    }
    let mut text = "Recently resolved:".to_string();
    for record in records {
        text.push('\n');
        text.push_str(&history_entry(clock, record));
    }
    text
}

pub fn url_choice(number: TicketNumber) -> String {
    format!("Accept {number}. Attach a link for the requester?")
}

pub fn prompt_url(number: TicketNumber, retry: bool) -> String {
    if retry {
        format!("That message has no link. Send a URL starting with http:// or https:// for {number}.")
    } else {
        format!("Send the link for {number}.")
    }
}

pub fn confirm(number: TicketNumber, disposition: Disposition, url: Option<&str>) -> String {
    match url {
        Some(url) => format!(
            "Mark {number} as {} with {url}?",
            disposition_label(disposition)
        ),
        None => format!("Mark {number} as {}?", disposition_label(disposition)),
    }
}

pub fn ask_notify(number: TicketNumber, disposition: Disposition) -> String {
    format!(
        "{number} marked {}. Notify the requester?",
        disposition_label(disposition)
    )
}

pub fn finished(number: Option<TicketNumber>) -> String {
    match number {
        Some(number) => format!("{number} done."),
        None => "Review closed.".to_string(),
    }
}

pub fn no_longer_pending(number: TicketNumber) -> String {
    format!("{number} is no longer pending.")
}

pub fn already_handled(number: TicketNumber) -> String {
    format!("{number} was already handled.")
}

pub fn menu_expired() -> String {
    "This menu has expired. Use /review to start again.".to_string()
}

pub fn try_again() -> String {
    "Something went wrong. Please try again.".to_string()
}

pub fn activation_result(active: bool, changed: &[i64], unknown: &[i64]) -> String {
    let verb = if active { "Activated" } else { "Deactivated" };
    let ids = |list: &[i64]| {
        list.iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut text = format!("{verb}: {}", ids(changed));
    if !unknown.is_empty() {
        text.push_str(&format!("\nNot seen before (recorded anyway): {}", ids(unknown)));
    }
    text
}

pub fn quota_adjusted(user_id: i64, record: &QuotaRecord, ceiling: u32) -> String {
    format!("Quota for {user_id} is now {}/{}.", record.count, ceiling)
}

pub fn priority_changed(number: TicketNumber, priority: bool) -> String {
    if priority {
        format!("{number} is now a priority ticket.")
    } else {
        format!("{number} is no longer a priority ticket.")
    }
}

pub fn pending_summary(clock: &dyn Clock, ticket: &PendingTicket) -> String {
    format!("{}\n\nStatus: pending", ticket_detail(clock, ticket))
}

pub fn history_summary(clock: &dyn Clock, record: &HistoryRecord) -> String {
    let mut text = format!(
        "Ticket {}\nFrom: {} ({})\nGroup: {}\n\n{}\n\nStatus: {} by {} at {}",
        record.number,
        record.requester_display_name,
        record.requester_id,
        record.source_group_title,
        record.message_text,
        disposition_label(record.disposition),
        record.resolving_admin,
        format_time(clock, record.resolved_at)
    );
    if let Some(url) = &record.attached_url {
        text.push_str(&format!("\nLink: {url}"));
    }
    text
}

/// Reply shown for a failed operation.
pub fn error_reply(err: &DeskError) -> String {
    match err {
        DeskError::Validation(msg) => format!("Invalid input: {msg}"),
        DeskError::NotFound { entity, key } => format!("No {entity} {key} found."),
        DeskError::PermissionDenied(_) => "You are not allowed to do that.".to_string(),
        DeskError::AlreadyResolved(number) | DeskError::DuplicateTicket(number) => {
            already_handled(*number)
        }
        _ => try_again(),
    }
}
