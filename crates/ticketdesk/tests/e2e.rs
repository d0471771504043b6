// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete request desk.
//!
//! Each test creates an isolated TestHarness with temp SQLite, a mock channel
//! and a manual clock. Tests are independent and order-insensitive.

use std::collections::HashSet;

use chrono::Duration;
use ticketdesk_core::{Disposition, StorageAdapter, TicketNumber};
use ticketdesk_engine::Handled;
use ticketdesk_engine::admission::Decision;
use ticketdesk_test_utils::TestHarness;
use ticketdesk_test_utils::harness::{ADMIN, ADMIN_CHAT, GROUP, REQUEST_THREAD};

fn admitted_number(handled: &Handled) -> Option<TicketNumber> {
    match handled {
        Handled::Admission(Decision::Admitted { ticket, .. }) => Some(ticket.number),
        _ => None,
    }
}

// ---- Scenario A: a request is admitted ----

#[tokio::test]
async fn test_request_is_admitted_and_queued() {
    let harness = TestHarness::builder().build().await.unwrap();

    let handled = harness.say(42, "#request Solaris (1972)").await.unwrap();
    assert_eq!(admitted_number(&handled), Some(TicketNumber(1)));

    let reply = harness.channel.posts_to(GROUP).pop().unwrap();
    assert_eq!(
        reply.text,
        "Request received. Your ticket is #1.\nRequests used today: 1/2."
    );
    assert_eq!(reply.thread_id, Some(REQUEST_THREAD));

    let queue = harness.channel.posts_to(ADMIN_CHAT);
    assert_eq!(queue.len(), 1);
    assert!(queue[0].text.contains("Solaris (1972)"));

    let ticket = harness
        .storage
        .get_pending(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.requester_id, 42);
    assert_eq!(ticket.message_text, "Solaris (1972)");
    assert!(ticket.posted_message.is_some());
    assert_eq!(harness.desk.quota().get(42).await.unwrap().count, 1);
}

// ---- Scenario B: the ceiling is enforced ----

#[tokio::test]
async fn test_third_request_exceeds_quota() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request One").await.unwrap();
    harness.say(42, "#request Two").await.unwrap();

    let handled = harness.say(42, "#request Three").await.unwrap();
    assert!(matches!(
        handled,
        Handled::Admission(Decision::QuotaExceeded { ref record, .. }) if record.count == 2
    ));
    assert!(
        harness
            .last_post_in(GROUP)
            .unwrap()
            .starts_with("You have used 2/2 requests.")
    );
    assert_eq!(harness.storage.list_pending().await.unwrap().len(), 2);
    assert_eq!(harness.desk.quota().get(42).await.unwrap().count, 2);
}

#[tokio::test]
async fn test_quota_resets_after_the_window() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request One").await.unwrap();
    harness.say(42, "#request Two").await.unwrap();

    harness.clock.advance(Duration::hours(24));
    let handled = harness.say(42, "#request Three").await.unwrap();
    assert_eq!(admitted_number(&handled), Some(TicketNumber(3)));
    assert_eq!(harness.desk.quota().get(42).await.unwrap().count, 1);
}

#[tokio::test]
async fn test_admins_are_not_limited() {
    let harness = TestHarness::builder().build().await.unwrap();
    for _ in 0..4 {
        let handled = harness.say(ADMIN, "#request Admin pick").await.unwrap();
        assert!(admitted_number(&handled).is_some());
    }
}

// ---- Scenario C: accept with a link and notify ----

#[tokio::test]
async fn test_accept_with_link_notifies_requester() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request Stalker").await.unwrap();

    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:accepted").await.unwrap();
    harness.press("rv:u:1:y").await.unwrap();
    harness.admin_say("https://t.me/films/9").await.unwrap();
    harness.press("rv:n:1:y").await.unwrap();

    let record = harness
        .storage
        .get_history(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.disposition, Disposition::Accepted);
    assert_eq!(record.attached_url.as_deref(), Some("https://t.me/films/9"));
    assert!(harness.storage.get_pending(TicketNumber(1)).await.unwrap().is_none());
    assert_eq!(
        harness.last_post_in(GROUP).unwrap(),
        "Your request #1 has been fulfilled: https://t.me/films/9"
    );
}

#[tokio::test]
async fn test_skip_notification_stays_silent() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request Stalker").await.unwrap();
    let before = harness.channel.posts_to(GROUP).len();

    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:accepted").await.unwrap();
    harness.press("rv:u:1:n").await.unwrap();
    harness.press("rv:c:1:y").await.unwrap();
    harness.press("rv:n:1:n").await.unwrap();

    assert_eq!(harness.channel.posts_to(GROUP).len(), before);
    let record = harness
        .storage
        .get_history(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.attached_url, None);
}

// ---- Scenario D: activation ----

#[tokio::test]
async fn test_deactivated_group_suspends_requests() {
    let harness = TestHarness::builder().build().await.unwrap();

    harness.admin_say(&format!("/deactivate {GROUP}")).await.unwrap();
    let notice = harness.channel.posts_to(GROUP).pop().unwrap();
    assert_eq!(notice.thread_id, Some(REQUEST_THREAD));
    assert!(notice.text.contains("paused"));
    assert!(
        harness
            .last_post_in(ADMIN_CHAT)
            .unwrap()
            .starts_with(&format!("Deactivated: {GROUP}"))
    );

    let handled = harness.say(42, "#request Solaris").await.unwrap();
    assert_eq!(handled, Handled::Admission(Decision::Suspended));
    assert!(harness.storage.list_pending().await.unwrap().is_empty());
    assert_eq!(harness.desk.quota().get(42).await.unwrap().count, 0);

    harness.admin_say(&format!("/activate {GROUP}")).await.unwrap();
    let handled = harness.say(42, "#request Solaris").await.unwrap();
    assert_eq!(admitted_number(&handled), Some(TicketNumber(1)));
}

#[tokio::test]
async fn test_members_cannot_toggle_activation() {
    let harness = TestHarness::builder().build().await.unwrap();
    let update = harness.message_in(42, GROUP, Some(REQUEST_THREAD), "/deactivate -100");
    assert_eq!(harness.send(update).await.unwrap(), Handled::Command);
    assert_eq!(
        harness.last_post_in(GROUP).unwrap(),
        "You are not allowed to do that."
    );
    assert!(harness.desk.admission().is_admin(ADMIN));
    let handled = harness.say(42, "#request Solaris").await.unwrap();
    assert!(admitted_number(&handled).is_some());
}

// ---- Scenario E: concurrent requests ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_distinct_numbers() {
    let harness = TestHarness::builder().build().await.unwrap();
    let updates: Vec<_> = (100..110)
        .map(|user| harness.request(user, "#request Same film"))
        .collect();

    let results =
        futures::future::join_all(updates.into_iter().map(|u| harness.desk.handle(u))).await;

    let numbers: HashSet<TicketNumber> = results
        .iter()
        .map(|r| admitted_number(r.as_ref().unwrap()).unwrap())
        .collect();
    assert_eq!(numbers.len(), 10);
    assert_eq!(
        numbers.iter().map(|n| n.0).max(),
        Some(10),
        "numbers should be dense"
    );
}

#[tokio::test]
async fn test_numbers_are_not_reused_after_resolution() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request One").await.unwrap();
    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:rejected").await.unwrap();
    harness.press("rv:c:1:y").await.unwrap();

    let handled = harness.say(43, "#request Two").await.unwrap();
    assert_eq!(admitted_number(&handled), Some(TicketNumber(2)));
}

// ---- Routing and malformed requests ----

#[tokio::test]
async fn test_request_outside_topic_is_misrouted() {
    let harness = TestHarness::builder().build().await.unwrap();
    let update = harness.message_in(42, GROUP, None, "#request Solaris");

    let handled = harness.send(update).await.unwrap();
    assert_eq!(
        handled,
        Handled::Admission(Decision::Misrouted {
            expected_thread: Some(REQUEST_THREAD)
        })
    );
    assert!(harness.last_post_in(GROUP).unwrap().contains("request topic"));
    assert_eq!(harness.desk.quota().get(42).await.unwrap().count, 0);
}

#[tokio::test]
async fn test_repeated_untagged_requests_are_escalated() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut escalations = Vec::new();
    for _ in 0..3 {
        match harness.say(42, "looking for Solaris please").await.unwrap() {
            Handled::Admission(Decision::Malformed { escalated, .. }) => escalations.push(escalated),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(escalations, [false, false, true]);

    let report = harness.last_post_in(ADMIN_CHAT).unwrap();
    assert!(report.contains("user42 (42) sent 3 request-like messages"));
    assert!(harness.storage.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_small_talk_is_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();
    let handled = harness.say(42, "good morning everyone").await.unwrap();
    assert_eq!(handled, Handled::Admission(Decision::Ignored));
    assert!(harness.channel.posts().is_empty());
}

// ---- Commands ----

#[tokio::test]
async fn test_owner_can_cancel_but_others_cannot() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request Solaris").await.unwrap();
    let queue_post = harness
        .storage
        .get_pending(TicketNumber(1))
        .await
        .unwrap()
        .unwrap()
        .posted_message
        .unwrap();

    harness.say(43, "/cancel #1").await.unwrap();
    assert_eq!(
        harness.last_post_in(GROUP).unwrap(),
        "You are not allowed to do that."
    );

    harness.say(42, "/cancel 1").await.unwrap();
    assert_eq!(harness.last_post_in(GROUP).unwrap(), "Ticket #1 cancelled.");
    assert!(harness.channel.deletes().contains(&queue_post));
    let record = harness
        .storage
        .get_history(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.disposition, Disposition::Deleted);
    assert_eq!(record.resolving_admin, 42);

    harness.say(42, "/cancel 1").await.unwrap();
    assert_eq!(
        harness.last_post_in(GROUP).unwrap(),
        "#1 was already handled."
    );
    harness.say(42, "/cancel 99").await.unwrap();
    assert_eq!(harness.last_post_in(GROUP).unwrap(), "No ticket #99 found.");
}

#[tokio::test]
async fn test_quota_command_reports_remaining() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request Solaris").await.unwrap();
    harness.say(42, "/quota").await.unwrap();
    let reply = harness.last_post_in(GROUP).unwrap();
    assert!(reply.starts_with("You have 1 of 2 requests left."));
    assert!(reply.contains("2026-04-03 09:00"));
}

#[tokio::test]
async fn test_adjust_restores_allowance() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request One").await.unwrap();
    harness.say(42, "#request Two").await.unwrap();

    harness.admin_say("/adjust 42 -1").await.unwrap();
    assert_eq!(
        harness.last_post_in(ADMIN_CHAT).unwrap(),
        "Quota for 42 is now 1/2."
    );
    let handled = harness.say(42, "#request Three").await.unwrap();
    assert!(admitted_number(&handled).is_some());
}

#[tokio::test]
async fn test_priority_moves_ticket_to_the_top() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request First").await.unwrap();
    harness.say(43, "#request Second").await.unwrap();

    harness.admin_say("/priority 2").await.unwrap();
    harness.admin_say("/pending").await.unwrap();
    let listing = harness.last_post_in(ADMIN_CHAT).unwrap();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines[0], "Pending tickets: 2 (page 1/1)");
    assert!(lines[1].starts_with("★ #2"));
    assert!(lines[2].starts_with("#1"));
}

#[tokio::test]
async fn test_search_finds_pending_and_resolved() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.say(42, "#request Solaris").await.unwrap();

    harness.admin_say("/search 1").await.unwrap();
    assert!(harness.last_post_in(ADMIN_CHAT).unwrap().contains("#1"));

    harness.admin_say("/search 7").await.unwrap();
    assert_eq!(
        harness.last_post_in(ADMIN_CHAT).unwrap(),
        "No ticket #7 found."
    );
}

#[tokio::test]
async fn test_history_lists_recent_resolutions() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.admin_say("/history").await.unwrap();
    assert_eq!(
        harness.last_post_in(ADMIN_CHAT).unwrap(),
        "No resolved tickets yet."
    );

    harness.say(42, "#request Solaris").await.unwrap();
    harness.say(42, "/cancel 1").await.unwrap();
    harness.admin_say("/history").await.unwrap();
    let listing = harness.last_post_in(ADMIN_CHAT).unwrap();
    assert!(listing.starts_with("Recently resolved:"));
    assert!(listing.contains("#1 user42"));
}

#[tokio::test]
async fn test_review_is_only_offered_in_the_admin_chat() {
    let harness = TestHarness::builder().build().await.unwrap();
    let update = harness.message_in(ADMIN, GROUP, Some(REQUEST_THREAD), "/review");
    harness.send(update).await.unwrap();
    assert_eq!(
        harness.last_post_in(GROUP).unwrap(),
        "You are not allowed to do that."
    );
    assert!(harness.menu().is_none());
}

#[tokio::test]
async fn test_bad_arguments_are_explained() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.admin_say("/pending zero").await.unwrap();
    assert!(
        harness
            .last_post_in(ADMIN_CHAT)
            .unwrap()
            .starts_with("Invalid input:")
    );
}
