// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Review menu flows against a real SQLite store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use ticketdesk_config::model::DeskConfig;
use ticketdesk_core::{Disposition, StorageAdapter, TicketNumber};
use ticketdesk_engine::admission::Decision;
use ticketdesk_engine::review::ReviewState;
use ticketdesk_engine::sessions::SessionLookup;
use ticketdesk_engine::texts;
use ticketdesk_engine::{Desk, Handled};
use ticketdesk_test_utils::harness::{ADMIN, ADMIN_CHAT, GROUP, REQUEST_THREAD};
use ticketdesk_test_utils::{ManualClock, MemoryStorage, MockChannel, TestHarness};
use tokio_util::sync::CancellationToken;

async fn harness_with_requests(users: &[i64]) -> TestHarness {
    let harness = TestHarness::builder().build().await.unwrap();
    for (i, user) in users.iter().enumerate() {
        let handled = harness
            .say(*user, &format!("#request Film {}", i + 1))
            .await
            .unwrap();
        assert_eq!(handled.admission_name(), Some("admitted"));
    }
    harness
}

trait HandledExt {
    fn admission_name(&self) -> Option<&'static str>;
}

impl HandledExt for Handled {
    fn admission_name(&self) -> Option<&'static str> {
        match self {
            Handled::Admission(decision) => Some(decision.name()),
            _ => None,
        }
    }
}

// ---- Accept with a link ----

#[tokio::test]
async fn accept_with_url_reprompts_until_a_link_arrives() {
    let harness = harness_with_requests(&[42]).await;
    let number = TicketNumber(1);

    harness.press("rv:s:1").await.unwrap();
    assert!(harness.menu_text().unwrap().starts_with("Ticket #1"));

    harness.press("rv:d:1:accepted").await.unwrap();
    assert_eq!(harness.menu_text().unwrap(), texts::url_choice(number));

    harness.press("rv:u:1:y").await.unwrap();
    assert_eq!(harness.menu_text().unwrap(), texts::prompt_url(number, false));

    let handled = harness.admin_say("here you go").await.unwrap();
    assert_eq!(handled, Handled::Review);
    assert_eq!(harness.menu_text().unwrap(), texts::prompt_url(number, true));
    assert!(harness.desk.registry().get_pending(number).await.unwrap().is_some());

    harness
        .admin_say("uploaded: https://t.me/films/123")
        .await
        .unwrap();
    let record = harness.desk.registry().get_history(number).await.unwrap().unwrap();
    assert_eq!(record.disposition, Disposition::Accepted);
    assert_eq!(record.attached_url.as_deref(), Some("https://t.me/films/123"));
    assert_eq!(record.resolving_admin, ADMIN);
    assert!(harness.desk.registry().get_pending(number).await.unwrap().is_none());
    assert_eq!(
        harness.menu_text().unwrap(),
        texts::ask_notify(number, Disposition::Accepted)
    );

    harness.press("rv:n:1:y").await.unwrap();
    let outcome = harness
        .channel
        .posts_to(GROUP)
        .pop()
        .expect("requester should be notified");
    assert_eq!(
        outcome.text,
        "Your request #1 has been fulfilled: https://t.me/films/123"
    );
    assert_eq!(outcome.thread_id, Some(REQUEST_THREAD));
    assert!(outcome.reply_to.is_some());
    assert!(harness.menu().is_none(), "session should end after notify");
}

#[tokio::test]
async fn resolving_edits_the_queue_post() {
    let harness = harness_with_requests(&[42]).await;
    let queue_post = harness
        .desk
        .registry()
        .get_pending(TicketNumber(1))
        .await
        .unwrap()
        .unwrap()
        .posted_message
        .unwrap();

    harness
        .send(harness.callback(ADMIN, Some(queue_post), "rv:s:1"))
        .await
        .unwrap();
    harness.press("rv:d:1:rejected").await.unwrap();
    harness.press("rv:c:1:y").await.unwrap();

    let edit = harness.channel.last_edit_of(queue_post).unwrap();
    assert!(edit.text.contains("Marked rejected by 1"));
    assert!(edit.choices.is_empty());
}

// ---- Exactly-once resolution ----

#[tokio::test]
async fn repeated_confirm_says_already_handled() {
    let harness = harness_with_requests(&[42]).await;
    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:rejected").await.unwrap();
    harness.press("rv:c:1:y").await.unwrap();

    let handled = harness.press("rv:c:1:y").await.unwrap();
    assert_eq!(handled, Handled::Review);
    let text = harness.menu_text().unwrap();
    assert!(text.starts_with(&texts::already_handled(TicketNumber(1))), "{text}");
    assert!(text.ends_with(&texts::ask_notify(TicketNumber(1), Disposition::Rejected)), "{text}");
    assert_eq!(harness.desk.registry().recent_history(10).await.unwrap().len(), 1);

    // The notify question still works afterwards.
    let before = harness.channel.posts_to(GROUP).len();
    harness.press("rv:n:1:y").await.unwrap();
    assert_eq!(harness.channel.posts_to(GROUP).len(), before + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_confirm_keeps_the_notify_prompt() {
    let harness = harness_with_requests(&[42]).await;
    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:rejected").await.unwrap();

    let (first, second) = tokio::join!(harness.press("rv:c:1:y"), harness.press("rv:c:1:y"));
    first.unwrap();
    second.unwrap();

    let session = match harness.desk.sessions().lookup((ADMIN, ADMIN_CHAT)) {
        SessionLookup::Live(session) => session,
        other => panic!("session should survive the double tap: {other:?}"),
    };
    assert_eq!(
        session.state,
        ReviewState::Resolved {
            ticket: TicketNumber(1),
            disposition: Disposition::Rejected,
        }
    );
    let text = harness.menu_text().unwrap();
    assert!(text.ends_with(&texts::ask_notify(TicketNumber(1), Disposition::Rejected)), "{text}");
    assert_eq!(harness.desk.registry().recent_history(10).await.unwrap().len(), 1);

    let before = harness.channel.posts_to(GROUP).len();
    harness.press("rv:n:1:y").await.unwrap();
    assert_eq!(harness.channel.posts_to(GROUP).len(), before + 1);
}

#[tokio::test]
async fn second_admin_sees_already_handled() {
    let harness = TestHarness::builder()
        .with_admins(vec![ADMIN, 2])
        .build()
        .await
        .unwrap();
    harness.say(42, "#request Solaris").await.unwrap();

    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:deleted").await.unwrap();

    for data in ["rv:s:1", "rv:d:1:rejected", "rv:c:1:y"] {
        harness.send(harness.callback(2, None, data)).await.unwrap();
    }

    harness.press("rv:c:1:y").await.unwrap();
    let text = harness.menu_text().unwrap();
    assert!(text.starts_with(&texts::already_handled(TicketNumber(1))));
    assert!(text.ends_with("No pending tickets."));

    let record = harness
        .desk
        .registry()
        .get_history(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.disposition, Disposition::Rejected);
    assert_eq!(record.resolving_admin, 2);
}

#[tokio::test]
async fn deleting_ends_the_session_without_notifying() {
    let harness = harness_with_requests(&[42]).await;
    let group_posts = harness.channel.posts_to(GROUP).len();

    harness.press("rv:s:1").await.unwrap();
    harness.press("rv:d:1:deleted").await.unwrap();
    harness.press("rv:c:1:y").await.unwrap();

    assert!(harness.menu().is_none());
    assert_eq!(harness.channel.posts_to(GROUP).len(), group_posts);
    let record = harness
        .desk
        .registry()
        .get_history(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.disposition, Disposition::Deleted);
}

#[tokio::test]
async fn cancelled_confirm_returns_to_the_list() {
    let harness = harness_with_requests(&[42, 43]).await;
    harness.press("rv:s:2").await.unwrap();
    harness.press("rv:d:2:quota_exceeded").await.unwrap();
    harness.press("rv:c:2:n").await.unwrap();

    assert!(harness.menu_text().unwrap().starts_with("Pending tickets: 2"));
    assert_eq!(harness.desk.registry().list_pending().await.unwrap().len(), 2);
}

#[tokio::test]
async fn selecting_a_resolved_ticket_falls_back_to_the_list() {
    let harness = harness_with_requests(&[42]).await;
    harness
        .desk
        .registry()
        .resolve(TicketNumber(1), Disposition::Rejected, ADMIN, None)
        .await
        .unwrap();

    harness.press("rv:s:1").await.unwrap();
    let text = harness.menu_text().unwrap();
    assert!(text.starts_with(&texts::no_longer_pending(TicketNumber(1))));
}

// ---- Navigation ----

#[tokio::test]
async fn review_command_pages_through_the_queue() {
    let harness = TestHarness::builder().with_page_size(2).build().await.unwrap();
    for user in 10..15 {
        harness.say(user, "#request something").await.unwrap();
    }

    harness.admin_say("/review").await.unwrap();
    assert_eq!(harness.menu_text().unwrap(), "Pending tickets: 5 (page 1/3)");

    harness.press("rv:p:2").await.unwrap();
    assert_eq!(harness.menu_text().unwrap(), "Pending tickets: 5 (page 3/3)");

    harness.press("rv:x").await.unwrap();
    assert!(harness.menu().is_none());
}

#[tokio::test]
async fn reopening_review_replaces_the_old_menu() {
    let harness = harness_with_requests(&[42]).await;
    harness.admin_say("/review").await.unwrap();
    let first = harness.menu().unwrap();

    harness.admin_say("/review").await.unwrap();
    let second = harness.menu().unwrap();
    assert_ne!(first, second);
    assert!(harness.channel.deletes().contains(&first));
}

#[tokio::test]
async fn admin_chatter_outside_a_session_is_ignored() {
    let harness = harness_with_requests(&[42]).await;
    let handled = harness.admin_say("https://t.me/x").await.unwrap();
    assert_eq!(handled, Handled::Ignored);
    assert_eq!(harness.desk.registry().list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn non_admin_buttons_are_denied() {
    let harness = harness_with_requests(&[42]).await;
    let handled = harness.send(harness.callback(42, None, "rv:o")).await.unwrap();
    assert_eq!(handled, Handled::Denied);
    assert!(harness.desk.registry().get_pending(TicketNumber(1)).await.unwrap().is_some());
}

// ---- Session lifetime ----

#[tokio::test]
async fn idle_menu_expires_on_next_press() {
    let harness = harness_with_requests(&[42]).await;
    harness.admin_say("/review").await.unwrap();
    let menu = harness.menu().unwrap();

    harness.clock.advance(Duration::hours(2));
    harness
        .send(harness.callback(ADMIN, Some(menu), "rv:p:0"))
        .await
        .unwrap();

    let edit = harness.channel.last_edit_of(menu).unwrap();
    assert_eq!(edit.text, texts::menu_expired());
    assert!(harness.desk.registry().get_pending(TicketNumber(1)).await.unwrap().is_some());
}

#[tokio::test]
async fn sweep_drops_idle_sessions_and_their_menus() {
    let harness = harness_with_requests(&[42]).await;
    harness.admin_say("/review").await.unwrap();
    let menu = harness.menu().unwrap();

    assert_eq!(harness.desk.sweep().await.sessions, 0);
    harness.clock.advance(Duration::hours(2));
    let report = harness.desk.sweep().await;
    assert_eq!(report.sessions, 1);
    assert!(report.markers > 0);
    assert!(harness.channel.deletes().contains(&menu));
}

// ---- Delivery and failures ----

#[tokio::test]
async fn redelivered_update_runs_once() {
    let harness = TestHarness::builder().build().await.unwrap();
    let update = harness.request(42, "#request Solaris");

    assert!(matches!(
        harness.send(update.clone()).await.unwrap(),
        Handled::Admission(Decision::Admitted { .. })
    ));
    assert_eq!(harness.send(update).await.unwrap(), Handled::Duplicate);
    assert_eq!(harness.desk.registry().list_pending().await.unwrap().len(), 1);
    assert_eq!(harness.desk.quota().get(42).await.unwrap().count, 1);
}

#[tokio::test]
async fn channel_outage_does_not_lose_the_ticket() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.channel.fail_sends(true);

    let handled = harness.say(42, "#request Solaris").await.unwrap();
    assert_eq!(handled.admission_name(), Some("admitted"));
    let ticket = harness
        .desk
        .registry()
        .get_pending(TicketNumber(1))
        .await
        .unwrap()
        .unwrap();
    assert!(ticket.posted_message.is_none());
}

fn memory_desk() -> (Arc<Desk>, Arc<MemoryStorage>, Arc<MockChannel>) {
    let mut config = DeskConfig::default();
    config.bot.admins = vec![ADMIN];
    config.bot.admin_chat_id = Some(ADMIN_CHAT);
    let store = Arc::new(MemoryStorage::new());
    let channel = Arc::new(MockChannel::new());
    let clock = Arc::new(ManualClock::at(
        Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap(),
    ));
    let desk = Desk::new(&config, store.clone(), channel.clone(), clock).unwrap();
    (Arc::new(desk), store, channel)
}

fn group_request(event_id: &str, user_id: i64) -> ticketdesk_core::types::InboundUpdate {
    ticketdesk_core::types::InboundUpdate::Message(ticketdesk_core::types::InboundEvent {
        event_id: event_id.into(),
        source_group_id: GROUP,
        group_title: Some("Films".into()),
        thread_id: None,
        message_id: Some(10),
        user_id,
        display_name: format!("user{user_id}"),
        text: "#request Solaris".into(),
        is_admin_context: false,
    })
}

#[tokio::test]
async fn failed_ticket_write_refunds_and_asks_to_retry() {
    let (desk, store, channel) = memory_desk();
    store.fail_on("open_ticket");

    let result = desk.handle(group_request("e1", 42)).await;
    assert!(result.unwrap_err().is_transient());
    assert_eq!(channel.posts_to(GROUP).pop().unwrap().text, texts::try_again());
    assert_eq!(desk.quota().get(42).await.unwrap().count, 0);
    assert!(store.list_pending().await.unwrap().is_empty());

    store.clear_failures();
    let handled = desk.handle(group_request("e2", 42)).await.unwrap();
    assert_eq!(handled.admission_name(), Some("admitted"));
}

#[tokio::test]
async fn missing_admin_chat_is_a_config_error() {
    let config = DeskConfig::default();
    let clock = Arc::new(ManualClock::at(Utc::now()));
    let result = Desk::new(
        &config,
        Arc::new(MemoryStorage::new()),
        Arc::new(MockChannel::new()),
        clock,
    );
    assert!(matches!(
        result,
        Err(ticketdesk_core::DeskError::Config(_))
    ));
}

#[tokio::test]
async fn run_handles_updates_until_the_channel_closes() {
    let (desk, store, channel) = memory_desk();
    for (i, user) in [40, 41, 42].into_iter().enumerate() {
        channel.inject(group_request(&format!("r{i}"), user));
    }
    channel.close();

    desk.clone().run(CancellationToken::new()).await.unwrap();

    let mut numbers: Vec<i64> = store
        .list_pending()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.number.0)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, [1, 2, 3]);
}

#[tokio::test]
async fn run_stops_on_cancel() {
    let (desk, _, _) = memory_desk();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(desk.run(cancel.clone()));
    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
