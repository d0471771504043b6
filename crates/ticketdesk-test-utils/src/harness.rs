// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete desk with a mock channel, a manual
//! clock and a temp SQLite database. Helpers build inbound updates with
//! fresh event ids so tests read as conversations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use ticketdesk_config::model::{DeskConfig, GroupBinding, StorageConfig};
use ticketdesk_core::types::{CallbackEvent, InboundEvent, InboundUpdate};
use ticketdesk_core::{DeskError, MessageHandle, StorageAdapter};
use ticketdesk_engine::sessions::SessionLookup;
use ticketdesk_engine::{Desk, Handled};
use ticketdesk_storage::SqliteStorage;

use crate::clock::ManualClock;
use crate::mock_channel::MockChannel;

/// Chat that receives the admin queue.
pub const ADMIN_CHAT: i64 = -1000;
/// The configured administrator.
pub const ADMIN: i64 = 1;
/// A bound request group.
pub const GROUP: i64 = -100;
/// The request topic inside [`GROUP`].
pub const REQUEST_THREAD: i32 = 7;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: DeskConfig,
    start: DateTime<Utc>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = DeskConfig::default();
        config.bot.admins = vec![ADMIN];
        config.bot.admin_chat_id = Some(ADMIN_CHAT);
        config.groups = vec![GroupBinding {
            group_id: GROUP,
            title: Some("Films".into()),
            request_thread_id: Some(REQUEST_THREAD),
        }];
        Self {
            config,
            start: Utc
                .with_ymd_and_hms(2026, 4, 2, 9, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    /// Replace the admin list.
    pub fn with_admins(mut self, admins: Vec<i64>) -> Self {
        self.config.bot.admins = admins;
        self
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.config.quota.daily_limit = limit;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.config.review.page_size = page_size;
        self
    }

    /// Add another group binding.
    pub fn with_group(mut self, binding: GroupBinding) -> Self {
        self.config.groups.push(binding);
        self
    }

    /// Start the manual clock at `start`.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Arbitrary config tweaks.
    pub fn configure(mut self, f: impl FnOnce(&mut DeskConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, DeskError> {
        // Create temp directory for SQLite
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| DeskError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;
        let channel = Arc::new(MockChannel::new());
        let clock = Arc::new(ManualClock::at(self.start));
        let desk = Arc::new(Desk::new(
            &config,
            storage.clone(),
            channel.clone(),
            clock.clone(),
        )?);

        Ok(TestHarness {
            desk,
            channel,
            clock,
            storage,
            config,
            next_event: AtomicU64::new(1),
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired desk over a temporary database.
pub struct TestHarness {
    pub desk: Arc<Desk>,
    pub channel: Arc<MockChannel>,
    pub clock: Arc<ManualClock>,
    pub storage: Arc<SqliteStorage>,
    pub config: DeskConfig,
    next_event: AtomicU64,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    fn next_seq(&self) -> u64 {
        self.next_event.fetch_add(1, Ordering::SeqCst)
    }

    fn event_id(&self) -> String {
        format!("evt-{}", self.next_seq())
    }

    /// A message from `user_id` in the request topic of [`GROUP`].
    pub fn request(&self, user_id: i64, text: &str) -> InboundUpdate {
        self.message_in(user_id, GROUP, Some(REQUEST_THREAD), text)
    }

    /// A message from `user_id` in an arbitrary non-admin chat and thread.
    pub fn message_in(
        &self,
        user_id: i64,
        group_id: i64,
        thread_id: Option<i32>,
        text: &str,
    ) -> InboundUpdate {
        let seq = self.next_seq();
        InboundUpdate::Message(InboundEvent {
            event_id: format!("evt-{seq}"),
            source_group_id: group_id,
            group_title: None,
            thread_id,
            message_id: i32::try_from(seq).ok(),
            user_id,
            display_name: format!("user{user_id}"),
            text: text.to_string(),
            is_admin_context: false,
        })
    }

    /// A message from `user_id` in the admin chat.
    pub fn admin_message(&self, user_id: i64, text: &str) -> InboundUpdate {
        InboundUpdate::Message(InboundEvent {
            event_id: self.event_id(),
            source_group_id: ADMIN_CHAT,
            group_title: Some("Admins".into()),
            thread_id: None,
            message_id: None,
            user_id,
            display_name: format!("admin{user_id}"),
            text: text.to_string(),
            is_admin_context: true,
        })
    }

    /// A button press by `user_id` on `message` in the admin chat.
    pub fn callback(
        &self,
        user_id: i64,
        message: Option<MessageHandle>,
        data: &str,
    ) -> InboundUpdate {
        InboundUpdate::Callback(CallbackEvent {
            event_id: self.event_id(),
            user_id,
            chat_id: ADMIN_CHAT,
            thread_id: None,
            message,
            data: data.to_string(),
        })
    }

    pub async fn send(&self, update: InboundUpdate) -> Result<Handled, DeskError> {
        self.desk.handle(update).await
    }

    /// `user_id` posts `text` in the request topic.
    pub async fn say(&self, user_id: i64, text: &str) -> Result<Handled, DeskError> {
        self.send(self.request(user_id, text)).await
    }

    /// [`ADMIN`] types `text` in the admin chat.
    pub async fn admin_say(&self, text: &str) -> Result<Handled, DeskError> {
        self.send(self.admin_message(ADMIN, text)).await
    }

    /// [`ADMIN`] presses `data` on the current review menu.
    pub async fn press(&self, data: &str) -> Result<Handled, DeskError> {
        let menu = self.menu();
        self.send(self.callback(ADMIN, menu, data)).await
    }

    /// The menu message of [`ADMIN`]'s live review session, if any.
    pub fn menu(&self) -> Option<MessageHandle> {
        match self.desk.sessions().lookup((ADMIN, ADMIN_CHAT)) {
            SessionLookup::Live(session) => session.menu,
            _ => None,
        }
    }

    /// Text currently shown in [`ADMIN`]'s review menu.
    pub fn menu_text(&self) -> Option<String> {
        let menu = self.menu()?;
        if let Some(edit) = self.channel.last_edit_of(menu) {
            return Some(edit.text);
        }
        self.channel
            .post_records()
            .into_iter()
            .find(|p| p.handle == menu)
            .map(|p| p.message.text)
    }

    /// Text of the last post in `chat_id`.
    pub fn last_post_in(&self, chat_id: i64) -> Option<String> {
        self.channel.posts_to(chat_id).pop().map(|m| m.text)
    }
}

#[cfg(test)]
mod tests {
    use ticketdesk_core::TicketNumber;
    use ticketdesk_engine::admission::Decision;

    use super::*;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.desk.registry().list_pending().await.unwrap().is_empty());
        assert_eq!(harness.config.bot.admin_chat_id, Some(ADMIN_CHAT));
    }

    #[tokio::test]
    async fn request_opens_ticket_and_posts_to_queue() {
        let harness = TestHarness::builder().build().await.unwrap();
        let handled = harness.say(42, "#request Solaris").await.unwrap();
        assert!(matches!(
            handled,
            Handled::Admission(Decision::Admitted { ref ticket, .. }) if ticket.number == TicketNumber(1)
        ));
        let queue = harness.channel.posts_to(ADMIN_CHAT);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].choices[0][0].data, "rv:s:1");
    }

    #[tokio::test]
    async fn event_ids_are_fresh() {
        let harness = TestHarness::builder().build().await.unwrap();
        let a = harness.request(42, "x");
        let b = harness.request(42, "x");
        assert_ne!(a.event_id(), b.event_id());
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();
        assert_ne!(
            h1.config.storage.database_path,
            h2.config.storage.database_path
        );
    }
}
