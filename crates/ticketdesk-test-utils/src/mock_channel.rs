// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound updates
//! and captured posts, edits and deletes for assertion in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use ticketdesk_core::traits::adapter::PluginAdapter;
use ticketdesk_core::traits::channel::ChannelAdapter;
use ticketdesk_core::types::{
    AdapterType, Choice, HealthStatus, InboundUpdate, MessageHandle, OutboundMessage,
};
use ticketdesk_core::DeskError;

/// A captured call to [`ChannelAdapter::edit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub handle: MessageHandle,
    pub text: String,
    pub choices: Vec<Vec<Choice>>,
}

/// A posted message together with the handle it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub handle: MessageHandle,
    pub message: OutboundMessage,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mock messaging channel for testing.
///
/// - **inbound**: updates injected via `inject()` are returned by `receive()`;
///   after `close()` an empty queue yields a "channel closed" error
/// - **captured**: posts, edits and deletes are recorded in call order
pub struct MockChannel {
    inbound: Mutex<VecDeque<InboundUpdate>>,
    notify: Notify,
    closed: AtomicBool,
    failing: AtomicBool,
    next_id: AtomicI32,
    posts: Mutex<Vec<PostRecord>>,
    edits: Mutex<Vec<EditRecord>>,
    deletes: Mutex<Vec<MessageHandle>>,
}

impl MockChannel {
    /// Create a new mock channel with empty queues.
    pub fn new() -> Self {
        Self {
            inbound: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            next_id: AtomicI32::new(1),
            posts: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        }
    }

    /// Queue an update for the next `receive()`.
    pub fn inject(&self, update: InboundUpdate) {
        lock(&self.inbound).push_back(update);
        self.notify.notify_one();
    }

    /// Make `receive()` fail once the queue is drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// While set, every post, edit and delete fails with a channel error.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every successful post, in order.
    pub fn posts(&self) -> Vec<OutboundMessage> {
        lock(&self.posts)
            .iter()
            .map(|p| p.message.clone())
            .collect()
    }

    /// Posts with their assigned handles.
    pub fn post_records(&self) -> Vec<PostRecord> {
        lock(&self.posts).clone()
    }

    /// Posts sent to `chat_id`.
    pub fn posts_to(&self, chat_id: i64) -> Vec<OutboundMessage> {
        lock(&self.posts)
            .iter()
            .filter(|p| p.message.chat_id == chat_id)
            .map(|p| p.message.clone())
            .collect()
    }

    pub fn edits(&self) -> Vec<EditRecord> {
        lock(&self.edits).clone()
    }

    /// Latest edit applied to `handle`.
    pub fn last_edit_of(&self, handle: MessageHandle) -> Option<EditRecord> {
        lock(&self.edits)
            .iter()
            .rev()
            .find(|e| e.handle == handle)
            .cloned()
    }

    pub fn deletes(&self) -> Vec<MessageHandle> {
        lock(&self.deletes).clone()
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        lock(&self.posts).clear();
        lock(&self.edits).clear();
        lock(&self.deletes).clear();
    }

    fn check(&self, op: &str) -> Result<(), DeskError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeskError::Channel {
                message: format!("mock {op} failure"),
                source: None,
            });
        }
        Ok(())
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn connect(&mut self) -> Result<(), DeskError> {
        Ok(())
    }

    async fn post(&self, msg: OutboundMessage) -> Result<MessageHandle, DeskError> {
        self.check("post")?;
        let handle = MessageHandle {
            chat_id: msg.chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        lock(&self.posts).push(PostRecord {
            handle,
            message: msg,
        });
        Ok(handle)
    }

    async fn edit(
        &self,
        handle: MessageHandle,
        text: &str,
        choices: Vec<Vec<Choice>>,
    ) -> Result<(), DeskError> {
        self.check("edit")?;
        lock(&self.edits).push(EditRecord {
            handle,
            text: text.to_string(),
            choices,
        });
        Ok(())
    }

    async fn delete(&self, handle: MessageHandle) -> Result<(), DeskError> {
        self.check("delete")?;
        lock(&self.deletes).push(handle);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundUpdate, DeskError> {
        loop {
            let notified = self.notify.notified();
            if let Some(update) = lock(&self.inbound).pop_front() {
                return Ok(update);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(DeskError::Channel {
                    message: "channel closed".into(),
                    source: None,
                });
            }
            // Wait for notification that a new update was injected
            notified.await;
        }
    }
}
