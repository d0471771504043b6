// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort wrapper around the channel adapter.
//!
//! Failures are logged and swallowed: a notification that could not be
//! delivered never rolls back or blocks a committed store change.

use std::sync::Arc;

use ticketdesk_core::types::{Choice, OutboundMessage};
use ticketdesk_core::{ChannelAdapter, MessageHandle};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn ChannelAdapter>,
}

impl Notifier {
    pub fn new(channel: Arc<dyn ChannelAdapter>) -> Self {
        Self { channel }
    }

    /// Post a message; `None` if delivery failed.
    pub async fn post(&self, msg: OutboundMessage) -> Option<MessageHandle> {
        let chat_id = msg.chat_id;
        match self.channel.post(msg).await {
            Ok(handle) => {
                debug!(chat_id, message_id = handle.message_id, "message posted");
                Some(handle)
            }
            Err(e) => {
                warn!(chat_id, error = %e, "failed to post message");
                None
            }
        }
    }

    /// Edit a posted message; `false` if the edit failed.
    pub async fn edit(&self, handle: MessageHandle, text: &str, choices: Vec<Vec<Choice>>) -> bool {
        match self.channel.edit(handle, text, choices).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    chat_id = handle.chat_id,
                    message_id = handle.message_id,
                    error = %e,
                    "failed to edit message"
                );
                false
            }
        }
    }

    /// Edit `handle` if present, otherwise post `fallback` as a new message.
    ///
    /// Returns the handle that now shows the content.
    pub async fn edit_or_post(
        &self,
        handle: Option<MessageHandle>,
        fallback: OutboundMessage,
    ) -> Option<MessageHandle> {
        if let Some(handle) = handle
            && self
                .edit(handle, &fallback.text, fallback.choices.clone())
                .await
        {
            return Some(handle);
        }
        self.post(fallback).await
    }

    pub async fn delete(&self, handle: MessageHandle) -> bool {
        match self.channel.delete(handle).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    chat_id = handle.chat_id,
                    message_id = handle.message_id,
                    error = %e,
                    "failed to delete message"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ticketdesk_test_utils::MockChannel;

    use super::*;

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failures_are_logged_not_raised() {
        let channel = Arc::new(MockChannel::new());
        channel.fail_sends(true);
        let notifier = Notifier::new(channel.clone());

        assert!(notifier.post(OutboundMessage::text(5, "hi")).await.is_none());
        let handle = MessageHandle {
            chat_id: 5,
            message_id: 1,
        };
        assert!(!notifier.edit(handle, "x", Vec::new()).await);
        assert!(!notifier.delete(handle).await);
        assert!(logs_contain("failed to post message"));
    }

    #[tokio::test]
    async fn edit_or_post_falls_back_to_posting() {
        let channel = Arc::new(MockChannel::new());
        let notifier = Notifier::new(channel.clone());

        let posted = notifier
            .edit_or_post(None, OutboundMessage::text(5, "menu"))
            .await
            .unwrap();
        let edited = notifier
            .edit_or_post(Some(posted), OutboundMessage::text(5, "menu v2"))
            .await
            .unwrap();
        assert_eq!(posted, edited);
        assert_eq!(channel.posts().len(), 1);
        assert_eq!(channel.edits().len(), 1);
        assert_eq!(channel.edits()[0].text, "menu v2");
    }
}
