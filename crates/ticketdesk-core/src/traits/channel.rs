// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for chat platform integrations.

use async_trait::async_trait;

use crate::error::DeskError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Choice, InboundUpdate, MessageHandle, OutboundMessage};

/// Adapter for the chat platform the desk talks through.
///
/// The desk never owns ticket state through a channel: posts, edits and
/// deletes are side effects whose failure must not undo a committed store
/// mutation.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Starts receiving updates from the platform.
    async fn connect(&mut self) -> Result<(), DeskError>;

    /// Posts a message and returns a handle for later edits.
    async fn post(&self, msg: OutboundMessage) -> Result<MessageHandle, DeskError>;

    /// Replaces the text (and choices) of a previously posted message.
    async fn edit(
        &self,
        handle: MessageHandle,
        text: &str,
        choices: Vec<Vec<Choice>>,
    ) -> Result<(), DeskError>;

    /// Deletes a previously posted message.
    async fn delete(&self, handle: MessageHandle) -> Result<(), DeskError>;

    /// Receives the next inbound update.
    async fn receive(&self) -> Result<InboundUpdate, DeskError>;
}
