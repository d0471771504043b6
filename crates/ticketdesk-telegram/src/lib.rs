// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for ticketdesk.
//!
//! Implements [`ChannelAdapter`] for the Telegram Bot API via teloxide:
//! long polling for messages and button presses, and posting, editing and
//! deleting messages with inline keyboards.

pub mod handler;
pub mod render;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ReplyParameters, ThreadId};
use ticketdesk_config::model::TelegramConfig;
use ticketdesk_core::error::DeskError;
use ticketdesk_core::traits::{ChannelAdapter, PluginAdapter};
use ticketdesk_core::types::{
    AdapterType, Choice, HealthStatus, InboundUpdate, MessageHandle, OutboundMessage,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Updates buffered between the poller and the desk.
const INBOUND_BUFFER: usize = 100;

/// Telegram channel adapter implementing [`ChannelAdapter`].
///
/// Connects via long polling and forwards group messages and inline button
/// presses to the desk. Messages in the admin chat are flagged as admin
/// context.
pub struct TelegramChannel {
    bot: Bot,
    admin_chat_id: i64,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundUpdate>>,
    inbound_tx: mpsc::Sender<InboundUpdate>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig, admin_chat_id: i64) -> Result<Self, DeskError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            DeskError::Config("telegram.bot_token is required for Telegram adapter".into())
        })?;

        if token.is_empty() {
            return Err(DeskError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        Ok(Self {
            bot: Bot::new(token),
            admin_chat_id,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn channel_error(action: &str, e: teloxide::RequestError) -> DeskError {
    DeskError::Channel {
        message: format!("failed to {action}: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn forward(tx: &mpsc::Sender<InboundUpdate>, update: InboundUpdate) {
    if tx.send(update).await.is_err() {
        warn!("inbound channel closed, dropping update");
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskError> {
        // Check if the bot token is valid by calling getMe.
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), DeskError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn connect(&mut self) -> Result<(), DeskError> {
        if self.polling_handle.is_some() {
            return Ok(()); // Already connected
        }

        let bot = self.bot.clone();
        let admin_chat_id = self.admin_chat_id;
        let message_tx = self.inbound_tx.clone();
        let callback_tx = self.inbound_tx.clone();

        info!(admin_chat_id, "starting Telegram long polling");

        let handle = tokio::spawn(async move {
            let schema = dptree::entry()
                .branch(Update::filter_message().endpoint(
                    move |update: Update, msg: Message| {
                        let tx = message_tx.clone();
                        async move {
                            let id = handler::event_id(&update);
                            match handler::to_inbound_event(&msg, id, admin_chat_id) {
                                Some(event) => forward(&tx, InboundUpdate::Message(event)).await,
                                None => debug!(
                                    chat_id = msg.chat.id.0,
                                    msg_id = msg.id.0,
                                    "ignoring message without text or from a bot"
                                ),
                            }
                            respond(())
                        }
                    },
                ))
                .branch(Update::filter_callback_query().endpoint(
                    move |bot: Bot, update: Update, query: CallbackQuery| {
                        let tx = callback_tx.clone();
                        async move {
                            // Stops the client-side spinner; the desk answers by editing the menu.
                            if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
                                debug!(error = %e, "failed to answer callback query");
                            }
                            let id = handler::event_id(&update);
                            match handler::to_callback_event(&query, id) {
                                Some(event) => forward(&tx, InboundUpdate::Callback(event)).await,
                                None => debug!("ignoring callback without chat or data"),
                            }
                            respond(())
                        }
                    },
                ));

            Dispatcher::builder(bot, schema)
                .default_handler(|_| async {}) // Silently ignore other update kinds
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn post(&self, msg: OutboundMessage) -> Result<MessageHandle, DeskError> {
        let chat_id = ChatId(msg.chat_id);
        let mut request = self
            .bot
            .send_message(chat_id, render::fit(&msg.text).into_owned());
        if let Some(thread_id) = msg.thread_id {
            request = request.message_thread_id(ThreadId(MessageId(thread_id)));
        }
        if let Some(reply_to) = msg.reply_to {
            request = request.reply_parameters(
                ReplyParameters::new(MessageId(reply_to)).allow_sending_without_reply(),
            );
        }
        if let Some(mode) = render::parse_mode(msg.format) {
            request = request.parse_mode(mode);
        }
        if !msg.choices.is_empty() {
            request = request.reply_markup(render::keyboard(msg.choices));
        }

        let sent = request.await.map_err(|e| {
            error!(chat_id = msg.chat_id, error = %e, "failed to send Telegram message");
            channel_error("send message", e)
        })?;

        Ok(MessageHandle {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn edit(
        &self,
        handle: MessageHandle,
        text: &str,
        choices: Vec<Vec<Choice>>,
    ) -> Result<(), DeskError> {
        let result = self
            .bot
            .edit_message_text(
                ChatId(handle.chat_id),
                MessageId(handle.message_id),
                render::fit(text).into_owned(),
            )
            .reply_markup(render::keyboard(choices))
            .await;

        match result {
            Ok(_) => Ok(()),
            // Same text pressed twice: nothing to change.
            Err(e) if e.to_string().contains("message is not modified") => Ok(()),
            Err(e) => Err(channel_error("edit message", e)),
        }
    }

    async fn delete(&self, handle: MessageHandle) -> Result<(), DeskError> {
        match self
            .bot
            .delete_message(ChatId(handle.chat_id), MessageId(handle.message_id))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("message to delete not found") => Ok(()),
            Err(e) => Err(channel_error("delete message", e)),
        }
    }

    async fn receive(&self) -> Result<InboundUpdate, DeskError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or_else(|| DeskError::Channel {
            message: "Telegram inbound channel closed".into(),
            source: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramChannel::new(&config(None), -1000).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramChannel::new(&config(Some("")), -1000).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        let channel =
            TelegramChannel::new(&config(Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11")), -1000);
        assert!(channel.is_ok());
    }

    #[test]
    fn plugin_adapter_metadata() {
        let channel = TelegramChannel::new(&config(Some("test:token")), -1000).unwrap();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.version(), semver::Version::new(0, 1, 0));
        assert_eq!(channel.adapter_type(), AdapterType::Channel);
    }

    #[tokio::test]
    async fn receive_yields_forwarded_updates() {
        let channel = TelegramChannel::new(&config(Some("test:token")), -1000).unwrap();
        let update = InboundUpdate::Callback(ticketdesk_core::types::CallbackEvent {
            event_id: "tg:1".into(),
            user_id: 1,
            chat_id: -1000,
            thread_id: None,
            message: None,
            data: "rv:o".into(),
        });
        forward(&channel.inbound_tx, update.clone()).await;
        assert_eq!(channel.receive().await.unwrap(), update);
    }
}
