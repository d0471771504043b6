// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Telegram updates into channel-agnostic desk updates.
//!
//! Messages from bots, messages without text and button presses that cannot
//! be tied to a chat are dropped here, before they reach the desk.

use teloxide::types::{CallbackQuery, MaybeInaccessibleMessage, Message, Update};
use ticketdesk_core::MessageHandle;
use ticketdesk_core::types::{CallbackEvent, InboundEvent};

/// Stable id for duplicate suppression. Telegram re-sends an update with
/// the same `update_id` until it is confirmed.
pub fn event_id(update: &Update) -> String {
    format!("tg:{}", update.id.0)
}

/// Forum topic of `msg`, if it was posted inside one.
///
/// Outside forums `message_thread_id` may point at a reply chain, which is
/// not a topic.
pub fn topic_of(msg: &Message) -> Option<i32> {
    if msg.is_topic_message {
        msg.thread_id.map(|thread| thread.0.0)
    } else {
        None
    }
}

/// Converts a text (or captioned) message.
pub fn to_inbound_event(msg: &Message, event_id: String, admin_chat_id: i64) -> Option<InboundEvent> {
    let user = msg.from.as_ref()?;
    if user.is_bot {
        return None;
    }
    let text = msg.text().or_else(|| msg.caption())?;
    let user_id = i64::try_from(user.id.0).ok()?;
    let chat_id = msg.chat.id.0;

    Some(InboundEvent {
        event_id,
        source_group_id: chat_id,
        group_title: msg.chat.title().map(str::to_string),
        thread_id: topic_of(msg),
        message_id: Some(msg.id.0),
        user_id,
        display_name: user.full_name(),
        text: text.to_string(),
        is_admin_context: chat_id == admin_chat_id,
    })
}

/// Converts an inline button press.
///
/// Presses on inline-mode messages carry no chat and are dropped.
pub fn to_callback_event(query: &CallbackQuery, event_id: String) -> Option<CallbackEvent> {
    let data = query.data.clone()?;
    let message = query.message.as_ref()?;
    let user_id = i64::try_from(query.from.id.0).ok()?;
    let chat_id = message.chat().id.0;
    let thread_id = match message {
        MaybeInaccessibleMessage::Regular(msg) => topic_of(msg),
        MaybeInaccessibleMessage::Inaccessible(_) => None,
    };

    Some(CallbackEvent {
        event_id,
        user_id,
        chat_id,
        thread_id,
        message: Some(MessageHandle {
            chat_id,
            message_id: message.id().0,
        }),
        data,
    })
}
