// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound rendering for the Telegram Bot API.
//!
//! Telegram rejects messages longer than 4096 characters and callback
//! payloads longer than 64 bytes. Texts are cut to fit; oversized payloads
//! are dropped from the keyboard with a warning rather than failing the
//! whole message.

use std::borrow::Cow;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use ticketdesk_core::types::{Choice, TextFormat};
use tracing::warn;

/// Longest message text Telegram accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Longest callback payload Telegram accepts, in bytes.
pub const MAX_CALLBACK_BYTES: usize = 64;

/// Cut `text` to [`MAX_MESSAGE_CHARS`], marking the cut with an ellipsis.
pub fn fit(text: &str) -> Cow<'_, str> {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return Cow::Borrowed(text);
    }
    let mut cut: String = text.chars().take(MAX_MESSAGE_CHARS - 1).collect();
    cut.push('…');
    Cow::Owned(cut)
}

pub fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some(ParseMode::Html),
    }
}

/// Inline keyboard for `choices`. An empty grid clears any existing keyboard.
pub fn keyboard(choices: Vec<Vec<Choice>>) -> InlineKeyboardMarkup {
    let rows = choices
        .into_iter()
        .map(|row| {
            row.into_iter()
                .filter(|choice| {
                    let fits = choice.data.len() <= MAX_CALLBACK_BYTES;
                    if !fits {
                        warn!(label = %choice.label, "callback payload too long, button dropped");
                    }
                    fits
                })
                .map(|choice| InlineKeyboardButton::callback(choice.label, choice.data))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert!(matches!(fit("hello"), Cow::Borrowed("hello")));
    }

    #[test]
    fn long_text_is_cut_to_the_limit() {
        let long = "é".repeat(MAX_MESSAGE_CHARS + 10);
        let cut = fit(&long);
        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn plain_text_has_no_parse_mode() {
        assert_eq!(parse_mode(TextFormat::Plain), None);
        assert_eq!(parse_mode(TextFormat::Html), Some(ParseMode::Html));
    }

    #[test]
    fn keyboard_keeps_rows_and_payloads() {
        let markup = keyboard(vec![
            vec![Choice::new("Accept", "rv:d:1:accepted"), Choice::new("Reject", "rv:d:1:rejected")],
            vec![Choice::new("Back", "rv:b")],
        ]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0][1].text, "Reject");
        assert!(matches!(
            &markup.inline_keyboard[1][0].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "rv:b"
        ));
    }

    #[test]
    fn oversized_payloads_are_dropped() {
        let markup = keyboard(vec![
            vec![Choice::new("Huge", "x".repeat(MAX_CALLBACK_BYTES + 1))],
            vec![Choice::new("Close", "rv:x")],
        ]);
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert_eq!(markup.inline_keyboard[0][0].text, "Close");
    }

    #[test]
    fn empty_grid_clears_the_keyboard() {
        assert!(keyboard(Vec::new()).inline_keyboard.is_empty());
    }
}
