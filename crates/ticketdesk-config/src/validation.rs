// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: non-zero limits, a parseable
//! timezone, and unique group bindings. All failures are collected.

use std::collections::HashSet;

use chrono_tz::Tz;

use crate::diagnostic::ConfigError;
use crate::model::DeskConfig;

/// Largest page the review menu will render.
pub const MAX_PAGE_SIZE: usize = 20;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &DeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.bot.timezone.parse::<Tz>().is_err() {
        errors.push(ConfigError::validation(format!(
            "bot.timezone `{}` is not an IANA timezone name",
            config.bot.timezone
        )));
    }

    if config.bot.admin_chat_id == Some(0) {
        errors.push(ConfigError::validation("bot.admin_chat_id must not be 0"));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.quota.daily_limit == 0 {
        errors.push(ConfigError::validation(
            "quota.daily_limit must be at least 1",
        ));
    }

    if config.quota.window_hours == 0 {
        errors.push(ConfigError::validation(
            "quota.window_hours must be at least 1",
        ));
    }

    if config.admission.request_tag.trim().is_empty() {
        errors.push(ConfigError::validation(
            "admission.request_tag must not be empty",
        ));
    }

    if config.admission.malformed_window_hours == 0 {
        errors.push(ConfigError::validation(
            "admission.malformed_window_hours must be at least 1",
        ));
    }

    if !(1..=MAX_PAGE_SIZE).contains(&config.review.page_size) {
        errors.push(ConfigError::validation(format!(
            "review.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
            config.review.page_size
        )));
    }

    if config.review.sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "review.sweep_interval_secs must be at least 1",
        ));
    }

    let mut seen = HashSet::new();
    for group in &config.groups {
        if !seen.insert(group.group_id) {
            errors.push(ConfigError::validation(format!(
                "duplicate group_id `{}` in [[groups]] array",
                group.group_id
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
