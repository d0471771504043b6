// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./ticketdesk.toml` > `~/.config/ticketdesk/ticketdesk.toml`
//! > `/etc/ticketdesk/ticketdesk.toml` with environment variable overrides via the
//! `TICKETDESK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::DeskConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ticketdesk/ticketdesk.toml`
/// 3. `~/.config/ticketdesk/ticketdesk.toml`
/// 4. `./ticketdesk.toml`
/// 5. `TICKETDESK_*` environment variables
pub fn load_config() -> Result<DeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DeskConfig::default()))
        .merge(Toml::file("/etc/ticketdesk/ticketdesk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("ticketdesk/ticketdesk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("ticketdesk.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TICKETDESK_TELEGRAM_BOT_TOKEN` must map to
/// `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("TICKETDESK_").map(|key| {
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

/// Maps a lowercased, prefix-stripped env key onto its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: &[&str] = &[
        "bot",
        "telegram",
        "storage",
        "quota",
        "admission",
        "review",
        "idempotency",
        "health",
    ];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(&format!("{section}_")) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
