// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for ticketdesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level ticketdesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeskConfig {
    /// Bot identity, admins and the admin queue destination.
    #[serde(default)]
    pub bot: BotConfig,

    /// Telegram bot integration settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-user daily allowance.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Request recognition and malformed-request escalation.
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Admin review menu settings.
    #[serde(default)]
    pub review: ReviewConfig,

    /// Duplicate-delivery suppression.
    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    /// Liveness probe endpoint.
    #[serde(default)]
    pub health: HealthConfig,

    /// Request channel bindings, one per source group.
    #[serde(default)]
    pub groups: Vec<GroupBinding>,
}

impl DeskConfig {
    /// Returns the binding configured for `group_id`, if any.
    pub fn binding(&self, group_id: i64) -> Option<&GroupBinding> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }
}

/// Bot identity and administration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Display name used in logs and greetings.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// IANA timezone used to present times to users (e.g. `Europe/Berlin`).
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Telegram user ids with administrator rights.
    #[serde(default)]
    pub admins: Vec<i64>,

    /// Chat receiving the admin queue posts. Required by `serve`.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,

    /// Forum topic inside the admin chat, if the queue lives in one.
    #[serde(default)]
    pub admin_thread_id: Option<i32>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
            timezone: default_timezone(),
            admins: Vec::new(),
            admin_chat_id: None,
            admin_thread_id: None,
        }
    }
}

fn default_bot_name() -> String {
    "ticketdesk".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables Telegram integration.
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "ticketdesk.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Per-user request allowance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Admitted requests allowed per window for non-admins.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Length of the rolling window, measured from the last reset.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            window_hours: default_window_hours(),
        }
    }
}

fn default_daily_limit() -> u32 {
    2
}

fn default_window_hours() -> u32 {
    24
}

/// Request recognition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Tag a message must start with to count as a request.
    #[serde(default = "default_request_tag")]
    pub request_tag: String,

    /// Words that make a message look like a request attempt.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Window over which malformed attempts are counted.
    #[serde(default = "default_malformed_window_hours")]
    pub malformed_window_hours: u32,

    /// Attempts above this count within the window escalate the warning.
    #[serde(default = "default_malformed_escalation_threshold")]
    pub malformed_escalation_threshold: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            request_tag: default_request_tag(),
            keywords: default_keywords(),
            malformed_window_hours: default_malformed_window_hours(),
            malformed_escalation_threshold: default_malformed_escalation_threshold(),
        }
    }
}

fn default_request_tag() -> String {
    "#request".to_string()
}

fn default_keywords() -> Vec<String> {
    ["request", "please upload", "looking for", "does anyone have"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_malformed_window_hours() -> u32 {
    24
}

fn default_malformed_escalation_threshold() -> u32 {
    2
}

/// Admin review menu.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Tickets listed per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Idle time after which a review session is discarded.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// How often idle sessions and stale markers are swept.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            session_idle_secs: default_session_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_page_size() -> usize {
    5
}

fn default_session_idle_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Duplicate-delivery suppression.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdempotencyConfig {
    /// Markers older than this are evicted.
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            horizon_secs: default_horizon_secs(),
        }
    }
}

fn default_horizon_secs() -> u64 {
    3600
}

/// Liveness probe endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,

    #[serde(default = "default_health_host")]
    pub host: String,

    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_host() -> String {
    "127.0.0.1".to_string()
}

fn default_health_port() -> u16 {
    3031
}

/// Where requests from one source group must be posted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupBinding {
    pub group_id: i64,

    #[serde(default)]
    pub title: Option<String>,

    /// Forum topic accepting requests. `None` accepts the whole group.
    #[serde(default)]
    pub request_thread_id: Option<i32>,
}
