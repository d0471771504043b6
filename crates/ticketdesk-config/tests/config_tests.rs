// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the ticketdesk configuration system.

use figment::providers::Serialized;
use figment::Figment;
use ticketdesk_config::diagnostic::ConfigError;
use ticketdesk_config::model::DeskConfig;
use ticketdesk_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r##"
[bot]
name = "film-desk"
log_level = "debug"
timezone = "Europe/Berlin"
admins = [11, 12]
admin_chat_id = -1009
admin_thread_id = 4

[telegram]
bot_token = "123:ABC"

[storage]
database_path = "/tmp/desk.db"
wal_mode = false

[quota]
daily_limit = 3
window_hours = 12

[admission]
request_tag = "#req"
keywords = ["need"]

[review]
page_size = 8

[health]
port = 9000

[[groups]]
group_id = -1001
title = "Films"
request_thread_id = 7

[[groups]]
group_id = -1002
"##;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.bot.name, "film-desk");
    assert_eq!(config.bot.admins, vec![11, 12]);
    assert_eq!(config.bot.admin_chat_id, Some(-1009));
    assert_eq!(config.bot.admin_thread_id, Some(4));
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:ABC"));
    assert!(!config.storage.wal_mode);
    assert_eq!(config.quota.daily_limit, 3);
    assert_eq!(config.quota.window_hours, 12);
    assert_eq!(config.admission.request_tag, "#req");
    assert_eq!(config.admission.keywords, vec!["need"]);
    assert_eq!(config.review.page_size, 8);
    assert_eq!(config.health.port, 9000);
    assert_eq!(config.groups.len(), 2);
    assert_eq!(config.binding(-1001).unwrap().request_thread_id, Some(7));
    assert_eq!(config.binding(-1002).unwrap().request_thread_id, None);
    assert!(config.binding(-1003).is_none());
}

#[test]
fn empty_config_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.bot.timezone, "UTC");
    assert_eq!(config.quota.daily_limit, 2);
    assert_eq!(config.quota.window_hours, 24);
    assert_eq!(config.admission.request_tag, "#request");
    assert_eq!(config.admission.malformed_escalation_threshold, 2);
    assert_eq!(config.review.page_size, 5);
    assert_eq!(config.review.session_idle_secs, 3600);
    assert_eq!(config.idempotency.horizon_secs, 3600);
    assert!(config.storage.wal_mode);
    assert!(config.telegram.bot_token.is_none());
    assert!(config.bot.admin_chat_id.is_none());
    assert!(config.groups.is_empty());
}

#[test]
fn unknown_key_is_rejected_with_suggestion() {
    let toml = r#"
[quota]
daly_limit = 5
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("unknown key error");
    assert_eq!(unknown.0, "daly_limit");
    assert_eq!(unknown.1.as_deref(), Some("daily_limit"));
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[agent]\nname = \"x\"\n").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("unknown field") || text.contains("agent"), "{text}");
}

#[test]
fn wrong_type_is_reported_as_invalid_type() {
    let errors = load_and_validate_str("[quota]\ndaily_limit = \"two\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("daily_limit"))),
        "{errors:?}"
    );
}

#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[bot]
timezone = "Nowhere/City"

[review]
page_size = 50
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2, "{errors:?}");
}

#[test]
fn later_layers_override_earlier_ones() {
    let config: DeskConfig = Figment::new()
        .merge(Serialized::defaults(DeskConfig::default()))
        .merge(("telegram.bot_token", "env-token"))
        .merge(("quota.daily_limit", 4))
        .extract()
        .expect("merged config");
    assert_eq!(config.telegram.bot_token.as_deref(), Some("env-token"));
    assert_eq!(config.quota.daily_limit, 4);
    assert_eq!(config.quota.window_hours, 24);
}

#[test]
fn diagnostics_render_with_code() {
    let errors = load_and_validate_str("[review]\npage_sise = 3\n").unwrap_err();
    let handler = miette::GraphicalReportHandler::new_themed(miette::GraphicalTheme::unicode_nocolor());
    let mut out = String::new();
    handler
        .render_report(&mut out, &errors[0] as &dyn miette::Diagnostic)
        .unwrap();
    assert!(out.contains("ticketdesk::config::unknown_key"), "{out}");
    assert!(out.contains("page_size"), "{out}");
}
