// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ticketdesk doctor` command implementation.
//!
//! Runs diagnostic checks against the ticketdesk environment to find
//! configuration mistakes, schema problems and an unreachable health
//! endpoint before the bot is started. The database is only read, never
//! migrated.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use ticketdesk_config::model::DeskConfig;
use ticketdesk_core::DeskError;

/// Tables the desk expects after migrations.
const EXPECTED_TABLES: &[&str] = &[
    "group_activation",
    "history",
    "malformed_attempts",
    "pending_tickets",
    "quota",
    "ticket_sequence",
];

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `ticketdesk doctor` command.
///
/// Quick checks always run. `deep` adds integrity, disk and memory checks;
/// `plain` disables colored output.
pub async fn run_doctor(config: &DeskConfig, deep: bool, plain: bool) -> Result<(), DeskError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let db_path = config.storage.database_path.as_str();

    let mut results = vec![
        check_config().await,
        check_database(db_path).await,
        check_telegram_token(config),
        check_admin_chat(config),
        check_health_endpoint(config).await,
    ];

    if deep {
        results.push(check_db_integrity(db_path).await);
        results.push(check_disk_space(db_path).await);
        results.push(check_memory_baseline().await);
    }

    println!();
    println!("  ticketdesk doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Check configuration loads without errors.
async fn check_config() -> CheckResult {
    let start = Instant::now();
    match ticketdesk_config::load_and_validate() {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database opens and carries the desk schema.
async fn check_database(db_path: &str) -> CheckResult {
    const NAME: &str = "Database";
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new(
            NAME,
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => return CheckResult::new(NAME, CheckStatus::Fail, format!("open failed: {e}"), start),
    };

    let tables = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await;

    match tables {
        Ok(tables) => {
            let missing: Vec<&str> = EXPECTED_TABLES
                .iter()
                .copied()
                .filter(|expected| !tables.iter().any(|t| t == expected))
                .collect();
            if missing.is_empty() {
                CheckResult::new(NAME, CheckStatus::Pass, "connected, schema current", start)
            } else {
                CheckResult::new(
                    NAME,
                    CheckStatus::Warn,
                    format!("missing tables: {} (run serve to migrate)", missing.join(", ")),
                    start,
                )
            }
        }
        Err(e) => CheckResult::new(NAME, CheckStatus::Fail, format!("query failed: {e}"), start),
    }
}

fn check_telegram_token(config: &DeskConfig) -> CheckResult {
    let start = Instant::now();
    match config.telegram.bot_token.as_deref() {
        Some(token) if !token.trim().is_empty() => {
            CheckResult::new("Telegram token", CheckStatus::Pass, "configured", start)
        }
        _ => CheckResult::new(
            "Telegram token",
            CheckStatus::Fail,
            "telegram.bot_token is not set",
            start,
        ),
    }
}

fn check_admin_chat(config: &DeskConfig) -> CheckResult {
    let start = Instant::now();
    match config.bot.admin_chat_id {
        None => CheckResult::new(
            "Admin chat",
            CheckStatus::Fail,
            "bot.admin_chat_id is not set",
            start,
        ),
        Some(chat) if config.bot.admins.is_empty() => CheckResult::new(
            "Admin chat",
            CheckStatus::Warn,
            format!("{chat}, but bot.admins is empty"),
            start,
        ),
        Some(chat) => CheckResult::new(
            "Admin chat",
            CheckStatus::Pass,
            format!("{chat} ({} admin(s))", config.bot.admins.len()),
            start,
        ),
    }
}

/// Probe a running desk's health endpoint.
async fn check_health_endpoint(config: &DeskConfig) -> CheckResult {
    const NAME: &str = "Health endpoint";
    let start = Instant::now();

    if !config.health.enabled {
        return CheckResult::new(NAME, CheckStatus::Pass, "disabled", start);
    }

    let url = format!("http://{}:{}/health", config.health.host, config.health.port);
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult::new(NAME, CheckStatus::Fail, format!("HTTP client error: {e}"), start);
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            CheckResult::new(NAME, CheckStatus::Pass, "ready", start)
        }
        Ok(resp) => CheckResult::new(NAME, CheckStatus::Warn, format!("status {}", resp.status()), start),
        Err(_) => CheckResult::new(
            NAME,
            CheckStatus::Warn,
            format!("not reachable at {url} (desk may not be running)"),
            start,
        ),
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    const NAME: &str = "DB integrity";
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new(NAME, CheckStatus::Warn, "database not found (skipped)", start);
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => return CheckResult::new(NAME, CheckStatus::Fail, format!("open failed: {e}"), start),
    };

    let result = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new(NAME, CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            NAME,
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(NAME, CheckStatus::Fail, format!("check failed: {e}"), start),
    }
}

/// Deep check: database size, or that its directory is reachable.
async fn check_disk_space(db_path: &str) -> CheckResult {
    const NAME: &str = "Disk space";
    let start = Instant::now();
    let path = Path::new(db_path);

    if let Ok(meta) = std::fs::metadata(path) {
        let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
        return CheckResult::new(NAME, CheckStatus::Pass, format!("DB size: {size_mb:.1} MB"), start);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match std::fs::metadata(dir) {
        Ok(_) => CheckResult::new(NAME, CheckStatus::Pass, "directory accessible", start),
        Err(e) => CheckResult::new(NAME, CheckStatus::Warn, format!("cannot access: {e}"), start),
    }
}

/// Deep check: memory baseline via jemalloc.
async fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use ticketdesk_config::model::StorageConfig;
    use ticketdesk_core::StorageAdapter;
    use ticketdesk_storage::SqliteStorage;

    use super::*;

    fn config() -> DeskConfig {
        ticketdesk_config::load_and_validate_str("").unwrap()
    }

    async fn migrated_db(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("desk.db").to_string_lossy().into_owned();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: path.clone(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        storage.close().await.unwrap();
        path
    }

    #[tokio::test]
    async fn missing_database_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let result = check_database(path.to_str().unwrap()).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn unmigrated_database_reports_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        rusqlite::Connection::open(&path).unwrap();

        let result = check_database(path.to_str().unwrap()).await;
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("pending_tickets"));
    }

    #[tokio::test]
    async fn migrated_database_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = migrated_db(&dir).await;

        assert_eq!(check_database(&path).await.status, CheckStatus::Pass);
        assert_eq!(check_db_integrity(&path).await.status, CheckStatus::Pass);
        let disk = check_disk_space(&path).await;
        assert_eq!(disk.status, CheckStatus::Pass);
        assert!(disk.message.starts_with("DB size:"));
    }

    #[tokio::test]
    async fn integrity_of_missing_database_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let result = check_db_integrity(path.to_str().unwrap()).await;
        assert_eq!(result.status, CheckStatus::Warn);
    }

    #[test]
    fn token_must_be_present_and_non_blank() {
        let mut config = config();
        config.telegram.bot_token = None;
        assert_eq!(check_telegram_token(&config).status, CheckStatus::Fail);
        config.telegram.bot_token = Some("  ".into());
        assert_eq!(check_telegram_token(&config).status, CheckStatus::Fail);
        config.telegram.bot_token = Some("123:abc".into());
        assert_eq!(check_telegram_token(&config).status, CheckStatus::Pass);
    }

    #[test]
    fn admin_chat_without_admins_warns() {
        let mut config = config();
        config.bot.admin_chat_id = None;
        assert_eq!(check_admin_chat(&config).status, CheckStatus::Fail);

        config.bot.admin_chat_id = Some(-1000);
        config.bot.admins = Vec::new();
        assert_eq!(check_admin_chat(&config).status, CheckStatus::Warn);

        config.bot.admins = vec![1];
        let result = check_admin_chat(&config);
        assert_eq!(result.status, CheckStatus::Pass);
        assert!(result.message.contains("1 admin(s)"));
    }

    #[tokio::test]
    async fn disabled_health_endpoint_is_not_probed() {
        let mut config = config();
        config.health.enabled = false;
        let result = check_health_endpoint(&config).await;
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.message, "disabled");
    }

    #[test]
    fn plain_lines_carry_status_tags() {
        let result = CheckResult {
            name: "Database".into(),
            status: CheckStatus::Warn,
            message: "missing tables: quota".into(),
            duration: Duration::from_millis(3),
        };
        let line = render_line(&result, false);
        assert!(line.starts_with("    [WARN] Database"));
        assert!(line.ends_with("missing tables: quota (3ms)"));
    }

    #[tokio::test]
    async fn memory_baseline_reports() {
        let result = check_memory_baseline().await;
        assert!(result.status == CheckStatus::Pass || result.status == CheckStatus::Warn);
    }
}
