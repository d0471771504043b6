// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ticketdesk serve` command implementation.
//!
//! Opens the SQLite store, connects the Telegram channel and runs the desk
//! until SIGTERM/SIGINT. The health endpoint runs alongside when enabled.

use std::sync::Arc;

use chrono_tz::Tz;
use ticketdesk_config::model::DeskConfig;
use ticketdesk_core::{ChannelAdapter, DeskError, PluginAdapter, StorageAdapter, SystemClock};
use ticketdesk_engine::{Desk, shutdown};
use ticketdesk_storage::SqliteStorage;
use ticketdesk_telegram::TelegramChannel;
use tracing::{error, info, warn};

use crate::health;

/// Runs the `ticketdesk serve` command.
pub async fn run_serve(config: DeskConfig) -> Result<(), DeskError> {
    init_tracing(&config.bot.log_level);

    info!(name = config.bot.name.as_str(), "starting ticketdesk serve");

    let admin_chat_id = config
        .bot
        .admin_chat_id
        .ok_or_else(|| DeskError::Config("bot.admin_chat_id is required to serve".into()))?;
    let tz = parse_timezone(&config.bot.timezone)?;

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };
    info!(path = config.storage.database_path.as_str(), "storage initialized");

    let channel = {
        let mut channel = TelegramChannel::new(&config.telegram, admin_chat_id)?;
        channel.connect().await?;
        Arc::new(channel)
    };

    let desk = Arc::new(Desk::new(
        &config,
        storage.clone(),
        channel.clone(),
        Arc::new(SystemClock::new(tz)),
    )?);

    let cancel = shutdown::install_signal_handler();

    let health_task = if config.health.enabled {
        let health_config = config.health.clone();
        let store: Arc<dyn StorageAdapter> = storage.clone();
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = health::serve(&health_config, store, cancel).await {
                error!(error = %e, "health endpoint stopped");
            }
        }))
    } else {
        info!("health endpoint disabled by configuration");
        None
    };

    let result = desk.run(cancel.clone()).await;

    // The desk may stop on its own when the channel closes.
    cancel.cancel();
    if let Some(task) = health_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "health task did not finish cleanly");
    }

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("ticketdesk serve shutdown complete");
    result
}

fn parse_timezone(name: &str) -> Result<Tz, DeskError> {
    name.parse::<Tz>()
        .map_err(|e| DeskError::Config(format!("invalid bot.timezone '{name}': {e}")))
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ticketdesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
