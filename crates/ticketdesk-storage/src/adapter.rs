// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use ticketdesk_config::model::StorageConfig;
use ticketdesk_core::traits::QuotaUpdate;
use ticketdesk_core::types::{
    GroupActivation, HistoryRecord, MessageHandle, NewTicket, PendingTicket, Resolution,
};
use ticketdesk_core::{
    AdapterType, DeskError, HealthStatus, PluginAdapter, QuotaRecord, StorageAdapter,
    TicketNumber,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, DeskError> {
        self.db.get().ok_or_else(|| DeskError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Run SQLite's integrity check against the open database.
    pub async fn integrity_check(&self) -> Result<Vec<String>, DeskError> {
        self.db()?.integrity_check().await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        let probe = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1 FROM ticket_sequence;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err);
        Ok(match probe {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), DeskError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), DeskError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| DeskError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), DeskError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn update_quota(
        &self,
        user_id: i64,
        update: QuotaUpdate,
    ) -> Result<Option<QuotaRecord>, DeskError> {
        queries::quota::update_quota(self.db()?, user_id, update).await
    }

    async fn next_ticket_number(&self) -> Result<TicketNumber, DeskError> {
        queries::tickets::next_ticket_number(self.db()?).await
    }

    async fn insert_pending(&self, ticket: &PendingTicket) -> Result<(), DeskError> {
        queries::tickets::insert_pending(self.db()?, ticket).await
    }

    async fn open_ticket(&self, new: NewTicket) -> Result<PendingTicket, DeskError> {
        queries::tickets::open_ticket(self.db()?, new).await
    }

    async fn get_pending(&self, number: TicketNumber) -> Result<Option<PendingTicket>, DeskError> {
        queries::tickets::get_pending(self.db()?, number).await
    }

    async fn list_pending(&self) -> Result<Vec<PendingTicket>, DeskError> {
        queries::tickets::list_pending(self.db()?).await
    }

    async fn set_posted_message(
        &self,
        number: TicketNumber,
        handle: MessageHandle,
    ) -> Result<(), DeskError> {
        queries::tickets::set_posted_message(self.db()?, number, handle).await
    }

    async fn set_priority(&self, number: TicketNumber, priority: bool) -> Result<bool, DeskError> {
        queries::tickets::set_priority(self.db()?, number, priority).await
    }

    async fn delete_pending(&self, number: TicketNumber) -> Result<bool, DeskError> {
        queries::tickets::delete_pending(self.db()?, number).await
    }

    async fn resolve_ticket(
        &self,
        number: TicketNumber,
        resolution: Resolution,
    ) -> Result<HistoryRecord, DeskError> {
        queries::tickets::resolve_ticket(self.db()?, number, resolution).await
    }

    async fn get_history(&self, number: TicketNumber) -> Result<Option<HistoryRecord>, DeskError> {
        queries::tickets::get_history(self.db()?, number).await
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<HistoryRecord>, DeskError> {
        queries::tickets::recent_history(self.db()?, limit).await
    }

    async fn get_group(&self, group_id: i64) -> Result<Option<GroupActivation>, DeskError> {
        queries::groups::get_group(self.db()?, group_id).await
    }

    async fn register_group(
        &self,
        group_id: i64,
        title: &str,
    ) -> Result<GroupActivation, DeskError> {
        queries::groups::register_group(self.db()?, group_id, title).await
    }

    async fn set_group_active(
        &self,
        group_id: i64,
        active: bool,
    ) -> Result<GroupActivation, DeskError> {
        queries::groups::set_group_active(self.db()?, group_id, active).await
    }

    async fn list_groups(&self) -> Result<Vec<GroupActivation>, DeskError> {
        queries::groups::list_groups(self.db()?).await
    }

    async fn record_malformed(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        window: Duration,
    ) -> Result<u32, DeskError> {
        queries::malformed::record_malformed(self.db()?, user_id, at, window).await
    }
}
