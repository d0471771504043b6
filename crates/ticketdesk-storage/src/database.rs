// SPDX-FileCopyrightText: 2026 Ticketdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use ticketdesk_core::DeskError;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into DeskError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> DeskError {
    DeskError::Storage {
        source: Box::new(e),
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> DeskError {
    DeskError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the ticketdesk SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl Database {
    /// Open (creating if needed) the database at `path` in WAL mode.
    pub async fn open(path: &str) -> Result<Self, DeskError> {
        Self::open_with(path, true).await
    }

    /// Open the database, apply PRAGMAs and run pending migrations.
    ///
    /// Migrations run on a short-lived blocking connection before the
    /// long-lived writer is opened, so `path` must name a file.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, DeskError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| DeskError::Storage {
                source: Box::new(e),
            })?;
        }

        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), DeskError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(map_sqlite_err)?;
            apply_pragmas(&conn, wal_mode).map_err(map_sqlite_err)?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| DeskError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| DeskError::Storage {
                source: Box::new(e),
            })?;
        conn.call(move |conn| apply_pragmas(conn, wal_mode))
            .await
            .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// The single writer connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), DeskError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Run SQLite's integrity check; returns the problems it reports.
    pub async fn integrity_check(&self) -> Result<Vec<String>, DeskError> {
        self.conn
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("PRAGMA integrity_check")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let problems = rows
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .filter(|line| line != "ok")
                    .collect();
                Ok(problems)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}
