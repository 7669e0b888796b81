// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The queue's SQLite file: pragmas, schema, checkpoint on close.
//!
//! Every statement runs on tokio-rusqlite's single background thread, which
//! is what makes drain-then-update atomic per row. Open one `Database` per
//! file.

use std::path::Path;

use questlog_core::QuestlogError;
use tracing::debug;

use crate::migrations;

/// Handle to the queue database.
///
/// Wraps one `tokio_rusqlite::Connection`; cloning the connection shares the
/// same background thread.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, QuestlogError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode.
    ///
    /// `synchronous = FULL` is always set: a call that mutates the queue
    /// returns only after the change is on stable storage.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, QuestlogError> {
        let parent = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            std::fs::create_dir_all(parent).map_err(|e| QuestlogError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| QuestlogError::Storage {
                source: Box::new(e),
            })?;

        let migrated = conn
            .call(move |conn| -> Result<Result<usize, QuestlogError>, rusqlite::Error> {
                if wal_mode {
                    let mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    debug!(journal_mode = %mode, "journal mode set");
                }
                conn.pragma_update(None, "synchronous", "FULL")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?;
        let applied = migrated?;

        debug!(path, wal_mode, applied, "queue database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection. Query modules call through `call()`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), QuestlogError> {
        checkpoint(&self.conn).await?;
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Flush the WAL into the main database file.
pub async fn checkpoint(conn: &tokio_rusqlite::Connection) -> Result<(), QuestlogError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)
}

/// Map a tokio-rusqlite error into the SDK error type.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error<rusqlite::Error>) -> QuestlogError {
    QuestlogError::Storage {
        source: err.to_string().into(),
    }
}
