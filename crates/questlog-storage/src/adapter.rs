// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the QueueStore trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use questlog_config::model::StorageConfig;
use questlog_core::types::{Message, MessageStatus, NewMessage, RetryPolicy, RowId};
use questlog_core::{AdapterType, HealthStatus, PluginAdapter, QueueStore, QuestlogError};

use crate::database::{self, Database};
use crate::queries::queue::{self, EnqueueOutcome};

/// SQLite-backed persistent message queue.
///
/// Wraps a [`Database`] handle and delegates all operations to the typed
/// query module. The database is opened on [`SqliteQueue::initialize`],
/// which also returns rows left in flight by a previous process to pending.
pub struct SqliteQueue {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteQueue {
    /// Create a queue with the given configuration. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize a queue in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, QuestlogError> {
        let queue = Self::new(config);
        queue.initialize().await?;
        Ok(queue)
    }

    /// Open the database and recover interrupted deliveries.
    pub async fn initialize(&self) -> Result<(), QuestlogError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        let recovered = queue::recover_in_flight(&db).await?;
        self.db.set(db).map_err(|_| QuestlogError::Storage {
            source: "queue already initialized".into(),
        })?;
        if recovered > 0 {
            info!(recovered, "reset in-flight messages to pending after restart");
        }
        debug!(path = %self.config.database_path, "message queue initialized");
        Ok(())
    }

    /// Checkpoint the WAL so the database file is self-contained.
    pub async fn close(&self) -> Result<(), QuestlogError> {
        database::checkpoint(self.db()?.connection()).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    pub fn capacity(&self) -> u64 {
        self.config.capacity
    }

    fn db(&self) -> Result<&Database, QuestlogError> {
        self.db.get().ok_or_else(|| QuestlogError::Storage {
            source: "queue not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteQueue {
    fn name(&self) -> &str {
        "sqlite-queue"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Queue
    }

    async fn health_check(&self) -> Result<HealthStatus, QuestlogError> {
        let db = self.db()?;
        let total = queue::count(db, None).await?;
        if total >= self.config.capacity {
            return Ok(HealthStatus::Degraded(format!(
                "queue at capacity ({total}/{})",
                self.config.capacity
            )));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), QuestlogError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for SqliteQueue {
    async fn enqueue(&self, message: NewMessage) -> Result<RowId, QuestlogError> {
        let path = message.path.clone();
        match queue::enqueue(self.db()?, self.config.capacity, message).await? {
            EnqueueOutcome::Inserted { row_id, evicted } => {
                if evicted > 0 {
                    warn!(evicted, row_id, "queue full, evicted oldest completed rows");
                }
                debug!(row_id, path = %path, "message enqueued");
                Ok(row_id)
            }
            EnqueueOutcome::Full => {
                warn!(path = %path, capacity = self.config.capacity, "queue full, message rejected");
                Err(QuestlogError::Capacity {
                    capacity: self.config.capacity,
                })
            }
        }
    }

    async fn drain(&self, limit: u32) -> Result<Vec<Message>, QuestlogError> {
        queue::drain(self.db()?, limit).await
    }

    async fn update_status(
        &self,
        row_id: RowId,
        status: MessageStatus,
    ) -> Result<(), QuestlogError> {
        let changed = queue::update_status(self.db()?, row_id, status).await?;
        if !changed {
            debug!(row_id, %status, "status update ignored");
        }
        Ok(())
    }

    async fn count(&self, status: Option<MessageStatus>) -> Result<u64, QuestlogError> {
        queue::count(self.db()?, status).await
    }

    async fn get(&self, row_id: RowId) -> Result<Option<Message>, QuestlogError> {
        queue::get(self.db()?, row_id).await
    }

    async fn recover_in_flight(&self) -> Result<u64, QuestlogError> {
        queue::recover_in_flight(self.db()?).await
    }

    async fn requeue_failed(
        &self,
        policy: RetryPolicy,
        interval: Duration,
    ) -> Result<u64, QuestlogError> {
        queue::requeue_failed(self.db()?, policy, interval).await
    }
}
