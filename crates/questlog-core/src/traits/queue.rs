// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent queue trait for outbound messages.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QuestlogError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Message, MessageStatus, NewMessage, RetryPolicy, RowId};

/// Durable, capacity-bounded, FIFO store of outbound messages.
///
/// Every mutating call is committed to stable storage before it returns.
#[async_trait]
pub trait QueueStore: PluginAdapter {
    /// Persist a new `Pending` message and return its row id.
    ///
    /// At capacity, the oldest `Sent`/`Failed` row is evicted first. Fails
    /// with [`QuestlogError::Capacity`] when no row can be evicted, leaving
    /// the queue unchanged.
    async fn enqueue(&self, message: NewMessage) -> Result<RowId, QuestlogError>;

    /// Take up to `limit` pending messages, oldest first, marking them
    /// `Sending` in the same transaction.
    async fn drain(&self, limit: u32) -> Result<Vec<Message>, QuestlogError>;

    /// Set the status of a row. Unknown rows are ignored. Moving a row to
    /// `Failed` increments its attempt counter.
    async fn update_status(&self, row_id: RowId, status: MessageStatus)
    -> Result<(), QuestlogError>;

    /// Count rows, optionally restricted to one status.
    async fn count(&self, status: Option<MessageStatus>) -> Result<u64, QuestlogError>;

    /// Fetch one row by id.
    async fn get(&self, row_id: RowId) -> Result<Option<Message>, QuestlogError>;

    /// Reset rows left `Sending` by an interrupted process back to `Pending`.
    async fn recover_in_flight(&self) -> Result<u64, QuestlogError>;

    /// Re-queue `Failed` rows as `Pending` according to `policy`.
    ///
    /// `interval` is the dispatch interval, the base delay for backoff.
    async fn requeue_failed(
        &self,
        policy: RetryPolicy,
        interval: Duration,
    ) -> Result<u64, QuestlogError>;
}
