// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for crash-safe outbound message delivery.

use std::time::Duration;

use questlog_core::types::{Message, MessageStatus, NewMessage, RetryPolicy, RowId};
use questlog_core::QuestlogError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};

const SELECT_COLUMNS: &str = "SELECT row_id, path, payload, content_type, core_callback_key,
        client_callback_key, status, attempts, created_at, updated_at
 FROM message_queue";

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The message was stored. `evicted` lists completed rows dropped to make room.
    Inserted { row_id: RowId, evicted: usize },
    /// The queue is full of pending/in-flight rows; nothing was changed.
    Full,
}

fn message_from_row(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let status: String = row.get(6)?;
    let status = status.parse::<MessageStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Message {
        row_id: row.get(0)?,
        path: row.get(1)?,
        payload: row.get(2)?,
        content_type: row.get(3)?,
        core_callback_key: row.get(4)?,
        client_callback_key: row.get(5)?,
        status,
        attempts: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Enqueue a new pending message, evicting the oldest completed rows when
/// the queue holds `capacity` rows or more.
pub async fn enqueue(
    db: &Database,
    capacity: u64,
    message: NewMessage,
) -> Result<EnqueueOutcome, QuestlogError> {
    let capacity = i64::try_from(capacity).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<EnqueueOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;

            let total: i64 =
                tx.query_row("SELECT COUNT(*) FROM message_queue", [], |row| row.get(0))?;
            let mut evicted = 0usize;
            let mut remaining = total;
            while remaining >= capacity {
                let victim: Option<i64> = tx
                    .query_row(
                        "SELECT row_id FROM message_queue
                         WHERE status IN ('sent', 'failed')
                         ORDER BY row_id ASC
                         LIMIT 1",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                match victim {
                    Some(row_id) => {
                        tx.execute(
                            "DELETE FROM message_queue WHERE row_id = ?1",
                            params![row_id],
                        )?;
                        evicted += 1;
                        remaining -= 1;
                    }
                    None => {
                        // Dropping the transaction rolls back any eviction above.
                        return Ok(EnqueueOutcome::Full);
                    }
                }
            }

            tx.execute(
                "INSERT INTO message_queue
                     (path, core_callback_key, client_callback_key, payload, content_type, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                params![
                    message.path,
                    message.core_callback_key,
                    message.client_callback_key,
                    message.payload,
                    message.content_type,
                ],
            )?;
            let row_id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(EnqueueOutcome::Inserted { row_id, evicted })
        })
        .await
        .map_err(map_tr_err)
}

/// Take up to `limit` pending messages, oldest first, and mark them `sending`.
///
/// Selection and status update happen in one transaction, so no message is
/// handed out twice.
pub async fn drain(db: &Database, limit: u32) -> Result<Vec<Message>, QuestlogError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let mut messages = {
                let mut stmt = tx.prepare(&format!(
                    "{SELECT_COLUMNS}
                     WHERE status = 'pending'
                     ORDER BY row_id ASC
                     LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![i64::from(limit)], message_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            for message in &mut messages {
                tx.execute(
                    "UPDATE message_queue SET status = 'sending',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE row_id = ?1",
                    params![message.row_id],
                )?;
                message.status = MessageStatus::Sending;
            }
            tx.commit()?;

            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a row to `status`.
///
/// Only legal transitions are applied (`sending -> sent|failed|pending`,
/// `failed -> pending`, `pending -> sending`); anything else, including an
/// unknown or evicted row, is a no-op. Returns whether a row changed.
pub async fn update_status(
    db: &Database,
    row_id: RowId,
    status: MessageStatus,
) -> Result<bool, QuestlogError> {
    let allowed_from: &'static str = match status {
        MessageStatus::Pending => "('sending', 'failed')",
        MessageStatus::Sending => "('pending')",
        MessageStatus::Sent | MessageStatus::Failed => "('sending')",
    };
    let bump = i64::from(status == MessageStatus::Failed);
    let status = status.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                &format!(
                    "UPDATE message_queue SET status = ?1, attempts = attempts + ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE row_id = ?3 AND status IN {allowed_from}"
                ),
                params![status, bump, row_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Count rows, optionally restricted to one status.
pub async fn count(db: &Database, status: Option<MessageStatus>) -> Result<u64, QuestlogError> {
    let status = status.map(|s| s.to_string());
    let total = db
        .connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            match status {
                Some(status) => conn.query_row(
                    "SELECT COUNT(*) FROM message_queue WHERE status = ?1",
                    params![status],
                    |row| row.get(0),
                ),
                None => conn.query_row("SELECT COUNT(*) FROM message_queue", [], |row| row.get(0)),
            }
        })
        .await
        .map_err(map_tr_err)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Fetch one row by id.
pub async fn get(db: &Database, row_id: RowId) -> Result<Option<Message>, QuestlogError> {
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE row_id = ?1"),
                params![row_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Reset every `sending` row to `pending`. Run once on open.
pub async fn recover_in_flight(db: &Database) -> Result<u64, QuestlogError> {
    db.connection()
        .call(|conn| -> Result<u64, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE message_queue SET status = 'pending',
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE status = 'sending'",
                [],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Re-queue failed rows as pending.
///
/// With [`RetryPolicy::FixedInterval`] every failed row is re-queued. With
/// [`RetryPolicy::Exponential`] a row waits `interval * 2^(attempts - 1)`
/// seconds since its failure, capped at `max_interval_secs`.
pub async fn requeue_failed(
    db: &Database,
    policy: RetryPolicy,
    interval: Duration,
) -> Result<u64, QuestlogError> {
    let base = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let changed = match policy {
                RetryPolicy::FixedInterval => conn.execute(
                    "UPDATE message_queue SET status = 'pending',
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE status = 'failed'",
                    [],
                )?,
                RetryPolicy::Exponential { max_interval_secs } => {
                    let cap = i64::try_from(max_interval_secs).unwrap_or(i64::MAX);
                    conn.execute(
                        "UPDATE message_queue SET status = 'pending',
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE status = 'failed'
                           AND CAST(strftime('%s', 'now') AS INTEGER)
                               - CAST(strftime('%s', updated_at) AS INTEGER)
                               >= min(?1 * (1 << min(max(attempts - 1, 0), 20)), ?2)",
                        params![base, cap],
                    )?
                }
            };
            Ok(changed as u64)
        })
        .await
        .map_err(map_tr_err)
}
