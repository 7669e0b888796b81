// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Questlog SDK.

use thiserror::Error;

/// The primary error type used across all Questlog adapter traits and core operations.
#[derive(Debug, Error)]
pub enum QuestlogError {
    /// Configuration errors (invalid TOML, missing required fields, bad remote config).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Network-level failure: connection refused, reset, DNS, or a retryable
    /// server status (5xx, 429).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A transport call exceeded its timeout.
    #[error("request timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The message queue is full and holds no evictable row.
    #[error("message queue is full ({capacity} rows) and no row can be evicted")]
    Capacity { capacity: u64 },

    /// A response body could not be parsed.
    #[error("malformed response for {operation}: {message}")]
    MalformedResponse { operation: String, message: String },

    /// An operation was invoked in a lifecycle state that does not allow it.
    #[error("{operation} is not allowed while {state}")]
    InvalidState { operation: String, state: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl QuestlogError {
    /// Whether a queued message that hit this error should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
