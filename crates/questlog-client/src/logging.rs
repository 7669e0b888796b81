// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional tracing subscriber setup for embedders without their own.

use tracing_subscriber::EnvFilter;

use questlog_core::QuestlogError;

/// Install a global `fmt` subscriber at `log_level` for questlog crates.
///
/// `RUST_LOG` takes precedence when set. Fails if a global subscriber is
/// already installed.
pub fn init_tracing(log_level: &str) -> Result<(), QuestlogError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("questlog={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| QuestlogError::Internal(format!("failed to install tracing subscriber: {e}")))
}
