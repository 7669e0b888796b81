// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Questlog SDK.
//!
//! Provides a WAL-mode SQLite message queue with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, capacity eviction,
//! and crash recovery of in-flight rows.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteQueue;
pub use database::Database;
pub use models::*;
