// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for stored queue rows.
//!
//! The canonical types live in `questlog-core::types` so the client can use
//! them across the `QueueStore` trait boundary. Re-exported here for
//! convenience within the storage crate.

pub use questlog_core::types::{Message, MessageStatus, NewMessage, RowId};
pub use crate::queries::queue::EnqueueOutcome;
