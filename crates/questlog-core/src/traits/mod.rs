// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pluggable collaborators of the client.
//!
//! Async adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod diagnostics;
pub mod queue;
pub mod transport;

pub use adapter::PluginAdapter;
pub use diagnostics::{DiagnosticSink, TracingSink};
pub use queue::QueueStore;
pub use transport::Transport;
