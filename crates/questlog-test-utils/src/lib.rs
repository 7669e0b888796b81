// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Questlog integration tests.
//!
//! Provides a scripted transport and a harness that wires a real client to
//! a temporary SQLite queue, for fast, deterministic tests without a
//! platform server.
//!
//! # Components
//!
//! - [`MockTransport`] - Scripted platform responses with request capture
//! - [`TestHarness`] - Client over a temp database and a mock transport

pub mod harness;
pub mod mock_transport;

pub use harness::TestHarness;
pub use mock_transport::MockTransport;
