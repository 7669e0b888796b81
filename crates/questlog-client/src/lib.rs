// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Game-embedded client for the Questlog learning-analytics platform.
//!
//! The [`Client`] authenticates players, manages the session lifecycle, and
//! delivers telemetry through a durable SQLite queue that survives restarts
//! and network outages. Completed requests are polled from a
//! [`ResponseChannel`] at the game's own cadence.

pub mod callbacks;
pub mod channel;
pub mod client;
pub mod dispatcher;
pub mod http;
pub mod logging;
pub mod options;
pub mod scheduler;
pub mod session;
pub mod telemetry;

pub use callbacks::{CallbackRegistry, Completion, ForgetOnDrop, Handler};
pub use channel::ResponseChannel;
pub use client::Client;
pub use http::HttpTransport;
pub use logging::init_tracing;
pub use options::{QueuedRequest, Registration, RequestOptions};
pub use scheduler::DispatchScheduler;
pub use session::LifecycleState;
pub use telemetry::EventValue;
