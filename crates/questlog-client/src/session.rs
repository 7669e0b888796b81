// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client session state and the connection lifecycle.
//!
//! [`SessionState`] is owned by the client and stamped onto every outgoing
//! request. It changes only when a login, session start, or session end
//! succeeds, or when the embedder calls one of the player setters.

use std::time::{Duration, Instant};

use serde::Deserialize;
use strum::Display;

use questlog_core::types::ApiStatus;
use questlog_core::{Operation, QuestlogError};

/// Connection lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// No platform configuration has been fetched.
    Disconnected,
    /// A config request is in flight.
    Connecting,
    /// Config applied; ready for login and session start.
    Connected,
    /// A game session is open and telemetry may be recorded.
    SessionActive,
    /// The last session was closed; a new one may be started.
    Ended,
}

impl LifecycleState {
    /// States in which platform requests other than `connect` are allowed.
    pub fn is_online(self) -> bool {
        matches!(self, Self::Connected | Self::SessionActive | Self::Ended)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionStartBody {
    game_session_id: String,
}

#[derive(Deserialize)]
struct UserBody {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Identity and session data stamped onto outgoing requests.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub lifecycle: LifecycleState,
    pub connect_uri: String,
    pub game_id: String,
    /// Per-game device identity (`<device>_<game>`).
    pub device_id: String,
    pub client_name: Option<String>,
    pub client_version: Option<String>,
    pub game_level: Option<u32>,
    pub cookie: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub player_handle: Option<String>,
    pub user_info: Option<serde_json::Value>,
    /// `eventsDetailLevel` from the platform config.
    pub detail_level: Option<u32>,
    pub last_status: Option<ApiStatus>,
    event_order: u64,
    session_started: Option<Instant>,
    time_played: Duration,
}

impl SessionState {
    pub fn new(connect_uri: String, game_id: String, device_id: &str) -> Self {
        Self {
            lifecycle: LifecycleState::Disconnected,
            connect_uri,
            device_id: format!("{device_id}_{game_id}"),
            game_id,
            client_name: None,
            client_version: None,
            game_level: None,
            cookie: None,
            session_id: None,
            user_id: None,
            player_handle: None,
            user_info: None,
            detail_level: None,
            last_status: None,
            event_order: 0,
            session_started: None,
            time_played: Duration::ZERO,
        }
    }

    /// Fail with `InvalidState` unless the lifecycle is one of `allowed`.
    pub fn require(
        &self,
        operation: Operation,
        allowed: &[LifecycleState],
    ) -> Result<(), QuestlogError> {
        if allowed.contains(&self.lifecycle) {
            Ok(())
        } else {
            Err(QuestlogError::InvalidState {
                operation: operation.to_string(),
                state: self.lifecycle.to_string(),
            })
        }
    }

    /// Store the cookie from a `Set-Cookie` header, keeping only the
    /// `name=value` pair.
    pub fn capture_cookie(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default().trim();
        if !pair.is_empty() {
            self.cookie = Some(pair.to_string());
        }
    }

    /// Apply the body of a successful response to the session.
    ///
    /// Only login, registration, logout, and session start carry state.
    pub fn apply_success(&mut self, operation: Operation, body: &str) -> Result<(), QuestlogError> {
        match operation {
            Operation::Login | Operation::RegisterStudent | Operation::RegisterInstructor => {
                let user: UserBody = parse_body(operation, body)?;
                if let Some(id) = user.id {
                    self.user_id = Some(match id {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    });
                }
            }
            Operation::Logout => {
                self.cookie = None;
                self.user_id = None;
            }
            Operation::StartSession => {
                let started: SessionStartBody = parse_body(operation, body)?;
                self.begin_session(started.game_session_id);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn begin_session(&mut self, session_id: String) {
        self.session_id = Some(session_id);
        self.lifecycle = LifecycleState::SessionActive;
        self.event_order = 0;
        self.session_started = Some(Instant::now());
    }

    /// Close the current session, folding its duration into the play time.
    pub fn finish_session(&mut self) {
        if let Some(started) = self.session_started.take() {
            self.time_played += started.elapsed();
        }
        self.session_id = None;
        self.event_order = 0;
        self.lifecycle = LifecycleState::Ended;
    }

    /// Next per-session event sequence number.
    pub fn next_event_order(&mut self) -> u64 {
        let order = self.event_order;
        self.event_order += 1;
        order
    }

    pub fn event_order(&self) -> u64 {
        self.event_order
    }

    /// Total play time across sessions, including the open one.
    pub fn total_time_played(&self) -> Duration {
        self.time_played
            + self
                .session_started
                .map(|started| started.elapsed())
                .unwrap_or_default()
    }
}

fn parse_body<T: for<'de> Deserialize<'de>>(
    operation: Operation,
    body: &str,
) -> Result<T, QuestlogError> {
    // Some endpoints answer with an empty body on success.
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|e| QuestlogError::MalformedResponse {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}
