// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the queue, the scheduler, and the client.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::endpoints;

/// Identifier of a row in the persistent message queue.
pub type RowId = i64;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter plugged into the client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Queue,
    Diagnostics,
}

// --- Queue types ---

/// Delivery status of a queued message.
///
/// Transitions: `Pending -> Sending -> {Sent, Failed}` and `Failed -> Pending`
/// when the retry policy re-queues a row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl MessageStatus {
    /// Rows in these states may be evicted when the queue is full.
    pub fn is_evictable(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// How failed queued messages are re-queued.
///
/// `FixedInterval` re-queues every failed row on the next dispatch cycle.
/// `Exponential` doubles the wait (starting at one dispatch interval) per
/// failed attempt, capped at `max_interval_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum RetryPolicy {
    #[default]
    FixedInterval,
    Exponential { max_interval_secs: u64 },
}

/// A message about to be enqueued. The queue assigns the row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub path: String,
    pub payload: String,
    /// `None` means `application/json`.
    pub content_type: Option<String>,
    /// Operation name that routes internal completion handling.
    pub core_callback_key: String,
    /// Request key of the caller's handler, if one was registered.
    pub client_callback_key: Option<String>,
}

impl NewMessage {
    /// Build a JSON message for the given operation.
    pub fn new(operation: Operation, payload: impl Into<String>) -> Self {
        Self {
            path: operation.path().to_string(),
            payload: payload.into(),
            content_type: None,
            core_callback_key: operation.to_string(),
            client_callback_key: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_client_key(mut self, key: &RequestKey) -> Self {
        self.client_callback_key = Some(key.as_str().to_string());
        self
    }
}

/// A persisted unit of outbound work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub row_id: RowId,
    pub path: String,
    pub payload: String,
    pub content_type: Option<String>,
    pub core_callback_key: String,
    pub client_callback_key: Option<String>,
    pub status: MessageStatus,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl Message {
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(endpoints::CONTENT_TYPE_JSON)
    }

    /// The operation recorded at enqueue time, if it is still known.
    pub fn operation(&self) -> Option<Operation> {
        self.core_callback_key.parse().ok()
    }
}

// --- Operations ---

/// HTTP method used for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// Every API operation the client can issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    DeviceUpdate,
    AuthStatus,
    RegisterStudent,
    RegisterInstructor,
    Login,
    Logout,
    Enroll,
    Unenroll,
    GetCourses,
    StartSession,
    EndSession,
    SaveGame,
    GetSaveGame,
    SavePlayerInfo,
    GetPlayerInfo,
    SendTelemEvents,
}

impl Operation {
    pub fn path(self) -> &'static str {
        match self {
            Self::Connect => endpoints::CONFIG,
            Self::DeviceUpdate => endpoints::DEVICE_UPDATE,
            Self::AuthStatus => endpoints::AUTH_STATUS,
            Self::RegisterStudent | Self::RegisterInstructor => endpoints::REGISTER,
            Self::Login => endpoints::LOGIN,
            Self::Logout => endpoints::LOGOUT,
            Self::Enroll => endpoints::ENROLL,
            Self::Unenroll => endpoints::UNENROLL,
            Self::GetCourses => endpoints::COURSES,
            Self::StartSession => endpoints::SESSION_START,
            Self::EndSession => endpoints::SESSION_END,
            Self::SaveGame | Self::GetSaveGame => endpoints::SAVE_GAME,
            Self::SavePlayerInfo | Self::GetPlayerInfo => endpoints::PLAYER_INFO,
            Self::SendTelemEvents => endpoints::EVENTS,
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            Self::Connect
            | Self::AuthStatus
            | Self::GetCourses
            | Self::GetSaveGame
            | Self::GetPlayerInfo => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Queued operations go through the persistent queue; the rest are
    /// dispatched immediately and are not persisted.
    pub fn is_queued(self) -> bool {
        matches!(
            self,
            Self::SendTelemEvents | Self::EndSession | Self::SaveGame | Self::SavePlayerInfo
        )
    }
}

/// Structured key under which a completion handler is registered.
///
/// Built from the operation, the queue row (if any), and a per-client
/// monotonic sequence, so two requests never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(operation: Operation, row_id: Option<RowId>, seq: u64) -> Self {
        match row_id {
            Some(row) => Self(format!("{operation}:{row}:{seq}")),
            None => Self(format!("{operation}:-:{seq}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The operation the key was issued for.
    pub fn operation(&self) -> Option<Operation> {
        self.0.split(':').next()?.parse().ok()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// --- Transport types ---

/// An HTTP request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Scheme and host, e.g. `https://analytics.example.org`.
    pub base_uri: String,
    pub path: String,
    pub body: Option<String>,
    pub content_type: String,
    pub cookie: Option<String>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_uri.trim_end_matches('/'), self.path)
    }
}

/// The transport's view of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Value of the `Set-Cookie` header, if the server sent one.
    pub set_cookie: Option<String>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-side conditions worth retrying for a queued message.
    pub fn is_retryable(&self) -> bool {
        self.status >= 500 || self.status == 429
    }
}

// --- Responses ---

/// Outcome of the last completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ApiStatus {
    Ok,
    Error,
}

/// A completed request, handed to the embedder through the response channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub operation: Operation,
    pub status: ApiStatus,
    /// `None` when no HTTP response was received.
    pub status_code: Option<u16>,
    pub body: String,
    pub row_id: Option<RowId>,
    pub request_key: Option<RequestKey>,
    pub error: Option<String>,
}

impl Response {
    pub fn ok(operation: Operation, status_code: u16, body: impl Into<String>) -> Self {
        Self {
            operation,
            status: ApiStatus::Ok,
            status_code: Some(status_code),
            body: body.into(),
            row_id: None,
            request_key: None,
            error: None,
        }
    }

    pub fn error(operation: Operation, error: impl Into<String>) -> Self {
        Self {
            operation,
            status: ApiStatus::Error,
            status_code: None,
            body: String::new(),
            row_id: None,
            request_key: None,
            error: Some(error.into()),
        }
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_row(mut self, row_id: RowId) -> Self {
        self.row_id = Some(row_id);
        self
    }

    pub fn with_key(mut self, key: Option<RequestKey>) -> Self {
        self.request_key = key;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ApiStatus::Ok
    }
}

/// Throttle settings served by the platform's config endpoint.
///
/// Every field is optional; missing values keep the local setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default)]
    pub events_period_secs: Option<u64>,
    #[serde(default)]
    pub events_min_size: Option<u32>,
    #[serde(default)]
    pub events_max_size: Option<u32>,
    #[serde(default)]
    pub events_detail_level: Option<u32>,
}
