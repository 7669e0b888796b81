// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-call options and request bodies.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use questlog_core::{RequestKey, Response, RowId};

use crate::callbacks::Handler;
use crate::dispatcher::RequestTarget;

/// Recognized per-call options.
///
/// `base_uri` and `timeout` apply to immediate operations only; queued
/// messages are always sent to the connect URI with the default timeout.
#[derive(Default)]
pub struct RequestOptions {
    /// Invoked with the response when the request completes, unless cancelled.
    pub callback: Option<Handler>,
    /// Overrides the connect URI for this request.
    pub base_uri: Option<String>,
    /// Overrides the default request timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: impl FnOnce(&Response) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn into_parts(self) -> (Option<Handler>, RequestTarget) {
        (
            self.callback,
            RequestTarget {
                base_uri: self.base_uri,
                timeout: self.timeout,
            },
        )
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("callback", &self.callback.is_some())
            .field("base_uri", &self.base_uri)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Handle for a message accepted into the persistent queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRequest {
    /// Key to cancel the completion callback with.
    pub key: RequestKey,
    /// Queue row, for [`crate::Client::message_status`].
    pub row_id: RowId,
}

/// Account details for student or instructor registration.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct RegistrationBody<'a> {
    #[serde(flatten)]
    pub registration: &'a Registration,
    pub role: &'static str,
}

#[derive(Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseCode<'a> {
    pub course_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseId<'a> {
    pub course_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeviceBody<'a> {
    pub device_id: &'a str,
    pub game_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionStartBody<'a> {
    pub game_id: &'a str,
    pub device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_handle: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionEndBody {
    pub game_id: String,
    pub game_session_id: Option<String>,
    pub game_session_event_order: u64,
    pub device_id: String,
    pub total_time_played: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_body_adds_role() {
        let registration = Registration {
            username: "ada".into(),
            password: "pw".into(),
            first_name: "Ada".into(),
            last_name: "L".into(),
            email: None,
        };
        let json = serde_json::to_value(RegistrationBody {
            registration: &registration,
            role: "student",
        })
        .unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["role"], "student");
        assert!(json.get("email").is_none());
    }

    #[test]
    fn options_split_into_handler_and_target() {
        let (callback, target) = RequestOptions::new()
            .with_callback(|_| {})
            .with_timeout(Duration::from_secs(2))
            .into_parts();
        assert!(callback.is_some());
        assert_eq!(target.timeout, Some(Duration::from_secs(2)));
        assert!(target.base_uri.is_none());
    }
}
