// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with scripted responses per
//! endpoint path and captures every request for assertion in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use questlog_core::types::{TransportRequest, TransportResponse};
use questlog_core::{AdapterType, HealthStatus, PluginAdapter, QuestlogError, Transport};

#[derive(Default)]
struct Script {
    /// Sticky response per path.
    routes: HashMap<String, TransportResponse>,
    /// One-shot responses consumed before the sticky one.
    queued: HashMap<String, VecDeque<TransportResponse>>,
    fail_next: usize,
    offline: bool,
    delay: Option<Duration>,
}

/// A mock platform endpoint for testing.
///
/// Requests to paths without a scripted response get `200 {}`. The query
/// string is ignored when matching a path.
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
    notify: Arc<Notify>,
}

fn route_of(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

fn reply(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        body: body.to_string(),
        set_cookie: None,
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            requests: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Answer every request to `path` with `status` and `body`.
    pub async fn on(&self, path: &str, status: u16, body: &str) {
        self.on_response(path, reply(status, body)).await;
    }

    /// Answer every request to `path` with a full response, e.g. one that
    /// sets a cookie.
    pub async fn on_response(&self, path: &str, response: TransportResponse) {
        self.script
            .lock()
            .await
            .routes
            .insert(path.to_string(), response);
    }

    /// Answer the next request to `path` once, ahead of the sticky response.
    pub async fn push_response(&self, path: &str, status: u16, body: &str) {
        self.script
            .lock()
            .await
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(reply(status, body));
    }

    /// Fail the next `n` requests with a transport error.
    pub async fn fail_next(&self, n: usize) {
        self.script.lock().await.fail_next = n;
    }

    /// Fail every request while offline.
    pub async fn set_offline(&self, offline: bool) {
        self.script.lock().await.offline = offline;
    }

    /// Delay every response, to keep requests in flight.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.script.lock().await.delay = delay;
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().await.clone()
    }

    /// Requests whose path (without query) equals `path`.
    pub async fn requests_for(&self, path: &str) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| route_of(&r.path) == path)
            .cloned()
            .collect()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn clear_requests(&self) {
        self.requests.lock().await.clear();
    }

    /// Wait until at least `n` requests to `path` arrived. Returns `false`
    /// on timeout.
    pub async fn wait_for(&self, path: &str, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.requests_for(path).await.len() >= n {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, QuestlogError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), QuestlogError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, QuestlogError> {
        let route = route_of(&request.path).to_string();
        self.requests.lock().await.push(request);
        self.notify.notify_waiters();

        let (outcome, delay) = {
            let mut script = self.script.lock().await;
            let outcome = if script.offline {
                Err("platform unreachable")
            } else if script.fail_next > 0 {
                script.fail_next -= 1;
                Err("connection reset")
            } else {
                let queued = script.queued.get_mut(&route).and_then(VecDeque::pop_front);
                Ok(queued
                    .or_else(|| script.routes.get(&route).cloned())
                    .unwrap_or_else(|| reply(200, "{}")))
            };
            (outcome, script.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome.map_err(|message| QuestlogError::Transport {
            message: message.to_string(),
            source: None,
        })
    }
}
