// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! reqwest-backed implementation of the [`Transport`] trait.
//!
//! Performs exactly one HTTP exchange per call. Retrying is the dispatch
//! scheduler's job, so this layer only classifies failures: timeouts become
//! [`QuestlogError::Timeout`], everything else that prevents a response
//! becomes [`QuestlogError::Transport`]. Any HTTP status, including 4xx and
//! 5xx, is returned as a [`TransportResponse`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderValue, SET_COOKIE};
use tracing::debug;

use questlog_core::types::{HttpMethod, TransportRequest, TransportResponse};
use questlog_core::{AdapterType, HealthStatus, PluginAdapter, QuestlogError, Transport};

/// HTTP transport for the analytics platform.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    ///
    /// `connect_timeout` bounds connection establishment; each request
    /// carries its own overall timeout.
    pub fn new(connect_timeout: Duration) -> Result<Self, QuestlogError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("questlog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QuestlogError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> QuestlogError {
    if err.is_timeout() {
        QuestlogError::Timeout { duration: timeout }
    } else {
        QuestlogError::Transport {
            message: format!("HTTP request failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

#[async_trait]
impl PluginAdapter for HttpTransport {
    fn name(&self) -> &str {
        "http"
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
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, QuestlogError> {
        let url = request.url();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };
        builder = builder.timeout(request.timeout);

        if let Some(cookie) = &request.cookie {
            let value = HeaderValue::from_str(cookie).map_err(|e| QuestlogError::Transport {
                message: format!("invalid cookie header value: {e}"),
                source: Some(Box::new(e)),
            })?;
            builder = builder.header(COOKIE, value);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(CONTENT_TYPE, request.content_type.as_str())
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(e, request.timeout))?;

        let status = response.status().as_u16();
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .text()
            .await
            .map_err(|e| map_send_error(e, request.timeout))?;

        debug!(method = %request.method, url = %url, status, "HTTP exchange complete");
        Ok(TransportResponse {
            status,
            body,
            set_cookie,
        })
    }
}
