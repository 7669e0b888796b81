// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end client testing.
//!
//! `TestHarness` assembles a [`Client`] over a temp SQLite queue and a
//! [`MockTransport`] that already answers the config and session-start
//! endpoints.

use std::sync::Arc;
use std::time::Duration;

use questlog_client::{Client, LifecycleState, RequestOptions};
use questlog_config::QuestlogConfig;
use questlog_config::model::{ClientConfig, StorageConfig, ThrottleConfig};
use questlog_core::{Operation, QuestlogError, Response, endpoints};

use crate::mock_transport::MockTransport;

/// Game id used by every harness client.
pub const TEST_GAME_ID: &str = "TEST-GAME";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    throttle: ThrottleConfig,
    capacity: u64,
    session_id: String,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            // Slow ticks so tests drive dispatch explicitly.
            throttle: ThrottleConfig {
                interval_secs: 3_600,
                ..ThrottleConfig::default()
            },
            capacity: 1_000,
            session_id: "test-session".to_string(),
        }
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_min_batch(mut self, min_batch_size: u32) -> Self {
        self.throttle.min_batch_size = min_batch_size;
        self
    }

    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.throttle.interval_secs = interval_secs;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Session id the mock platform hands out on session start.
    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = session_id.to_string();
        self
    }

    /// Build the harness, creating the temp database and the client.
    pub async fn build(self) -> Result<TestHarness, QuestlogError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| QuestlogError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("questlog.db");

        let config = QuestlogConfig {
            client: ClientConfig {
                server_uri: "http://platform.test".to_string(),
                game_id: TEST_GAME_ID.to_string(),
                device_id: Some("test-device".to_string()),
                client_version: Some("0.0.1-test".to_string()),
                request_timeout_secs: 5,
                ..ClientConfig::default()
            },
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
                capacity: self.capacity,
            },
            throttle: self.throttle,
        };

        let transport = Arc::new(MockTransport::new());
        transport.on(endpoints::CONFIG, 200, "{}").await;
        let session_body = serde_json::json!({ "gameSessionId": self.session_id }).to_string();
        transport
            .on(endpoints::SESSION_START, 200, &session_body)
            .await;

        let client = Client::open(&config, transport.clone()).await?;
        Ok(TestHarness {
            client,
            transport,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A client wired to a mock platform and a temp queue.
pub struct TestHarness {
    /// The client under test.
    pub client: Client,
    /// The scripted platform.
    pub transport: Arc<MockTransport>,
    /// Configuration the client was opened with.
    pub config: QuestlogConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Poll the response channel until a response for `operation` arrives.
    ///
    /// Responses for other operations are discarded.
    pub async fn wait_for(&self, operation: Operation, timeout: Duration) -> Option<Response> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            while let Some(response) = self.client.poll_response() {
                if response.operation == operation {
                    return Some(response);
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    /// Connect and wait for the platform config to be applied.
    pub async fn connect(&self) -> Result<(), QuestlogError> {
        self.client.connect(RequestOptions::default())?;
        self.expect_ok(Operation::Connect).await?;
        Ok(())
    }

    /// Connect if needed, then open a session and wait for it to start.
    pub async fn start_session(&self) -> Result<(), QuestlogError> {
        if self.client.state() == LifecycleState::Disconnected {
            self.connect().await?;
        }
        self.client.start_session(RequestOptions::default())?;
        self.expect_ok(Operation::StartSession).await?;
        Ok(())
    }

    /// Shut the client down and open a fresh one over the same database,
    /// as a game restart would.
    pub async fn restart(&mut self) -> Result<(), QuestlogError> {
        self.client.shutdown().await?;
        self.client = Client::open(&self.config, self.transport.clone()).await?;
        Ok(())
    }

    async fn expect_ok(&self, operation: Operation) -> Result<Response, QuestlogError> {
        let response = self
            .wait_for(operation, Duration::from_secs(5))
            .await
            .ok_or_else(|| QuestlogError::Internal(format!("no response for {operation}")))?;
        if !response.is_ok() {
            return Err(QuestlogError::Internal(format!(
                "{operation} failed: {:?}",
                response.error
            )));
        }
        Ok(response)
    }
}
