// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Questlog SDK.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use questlog_core::types::{RemoteConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Top-level Questlog configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuestlogConfig {
    /// Server, game identity, and request settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Persistent message queue settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dispatch pacing and batching settings.
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

/// Client identity and request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Scheme and host of the analytics platform.
    #[serde(default = "default_server_uri")]
    pub server_uri: String,

    /// Identifier of the game, issued by the platform.
    #[serde(default)]
    pub game_id: String,

    /// Stable device identifier. A random one is generated when unset.
    #[serde(default)]
    pub device_id: Option<String>,

    /// Client name reported with telemetry.
    #[serde(default)]
    pub client_name: Option<String>,

    /// Client version reported with telemetry.
    #[serde(default)]
    pub client_version: Option<String>,

    /// Default timeout for each HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_uri: default_server_uri(),
            game_id: String::new(),
            device_id: None,
            client_name: None,
            client_version: None,
            request_timeout_secs: default_request_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

fn default_server_uri() -> String {
    "http://localhost:8001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Persistent queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Maximum number of rows kept in the message queue.
    #[serde(default = "default_capacity")]
    pub capacity: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            capacity: default_capacity(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("questlog").join("questlog.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "questlog.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

fn default_capacity() -> u64 {
    32_000
}

/// Dispatch throttling configuration.
///
/// A dispatch cycle runs every `interval_secs` and drains at most
/// `max_batch_size` messages, but only once `min_batch_size` are pending
/// (unless the flush is forced).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: u32,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,

    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Re-queue policy for failed messages.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
            priority: default_priority(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_min_batch_size() -> u32 {
    5
}

fn default_max_batch_size() -> u32 {
    100
}

fn default_priority() -> u32 {
    10
}

impl ThrottleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Merge server-provided settings over these ones.
    ///
    /// Returns the merged config and one message per remote value that was
    /// ignored because it would break `0 < min <= max` or a zero interval.
    pub fn merge_remote(&self, remote: &RemoteConfig) -> (ThrottleConfig, Vec<String>) {
        let mut merged = self.clone();
        let mut ignored = Vec::new();

        if let Some(period) = remote.events_period_secs {
            if period == 0 {
                ignored.push("eventsPeriodSecs must be positive".to_string());
            } else {
                merged.interval_secs = period;
            }
        }

        let min = remote.events_min_size.unwrap_or(merged.min_batch_size);
        let max = remote.events_max_size.unwrap_or(merged.max_batch_size);
        if max == 0 || min > max {
            ignored.push(format!(
                "eventsMinSize/eventsMaxSize ({min}/{max}) must satisfy min <= max and max > 0"
            ));
        } else {
            merged.min_batch_size = min;
            merged.max_batch_size = max;
        }

        (merged, ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_defaults_match_platform_defaults() {
        let throttle = ThrottleConfig::default();
        assert_eq!(throttle.interval_secs, 10);
        assert_eq!(throttle.min_batch_size, 5);
        assert_eq!(throttle.max_batch_size, 100);
        assert_eq!(throttle.priority, 10);
        assert_eq!(throttle.retry, RetryPolicy::FixedInterval);
        assert_eq!(StorageConfig::default().capacity, 32_000);
    }

    #[test]
    fn merge_remote_applies_valid_values() {
        let remote = RemoteConfig {
            events_period_secs: Some(30),
            events_min_size: Some(2),
            events_max_size: Some(20),
            events_detail_level: Some(3),
        };
        let (merged, ignored) = ThrottleConfig::default().merge_remote(&remote);
        assert!(ignored.is_empty());
        assert_eq!(merged.interval_secs, 30);
        assert_eq!(merged.min_batch_size, 2);
        assert_eq!(merged.max_batch_size, 20);
        assert_eq!(merged.priority, 10);
    }

    #[test]
    fn merge_remote_ignores_inverted_batch_bounds() {
        let remote = RemoteConfig {
            events_min_size: Some(50),
            events_max_size: Some(10),
            ..RemoteConfig::default()
        };
        let (merged, ignored) = ThrottleConfig::default().merge_remote(&remote);
        assert_eq!(ignored.len(), 1);
        assert_eq!(merged.min_batch_size, 5);
        assert_eq!(merged.max_batch_size, 100);
    }

    #[test]
    fn merge_remote_keeps_local_values_for_missing_fields() {
        let local = ThrottleConfig {
            interval_secs: 3,
            ..ThrottleConfig::default()
        };
        let (merged, ignored) = local.merge_remote(&RemoteConfig::default());
        assert!(ignored.is_empty());
        assert_eq!(merged, local);
    }

    #[test]
    fn retry_policy_deserializes_from_toml() {
        let throttle: ThrottleConfig = toml::from_str(
            r#"
retry = { kind = "exponential", max_interval_secs = 300 }
"#,
        )
        .unwrap();
        assert_eq!(
            throttle.retry,
            RetryPolicy::Exponential {
                max_interval_secs: 300
            }
        );
    }
}
