// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks run after deserialization. Every problem is reported,
//! not just the first.

use crate::diagnostic::ConfigError;
use crate::model::QuestlogConfig;

#[derive(Default)]
struct Problems(Vec<ConfigError>);

impl Problems {
    fn require(&mut self, ok: bool, field: &str, reason: impl FnOnce() -> String) {
        if !ok {
            self.0.push(ConfigError::Invalid {
                field: field.to_string(),
                reason: reason(),
            });
        }
    }
}

pub fn validate_config(config: &QuestlogConfig) -> Result<(), Vec<ConfigError>> {
    let mut problems = Problems::default();
    let client = &config.client;
    let storage = &config.storage;
    let throttle = &config.throttle;

    let uri = client.server_uri.trim();
    problems.require(!uri.is_empty(), "client.server_uri", || "must not be empty".into());
    problems.require(
        uri.is_empty() || uri.starts_with("http://") || uri.starts_with("https://"),
        "client.server_uri",
        || format!("`{uri}` must start with http:// or https://"),
    );
    problems.require(!client.game_id.trim().is_empty(), "client.game_id", || {
        "must not be empty".into()
    });
    problems.require(
        client.request_timeout_secs > 0,
        "client.request_timeout_secs",
        || "must be positive".into(),
    );

    problems.require(
        !storage.database_path.trim().is_empty(),
        "storage.database_path",
        || "must not be empty".into(),
    );
    problems.require(storage.capacity > 0, "storage.capacity", || {
        "must be positive".into()
    });

    problems.require(throttle.interval_secs > 0, "throttle.interval_secs", || {
        "must be positive".into()
    });
    problems.require(throttle.max_batch_size > 0, "throttle.max_batch_size", || {
        "must be positive".into()
    });
    problems.require(
        throttle.min_batch_size <= throttle.max_batch_size,
        "throttle.min_batch_size",
        || {
            format!(
                "({}) must not exceed max_batch_size ({})",
                throttle.min_batch_size, throttle.max_batch_size
            )
        },
    );

    if problems.0.is_empty() {
        Ok(())
    } else {
        Err(problems.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_game() -> QuestlogConfig {
        let mut config = QuestlogConfig::default();
        config.client.game_id = "AA-1".to_string();
        config
    }

    fn fields(errors: &[ConfigError]) -> Vec<&str> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Invalid { field, .. } => Some(field.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn defaults_only_lack_a_game_id() {
        let errors = validate_config(&QuestlogConfig::default()).unwrap_err();
        assert_eq!(fields(&errors), ["client.game_id"]);
        assert!(validate_config(&with_game()).is_ok());
    }

    #[test]
    fn server_uri_needs_http_scheme() {
        let mut config = with_game();
        config.client.server_uri = "analytics.example.org".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "`client.server_uri` `analytics.example.org` must start with http:// or https://"
        );

        config.client.server_uri = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), ["client.server_uri"]);
    }

    #[test]
    fn inverted_batch_bounds_are_rejected() {
        let mut config = with_game();
        config.throttle.min_batch_size = 200;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), ["throttle.min_batch_size"]);
    }

    #[test]
    fn every_problem_is_collected() {
        let mut config = QuestlogConfig::default();
        config.storage.database_path = String::new();
        config.storage.capacity = 0;
        config.throttle.interval_secs = 0;
        config.throttle.max_batch_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            fields(&errors),
            [
                "client.game_id",
                "storage.database_path",
                "storage.capacity",
                "throttle.interval_secs",
                "throttle.max_batch_size",
                "throttle.min_batch_size",
            ]
        );
    }
}
