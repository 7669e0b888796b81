// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading questlog.toml end to end.

use questlog_config::{ConfigError, ConfigSource, load, render};
use questlog_core::RetryPolicy;

fn inline(toml: &str) -> ConfigSource {
    ConfigSource::Inline(toml.to_string())
}

#[test]
fn full_config_round_trips_every_section() {
    let toml = r#"
[client]
server_uri = "https://analytics.example.org"
game_id = "AA-1"
device_id = "device-42"
client_name = "Mars Generation One"
client_version = "1.4.0"
request_timeout_secs = 15
log_level = "debug"

[storage]
database_path = "/tmp/questlog-test.db"
wal_mode = false
capacity = 500

[throttle]
interval_secs = 20
min_batch_size = 2
max_batch_size = 50
priority = 3
retry = { kind = "exponential", max_interval_secs = 300 }
"#;

    let config = load(&inline(toml)).expect("valid config");
    assert_eq!(config.client.server_uri, "https://analytics.example.org");
    assert_eq!(config.client.device_id.as_deref(), Some("device-42"));
    assert_eq!(config.client.client_name.as_deref(), Some("Mars Generation One"));
    assert_eq!(config.client.request_timeout_secs, 15);
    assert_eq!(config.client.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/questlog-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.capacity, 500);
    assert_eq!(config.throttle.interval_secs, 20);
    assert_eq!(config.throttle.min_batch_size, 2);
    assert_eq!(config.throttle.max_batch_size, 50);
    assert_eq!(config.throttle.priority, 3);
    assert_eq!(
        config.throttle.retry,
        RetryPolicy::Exponential {
            max_interval_secs: 300
        }
    );
}

#[test]
fn omitted_sections_take_platform_defaults() {
    let config = inline("").extract().expect("empty TOML is fine");
    assert_eq!(config.client.server_uri, "http://localhost:8001");
    assert!(config.client.game_id.is_empty());
    assert!(config.client.device_id.is_none());
    assert_eq!(config.client.request_timeout_secs, 30);
    assert!(config.storage.wal_mode);
    assert_eq!(config.storage.capacity, 32_000);
    assert_eq!(config.throttle.interval_secs, 10);
    assert_eq!(config.throttle.min_batch_size, 5);
    assert_eq!(config.throttle.max_batch_size, 100);
    assert_eq!(config.throttle.priority, 10);
    assert_eq!(config.throttle.retry, RetryPolicy::FixedInterval);
}

#[test]
fn misspelled_key_points_at_the_line() {
    let toml = "[client]\ngame_id = \"AA-1\"\n\n[throttle]\nmin_bach_size = 3\n";
    let errors = load(&inline(toml)).expect_err("unknown key");

    let [
        ConfigError::UnknownKey {
            key,
            section,
            suggestion,
            span,
            ..
        },
    ] = errors.as_slice()
    else {
        panic!("expected a single unknown key error, got {errors:?}");
    };
    assert_eq!(key, "min_bach_size");
    assert_eq!(section, "[throttle]");
    assert_eq!(suggestion.as_deref(), Some("min_batch_size"));
    let span = span.expect("inline text is searchable");
    assert_eq!(span.offset(), toml.find("min_bach_size").unwrap());
    assert_eq!(span.len(), "min_bach_size".len());

    let report = render(&errors);
    assert!(report.contains("did you mean `min_batch_size`?"));
}

#[test]
fn wrong_type_names_the_key() {
    let errors = load(&inline("[storage]\ncapacity = \"lots\"\n")).expect_err("string capacity");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::WrongType { key, .. } if key == "storage.capacity"
    )));
}

#[test]
fn semantic_problems_surface_after_parsing() {
    let errors = load(&inline("[client]\nserver_uri = \"https://x.org\"\n")).expect_err("no game id");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "`client.game_id` must not be empty");

    let config = load(&inline("[client]\ngame_id = \"AA-1\"\n")).expect("minimal config");
    assert_eq!(config.client.game_id, "AA-1");
}

#[test]
fn file_source_is_validated_like_inline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("questlog.toml");
    std::fs::write(&path, "[client]\ngame_id = \"FILE-1\"\n[storage]\ncapacity = 0\n").unwrap();

    let errors = load(&ConfigSource::File(path)).expect_err("zero capacity");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::Invalid { field, .. } if field == "storage.capacity"
    )));
}
