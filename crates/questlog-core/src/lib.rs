// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Questlog game analytics SDK.
//!
//! This crate provides the error type, the shared message/response types,
//! the fixed endpoint table, and the adapter traits that the storage and
//! client crates implement and consume.

pub mod endpoints;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::QuestlogError;
pub use types::{
    AdapterType, ApiStatus, HealthStatus, Message, MessageStatus, NewMessage, Operation,
    RequestKey, Response, RetryPolicy, RowId,
};

pub use traits::{DiagnosticSink, PluginAdapter, QueueStore, Transport, TracingSink};

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn message_status_round_trips_through_storage_text() {
        let variants = [
            MessageStatus::Pending,
            MessageStatus::Sending,
            MessageStatus::Sent,
            MessageStatus::Failed,
        ];
        for variant in variants {
            let text = variant.to_string();
            assert_eq!(text, variant.as_ref());
            assert_eq!(MessageStatus::from_str(&text).unwrap(), variant);
        }
        assert_eq!(MessageStatus::Sending.to_string(), "sending");
    }

    #[test]
    fn only_completed_rows_are_evictable() {
        assert!(MessageStatus::Sent.is_evictable());
        assert!(MessageStatus::Failed.is_evictable());
        assert!(!MessageStatus::Pending.is_evictable());
        assert!(!MessageStatus::Sending.is_evictable());
    }

    #[test]
    fn operations_map_to_fixed_paths() {
        assert_eq!(Operation::Connect.path(), "/api/v2/data/config");
        assert_eq!(Operation::Login.path(), "/api/user/login");
        assert_eq!(Operation::RegisterInstructor.path(), "/api/v2/auth/user/register");
        assert_eq!(Operation::SendTelemEvents.path(), "/api/v2/data/events");
        assert_eq!(Operation::GetSaveGame.path(), Operation::SaveGame.path());
        assert_eq!(Operation::GetCourses.method(), types::HttpMethod::Get);
        assert_eq!(Operation::Enroll.method(), types::HttpMethod::Post);
    }

    #[test]
    fn only_background_writes_are_queued() {
        assert!(Operation::SendTelemEvents.is_queued());
        assert!(Operation::SaveGame.is_queued());
        assert!(Operation::EndSession.is_queued());
        assert!(!Operation::Login.is_queued());
        assert!(!Operation::Connect.is_queued());
        assert!(!Operation::StartSession.is_queued());
    }

    #[test]
    fn new_message_records_operation_for_routing() {
        let key = RequestKey::new(Operation::SaveGame, None, 7);
        let msg = NewMessage::new(Operation::SaveGame, "{}").with_client_key(&key);
        assert_eq!(msg.path, "/api/v2/data/game");
        assert_eq!(msg.core_callback_key, "save_game");
        assert_eq!(msg.client_callback_key.as_deref(), Some("save_game:-:7"));
        assert_eq!(msg.content_type, None);
    }

    #[test]
    fn remote_config_parses_partial_payload() {
        let config: types::RemoteConfig =
            serde_json::from_str(r#"{"eventsPeriodSecs":30,"eventsMaxSize":50}"#).unwrap();
        assert_eq!(config.events_period_secs, Some(30));
        assert_eq!(config.events_max_size, Some(50));
        assert_eq!(config.events_min_size, None);
    }

    #[test]
    fn transport_request_url_joins_without_double_slash() {
        let req = types::TransportRequest {
            method: types::HttpMethod::Get,
            base_uri: "https://example.org/".into(),
            path: Operation::GetCourses.path().into(),
            body: None,
            content_type: endpoints::CONTENT_TYPE_JSON.into(),
            cookie: None,
            timeout: std::time::Duration::from_secs(1),
        };
        assert_eq!(req.url(), "https://example.org/api/v2/lms/courses");
    }

    #[test]
    fn request_key_remembers_its_operation() {
        let key = RequestKey::new(Operation::SaveGame, Some(12), 3);
        assert_eq!(key.as_str(), "save_game:12:3");
        assert_eq!(key.operation(), Some(Operation::SaveGame));
        assert_eq!(RequestKey::from("bogus".to_string()).operation(), None);
    }

    proptest! {
        #[test]
        fn request_keys_are_unique_per_sequence(a in 0u64..10_000, b in 0u64..10_000) {
            prop_assume!(a != b);
            let ka = RequestKey::new(Operation::Login, None, a);
            let kb = RequestKey::new(Operation::Login, None, b);
            prop_assert_ne!(ka, kb);
        }
    }
}
