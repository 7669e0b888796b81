// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end client tests against a scripted platform.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use questlog_client::{LifecycleState, RequestOptions};
use questlog_core::types::{ApiStatus, TransportResponse};
use questlog_core::{DiagnosticSink, MessageStatus, Operation, QuestlogError, endpoints};
use questlog_test_utils::TestHarness;

const WAIT: Duration = Duration::from_secs(5);

async fn queue_event(harness: &TestHarness, name: &str) {
    harness.client.add_telem_event_value("score", 10i64);
    harness.client.save_telem_event(name).unwrap();
    harness
        .client
        .send_telem_events(RequestOptions::default())
        .await
        .unwrap()
        .expect("one event was saved");
}

#[derive(Clone, Default)]
struct RecordingSink {
    errors: Arc<Mutex<Vec<String>>>,
}

impl DiagnosticSink for RecordingSink {
    fn warning(&self, _location: &str, _message: &str) {}

    fn error(&self, location: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .push(format!("{location}: {message}"));
    }
}

#[tokio::test]
async fn telemetry_before_session_is_rejected_without_network() {
    let harness = TestHarness::builder().build().await.unwrap();

    let err = harness.client.save_telem_event("jump").unwrap_err();
    assert!(matches!(err, QuestlogError::InvalidState { .. }));
    let err = harness
        .client
        .send_telem_events(RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QuestlogError::InvalidState { .. }));
    assert!(harness.client.end_session(RequestOptions::default()).await.is_err());

    assert_eq!(harness.transport.request_count().await, 0);
}

#[tokio::test]
async fn login_requires_connection() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .client
        .login("ada", "secret", RequestOptions::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "login is not allowed while disconnected");
}

#[tokio::test]
async fn four_events_wait_and_fifth_releases_batch_of_five() {
    let harness = TestHarness::builder().with_min_batch(5).build().await.unwrap();
    harness.start_session().await.unwrap();

    for i in 0..4 {
        queue_event(&harness, &format!("event-{i}")).await;
    }
    assert_eq!(harness.client.scheduler().run_cycle(false).await.unwrap(), 0);
    assert!(harness.transport.requests_for(endpoints::EVENTS).await.is_empty());

    queue_event(&harness, "event-4").await;
    assert_eq!(harness.client.scheduler().run_cycle(false).await.unwrap(), 5);

    let sent = harness.transport.requests_for(endpoints::EVENTS).await;
    assert_eq!(sent.len(), 5);
    for (i, request) in sent.iter().enumerate() {
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body[0]["eventName"], format!("event-{i}"));
        assert_eq!(body[0]["gameSessionEventOrder"], i as u64);
        assert_eq!(body[0]["gameSessionId"], "test-session");
    }
    assert_eq!(harness.client.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn end_session_forces_delivery_below_min_batch() {
    let harness = TestHarness::builder().with_min_batch(5).build().await.unwrap();
    harness.start_session().await.unwrap();

    for i in 0..3 {
        queue_event(&harness, &format!("e{i}")).await;
    }
    harness.client.save_telem_event("unsent").unwrap();
    let end = harness
        .client
        .end_session(RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(harness.client.state(), LifecycleState::Ended);
    assert!(harness.client.session_id().is_none());

    // 3 queued batches plus the one packaged by end_session.
    assert!(harness.transport.wait_for(endpoints::EVENTS, 4, WAIT).await);
    assert!(harness.transport.wait_for(endpoints::SESSION_END, 1, WAIT).await);

    let requests = harness.transport.requests().await;
    let end_index = requests
        .iter()
        .position(|r| r.path == endpoints::SESSION_END)
        .unwrap();
    let last_event_index = requests
        .iter()
        .rposition(|r| r.path == endpoints::EVENTS)
        .unwrap();
    assert!(last_event_index < end_index);

    let response = harness.wait_for(Operation::EndSession, WAIT).await.unwrap();
    assert!(response.is_ok());
    assert_eq!(response.row_id, Some(end.row_id));
    assert_eq!(response.request_key, Some(end.key));
    assert_eq!(
        harness.client.message_status(end.row_id).await.unwrap(),
        Some(MessageStatus::Sent)
    );
}

#[tokio::test]
async fn failed_delivery_is_retried_until_platform_recovers() {
    let harness = TestHarness::builder().with_min_batch(1).build().await.unwrap();
    harness.start_session().await.unwrap();
    harness.transport.set_offline(true).await;

    harness.client.save_telem_event("offline").unwrap();
    let queued = harness
        .client
        .send_telem_events(RequestOptions::default())
        .await
        .unwrap()
        .unwrap();

    for _ in 0..3 {
        assert_eq!(harness.client.flush().await.unwrap(), 1);
        assert_eq!(
            harness.client.message_status(queued.row_id).await.unwrap(),
            Some(MessageStatus::Failed)
        );
    }

    harness.transport.set_offline(false).await;
    assert_eq!(harness.client.flush().await.unwrap(), 1);
    assert_eq!(
        harness.client.message_status(queued.row_id).await.unwrap(),
        Some(MessageStatus::Sent)
    );
    assert_eq!(harness.transport.requests_for(endpoints::EVENTS).await.len(), 4);
}

#[tokio::test]
async fn restart_redelivers_messages_interrupted_in_flight() {
    let mut harness = TestHarness::builder().with_min_batch(1).build().await.unwrap();
    harness.start_session().await.unwrap();
    queue_event(&harness, "a").await;
    queue_event(&harness, "b").await;

    // Both rows are drained and then the process "dies" mid-request.
    harness.transport.set_delay(Some(Duration::from_secs(30))).await;
    let interrupted = tokio::time::timeout(Duration::from_millis(200), harness.client.flush()).await;
    assert!(interrupted.is_err());
    assert_eq!(harness.client.pending_count().await.unwrap(), 0);

    harness.transport.set_delay(None).await;
    harness.restart().await.unwrap();
    assert_eq!(harness.client.pending_count().await.unwrap(), 2);

    assert_eq!(harness.client.flush().await.unwrap(), 2);
    assert_eq!(harness.client.pending_count().await.unwrap(), 0);
    // At-least-once: the interrupted attempts were recorded too.
    assert_eq!(harness.transport.requests_for(endpoints::EVENTS).await.len(), 4);
}

#[tokio::test]
async fn full_queue_rejects_and_keeps_events() {
    let harness = TestHarness::builder()
        .with_min_batch(100)
        .with_capacity(2)
        .build()
        .await
        .unwrap();
    harness.start_session().await.unwrap();
    queue_event(&harness, "one").await;
    queue_event(&harness, "two").await;

    harness.client.save_telem_event("three").unwrap();
    let err = harness
        .client
        .send_telem_events(RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QuestlogError::Capacity { capacity: 2 }));
    assert_eq!(harness.client.pending_telem_events(), 1);
}

#[tokio::test]
async fn end_session_on_full_queue_keeps_session_and_events() {
    let harness = TestHarness::builder()
        .with_min_batch(100)
        .with_capacity(2)
        .build()
        .await
        .unwrap();
    harness.start_session().await.unwrap();
    queue_event(&harness, "one").await;
    queue_event(&harness, "two").await;

    harness.client.save_telem_event("three").unwrap();
    let err = harness
        .client
        .end_session(RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QuestlogError::Capacity { capacity: 2 }));
    assert_eq!(harness.client.state(), LifecycleState::SessionActive);
    assert_eq!(harness.client.pending_telem_events(), 1);
    assert_eq!(harness.client.session_id().as_deref(), Some("test-session"));

    // Delivered rows become evictable, so the retry fits.
    assert_eq!(harness.client.flush().await.unwrap(), 2);
    harness.client.end_session(RequestOptions::default()).await.unwrap();
    assert_eq!(harness.client.state(), LifecycleState::Ended);
    assert_eq!(harness.client.pending_telem_events(), 0);

    harness.wait_for(Operation::EndSession, WAIT).await.unwrap();
    let batches = harness.transport.requests_for(endpoints::EVENTS).await;
    let last: serde_json::Value =
        serde_json::from_str(batches.last().unwrap().body.as_deref().unwrap()).unwrap();
    assert_eq!(last[0]["eventName"], "three");
}

#[tokio::test]
async fn cancelled_request_never_reaches_callback_or_channel() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.connect().await.unwrap();
    harness
        .transport
        .set_delay(Some(Duration::from_millis(200)))
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let key = harness
        .client
        .get_courses(RequestOptions::new().with_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    assert!(harness.client.cancel_request(&key));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(harness.client.poll_response().is_none());
    assert!(!harness.client.cancel_request(&key));
}

#[tokio::test]
async fn cancelling_connect_returns_to_disconnected() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.transport.set_delay(Some(Duration::from_secs(5))).await;

    let key = harness.client.connect(RequestOptions::default()).unwrap();
    assert_eq!(harness.client.state(), LifecycleState::Connecting);
    assert!(harness.client.cancel_request(&key));
    assert_eq!(harness.client.state(), LifecycleState::Disconnected);
}

#[tokio::test]
async fn callback_and_channel_both_see_completed_response() {
    let harness = TestHarness::builder().build().await.unwrap();
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);

    let key = harness
        .client
        .connect(RequestOptions::new().with_callback(move |response| {
            *slot.lock().unwrap() = Some(response.status);
        }))
        .unwrap();

    let response = harness.wait_for(Operation::Connect, WAIT).await.unwrap();
    assert_eq!(response.request_key, Some(key));
    assert_eq!(*seen.lock().unwrap(), Some(ApiStatus::Ok));
    assert_eq!(harness.client.state(), LifecycleState::Connected);
    assert_eq!(harness.client.last_status(), Some(ApiStatus::Ok));
}

#[tokio::test]
async fn connect_applies_platform_throttle_settings() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .transport
        .on(
            endpoints::CONFIG,
            200,
            r#"{"eventsPeriodSecs":15,"eventsMinSize":2,"eventsMaxSize":40,"eventsDetailLevel":1}"#,
        )
        .await;
    harness.connect().await.unwrap();

    let throttle = harness.client.throttle();
    assert_eq!(throttle.interval_secs, 15);
    assert_eq!(throttle.min_batch_size, 2);
    assert_eq!(throttle.max_batch_size, 40);
    assert_eq!(harness.client.detail_level(), Some(1));

    let config_request = &harness.transport.requests_for(endpoints::CONFIG).await[0];
    assert_eq!(config_request.path, format!("{}?gameId=TEST-GAME", endpoints::CONFIG));
}

#[tokio::test]
async fn login_stores_cookie_for_later_requests() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .transport
        .on_response(
            endpoints::LOGIN,
            TransportResponse {
                status: 200,
                body: r#"{"id":"u-7"}"#.to_string(),
                set_cookie: Some("connect.sid=abc; Path=/; HttpOnly".to_string()),
            },
        )
        .await;
    harness.connect().await.unwrap();

    harness
        .client
        .login("ada", "secret", RequestOptions::default())
        .unwrap();
    assert!(harness.wait_for(Operation::Login, WAIT).await.unwrap().is_ok());
    assert_eq!(harness.client.cookie().as_deref(), Some("connect.sid=abc"));
    assert_eq!(harness.client.user_id().as_deref(), Some("u-7"));

    harness.client.get_courses(RequestOptions::default()).unwrap();
    harness.wait_for(Operation::GetCourses, WAIT).await.unwrap();
    let courses = &harness.transport.requests_for(endpoints::COURSES).await[0];
    assert_eq!(courses.cookie.as_deref(), Some("connect.sid=abc"));

    let login = &harness.transport.requests_for(endpoints::LOGIN).await[0];
    let body: serde_json::Value = serde_json::from_str(login.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["username"], "ada");
}

#[tokio::test]
async fn immediate_failure_becomes_error_response_and_diagnostic() {
    let harness = TestHarness::builder().build().await.unwrap();
    let sink = RecordingSink::default();
    harness.client.set_diagnostic_sink(sink.clone());
    harness.connect().await.unwrap();
    harness.transport.on(endpoints::COURSES, 500, "boom").await;

    harness.client.get_courses(RequestOptions::default()).unwrap();
    let response = harness.wait_for(Operation::GetCourses, WAIT).await.unwrap();
    assert!(!response.is_ok());
    assert_eq!(response.status_code, Some(500));
    assert_eq!(response.body, "boom");
    assert_eq!(harness.client.last_status(), Some(ApiStatus::Error));
    assert!(
        sink.errors
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.starts_with("get_courses"))
    );
}

#[tokio::test]
async fn malformed_session_start_keeps_client_connected() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.connect().await.unwrap();
    harness.transport.on(endpoints::SESSION_START, 200, "{}").await;

    harness.client.start_session(RequestOptions::default()).unwrap();
    let response = harness.wait_for(Operation::StartSession, WAIT).await.unwrap();
    assert!(!response.is_ok());
    assert_eq!(harness.client.state(), LifecycleState::Connected);
}

#[tokio::test]
async fn save_game_picks_content_type_from_payload() {
    let harness = TestHarness::builder().with_min_batch(1).build().await.unwrap();
    harness.connect().await.unwrap();

    harness
        .client
        .save_game(r#"{"checkpoint":3}"#, RequestOptions::default())
        .await
        .unwrap();
    harness
        .client
        .save_game("opaque-save-blob", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(harness.client.flush().await.unwrap(), 2);

    let saves = harness.transport.requests_for(endpoints::SAVE_GAME).await;
    assert_eq!(saves[0].content_type, endpoints::CONTENT_TYPE_JSON);
    assert_eq!(saves[1].content_type, endpoints::CONTENT_TYPE_TEXT);
    assert_eq!(saves[1].body.as_deref(), Some("opaque-save-blob"));
    assert!(saves[0].path.ends_with("?gameId=TEST-GAME"));
}

#[tokio::test]
async fn session_can_restart_after_end() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.start_session().await.unwrap();
    harness
        .client
        .end_session(RequestOptions::default())
        .await
        .unwrap();

    harness.start_session().await.unwrap();
    assert_eq!(harness.client.state(), LifecycleState::SessionActive);
    assert_eq!(harness.client.session_id().as_deref(), Some("test-session"));
}

#[tokio::test]
async fn health_reports_both_adapters() {
    let harness = TestHarness::builder().build().await.unwrap();
    let health = harness.client.health().await;
    let names: Vec<&str> = health.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["mock-transport", "sqlite-queue"]);
}
