// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request building and completion routing shared by immediate operations
//! and the dispatch scheduler.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use questlog_config::model::ThrottleConfig;
use questlog_core::types::{Message, RemoteConfig, TransportRequest, TransportResponse};
use questlog_core::{
    DiagnosticSink, Operation, QuestlogError, RequestKey, Response, Transport, endpoints,
};

use crate::callbacks::{CallbackRegistry, Completion};
use crate::channel::ResponseChannel;
use crate::session::{LifecycleState, SessionState};

/// Result of attempting delivery of one queued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The platform accepted the message.
    Delivered(TransportResponse),
    /// The platform answered with a final error status; retrying is pointless.
    Rejected(TransportResponse),
    /// Network failure, timeout, or a retryable status. The row will be retried.
    Retry(String),
}

/// Per-request overrides for an outgoing call.
#[derive(Debug, Clone, Default)]
pub struct RequestTarget {
    pub base_uri: Option<String>,
    pub timeout: Option<Duration>,
}

/// Everything needed to send a request and publish its outcome.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    callbacks: Arc<CallbackRegistry>,
    responses: ResponseChannel,
    session: Arc<Mutex<SessionState>>,
    throttle: Arc<ArcSwap<ThrottleConfig>>,
    diagnostics: ArcSwap<Box<dyn DiagnosticSink>>,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        callbacks: Arc<CallbackRegistry>,
        responses: ResponseChannel,
        session: Arc<Mutex<SessionState>>,
        throttle: Arc<ArcSwap<ThrottleConfig>>,
        diagnostics: Box<dyn DiagnosticSink>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            callbacks,
            responses,
            session,
            throttle,
            diagnostics: ArcSwap::from_pointee(diagnostics),
            request_timeout,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn set_diagnostics(&self, sink: Box<dyn DiagnosticSink>) {
        self.diagnostics.store(Arc::new(sink));
    }

    pub fn warning(&self, location: &str, message: &str) {
        self.diagnostics.load().warning(location, message);
    }

    pub fn error(&self, location: &str, message: &str) {
        self.diagnostics.load().error(location, message);
    }

    pub fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a request stamped with the current connect URI and cookie.
    pub fn build_request(
        &self,
        operation: Operation,
        path: String,
        body: Option<String>,
        content_type: &str,
        target: &RequestTarget,
    ) -> TransportRequest {
        let session = self.session();
        TransportRequest {
            method: operation.method(),
            base_uri: target
                .base_uri
                .clone()
                .unwrap_or_else(|| session.connect_uri.clone()),
            path,
            body,
            content_type: content_type.to_string(),
            cookie: session.cookie.clone(),
            timeout: target.timeout.unwrap_or(self.request_timeout),
        }
    }

    /// Run an immediate operation to completion and publish its response.
    pub async fn execute(&self, operation: Operation, request: TransportRequest, key: RequestKey) {
        debug!(%operation, key = %key, path = %request.path, "dispatching immediate request");
        let response = match self.transport.send(request).await {
            Ok(reply) => self.apply_reply(operation, reply),
            Err(err) => {
                if operation == Operation::Connect {
                    self.session().lifecycle = LifecycleState::Disconnected;
                }
                Response::error(operation, err.to_string())
            }
        };
        self.complete(Some(key), response);
    }

    /// Send one queued message and classify the outcome.
    pub async fn deliver(&self, message: &Message) -> Delivery {
        let operation = message.operation().unwrap_or(Operation::SendTelemEvents);
        let request = self.build_request(
            operation,
            message.path.clone(),
            Some(message.payload.clone()),
            message.content_type(),
            &RequestTarget::default(),
        );
        match self.transport.send(request).await {
            Ok(reply) if reply.is_success() => {
                self.capture_cookie(&reply);
                Delivery::Delivered(reply)
            }
            Ok(reply) if reply.is_retryable() => {
                Delivery::Retry(format!("server returned {}", reply.status))
            }
            Ok(reply) => Delivery::Rejected(reply),
            Err(err) => Delivery::Retry(err.to_string()),
        }
    }

    /// Hand a response to its registered handler and publish it, unless the
    /// request was cancelled.
    pub fn complete(&self, key: Option<RequestKey>, response: Response) {
        let response = response.with_key(key.clone());
        let Completion::Completed(response) = self.callbacks.complete(key.as_ref(), response)
        else {
            return;
        };
        if !response.is_ok() {
            let message = response.error.as_deref().unwrap_or("request failed");
            self.error(&response.operation.to_string(), message);
        }
        self.session().last_status = Some(response.status);
        self.responses.push(response);
    }

    fn capture_cookie(&self, reply: &TransportResponse) {
        if let Some(set_cookie) = &reply.set_cookie {
            self.session().capture_cookie(set_cookie);
        }
    }

    fn apply_reply(&self, operation: Operation, reply: TransportResponse) -> Response {
        self.capture_cookie(&reply);
        if !reply.is_success() {
            if operation == Operation::Connect {
                self.session().lifecycle = LifecycleState::Disconnected;
            }
            return Response::error(operation, format!("server returned {}", reply.status))
                .with_status_code(reply.status)
                .with_body(reply.body);
        }

        let applied = if operation == Operation::Connect {
            self.apply_remote_config(&reply.body)
        } else {
            self.session().apply_success(operation, &reply.body)
        };
        match applied {
            Ok(()) => Response::ok(operation, reply.status, reply.body),
            Err(err) => Response::error(operation, err.to_string())
                .with_status_code(reply.status)
                .with_body(reply.body),
        }
    }

    /// Merge the platform's throttle settings over the local ones and
    /// publish the result for the next dispatch cycle.
    fn apply_remote_config(&self, body: &str) -> Result<(), QuestlogError> {
        let parsed = if body.trim().is_empty() {
            Ok(RemoteConfig::default())
        } else {
            serde_json::from_str::<RemoteConfig>(body)
        };
        let remote = match parsed {
            Ok(remote) => remote,
            Err(e) => {
                self.session().lifecycle = LifecycleState::Disconnected;
                return Err(QuestlogError::MalformedResponse {
                    operation: Operation::Connect.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let (merged, ignored) = self.throttle.load().merge_remote(&remote);
        for reason in &ignored {
            warn!(reason = %reason, "ignoring remote throttle setting");
            self.warning(endpoints::CONFIG, reason);
        }
        debug!(
            interval_secs = merged.interval_secs,
            min_batch_size = merged.min_batch_size,
            max_batch_size = merged.max_batch_size,
            "applied platform throttle settings"
        );
        self.throttle.store(Arc::new(merged));

        let mut session = self.session();
        session.detail_level = remote.events_detail_level;
        session.lifecycle = LifecycleState::Connected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use questlog_core::TracingSink;
    use questlog_test_utils::MockTransport;

    use super::*;

    fn dispatcher(transport: Arc<MockTransport>) -> (Dispatcher, ResponseChannel) {
        let responses = ResponseChannel::new();
        let session = SessionState::new("http://platform".into(), "GAME".into(), "dev");
        let dispatcher = Dispatcher::new(
            transport,
            Arc::new(CallbackRegistry::new()),
            responses.clone(),
            Arc::new(Mutex::new(session)),
            Arc::new(ArcSwap::from_pointee(ThrottleConfig::default())),
            Box::new(TracingSink),
            Duration::from_secs(30),
        );
        (dispatcher, responses)
    }

    #[tokio::test]
    async fn connect_applies_remote_throttle() {
        let transport = Arc::new(MockTransport::new());
        transport
            .on(
                endpoints::CONFIG,
                200,
                r#"{"eventsPeriodSecs":30,"eventsMinSize":1,"eventsMaxSize":50,"eventsDetailLevel":2}"#,
            )
            .await;
        let (dispatcher, responses) = dispatcher(Arc::clone(&transport));
        dispatcher.session().lifecycle = LifecycleState::Connecting;

        let request = dispatcher.build_request(
            Operation::Connect,
            endpoints::CONFIG.to_string(),
            None,
            endpoints::CONTENT_TYPE_JSON,
            &RequestTarget::default(),
        );
        let key = RequestKey::new(Operation::Connect, None, 1);
        dispatcher.execute(Operation::Connect, request, key.clone()).await;

        let response = responses.pop().unwrap();
        assert!(response.is_ok());
        assert_eq!(response.request_key, Some(key));
        assert_eq!(dispatcher.throttle.load().interval_secs, 30);
        assert_eq!(dispatcher.throttle.load().min_batch_size, 1);
        let session = dispatcher.session();
        assert_eq!(session.lifecycle, LifecycleState::Connected);
        assert_eq!(session.detail_level, Some(2));
    }

    #[tokio::test]
    async fn malformed_config_returns_to_disconnected() {
        let transport = Arc::new(MockTransport::new());
        transport.on(endpoints::CONFIG, 200, "not json").await;
        let (dispatcher, responses) = dispatcher(Arc::clone(&transport));
        dispatcher.session().lifecycle = LifecycleState::Connecting;

        let request = dispatcher.build_request(
            Operation::Connect,
            endpoints::CONFIG.to_string(),
            None,
            endpoints::CONTENT_TYPE_JSON,
            &RequestTarget::default(),
        );
        dispatcher
            .execute(Operation::Connect, request, RequestKey::new(Operation::Connect, None, 2))
            .await;

        let response = responses.pop().unwrap();
        assert!(!response.is_ok());
        assert!(response.error.unwrap().contains("malformed response"));
        assert_eq!(dispatcher.session().lifecycle, LifecycleState::Disconnected);
    }

    #[tokio::test]
    async fn delivery_classifies_statuses() {
        let transport = Arc::new(MockTransport::new());
        let (dispatcher, _) = dispatcher(Arc::clone(&transport));
        let message = Message {
            row_id: 1,
            path: endpoints::EVENTS.to_string(),
            payload: "[]".to_string(),
            content_type: None,
            core_callback_key: Operation::SendTelemEvents.to_string(),
            client_callback_key: None,
            status: questlog_core::MessageStatus::Sending,
            attempts: 0,
            created_at: String::new(),
            updated_at: String::new(),
        };

        transport.on(endpoints::EVENTS, 200, "{}").await;
        assert!(matches!(dispatcher.deliver(&message).await, Delivery::Delivered(_)));

        transport.on(endpoints::EVENTS, 503, "").await;
        assert!(matches!(dispatcher.deliver(&message).await, Delivery::Retry(_)));

        transport.on(endpoints::EVENTS, 400, "bad").await;
        assert!(matches!(dispatcher.deliver(&message).await, Delivery::Rejected(_)));

        transport.set_offline(true).await;
        assert!(matches!(dispatcher.deliver(&message).await, Delivery::Retry(_)));
    }

    #[tokio::test]
    async fn requests_carry_cookie_and_overrides() {
        let transport = Arc::new(MockTransport::new());
        let (dispatcher, _) = dispatcher(Arc::clone(&transport));
        dispatcher.session().capture_cookie("sid=1; Path=/");

        let request = dispatcher.build_request(
            Operation::Login,
            endpoints::LOGIN.to_string(),
            Some("{}".into()),
            endpoints::CONTENT_TYPE_JSON,
            &RequestTarget {
                base_uri: Some("http://other".into()),
                timeout: Some(Duration::from_secs(3)),
            },
        );
        assert_eq!(request.base_uri, "http://other");
        assert_eq!(request.cookie.as_deref(), Some("sid=1"));
        assert_eq!(request.timeout, Duration::from_secs(3));
    }
}
