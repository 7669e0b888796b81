// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The client: builds requests for every platform operation and routes
//! them either straight to the transport or through the persistent queue.
//!
//! Immediate operations (`connect`, `login`, `get_courses`, ...) are spawned
//! on the runtime and return their [`RequestKey`] at once. Queued operations
//! (telemetry, session end, saves) are committed to the queue before the
//! call returns and delivered by the [`DispatchScheduler`]. Either way the
//! outcome arrives as a [`Response`] on the response channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use questlog_config::QuestlogConfig;
use questlog_config::model::ThrottleConfig;
use questlog_core::types::ApiStatus;
use questlog_core::{
    DiagnosticSink, HealthStatus, MessageStatus, NewMessage, Operation, QueueStore, QuestlogError,
    RequestKey, Response, RowId, TracingSink, Transport, endpoints,
};
use questlog_storage::SqliteQueue;

use crate::callbacks::CallbackRegistry;
use crate::channel::ResponseChannel;
use crate::dispatcher::Dispatcher;
use crate::http::HttpTransport;
use crate::options::{
    CourseCode, CourseId, Credentials, DeviceBody, QueuedRequest, Registration, RegistrationBody,
    RequestOptions, SessionEndBody, SessionStartBody,
};
use crate::scheduler::DispatchScheduler;
use crate::session::{LifecycleState, SessionState};
use crate::telemetry::{EventValue, TelemetryBuffer};

use LifecycleState::{Connected, Disconnected, Ended, SessionActive};

const ONLINE: &[LifecycleState] = &[Connected, SessionActive, Ended];

/// An analytics client bound to one game.
///
/// Must be created inside a tokio runtime. Dropping the client stops the
/// background dispatch loop; call [`Client::shutdown`] to also checkpoint
/// the queue.
pub struct Client {
    queue: Arc<dyn QueueStore>,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<DispatchScheduler>,
    callbacks: Arc<CallbackRegistry>,
    responses: ResponseChannel,
    telemetry: Mutex<TelemetryBuffer>,
    runtime: Handle,
    seq: AtomicU64,
    cancel: CancellationToken,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Open the SQLite queue from `config.storage` and start the client.
    pub async fn open(
        config: &QuestlogConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, QuestlogError> {
        let queue = SqliteQueue::open(config.storage.clone()).await?;
        Self::with_queue(config, Arc::new(queue), transport).await
    }

    /// Open the client with the reqwest transport.
    pub async fn open_http(config: &QuestlogConfig) -> Result<Self, QuestlogError> {
        let transport = HttpTransport::new(Duration::from_secs(10))?;
        Self::open(config, Arc::new(transport)).await
    }

    /// Start a client over an already initialized queue.
    ///
    /// Rows left in flight by an earlier process are returned to pending
    /// before the dispatch loop starts.
    pub async fn with_queue(
        config: &QuestlogConfig,
        queue: Arc<dyn QueueStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, QuestlogError> {
        let runtime = Handle::try_current()
            .map_err(|e| QuestlogError::Internal(format!("no tokio runtime: {e}")))?;

        let recovered = queue.recover_in_flight().await?;
        if recovered > 0 {
            info!(recovered, "re-queued messages interrupted by a previous run");
        }

        let device_id = config
            .client
            .device_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut session = SessionState::new(
            config.client.server_uri.clone(),
            config.client.game_id.clone(),
            &device_id,
        );
        session.client_name = config.client.client_name.clone();
        session.client_version = config.client.client_version.clone();

        let throttle = Arc::new(ArcSwap::from_pointee(config.throttle.clone()));
        let callbacks = Arc::new(CallbackRegistry::new());
        let responses = ResponseChannel::new();
        let dispatcher = Arc::new(Dispatcher::new(
            transport,
            Arc::clone(&callbacks),
            responses.clone(),
            Arc::new(Mutex::new(session)),
            Arc::clone(&throttle),
            Box::new(TracingSink),
            config.client.request_timeout(),
        ));
        let scheduler = Arc::new(DispatchScheduler::new(
            Arc::clone(&queue),
            Arc::clone(&dispatcher),
            throttle,
        ));

        let cancel = CancellationToken::new();
        let dispatch_task = Arc::clone(&scheduler).spawn(cancel.clone());

        // Seeded from the clock so keys persisted by an earlier process never
        // collide with new ones.
        let seq = u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or_default();

        info!(game_id = %config.client.game_id, "questlog client started");
        Ok(Self {
            queue,
            dispatcher,
            scheduler,
            callbacks,
            responses,
            telemetry: Mutex::new(TelemetryBuffer::new()),
            runtime,
            seq: AtomicU64::new(seq),
            cancel,
            dispatch_task: Mutex::new(Some(dispatch_task)),
        })
    }

    // --- Immediate operations ---

    /// Fetch the platform config and apply its throttle settings.
    pub fn connect(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        let path = self.game_path(endpoints::CONFIG)?;
        {
            let mut session = self.session();
            session.require(Operation::Connect, &[Disconnected])?;
            session.lifecycle = LifecycleState::Connecting;
        }
        Ok(self.dispatch(Operation::Connect, path, None, options))
    }

    pub fn device_update(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        let body = {
            let session = self.session();
            session.require(Operation::DeviceUpdate, ONLINE)?;
            to_json(&DeviceBody {
                device_id: &session.device_id,
                game_id: &session.game_id,
            })?
        };
        Ok(self.dispatch(
            Operation::DeviceUpdate,
            endpoints::DEVICE_UPDATE.to_string(),
            Some(body),
            options,
        ))
    }

    pub fn auth_status(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::AuthStatus, ONLINE)?;
        Ok(self.dispatch(
            Operation::AuthStatus,
            endpoints::AUTH_STATUS.to_string(),
            None,
            options,
        ))
    }

    pub fn register_student(
        &self,
        registration: &Registration,
        options: RequestOptions,
    ) -> Result<RequestKey, QuestlogError> {
        self.register(Operation::RegisterStudent, "student", registration, options)
    }

    pub fn register_instructor(
        &self,
        registration: &Registration,
        options: RequestOptions,
    ) -> Result<RequestKey, QuestlogError> {
        self.register(Operation::RegisterInstructor, "instructor", registration, options)
    }

    fn register(
        &self,
        operation: Operation,
        role: &'static str,
        registration: &Registration,
        options: RequestOptions,
    ) -> Result<RequestKey, QuestlogError> {
        self.session().require(operation, &[Connected])?;
        let body = to_json(&RegistrationBody { registration, role })?;
        Ok(self.dispatch(operation, endpoints::REGISTER.to_string(), Some(body), options))
    }

    pub fn login(
        &self,
        username: &str,
        password: &str,
        options: RequestOptions,
    ) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::Login, &[Connected])?;
        let body = to_json(&Credentials { username, password })?;
        Ok(self.dispatch(Operation::Login, endpoints::LOGIN.to_string(), Some(body), options))
    }

    pub fn logout(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::Logout, ONLINE)?;
        Ok(self.dispatch(Operation::Logout, endpoints::LOGOUT.to_string(), Some("{}".into()), options))
    }

    pub fn enroll(
        &self,
        course_code: &str,
        options: RequestOptions,
    ) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::Enroll, ONLINE)?;
        let body = to_json(&CourseCode { course_code })?;
        Ok(self.dispatch(Operation::Enroll, endpoints::ENROLL.to_string(), Some(body), options))
    }

    pub fn unenroll(
        &self,
        course_id: &str,
        options: RequestOptions,
    ) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::Unenroll, ONLINE)?;
        let body = to_json(&CourseId { course_id })?;
        Ok(self.dispatch(Operation::Unenroll, endpoints::UNENROLL.to_string(), Some(body), options))
    }

    pub fn get_courses(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::GetCourses, ONLINE)?;
        Ok(self.dispatch(Operation::GetCourses, endpoints::COURSES.to_string(), None, options))
    }

    /// Open a game session. The session id is stamped once the platform
    /// answers.
    pub fn start_session(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        let body = {
            let session = self.session();
            session.require(Operation::StartSession, &[Connected, Ended])?;
            to_json(&SessionStartBody {
                game_id: &session.game_id,
                device_id: &session.device_id,
                game_level: session.game_level,
                client_name: session.client_name.as_deref(),
                client_version: session.client_version.as_deref(),
                player_handle: session.player_handle.as_deref(),
                user_info: session.user_info.as_ref(),
            })?
        };
        Ok(self.dispatch(
            Operation::StartSession,
            endpoints::SESSION_START.to_string(),
            Some(body),
            options,
        ))
    }

    pub fn get_save_game(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::GetSaveGame, ONLINE)?;
        let path = self.game_path(endpoints::SAVE_GAME)?;
        Ok(self.dispatch(Operation::GetSaveGame, path, None, options))
    }

    pub fn get_player_info(&self, options: RequestOptions) -> Result<RequestKey, QuestlogError> {
        self.session().require(Operation::GetPlayerInfo, ONLINE)?;
        let path = self.game_path(endpoints::PLAYER_INFO)?;
        Ok(self.dispatch(Operation::GetPlayerInfo, path, None, options))
    }

    // --- Queued operations ---

    /// Package every saved telemetry event into one queued message.
    ///
    /// Returns `None` when no event was saved since the last send.
    pub async fn send_telem_events(
        &self,
        options: RequestOptions,
    ) -> Result<Option<QueuedRequest>, QuestlogError> {
        let events = {
            let session = self.session();
            session.require(Operation::SendTelemEvents, &[SessionActive])?;
            self.telemetry().take_events()
        };
        if events.is_empty() {
            return Ok(None);
        }

        let payload = to_json(&events)?;
        match self
            .enqueue(Operation::SendTelemEvents, endpoints::EVENTS.to_string(), payload, None, options)
            .await
        {
            Ok(queued) => Ok(Some(queued)),
            Err(e) => {
                self.telemetry().restore(events);
                Err(e)
            }
        }
    }

    /// Close the session.
    ///
    /// Saved telemetry is queued first, the session-end message behind it,
    /// and a dispatch cycle is forced so neither waits for the batch
    /// threshold. Delivery itself stays asynchronous.
    pub async fn end_session(&self, options: RequestOptions) -> Result<QueuedRequest, QuestlogError> {
        let (events, payload) = {
            let session = self.session();
            session.require(Operation::EndSession, &[SessionActive])?;
            let body = SessionEndBody {
                game_id: session.game_id.clone(),
                game_session_id: session.session_id.clone(),
                game_session_event_order: session.event_order(),
                device_id: session.device_id.clone(),
                total_time_played: session.total_time_played().as_secs_f64(),
            };
            (self.telemetry().take_events(), to_json(&body)?)
        };

        // The session stays active until both messages are queued, so a
        // failed end can be retried without losing saved events.
        if !events.is_empty() {
            let batch = match to_json(&events) {
                Ok(batch) => batch,
                Err(e) => {
                    self.telemetry().restore(events);
                    return Err(e);
                }
            };
            if let Err(e) = self
                .enqueue(
                    Operation::SendTelemEvents,
                    endpoints::EVENTS.to_string(),
                    batch,
                    None,
                    RequestOptions::default(),
                )
                .await
            {
                warn!(error = %e, "session end deferred: telemetry could not be queued");
                self.telemetry().restore(events);
                return Err(e);
            }
        }
        let queued = self
            .enqueue(
                Operation::EndSession,
                endpoints::SESSION_END.to_string(),
                payload,
                None,
                options,
            )
            .await
            .inspect_err(|e| warn!(error = %e, "session end message could not be queued"))?;

        {
            let mut session = self.session();
            if session.lifecycle == SessionActive {
                session.finish_session();
            }
        }
        self.scheduler.request_flush();
        Ok(queued)
    }

    /// Queue a save blob. JSON is sent as JSON, anything else as text.
    pub async fn save_game(
        &self,
        data: &str,
        options: RequestOptions,
    ) -> Result<QueuedRequest, QuestlogError> {
        self.session().require(Operation::SaveGame, ONLINE)?;
        let path = self.game_path(endpoints::SAVE_GAME)?;
        let content_type = if serde_json::from_str::<serde_json::Value>(data).is_ok() {
            endpoints::CONTENT_TYPE_JSON
        } else {
            endpoints::CONTENT_TYPE_TEXT
        };
        self.enqueue(Operation::SaveGame, path, data.to_string(), Some(content_type), options)
            .await
    }

    pub async fn save_player_info(
        &self,
        info: &serde_json::Value,
        options: RequestOptions,
    ) -> Result<QueuedRequest, QuestlogError> {
        self.session().require(Operation::SavePlayerInfo, ONLINE)?;
        let path = self.game_path(endpoints::PLAYER_INFO)?;
        self.enqueue(Operation::SavePlayerInfo, path, to_json(info)?, None, options)
            .await
    }

    // --- Telemetry ---

    /// Set a value on the next saved event.
    pub fn add_telem_event_value(&self, key: &str, value: impl Into<EventValue>) {
        self.telemetry().add_value(key, value);
    }

    pub fn clear_telem_event_values(&self) {
        self.telemetry().clear_values();
    }

    /// Save a named event from the accumulated values.
    pub fn save_telem_event(&self, name: &str) -> Result<(), QuestlogError> {
        let mut session = self.session();
        session.require(Operation::SendTelemEvents, &[SessionActive])?;
        self.telemetry().save_event(name, &mut session);
        Ok(())
    }

    pub fn save_achievement_event(
        &self,
        item: &str,
        group: &str,
        sub_group: &str,
    ) -> Result<(), QuestlogError> {
        let mut session = self.session();
        session.require(Operation::SendTelemEvents, &[SessionActive])?;
        self.telemetry()
            .save_achievement(item, group, sub_group, &mut session);
        Ok(())
    }

    pub fn clear_telem_events(&self) {
        self.telemetry().clear_events();
    }

    pub fn pending_telem_events(&self) -> usize {
        self.telemetry().pending_events()
    }

    // --- Player and session setters ---

    pub fn set_name(&self, client_name: &str) {
        self.session().client_name = Some(client_name.to_string());
    }

    pub fn set_version(&self, client_version: &str) {
        self.session().client_version = Some(client_version.to_string());
    }

    pub fn set_game_level(&self, level: u32) {
        self.session().game_level = Some(level);
    }

    pub fn set_user_id(&self, user_id: &str) {
        self.session().user_id = Some(user_id.to_string());
    }

    pub fn set_player_handle(&self, handle: &str) {
        self.session().player_handle = Some(handle.to_string());
    }

    pub fn remove_player_handle(&self) {
        self.session().player_handle = None;
    }

    pub fn set_connect_uri(&self, uri: &str) {
        self.session().connect_uri = uri.to_string();
    }

    pub fn set_cookie(&self, cookie: &str) {
        self.session().cookie = Some(cookie.to_string());
    }

    pub fn set_session_id(&self, session_id: &str) {
        self.session().session_id = Some(session_id.to_string());
    }

    pub fn set_user_info(&self, info: serde_json::Value) {
        self.session().user_info = Some(info);
    }

    // --- Getters ---

    pub fn state(&self) -> LifecycleState {
        self.session().lifecycle
    }

    pub fn game_id(&self) -> String {
        self.session().game_id.clone()
    }

    pub fn device_id(&self) -> String {
        self.session().device_id.clone()
    }

    pub fn cookie(&self) -> Option<String> {
        self.session().cookie.clone()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session().session_id.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.session().user_id.clone()
    }

    /// Outcome of the most recently completed request.
    pub fn last_status(&self) -> Option<ApiStatus> {
        self.session().last_status
    }

    /// `eventsDetailLevel` from the platform config, once connected.
    pub fn detail_level(&self) -> Option<u32> {
        self.session().detail_level
    }

    /// Throttle settings in effect, after any platform overrides.
    pub fn throttle(&self) -> Arc<ThrottleConfig> {
        self.scheduler.throttle()
    }

    // --- Responses, cancellation, and queue control ---

    /// Take the oldest completed response, if any. Never blocks.
    pub fn poll_response(&self) -> Option<Response> {
        self.responses.pop()
    }

    /// Another handle to the response channel.
    pub fn responses(&self) -> ResponseChannel {
        self.responses.clone()
    }

    /// Cancel a request's completion. The response, if it still arrives, is
    /// dropped; an immediate request still in flight is aborted.
    pub fn cancel_request(&self, key: &RequestKey) -> bool {
        let cancelled = self.callbacks.cancel(key);
        if cancelled && key.operation() == Some(Operation::Connect) {
            let mut session = self.session();
            if session.lifecycle == LifecycleState::Connecting {
                session.lifecycle = Disconnected;
            }
        }
        debug!(key = %key, cancelled, "cancel requested");
        cancelled
    }

    /// Run a forced dispatch cycle now and return how many messages were
    /// submitted.
    pub async fn flush(&self) -> Result<usize, QuestlogError> {
        self.scheduler.run_cycle(true).await
    }

    /// Delivery status of a queued message. `None` once the row was evicted.
    pub async fn message_status(&self, row_id: RowId) -> Result<Option<MessageStatus>, QuestlogError> {
        Ok(self.queue.get(row_id).await?.map(|m| m.status))
    }

    /// Messages waiting for dispatch.
    pub async fn pending_count(&self) -> Result<u64, QuestlogError> {
        self.queue.count(Some(MessageStatus::Pending)).await
    }

    pub fn scheduler(&self) -> &DispatchScheduler {
        &self.scheduler
    }

    /// Replace the sink that receives warnings and errors.
    pub fn set_diagnostic_sink(&self, sink: impl DiagnosticSink) {
        self.dispatcher.set_diagnostics(Box::new(sink));
    }

    /// Health of the transport and the queue.
    pub async fn health(&self) -> Vec<(String, HealthStatus)> {
        let transport = self.dispatcher.transport();
        let transport_health = transport
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        let queue_health = self
            .queue
            .health_check()
            .await
            .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
        vec![
            (transport.name().to_string(), transport_health),
            (self.queue.name().to_string(), queue_health),
        ]
    }

    /// Stop the dispatch loop and release the queue and transport.
    ///
    /// Undelivered messages stay in the queue for the next run.
    pub async fn shutdown(&self) -> Result<(), QuestlogError> {
        self.cancel.cancel();
        let task = self
            .dispatch_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "dispatch task did not stop cleanly");
            }
        }
        self.queue.shutdown().await?;
        self.dispatcher.transport().shutdown().await?;
        info!("questlog client stopped");
        Ok(())
    }

    // --- Internals ---

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.dispatcher.session()
    }

    fn telemetry(&self) -> MutexGuard<'_, TelemetryBuffer> {
        self.telemetry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_key(&self, operation: Operation) -> RequestKey {
        RequestKey::new(operation, None, self.seq.fetch_add(1, Ordering::Relaxed))
    }

    /// `path?gameId=<game>` with the game id form-encoded.
    fn game_path(&self, path: &str) -> Result<String, QuestlogError> {
        let game_id = self.session().game_id.clone();
        let query = serde_urlencoded::to_string([("gameId", game_id.as_str())])
            .map_err(|e| QuestlogError::Internal(format!("failed to encode query: {e}")))?;
        Ok(format!("{path}?{query}"))
    }

    fn dispatch(
        &self,
        operation: Operation,
        path: String,
        body: Option<String>,
        options: RequestOptions,
    ) -> RequestKey {
        let (callback, target) = options.into_parts();
        let key = self.next_key(operation);
        self.callbacks.register(key.clone(), callback);

        let request =
            self.dispatcher
                .build_request(operation, path, body, endpoints::CONTENT_TYPE_JSON, &target);
        let dispatcher = Arc::clone(&self.dispatcher);
        let task_key = key.clone();
        // Created outside the task so it is dropped even if the task is
        // aborted before its first poll.
        let guard = self.callbacks.forget_on_drop(key.clone());
        let task = self.runtime.spawn(async move {
            let _guard = guard;
            dispatcher.execute(operation, request, task_key).await;
        });
        self.callbacks.attach(&key, task.abort_handle());
        key
    }

    async fn enqueue(
        &self,
        operation: Operation,
        path: String,
        payload: String,
        content_type: Option<&str>,
        options: RequestOptions,
    ) -> Result<QueuedRequest, QuestlogError> {
        let (callback, target) = options.into_parts();
        if target.base_uri.is_some() || target.timeout.is_some() {
            debug!(%operation, "base URI and timeout overrides do not apply to queued messages");
        }
        let key = self.next_key(operation);
        self.callbacks.register(key.clone(), callback);

        let mut message = NewMessage::new(operation, payload).with_client_key(&key);
        message.path = path;
        if let Some(content_type) = content_type {
            message = message.with_content_type(content_type);
        }

        match self.queue.enqueue(message).await {
            Ok(row_id) => {
                debug!(%operation, row_id, key = %key, "message queued");
                Ok(QueuedRequest { key, row_id })
            }
            Err(e) => {
                self.callbacks.forget(&key);
                self.dispatcher.error(&operation.to_string(), &e.to_string());
                Err(e)
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, QuestlogError> {
    serde_json::to_string(value)
        .map_err(|e| QuestlogError::Internal(format!("failed to encode request body: {e}")))
}
