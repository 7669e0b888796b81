// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telemetry accumulation.
//!
//! Values are collected with [`TelemetryBuffer::add_value`] until the game
//! saves a named event, which snapshots the values together with the session
//! metadata. Saved events are held until the client packages them into one
//! queued message.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::SessionState;

/// Event name used for achievements.
pub const ACHIEVEMENT_EVENT: &str = "$Achievement";

/// A typed telemetry value.
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for EventValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for EventValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for EventValue {
    fn from(value: u32) -> Self {
        Self::UInt(value.into())
    }
}

impl From<u64> for EventValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f32> for EventValue {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for EventValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<EventValue> for Value {
    fn from(value: EventValue) -> Self {
        match value {
            EventValue::Text(s) => Value::String(s),
            EventValue::Int(n) => Value::from(n),
            EventValue::UInt(n) => Value::from(n),
            // Non-finite floats have no JSON form.
            EventValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            EventValue::Bool(b) => Value::Bool(b),
        }
    }
}

/// One saved telemetry event as sent to the events endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub client_time_stamp: i64,
    pub game_id: String,
    pub game_session_id: Option<String>,
    pub game_session_event_order: u64,
    pub client_version: Option<String>,
    pub game_level: Option<u32>,
    pub user_id: Option<String>,
    pub device_id: String,
    /// Seconds, across all sessions of this client.
    pub total_time_played: f64,
    pub event_name: String,
    pub event_data: Map<String, Value>,
}

impl TelemetryEvent {
    /// Stamp an event with the current session metadata, consuming the next
    /// event order number.
    pub fn stamp(name: &str, data: Map<String, Value>, session: &mut SessionState) -> Self {
        Self {
            client_time_stamp: chrono::Utc::now().timestamp(),
            game_id: session.game_id.clone(),
            game_session_id: session.session_id.clone(),
            game_session_event_order: session.next_event_order(),
            client_version: session.client_version.clone(),
            game_level: session.game_level,
            user_id: session.user_id.clone(),
            device_id: session.device_id.clone(),
            total_time_played: session.total_time_played().as_secs_f64(),
            event_name: name.to_string(),
            event_data: data,
        }
    }
}

/// Pending values and saved events of the current session.
#[derive(Debug, Default)]
pub struct TelemetryBuffer {
    values: Map<String, Value>,
    events: Vec<TelemetryEvent>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value for the next saved event. A repeated key overwrites.
    pub fn add_value(&mut self, key: &str, value: impl Into<EventValue>) {
        self.values.insert(key.to_string(), value.into().into());
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Save an event built from the accumulated values, then clear them.
    pub fn save_event(&mut self, name: &str, session: &mut SessionState) {
        let data = std::mem::take(&mut self.values);
        self.events.push(TelemetryEvent::stamp(name, data, session));
    }

    /// Save an achievement event. Accumulated values are left untouched.
    pub fn save_achievement(
        &mut self,
        item: &str,
        group: &str,
        sub_group: &str,
        session: &mut SessionState,
    ) {
        let mut data = Map::new();
        data.insert("item".into(), Value::from(item));
        data.insert("group".into(), Value::from(group));
        data.insert("subGroup".into(), Value::from(sub_group));
        self.events
            .push(TelemetryEvent::stamp(ACHIEVEMENT_EVENT, data, session));
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn pending_values(&self) -> usize {
        self.values.len()
    }

    /// Take every saved event, leaving the buffer empty.
    pub fn take_events(&mut self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut self.events)
    }

    /// Put taken events back ahead of any saved since, after a failed send.
    pub fn restore(&mut self, mut events: Vec<TelemetryEvent>) {
        events.append(&mut self.events);
        self.events = events;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_session() -> SessionState {
        let mut session = SessionState::new("http://localhost".into(), "GAME".into(), "dev");
        session.client_version = Some("1.2.0".into());
        session.game_level = Some(3);
        session.begin_session("S-9".into());
        session
    }

    #[test]
    fn values_convert_to_json() {
        assert_eq!(Value::from(EventValue::from("a")), Value::from("a"));
        assert_eq!(Value::from(EventValue::from(-3i32)), Value::from(-3));
        assert_eq!(Value::from(EventValue::from(7u64)), Value::from(7u64));
        assert_eq!(Value::from(EventValue::from(true)), Value::Bool(true));
        assert_eq!(Value::from(EventValue::from(f64::NAN)), Value::Null);
    }

    #[test]
    fn save_event_snapshots_and_clears_values() {
        let mut session = active_session();
        let mut buffer = TelemetryBuffer::new();
        buffer.add_value("score", 120i64);
        buffer.add_value("hero", "knight");
        buffer.save_event("level_complete", &mut session);

        assert_eq!(buffer.pending_values(), 0);
        assert_eq!(buffer.pending_events(), 1);

        let events = buffer.take_events();
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["eventName"], "level_complete");
        assert_eq!(json["eventData"]["score"], 120);
        assert_eq!(json["eventData"]["hero"], "knight");
        assert_eq!(json["gameSessionId"], "S-9");
        assert_eq!(json["gameSessionEventOrder"], 0);
        assert_eq!(json["deviceId"], "dev_GAME");
        assert_eq!(json["gameLevel"], 3);
        assert_eq!(buffer.pending_events(), 0);
    }

    #[test]
    fn event_order_increments_across_saves() {
        let mut session = active_session();
        let mut buffer = TelemetryBuffer::new();
        buffer.save_event("a", &mut session);
        buffer.save_achievement("sword", "weapons", "melee", &mut session);

        let events = buffer.take_events();
        assert_eq!(events[0].game_session_event_order, 0);
        assert_eq!(events[1].game_session_event_order, 1);
        assert_eq!(events[1].event_name, ACHIEVEMENT_EVENT);
        assert_eq!(events[1].event_data["subGroup"], "melee");
    }

    #[test]
    fn achievement_keeps_pending_values() {
        let mut session = active_session();
        let mut buffer = TelemetryBuffer::new();
        buffer.add_value("x", 1.5f32);
        buffer.save_achievement("a", "b", "c", &mut session);
        assert_eq!(buffer.pending_values(), 1);
        buffer.clear_values();
        buffer.clear_events();
        assert_eq!(buffer.pending_values(), 0);
        assert_eq!(buffer.pending_events(), 0);
    }
}
