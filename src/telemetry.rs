//! Bounded buffer of telemetry events.
//!
//! Telemetry is the trail of things that happened before an error: log lines,
//! network calls, navigation and so on. Events are recorded through
//! [`Notifier::capture_event`](crate::Notifier::capture_event) and attached to
//! every item delivered afterwards.

use core::fmt;
use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::level::Level;

/// Kind of a telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A log line.
    Log,
    /// A network request.
    Network,
    /// A user-interface interaction.
    Dom,
    /// A change of location within the application.
    Navigation,
    /// An error that was reported.
    Error,
    /// Anything recorded explicitly by the caller.
    Manual,
}

impl EventType {
    /// Every event type.
    pub const ALL: [EventType; 6] = [
        EventType::Log,
        EventType::Network,
        EventType::Dom,
        EventType::Navigation,
        EventType::Error,
        EventType::Manual,
    ];

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::Log => "log",
            EventType::Network => "network",
            EventType::Dom => "dom",
            EventType::Navigation => "navigation",
            EventType::Error => "error",
            EventType::Manual => "manual",
        }
    }

    /// Parses a type name, returning `None` for anything unrecognised.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Level used when none is given.
    pub const fn default_level(self) -> Level {
        match self {
            EventType::Error => Level::Error,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    /// What kind of event this is.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Severity.
    pub level: Level,
    /// Event data.
    pub body: Map<String, Value>,
    /// Epoch milliseconds at recording time.
    pub timestamp_ms: i64,
    /// Random v4 identifier.
    pub uuid: Uuid,
}

impl TelemetryEvent {
    /// Creates an event stamped with the current time.
    pub fn new(event_type: EventType, level: Level, body: Map<String, Value>) -> Self {
        Self {
            event_type,
            level,
            body,
            timestamp_ms: Utc::now().timestamp_millis(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Resolves loosely typed `captureEvent` arguments into an event.
    ///
    /// If `type_or_body` is an object it is the body and `body_or_level` is
    /// the level; otherwise `type_or_body` is the type, `body_or_level` the
    /// body and `level` the level. Unrecognised or empty type names fall back
    /// to [`EventType::Manual`], unrecognised levels to the type's
    /// [default level](EventType::default_level). A body that is not an
    /// object is stored under `value`.
    ///
    /// ```
    /// use serde_json::{Value, json};
    /// use tattle::{EventType, Level, TelemetryEvent};
    ///
    /// let event = TelemetryEvent::from_args(json!("meaningless"), json!({"foo": "bar"}), json!(23));
    /// assert_eq!(event.event_type, EventType::Manual);
    /// assert_eq!(event.level, Level::Info);
    /// assert_eq!(event.body["foo"], "bar");
    ///
    /// let event = TelemetryEvent::from_args(json!({"status": 500}), json!("error"), Value::Null);
    /// assert_eq!(event.level, Level::Error);
    /// ```
    pub fn from_args(type_or_body: Value, body_or_level: Value, level: Value) -> Self {
        let (event_type, body, level) = match type_or_body {
            Value::Object(body) => (EventType::Manual, body, body_or_level),
            other => {
                let event_type = other
                    .as_str()
                    .and_then(EventType::parse)
                    .unwrap_or(EventType::Manual);
                (event_type, into_body(body_or_level), level)
            }
        };
        let level = level
            .as_str()
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
            .unwrap_or(event_type.default_level());

        Self::new(event_type, level, body)
    }
}

fn into_body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_owned(), other);
            map
        }
    }
}

/// Fixed-capacity FIFO of telemetry events. When full, the oldest event is
/// dropped to make room.
#[derive(Debug, Clone, Default)]
pub struct Telemeter {
    events: VecDeque<TelemetryEvent>,
    capacity: usize,
}

impl Telemeter {
    /// Creates an empty buffer holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Changes the capacity, discarding the oldest events if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.truncate();
    }

    /// The current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends an event.
    pub fn record(&mut self, event: TelemetryEvent) {
        self.events.push_back(event);
        self.truncate();
    }

    /// A copy of the buffered events, oldest first.
    pub fn copy_events(&self) -> Vec<TelemetryEvent> {
        self.events.iter().cloned().collect()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn truncate(&mut self) {
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }
}
