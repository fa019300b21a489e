//! Event model for the host-process channel.
//!
//! Everything the engine tells the host travels as one of these events,
//! serialized to a single JSON line of shape
//! `{"messageType": <string>, "message": <any>}`.

use serde::Serialize;
use serde_json::{json, Value};

/// A face that passed the match threshold on the current frame.
///
/// Ephemeral: recreated every frame, never persisted. The distance is
/// rounded to 2 decimals at construction, matching the wire format.
/// Rounding happens in `f64` so the serialized JSON number is exact;
/// widening the rounded `f32` instead would put values like
/// 0.20000000298023224 on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedFace {
    pub user_login: String,
    pub distance: f64,
}

impl MatchedFace {
    pub fn new(user_login: impl Into<String>, distance: f32) -> Self {
        Self {
            user_login: user_login.into(),
            distance: (distance as f64 * 100.0).round() / 100.0,
        }
    }
}

/// Who the session currently belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Nobody in front of the camera.
    NoUser,
    /// A face is present but matches no enrolled user.
    Unknown,
    /// An enrolled user, by login.
    Known(String),
}

impl Identity {
    /// The login string carried in login/logout events. The unknown user
    /// is reported as the reserved login `"unknown"`.
    pub fn as_wire_user(&self) -> &str {
        match self {
            Identity::NoUser => "",
            Identity::Unknown => "unknown",
            Identity::Known(login) => login,
        }
    }

    pub fn matches_login(&self, login: &str) -> bool {
        matches!(self, Identity::Known(current) if current == login)
    }
}

/// One event on the host channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Free-form diagnostic, any JSON value.
    Log(Value),
    /// Lifecycle / state announcement.
    Status(Value),
    /// A user (or the unknown user) was logged in.
    Login { user: String, distance: f64 },
    /// The current user departed.
    Logout { user: String },
    /// Raw per-frame match results, independent of any committed transition.
    MatchResults { matched_faces: Vec<MatchedFace> },
}

impl Event {
    pub fn log(message: impl Into<String>) -> Self {
        Event::Log(Value::String(message.into()))
    }

    pub fn status(message: impl Into<String>) -> Self {
        Event::Status(Value::String(message.into()))
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            Event::Log(_) => "log",
            Event::Status(_) => "status",
            Event::Login { .. } => "login",
            Event::Logout { .. } => "logout",
            Event::MatchResults { .. } => "matchResults",
        }
    }

    pub fn message(&self) -> Value {
        match self {
            Event::Log(v) | Event::Status(v) => v.clone(),
            Event::Login { user, distance } => json!({ "user": user, "distance": distance }),
            Event::Logout { user } => json!({ "user": user }),
            Event::MatchResults { matched_faces } => json!({ "matchedFaces": matched_faces }),
        }
    }

    /// Serialize to the wire envelope (no trailing newline).
    pub fn to_json_line(&self) -> String {
        json!({
            "messageType": self.message_type(),
            "message": self.message(),
        })
        .to_string()
    }
}

/// Sink for events bound for the host process.
///
/// Injected into every component that needs to report; implementations
/// decide where the events go (stdout for the daemon, memory for tests).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Sink that discards everything. Useful as a default in tests and tools.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Sink that records events in memory, for assertions in tests.
pub struct MemorySink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Events of a given wire type, in emission order.
    pub fn events_of_type(&self, message_type: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.message_type() == message_type)
            .collect()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}
