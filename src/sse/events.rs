//! Stream line, frame and event types.

use std::collections::BTreeMap;

use crate::flow::Step;

/// Payload that marks the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A single classified line of the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// `event: <type>` declaration
    Event(String),
    /// `data: <payload>` with the prefix and surrounding whitespace stripped
    Data(String),
    /// Blank line between events
    Empty,
    /// `:` comment or a line in no known format
    Comment(String),
}

/// A logical protocol frame produced by the frame decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Non-empty data payload
    Data(String),
    /// End-of-stream sentinel
    End,
}

/// Semantic event carried by one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental assistant text
    Token { content: String },
    /// Safety interrupt; the turn is aborted
    Crisis(CrisisPayload),
    /// Turn finished, possibly with a step transition
    Done(DoneInfo),
    /// Backend reported that generation failed
    Failed {
        code: String,
        message: Option<String>,
    },
}

impl StreamEvent {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Token { .. })
    }
}

/// Help resources shown when the backend blocks a turn for safety reasons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrisisPayload {
    /// Hotline numbers keyed by region code (`US`, `ES`, ...)
    pub resources: BTreeMap<String, String>,
    pub message: Option<String>,
}

impl CrisisPayload {
    pub fn resource(&self, region: &str) -> Option<&str> {
        self.resources.get(region).map(String::as_str)
    }
}

/// Fields carried by a `Done` event. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DoneInfo {
    pub next_step: Option<Step>,
    pub emotion_detected: Option<String>,
    pub confidence: Option<f64>,
    /// Server-side id of the assistant message (learn flow)
    pub message_id: Option<String>,
    /// Step the server considers finished (learn flow)
    pub step_completed: Option<Step>,
    /// Explicit end-of-session signal (learn flow)
    pub session_completed: Option<bool>,
}
