//! Event classifier
//!
//! Maps one frame payload to a [`StreamEvent`]. Rules are tried in order and
//! the first match wins; anything unrecognized is dropped by returning `None`.

use serde_json::{Map, Value};

use super::events::{CrisisPayload, DoneInfo, StreamEvent};
use super::payloads::{CrisisBody, ErrorBody};
use crate::flow::Step;

/// Reason code the backend uses for a safety block.
pub const CRISIS_REASON: &str = "CRISIS";

const DONE_KEYS: [&str; 4] = [
    "next_step",
    "emotion_detected",
    "confidence",
    "session_completed",
];

/// Classify a raw frame payload.
pub fn classify(payload: &str) -> Option<StreamEvent> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => classify_value(&value),
        Err(e) => {
            tracing::debug!(error = %e, "Dropping non-JSON frame");
            None
        }
    }
}

/// Classify an already-parsed JSON value.
///
/// Used for stream frames as well as single-body JSON responses.
pub fn classify_value(value: &Value) -> Option<StreamEvent> {
    let object = value.as_object()?;

    if is_crisis(object) {
        return Some(StreamEvent::Crisis(crisis_payload(value)));
    }

    if let Some(Value::String(content)) = object.get("content") {
        return Some(StreamEvent::Token {
            content: content.clone(),
        });
    }

    if DONE_KEYS.iter().any(|key| object.contains_key(*key)) {
        return Some(StreamEvent::Done(done_info(object)));
    }

    if let Some(Value::String(_)) = object.get("error") {
        let body: ErrorBody = serde_json::from_value(value.clone()).ok()?;
        return Some(StreamEvent::Failed {
            code: body.error,
            message: body.message,
        });
    }

    None
}

/// Whether a JSON object is a crisis block.
pub fn is_crisis(object: &Map<String, Value>) -> bool {
    let blocked = object.get("blocked").map(is_truthy).unwrap_or(false);
    let reason = object.get("reason").and_then(Value::as_str);
    blocked && reason == Some(CRISIS_REASON)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn crisis_payload(value: &Value) -> CrisisPayload {
    let body: CrisisBody = match serde_json::from_value(value.clone()) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Crisis frame has malformed resources");
            return CrisisPayload::default();
        }
    };

    let resources = body
        .resources
        .into_iter()
        .filter_map(|(region, number)| match number {
            Value::String(s) => Some((region, s)),
            Value::Number(n) => Some((region, n.to_string())),
            _ => None,
        })
        .collect();

    CrisisPayload {
        resources,
        message: body.message,
    }
}

fn done_info(object: &Map<String, Value>) -> DoneInfo {
    let message_id = field(object, "message_id", |v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    DoneInfo {
        next_step: parse_step(field(object, "next_step", |v| v.as_str().map(str::to_string))),
        emotion_detected: field(object, "emotion_detected", |v| v.as_str().map(str::to_string)),
        confidence: field(object, "confidence", Value::as_f64),
        message_id,
        step_completed: parse_step(field(object, "step_completed", |v| {
            v.as_str().map(str::to_string)
        })),
        session_completed: field(object, "session_completed", Value::as_bool),
    }
}

/// Read one optional done field. Null is absent; a value of the wrong type
/// is logged and treated as absent so the rest of the frame still applies.
fn field<T>(
    object: &Map<String, Value>,
    key: &str,
    read: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    match object.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let parsed = read(value);
            if parsed.is_none() {
                tracing::warn!(field = key, value = %value, "Ignoring mistyped field in done frame");
            }
            parsed
        }
    }
}

/// Unknown step names are treated as absent.
fn parse_step(name: Option<String>) -> Option<Step> {
    let name = name?;
    match name.parse::<Step>() {
        Ok(step) => Some(step),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unknown step in done frame");
            None
        }
    }
}
