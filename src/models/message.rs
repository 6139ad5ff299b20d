use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::Step;

/// Author of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A committed message in a session.
///
/// Messages are immutable once committed; the in-progress assistant reply
/// lives in the orchestrator's accumulator until its turn completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Step the session was at when the message was committed
    pub step: Step,
    pub timestamp: DateTime<Utc>,
    /// Emotion the backend detected for this turn, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

impl Message {
    fn new(role: Role, step: Step, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            step,
            timestamp: Utc::now(),
            emotion: None,
        }
    }

    /// New user message with a fresh id.
    pub fn user(step: Step, content: impl Into<String>) -> Self {
        Self::new(Role::User, step, content)
    }

    /// New assistant message with a fresh id.
    pub fn assistant(step: Step, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, step, content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_emotion(mut self, emotion: Option<String>) -> Self {
        self.emotion = emotion;
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Message shape returned by the session history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMessage {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    pub step: String,
    pub created_at: DateTime<Utc>,
}

impl RemoteMessage {
    /// Convert to a local message. Messages with an unknown step are skipped.
    pub fn into_message(self) -> Option<Message> {
        let step = match self.step.parse::<Step>() {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "Skipping remote message");
                return None;
            }
        };
        Some(Message {
            id: self.id,
            role: self.role,
            content: self.content,
            step,
            timestamp: self.created_at,
            emotion: None,
        })
    }
}
