use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flow::{Flow, Step};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

/// One guided dialogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub flow: Flow,
    #[serde(default)]
    pub status: SessionStatus,
    pub current_step: Step,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A new active session at the first step of `flow`.
    pub fn new(id: impl Into<String>, flow: Flow) -> Self {
        Self {
            id: id.into(),
            flow,
            status: SessionStatus::Active,
            current_step: flow.first(),
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}
