use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Message;
use crate::flow::Step;

/// Messages of one step, for the step history view.
///
/// Derived from the ledger on demand; never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepHistoryEntry {
    pub step: Step,
    pub started_at: DateTime<Utc>,
    /// Set once the session has moved past this step
    pub completed_at: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
}

/// Group messages by step, in order of each step's first appearance.
///
/// The step holding the most recent message is the one in progress; every
/// other step is complete as of its last message.
pub fn step_history(messages: &[Message]) -> Vec<StepHistoryEntry> {
    let mut entries: Vec<StepHistoryEntry> = Vec::new();

    for message in messages {
        match entries.iter_mut().find(|entry| entry.step == message.step) {
            Some(entry) => entry.messages.push(message.clone()),
            None => entries.push(StepHistoryEntry {
                step: message.step,
                started_at: message.timestamp,
                completed_at: None,
                messages: vec![message.clone()],
            }),
        }
    }

    let current = messages.last().map(|m| m.step);
    for entry in entries.iter_mut() {
        if Some(entry.step) != current {
            entry.completed_at = entry.messages.last().map(|m| m.timestamp);
        }
    }

    entries
}
