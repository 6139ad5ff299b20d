//! Turn outcomes and progress updates.

use crate::flow::{Step, StepChange};
use crate::models::{Message, Session};
use crate::sse::CrisisPayload;

/// How a submitted turn ended, when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Not started: another turn is in flight, the text was blank, or the
    /// session is no longer active. No network call was made.
    Ignored,
    /// The assistant reply was committed.
    Completed(CompletedTurn),
    /// The backend blocked the turn. Nothing was committed for the reply.
    Crisis(CrisisPayload),
    /// The turn was cancelled before it committed.
    Cancelled,
}

impl TurnOutcome {
    pub fn completed(&self) -> Option<&CompletedTurn> {
        match self {
            TurnOutcome::Completed(turn) => Some(turn),
            _ => None,
        }
    }
}

/// A turn whose reply made it into the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTurn {
    pub user_message: Message,
    /// Committed at the step the session was at before any transition
    pub assistant_message: Message,
    pub transition: Option<StepChange>,
    /// Step after the transition
    pub current_step: Step,
    /// Options parsed from the reply when it moved the session into `options`
    pub options: Vec<String>,
    pub confidence: Option<f64>,
    /// The session passed its terminal step
    pub session_complete: bool,
    /// A ledger write failed; it will be retried on the next resume
    pub ledger_degraded: bool,
}

/// Progress published while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    Started {
        session_id: String,
        turn_id: u64,
    },
    /// Full reply text accumulated so far
    Content {
        session_id: String,
        turn_id: u64,
        content: String,
    },
    Crisis {
        session_id: String,
        turn_id: u64,
        payload: CrisisPayload,
    },
    Committed {
        session_id: String,
        turn_id: u64,
        message: Message,
        step: Step,
    },
    Failed {
        session_id: String,
        turn_id: u64,
        error: String,
    },
    Cancelled {
        session_id: String,
        turn_id: u64,
    },
}

impl TurnUpdate {
    pub fn session_id(&self) -> &str {
        match self {
            TurnUpdate::Started { session_id, .. }
            | TurnUpdate::Content { session_id, .. }
            | TurnUpdate::Crisis { session_id, .. }
            | TurnUpdate::Committed { session_id, .. }
            | TurnUpdate::Failed { session_id, .. }
            | TurnUpdate::Cancelled { session_id, .. } => session_id,
        }
    }
}

/// Point-in-time view of a registered session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session: Session,
    /// Zero-based step position for progress display
    pub progress_index: Option<usize>,
    pub step_count: usize,
    pub in_flight: bool,
    /// Messages whose ledger write failed and awaits retry
    pub unsynced: usize,
}
