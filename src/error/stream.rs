//! Turn errors.
//!
//! Failures of a single submit/stream/commit cycle. A crisis interrupt or a
//! cancellation is an outcome, not an error.

use thiserror::Error;

use super::{ApiError, ErrorCategory, LedgerError};
use crate::traits::HttpError;

/// Why a turn failed.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The request could not be sent, the server refused it, or the stream
    /// broke mid-read. The optimistic user message stays in the ledger.
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),

    /// The stream closed without a crisis, done or error event.
    #[error("Stream ended without a terminal event after {received_chars} characters")]
    IncompleteStream { received_chars: usize },

    /// The backend reported a generation failure in an error frame.
    #[error("Backend error [{code}]{}", .message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Backend {
        code: String,
        message: Option<String>,
    },

    /// Submit or cancel targeted a session that was never opened.
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Reading the ledger failed while opening or resuming a session.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A session endpoint (create, update) failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl TurnError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TurnError::Transport(HttpError::ServerError { .. }) => ErrorCategory::Server,
            TurnError::Transport(_) => ErrorCategory::Network,
            TurnError::IncompleteStream { .. } => ErrorCategory::Protocol,
            TurnError::Backend { .. } => ErrorCategory::Server,
            TurnError::UnknownSession(_) => ErrorCategory::Client,
            TurnError::Ledger(e) => e.category(),
            TurnError::Api(e) => e.category(),
        }
    }

    /// Whether the caller may offer a retry. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            TurnError::Transport(HttpError::InvalidUrl(_)) => false,
            TurnError::Transport(HttpError::ServerError { status, .. }) => *status >= 500,
            TurnError::Api(e) => e.is_retryable(),
            other => other.category().is_retryable(),
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            TurnError::Transport(HttpError::ServerError { status, .. }) => {
                format!("The server could not answer (status {}). Please try again.", status)
            }
            TurnError::Transport(_) => {
                "Connection to the server was lost. Please try again.".to_string()
            }
            TurnError::IncompleteStream { .. } => {
                "The reply was cut off before it finished. Please try again.".to_string()
            }
            TurnError::Backend { .. } => {
                "Something went wrong while generating a reply. Please try again.".to_string()
            }
            TurnError::UnknownSession(id) => format!("Session '{}' is not open.", id),
            TurnError::Ledger(_) => "Your conversation history could not be loaded.".to_string(),
            TurnError::Api(_) => "The session could not be updated. Please try again.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            TurnError::Transport(_) => "E_TURN_TRANSPORT",
            TurnError::IncompleteStream { .. } => "E_TURN_INCOMPLETE",
            TurnError::Backend { .. } => "E_TURN_BACKEND",
            TurnError::UnknownSession(_) => "E_TURN_SESSION",
            TurnError::Ledger(e) => e.error_code(),
            TurnError::Api(e) => e.error_code(),
        }
    }
}
