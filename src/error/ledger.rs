//! Message ledger errors.

use std::path::PathBuf;

use thiserror::Error;

use super::ErrorCategory;

/// Errors raised by ledger stores.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing a session file failed
    #[error("Ledger I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A session log could not be encoded or decoded
    #[error("Ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session id cannot be used as a storage key
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// The process-wide ledger was used before `init_global`
    #[error("Message ledger has not been initialized")]
    NotInitialized,

    /// A store reported a failure of its own
    #[error("Ledger store unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LedgerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::InvalidSessionId(_) | LedgerError::NotInitialized => ErrorCategory::Client,
            _ => ErrorCategory::Storage,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Io { .. } => "E_LEDGER_IO",
            LedgerError::Serialization(_) => "E_LEDGER_SERDE",
            LedgerError::InvalidSessionId(_) => "E_LEDGER_ID",
            LedgerError::NotInitialized => "E_LEDGER_INIT",
            LedgerError::Unavailable(_) => "E_LEDGER_UNAVAILABLE",
        }
    }
}
