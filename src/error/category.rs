//! Error category classification.
//!
//! A coarse grouping that drives retry affordances and log fields.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, DNS, timeout or a dropped stream.
    /// Generally transient; the caller may offer a retry.
    Network,

    /// The backend answered with an error status or an error frame.
    Server,

    /// The stream was well-formed at the transport level but broke the
    /// turn protocol (for example it ended without a terminal event).
    Protocol,

    /// Local message storage failed.
    Storage,

    /// Programming or usage errors, such as an unknown session id.
    Client,
}

impl ErrorCategory {
    /// Whether errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network | ErrorCategory::Server | ErrorCategory::Protocol
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Server => "server",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Client => "client",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
