//! Session API errors.

use thiserror::Error;

use super::ErrorCategory;
use crate::traits::HttpError;

/// Errors from the non-streaming session endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request did not complete
    #[error("Request failed: {0}")]
    Http(#[from] HttpError),

    /// The server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Http(_) => ErrorCategory::Network,
            ApiError::Status { status, .. } if *status >= 500 => ErrorCategory::Server,
            ApiError::Status { .. } => ErrorCategory::Client,
            ApiError::Decode(_) => ErrorCategory::Protocol,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Http(_) => "E_API_HTTP",
            ApiError::Status { .. } => "E_API_STATUS",
            ApiError::Decode(_) => "E_API_DECODE",
        }
    }

    /// Whether the server reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}
