//! Client configuration.
//!
//! Defaults, `with_*` builder setters, and `from_env()` for the binary.

use std::path::PathBuf;

use crate::flow::Flow;

/// Default backend URL for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable overriding the backend URL.
pub const ENV_API_URL: &str = "STEPFLOW_API_URL";
/// Environment variable overriding the ledger directory.
pub const ENV_DATA_DIR: &str = "STEPFLOW_DATA_DIR";
/// Environment variable selecting the default flow.
pub const ENV_FLOW: &str = "STEPFLOW_FLOW";
/// Environment variable carrying a bearer token for the backend.
pub const ENV_TOKEN: &str = "STEPFLOW_TOKEN";

/// Configuration for a stepflow client.
///
/// # Example
///
/// ```ignore
/// use stepflow::config::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_api_url("https://api.example.com")
///     .with_flow(Flow::Learn);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash
    pub api_url: String,
    /// Directory holding the message ledger
    pub data_dir: PathBuf,
    /// Flow used when creating a new session
    pub flow: Flow,
    /// Bearer token attached to every request
    pub auth_token: Option<String>,
    /// Sent as `X-Device-Fingerprint` when set
    pub device_fingerprint: Option<String>,
    /// Capacity of the turn update broadcast channel
    pub update_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: default_data_dir(),
            flow: Flow::Solve,
            auth_token: None,
            device_fingerprint: None,
            update_buffer: 256,
        }
    }
}

/// `<platform data dir>/stepflow`, or `./data` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("stepflow"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `STEPFLOW_*` environment variables.
    ///
    /// An unparseable `STEPFLOW_FLOW` is ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config = config.with_api_url(url);
            }
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                config = config.with_data_dir(dir);
            }
        }
        if let Ok(flow) = std::env::var(ENV_FLOW) {
            match flow.parse() {
                Ok(flow) => config = config.with_flow(flow),
                Err(e) => tracing::warn!(error = %e, "Ignoring {}", ENV_FLOW),
            }
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            if !token.trim().is_empty() {
                config = config.with_auth_token(token);
            }
        }

        config
    }

    /// Set the backend URL. A trailing slash is removed.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_device_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.device_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_update_buffer(mut self, capacity: usize) -> Self {
        self.update_buffer = capacity.max(1);
        self
    }
}
