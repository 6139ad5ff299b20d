//! Session API client.
//!
//! Endpoint paths and request/response shapes of the backend. The solve flow
//! lives under `/sessions`, the learn flow under `/learn`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::flow::{Flow, Step};
use crate::models::{Message, RemoteMessage, Session, SessionStatus};
use crate::traits::{Headers, HttpClient, HttpError, Response, StreamingResponse};

/// Body of a turn request.
#[derive(Debug, Clone, Serialize)]
struct TurnRequest<'a> {
    content: &'a str,
    step: Step,
}

/// Response of the create endpoints.
#[derive(Debug, Deserialize)]
struct CreatedSession {
    #[serde(deserialize_with = "crate::models::deserialize_id")]
    session_id: String,
    #[serde(default)]
    status: Option<SessionStatus>,
    #[serde(default)]
    current_step: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Session detail with its message history.
#[derive(Debug, Deserialize)]
struct SessionDetail {
    #[serde(default)]
    messages: Vec<RemoteMessage>,
}

/// Partial update of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_step_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_first_step_action(mut self, action: impl Into<String>) -> Self {
        self.first_step_action = Some(action.into());
        self
    }

    pub fn with_reminder_time(mut self, at: DateTime<Utc>) -> Self {
        self.reminder_time = Some(at);
        self
    }
}

fn collection(flow: Flow) -> &'static str {
    match flow {
        Flow::Solve => "sessions",
        Flow::Learn => "learn",
    }
}

/// Client for the session endpoints.
pub struct SessionApi<C: HttpClient> {
    client: C,
    base_url: String,
    headers: Headers,
}

impl<C: HttpClient> SessionApi<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Headers::new(),
        }
    }

    /// Build from configuration: base URL, bearer token and device fingerprint.
    pub fn from_config(client: C, config: &ClientConfig) -> Self {
        let mut api = Self::new(client, config.api_url.clone());
        if let Some(token) = &config.auth_token {
            api = api.with_auth(token);
        }
        if let Some(fingerprint) = &config.device_fingerprint {
            api = api.with_header("X-Device-Fingerprint", fingerprint);
        }
        api
    }

    /// Attach a header to every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn session_url(&self, flow: Flow, session_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection(flow), session_id)
    }

    pub fn messages_url(&self, flow: Flow, session_id: &str) -> String {
        format!("{}/messages", self.session_url(flow, session_id))
    }

    fn json_headers(&self) -> Headers {
        let mut headers = self.headers.clone();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers
    }

    fn check(response: Response) -> Result<Response, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                status: response.status,
                message: response.text().unwrap_or_default(),
            })
        }
    }

    /// Create a session on the backend.
    pub async fn create_session(&self, flow: Flow) -> Result<Session, ApiError> {
        let url = format!("{}/{}", self.base_url, collection(flow));
        let response = self.client.post(&url, "{}", &self.json_headers()).await?;
        let created: CreatedSession = Self::check(response)?.json()?;

        let current_step = created
            .current_step
            .and_then(|s| s.parse::<Step>().ok())
            .unwrap_or_else(|| flow.first());

        tracing::info!(session_id = %created.session_id, %flow, "Session created");

        Ok(Session {
            id: created.session_id,
            flow,
            status: created.status.unwrap_or_default(),
            current_step,
            created_at: created.created_at.unwrap_or_else(Utc::now),
        })
    }

    /// Open the response stream for one turn.
    ///
    /// The response is either an event stream or, for some backends, a single
    /// JSON body; see [`StreamingResponse::is_json`].
    pub async fn open_turn(
        &self,
        flow: Flow,
        session_id: &str,
        content: &str,
        step: Step,
    ) -> Result<StreamingResponse, HttpError> {
        let body = serde_json::to_string(&TurnRequest { content, step })
            .map_err(|e| HttpError::Other(e.to_string()))?;
        let mut headers = self.json_headers();
        headers.insert("Accept".to_string(), "text/event-stream".to_string());

        tracing::debug!(session_id, %step, "Opening turn stream");
        self.client
            .post_stream(&self.messages_url(flow, session_id), &body, &headers)
            .await
    }

    /// Fetch the server-side message history of a session.
    pub async fn fetch_messages(
        &self,
        flow: Flow,
        session_id: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let url = match flow {
            Flow::Solve => format!("{}?include_messages=true", self.session_url(flow, session_id)),
            Flow::Learn => self.session_url(flow, session_id),
        };
        let response = self.client.get(&url, &self.headers).await?;
        let detail: SessionDetail = Self::check(response)?.json()?;

        Ok(detail
            .messages
            .into_iter()
            .filter_map(RemoteMessage::into_message)
            .collect())
    }

    /// Apply a partial update to a session.
    pub async fn patch_session(
        &self,
        flow: Flow,
        session_id: &str,
        patch: &SessionPatch,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_string(patch)?;
        let response = self
            .client
            .patch(&self.session_url(flow, session_id), &body, &self.json_headers())
            .await?;
        Self::check(response)?;
        tracing::debug!(session_id, "Session patched");
        Ok(())
    }
}
