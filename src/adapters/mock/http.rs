//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that returns scripted responses,
//! including event streams delivered chunk by chunk.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response, StreamingResponse};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET, POST or PATCH)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
    /// Request body (for POST and PATCH requests)
    pub body: Option<String>,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a buffered response
    Success(Response),
    /// Fail the request before any body is read
    Error(HttpError),
    /// Return an event stream delivering these chunks
    Stream(Vec<Bytes>),
    /// Event stream that waits `delay` before each chunk
    DelayedStream { chunks: Vec<Bytes>, delay: Duration },
    /// Event stream that breaks with `error` after the chunks
    BrokenStream { chunks: Vec<Bytes>, error: HttpError },
    /// Single `application/json` body on a streaming request
    Json(String),
}

impl MockResponse {
    /// Event stream built from string chunks.
    pub fn stream<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockResponse::Stream(to_bytes(chunks))
    }

    /// Delayed event stream built from string chunks.
    pub fn delayed<I, S>(chunks: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockResponse::DelayedStream {
            chunks: to_bytes(chunks),
            delay,
        }
    }
}

fn to_bytes<I, S>(chunks: I) -> Vec<Bytes>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    chunks.into_iter().map(|c| Bytes::from(c.into())).collect()
}

fn event_stream_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("content-type".to_string(), "text/event-stream".to_string());
    headers
}

/// Mock HTTP client for testing.
///
/// Responses are looked up by URL: first a queued one-shot response, then
/// an exact match, then a prefix match, then the default.
///
/// # Example
///
/// ```ignore
/// use stepflow::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.set_response(
///     "http://api/sessions/s-1/messages",
///     MockResponse::stream(["data: {\"content\":\"Hi\"}\n", "data: {\"next_step\":\"clarify\"}\n"]),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    /// Configured responses by URL pattern
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// One-shot responses consumed in order
    queued: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            queued: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set a response for a URL (exact or prefix match).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), response);
    }

    /// Queue a response used once for the next request to exactly `url`.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        let mut queued = self.queued.lock().unwrap();
        queued.entry(url.to_string()).or_default().push_back(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests with this method.
    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Record a request.
    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    /// Get the response for a URL.
    fn get_response(&self, url: &str) -> Option<MockResponse> {
        if let Some(queue) = self.queued.lock().unwrap().get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }

        let responses = self.responses.lock().unwrap();

        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        responses
            .iter()
            .find(|(pattern, _)| url.starts_with(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }

    fn buffered(&self, url: &str) -> Result<Response, HttpError> {
        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Json(body)) => Ok(Response::json_body(200, body)),
            Some(_) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("GET", url, headers, None);
        self.buffered(url)
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));
        self.buffered(url)
    }

    async fn patch(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<Response, HttpError> {
        self.record_request("PATCH", url, headers, Some(body.to_string()));
        self.buffered(url)
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<StreamingResponse, HttpError> {
        self.record_request("POST", url, headers, Some(body.to_string()));

        let (headers, stream): (Headers, ByteStream) = match self.get_response(url) {
            Some(MockResponse::Stream(chunks)) => (
                event_stream_headers(),
                Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))),
            ),
            Some(MockResponse::DelayedStream { chunks, delay }) => (
                event_stream_headers(),
                Box::pin(futures::stream::iter(chunks).then(move |chunk| async move {
                    tokio::time::sleep(delay).await;
                    Ok::<Bytes, HttpError>(chunk)
                })),
            ),
            Some(MockResponse::BrokenStream { chunks, error }) => (
                event_stream_headers(),
                Box::pin(futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(Ok)
                        .chain(std::iter::once(Err(error))),
                )),
            ),
            Some(MockResponse::Json(body)) => {
                let mut headers = Headers::new();
                headers.insert("content-type".to_string(), "application/json".to_string());
                (
                    headers,
                    Box::pin(futures::stream::iter(vec![Ok(Bytes::from(body))])),
                )
            }
            Some(MockResponse::Success(response)) => {
                if !response.is_success() {
                    return Err(HttpError::ServerError {
                        status: response.status,
                        message: response.text().unwrap_or_default(),
                    });
                }
                (
                    response.headers,
                    Box::pin(futures::stream::iter(vec![Ok(response.body)])),
                )
            }
            Some(MockResponse::Error(err)) => return Err(err),
            None => return Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        };

        Ok(StreamingResponse::new(200, headers, stream))
    }
}
