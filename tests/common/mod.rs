//! Common test utilities for integration tests.
//!
//! Builds an orchestrator over a [`MockHttpClient`] and provides stream and
//! ledger fixtures.
//!
//! # Example
//!
//! ```ignore
//! let h = Harness::new();
//! h.open_solve("s1").await;
//! h.script("s1", &[r#"{"content":"Hi"}"#, r#"{"next_step":"clarify"}"#]);
//! ```

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use stepflow::adapters::mock::{MockHttpClient, MockResponse};
use stepflow::ledger::{InMemoryLedgerStore, LedgerStore};
use stepflow::{
    Flow, LedgerError, Message, MessageLedger, Orchestrator, Session, SessionApi, Step,
};

pub const API: &str = "http://api";

/// Frame each payload as one `data:` event.
pub fn sse(payloads: &[&str]) -> Vec<String> {
    payloads
        .iter()
        .map(|payload| format!("data: {}\n\n", payload))
        .collect()
}

pub fn messages_url(flow: Flow, session_id: &str) -> String {
    match flow {
        Flow::Solve => format!("{}/sessions/{}/messages", API, session_id),
        Flow::Learn => format!("{}/learn/{}/messages", API, session_id),
    }
}

/// Orchestrator wired to a mock backend.
pub struct Harness {
    pub mock: MockHttpClient,
    pub ledger: MessageLedger,
    pub orchestrator: Orchestrator<MockHttpClient>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ledger(MessageLedger::in_memory())
    }

    pub fn with_ledger(ledger: MessageLedger) -> Self {
        let mock = MockHttpClient::new();
        let api = SessionApi::new(mock.clone(), API);
        let orchestrator = Orchestrator::new(api, ledger.clone());
        Self {
            mock,
            ledger,
            orchestrator,
        }
    }

    pub async fn open(&self, session_id: &str, flow: Flow, step: Step) -> Session {
        let mut session = Session::new(session_id, flow);
        session.current_step = step;
        self.orchestrator.open(session.clone()).await;
        session
    }

    pub async fn open_solve(&self, session_id: &str) -> Session {
        self.open(session_id, Flow::Solve, Step::Receive).await
    }

    /// Answer every turn of a solve session with these payloads.
    pub fn script(&self, session_id: &str, payloads: &[&str]) {
        self.mock.set_response(
            &messages_url(Flow::Solve, session_id),
            MockResponse::stream(sse(payloads)),
        );
    }

    /// Answer the next turn of a solve session with these payloads.
    pub fn script_once(&self, session_id: &str, payloads: &[&str]) {
        self.mock.push_response(
            &messages_url(Flow::Solve, session_id),
            MockResponse::stream(sse(payloads)),
        );
    }

    /// Answer every turn with payloads spaced `delay` apart.
    pub fn script_slow(&self, session_id: &str, payloads: &[&str], delay: Duration) {
        self.mock.set_response(
            &messages_url(Flow::Solve, session_id),
            MockResponse::delayed(sse(payloads), delay),
        );
    }

    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        self.ledger.list(session_id).await.unwrap()
    }
}

/// In-memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyLedgerStore {
    inner: InMemoryLedgerStore,
    failing: AtomicBool,
    snapshots_failing: AtomicBool,
}

impl FlakyLedgerStore {
    pub fn failing() -> Arc<Self> {
        let store = Arc::new(Self::default());
        store.set_failing(true);
        store
    }

    /// Fail message and snapshot writes.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
        self.snapshots_failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only snapshot writes.
    pub fn set_snapshots_failing(&self, failing: bool) {
        self.snapshots_failing.store(failing, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool) -> Result<(), LedgerError> {
        if flag.load(Ordering::SeqCst) {
            Err(LedgerError::Unavailable("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyLedgerStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), LedgerError> {
        Self::check(&self.failing)?;
        self.inner.append(session_id, message).await
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Message>, LedgerError> {
        self.inner.list(session_id).await
    }

    async fn delete(&self, session_id: &str) -> Result<(), LedgerError> {
        self.inner.delete(session_id).await
    }

    async fn put_session(&self, session: &Session) -> Result<(), LedgerError> {
        Self::check(&self.snapshots_failing)?;
        self.inner.put_session(session).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, LedgerError> {
        self.inner.get_session(session_id).await
    }
}
