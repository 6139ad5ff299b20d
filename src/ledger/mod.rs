//! Message ledger
//!
//! Durable, append-only record of committed messages per session, used to
//! replay a conversation after a restart. Appends are idempotent on the
//! message id: replaying an id overwrites the stored copy in place.
//!
//! Storage is pluggable through [`LedgerStore`]. The process normally uses a
//! single file-backed ledger reached through [`init_global`] and [`global`].

mod file;
mod memory;

pub use file::FileLedgerStore;
pub use memory::InMemoryLedgerStore;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::flow::Step;
use crate::models::{step_history, Message, Session, StepHistoryEntry};

/// Everything stored for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    /// Latest snapshot of the session, if one was saved
    #[serde(default)]
    pub session: Option<Session>,
    /// Committed messages ordered by timestamp, ties in append order
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl SessionLog {
    /// Insert or overwrite by id. Returns true if an existing copy was replaced.
    ///
    /// A new id is placed after every message with the same or an earlier
    /// timestamp, so a write retried later still lands at its commit time.
    pub fn upsert(&mut self, message: Message) -> bool {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
            return true;
        }
        let position = self
            .messages
            .iter()
            .rposition(|m| m.timestamp <= message.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(position, message);
        false
    }
}

/// Backing store for the ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Store a message, replacing any message with the same id.
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), LedgerError>;

    /// Messages of a session in commit order. Unknown sessions are empty.
    async fn list(&self, session_id: &str) -> Result<Vec<Message>, LedgerError>;

    /// Remove everything stored for a session.
    async fn delete(&self, session_id: &str) -> Result<(), LedgerError>;

    /// Save the session snapshot.
    async fn put_session(&self, session: &Session) -> Result<(), LedgerError>;

    /// Load the session snapshot, if any.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, LedgerError>;
}

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), LedgerError> {
        (**self).append(session_id, message).await
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Message>, LedgerError> {
        (**self).list(session_id).await
    }

    async fn delete(&self, session_id: &str) -> Result<(), LedgerError> {
        (**self).delete(session_id).await
    }

    async fn put_session(&self, session: &Session) -> Result<(), LedgerError> {
        (**self).put_session(session).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, LedgerError> {
        (**self).get_session(session_id).await
    }
}

/// Handle to a ledger store. Cheap to clone.
#[derive(Clone)]
pub struct MessageLedger {
    store: Arc<dyn LedgerStore>,
}

impl MessageLedger {
    pub fn new(store: impl LedgerStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Ledger that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(InMemoryLedgerStore::new())
    }

    pub async fn append(&self, session_id: &str, message: &Message) -> Result<(), LedgerError> {
        self.store.append(session_id, message).await?;
        tracing::debug!(
            session_id,
            message_id = %message.id,
            step = %message.step,
            "Ledger append"
        );
        Ok(())
    }

    pub async fn list(&self, session_id: &str) -> Result<Vec<Message>, LedgerError> {
        self.store.list(session_id).await
    }

    pub async fn clear(&self, session_id: &str) -> Result<(), LedgerError> {
        self.store.delete(session_id).await?;
        tracing::info!(session_id, "Ledger cleared");
        Ok(())
    }

    pub async fn save_session(&self, session: &Session) -> Result<(), LedgerError> {
        self.store.put_session(session).await
    }

    pub async fn load_session(&self, session_id: &str) -> Result<Option<Session>, LedgerError> {
        self.store.get_session(session_id).await
    }

    /// Step a resumed session should start from: the saved snapshot's step,
    /// else the step of the last committed message.
    pub async fn last_step(&self, session_id: &str) -> Result<Option<Step>, LedgerError> {
        if let Some(session) = self.load_session(session_id).await? {
            return Ok(Some(session.current_step));
        }
        Ok(self.list(session_id).await?.last().map(|m| m.step))
    }

    /// Messages grouped by step.
    pub async fn step_history(
        &self,
        session_id: &str,
    ) -> Result<Vec<StepHistoryEntry>, LedgerError> {
        Ok(step_history(&self.list(session_id).await?))
    }
}

impl std::fmt::Debug for MessageLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLedger").finish_non_exhaustive()
    }
}

static GLOBAL_LEDGER: OnceCell<MessageLedger> = OnceCell::new();

/// Open the process-wide file ledger under `data_dir`.
///
/// Only the first call opens storage; later calls return the same handle
/// regardless of the directory passed.
pub fn init_global(data_dir: impl AsRef<Path>) -> Result<&'static MessageLedger, LedgerError> {
    let data_dir = data_dir.as_ref();
    GLOBAL_LEDGER.get_or_try_init(|| {
        let store = FileLedgerStore::open(data_dir)?;
        tracing::info!(path = ?store.root(), "Message ledger opened");
        Ok(MessageLedger::new(store))
    })
}

/// The process-wide ledger. Fails if [`init_global`] has not run.
pub fn global() -> Result<&'static MessageLedger, LedgerError> {
    GLOBAL_LEDGER.get().ok_or(LedgerError::NotInitialized)
}
