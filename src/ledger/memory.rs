//! In-memory ledger store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerStore, SessionLog};
use crate::error::LedgerError;
use crate::models::{Message, Session};

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    logs: RwLock<HashMap<String, SessionLog>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with stored data.
    pub async fn session_count(&self) -> usize {
        self.logs.read().await.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), LedgerError> {
        let mut logs = self.logs.write().await;
        logs.entry(session_id.to_string())
            .or_default()
            .upsert(message.clone());
        Ok(())
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Message>, LedgerError> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(session_id)
            .map(|log| log.messages.clone())
            .unwrap_or_default())
    }

    async fn delete(&self, session_id: &str) -> Result<(), LedgerError> {
        self.logs.write().await.remove(session_id);
        Ok(())
    }

    async fn put_session(&self, session: &Session) -> Result<(), LedgerError> {
        let mut logs = self.logs.write().await;
        logs.entry(session.id.clone()).or_default().session = Some(session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, LedgerError> {
        let logs = self.logs.read().await;
        Ok(logs.get(session_id).and_then(|log| log.session.clone()))
    }
}
