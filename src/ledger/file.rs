//! JSON file ledger store. One file per session under `<root>/sessions/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LedgerStore, SessionLog};
use crate::error::LedgerError;
use crate::models::{Message, Session};

/// File-backed store that survives process restarts.
#[derive(Debug)]
pub struct FileLedgerStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedgerStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let root = root.as_ref().to_path_buf();
        let sessions = root.join("sessions");
        std::fs::create_dir_all(&sessions).map_err(|e| LedgerError::io(&sessions, e))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, LedgerError> {
        let valid = !session_id.is_empty()
            && !session_id.starts_with('.')
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(LedgerError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.root.join("sessions").join(format!("{}.json", session_id)))
    }

    async fn read_log(&self, path: &Path) -> Result<SessionLog, LedgerError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SessionLog::default()),
            Err(e) => Err(LedgerError::io(path, e)),
        }
    }

    /// Write through a temp file so a crash never leaves a half-written log.
    async fn write_log(&self, path: &Path, log: &SessionLog) -> Result<(), LedgerError> {
        let json = serde_json::to_vec_pretty(log)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| LedgerError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| LedgerError::io(path, e))
    }
}

#[async_trait]
impl LedgerStore for FileLedgerStore {
    async fn append(&self, session_id: &str, message: &Message) -> Result<(), LedgerError> {
        let path = self.path_for(session_id)?;
        let _guard = self.write_lock.lock().await;
        let mut log = self.read_log(&path).await?;
        log.upsert(message.clone());
        self.write_log(&path, &log).await
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Message>, LedgerError> {
        let path = self.path_for(session_id)?;
        Ok(self.read_log(&path).await?.messages)
    }

    async fn delete(&self, session_id: &str) -> Result<(), LedgerError> {
        let path = self.path_for(session_id)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LedgerError::io(&path, e)),
        }
    }

    async fn put_session(&self, session: &Session) -> Result<(), LedgerError> {
        let path = self.path_for(&session.id)?;
        let _guard = self.write_lock.lock().await;
        let mut log = self.read_log(&path).await?;
        log.session = Some(session.clone());
        self.write_log(&path, &log).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, LedgerError> {
        let path = self.path_for(session_id)?;
        Ok(self.read_log(&path).await?.session)
    }
}
