//! Session stream orchestrator
//!
//! Owns the per-session step machines and at most one in-flight turn per
//! session. A turn:
//!
//! 1. appends the user message to the ledger (before any network call),
//! 2. opens the response stream and decodes frames into events,
//! 3. grows an in-memory reply on each token and publishes it,
//! 4. ends on the first terminal event: a crisis aborts without committing,
//!    done commits the reply at the pre-transition step and then advances.
//!
//! Cancellation drops the reader and discards the reply. Each turn carries an
//! id that is checked under the session lock before committing, so a done
//! event that races a cancel never commits.

mod turn;

pub use turn::{CompletedTurn, SessionState, TurnOutcome, TurnUpdate};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::api::{SessionApi, SessionPatch};
use crate::error::TurnError;
use crate::flow::{Flow, Step, StepChange, StepMachine};
use crate::ledger::MessageLedger;
use crate::models::{Message, Session, SessionStatus, StepHistoryEntry};
use crate::options::extract_options;
use crate::sse::{
    classify, classify_value, decode_stream, CrisisPayload, DoneInfo, Frame, StreamEvent,
};
use crate::traits::{HttpClient, HttpError, StreamingResponse};

const DEFAULT_UPDATE_BUFFER: usize = 256;

#[derive(Debug, Clone)]
struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct SessionSlot {
    session: Session,
    machine: StepMachine,
    active: Option<ActiveTurn>,
    /// Messages whose ledger write failed, retried on resume
    unsynced: Vec<Message>,
    /// The last snapshot write failed, rewritten on resume
    snapshot_dirty: bool,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            machine: StepMachine::resume(session.flow, session.current_step),
            session,
            active: None,
            unsynced: Vec::new(),
            snapshot_dirty: false,
        }
    }

    fn is_live(&self, turn: &ActiveTurn) -> bool {
        self.active.as_ref().map(|a| a.id) == Some(turn.id) && !turn.cancel.is_cancelled()
    }

    /// Release the in-flight slot if it still belongs to `turn`.
    fn release(&mut self, turn: &ActiveTurn) {
        if self.active.as_ref().map(|a| a.id) == Some(turn.id) {
            self.active = None;
        }
    }
}

/// How the stream of one turn ended.
enum TurnEnd {
    Done { content: String, info: DoneInfo },
    Crisis(CrisisPayload),
    Cancelled,
}

/// Drives turns for any number of concurrently open sessions.
pub struct Orchestrator<C: HttpClient> {
    api: SessionApi<C>,
    ledger: MessageLedger,
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionSlot>>>>,
    updates: broadcast::Sender<TurnUpdate>,
    next_turn: AtomicU64,
}

impl<C: HttpClient> Orchestrator<C> {
    pub fn new(api: SessionApi<C>, ledger: MessageLedger) -> Self {
        Self::with_update_buffer(api, ledger, DEFAULT_UPDATE_BUFFER)
    }

    pub fn with_update_buffer(api: SessionApi<C>, ledger: MessageLedger, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            api,
            ledger,
            sessions: RwLock::new(HashMap::new()),
            updates,
            next_turn: AtomicU64::new(1),
        }
    }

    /// Receive turn progress for every session.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnUpdate> {
        self.updates.subscribe()
    }

    fn publish(&self, update: TurnUpdate) {
        // No receivers is fine.
        let _ = self.updates.send(update);
    }

    async fn slot(&self, session_id: &str) -> Result<Arc<Mutex<SessionSlot>>, TurnError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| TurnError::UnknownSession(session_id.to_string()))
    }

    /// Create a session on the backend and open it.
    pub async fn start(&self, flow: Flow) -> Result<Session, TurnError> {
        let session = self.api.create_session(flow).await?;
        self.open(session.clone()).await;
        Ok(session)
    }

    /// Register a session at its current step. Replaces any registration
    /// with the same id.
    pub async fn open(&self, session: Session) {
        let mut slot = SessionSlot::new(session.clone());
        self.sync_snapshot(&mut slot).await;
        tracing::info!(
            session_id = %session.id,
            flow = %session.flow,
            step = %session.current_step,
            "Session opened"
        );
        self.sessions
            .write()
            .await
            .insert(session.id, Arc::new(Mutex::new(slot)));
    }

    /// Re-open a session from the ledger, for example after a restart.
    ///
    /// Retries ledger writes that failed earlier, seeds an empty ledger from
    /// the backend's history once, and returns the committed messages.
    pub async fn resume(&self, session_id: &str, flow: Flow) -> Result<Vec<Message>, TurnError> {
        if let Ok(slot) = self.slot(session_id).await {
            let mut state = slot.lock().await;
            self.flush_unsynced(session_id, &mut state).await;
        }

        let mut messages = self.ledger.list(session_id).await?;
        if messages.is_empty() {
            messages = self.seed_from_remote(session_id, flow).await;
        }

        let snapshot = self.ledger.load_session(session_id).await?;
        let session = match snapshot {
            Some(session) => session,
            None => Session {
                id: session_id.to_string(),
                flow,
                status: SessionStatus::Active,
                current_step: messages.last().map(|m| m.step).unwrap_or_else(|| flow.first()),
                created_at: messages.first().map(|m| m.timestamp).unwrap_or_else(Utc::now),
            },
        };

        let existing = self.sessions.read().await.get(session_id).cloned();
        match existing {
            Some(slot) => {
                let mut state = slot.lock().await;
                // A dirty slot is newer than the stored snapshot.
                if state.active.is_none() && !state.snapshot_dirty {
                    state.machine = StepMachine::resume(session.flow, session.current_step);
                    state.session = session;
                }
            }
            None => {
                tracing::info!(
                    session_id,
                    step = %session.current_step,
                    messages = messages.len(),
                    "Session resumed"
                );
                self.sessions
                    .write()
                    .await
                    .insert(session_id.to_string(), Arc::new(Mutex::new(SessionSlot::new(session))));
            }
        }

        Ok(messages)
    }

    async fn seed_from_remote(&self, session_id: &str, flow: Flow) -> Vec<Message> {
        let remote = match self.api.fetch_messages(flow, session_id).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Remote history unavailable");
                return Vec::new();
            }
        };

        for message in &remote {
            if let Err(e) = self.ledger.append(session_id, message).await {
                tracing::warn!(session_id, error = %e, "Failed to seed ledger from remote history");
                break;
            }
        }
        tracing::debug!(session_id, count = remote.len(), "Ledger seeded from remote history");
        remote
    }

    async fn flush_unsynced(&self, session_id: &str, state: &mut SessionSlot) {
        if state.unsynced.is_empty() && !state.snapshot_dirty {
            return;
        }
        let pending = std::mem::take(&mut state.unsynced);
        for message in pending {
            if let Err(e) = self.ledger.append(session_id, &message).await {
                tracing::warn!(session_id, message_id = %message.id, error = %e, "Ledger retry failed");
                state.unsynced.push(message);
            }
        }
        if state.unsynced.is_empty() && self.sync_snapshot(state).await {
            tracing::info!(session_id, "Ledger recovered");
        }
    }

    /// Write a message, queueing it for retry on failure.
    async fn persist(&self, session_id: &str, state: &mut SessionSlot, message: &Message) -> bool {
        match self.ledger.append(session_id, message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    session_id,
                    message_id = %message.id,
                    error_code = e.error_code(),
                    error = %e,
                    "Ledger write failed"
                );
                state.unsynced.push(message.clone());
                false
            }
        }
    }

    /// Write the session snapshot, marking the slot dirty on failure.
    async fn sync_snapshot(&self, state: &mut SessionSlot) -> bool {
        match self.ledger.save_session(&state.session).await {
            Ok(()) => {
                state.snapshot_dirty = false;
                true
            }
            Err(e) => {
                tracing::warn!(session_id = %state.session.id, error = %e, "Session snapshot write failed");
                state.snapshot_dirty = true;
                false
            }
        }
    }

    /// Submit user text and run the turn to its end.
    ///
    /// `current_step` is the step the caller shows; the request and both
    /// messages are tagged with it, and the step machine is realigned to it
    /// if it differs.
    pub async fn submit(
        &self,
        session_id: &str,
        text: &str,
        current_step: Step,
    ) -> Result<TurnOutcome, TurnError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let slot = self.slot(session_id).await?;
        let (turn, flow, user_message, user_persisted) = {
            let mut state = slot.lock().await;
            if state.active.is_some() {
                tracing::debug!(session_id, "Turn already in flight, ignoring submit");
                return Ok(TurnOutcome::Ignored);
            }
            if !state.session.is_active() {
                tracing::debug!(session_id, status = state.session.status.as_str(), "Session not active, ignoring submit");
                return Ok(TurnOutcome::Ignored);
            }
            if let Some(change) = state.machine.realign(current_step) {
                tracing::debug!(session_id, from = %change.from, to = %change.to, "Step realigned by caller");
                state.session.current_step = change.to;
            }

            let turn = ActiveTurn {
                id: self.next_turn.fetch_add(1, Ordering::Relaxed),
                cancel: CancellationToken::new(),
            };
            state.active = Some(turn.clone());

            let user_message = Message::user(current_step, text);
            let persisted = self.persist(session_id, &mut state, &user_message).await;
            (turn, state.session.flow, user_message, persisted)
        };

        tracing::info!(session_id, turn_id = turn.id, step = %current_step, "Turn started");
        self.publish(TurnUpdate::Started {
            session_id: session_id.to_string(),
            turn_id: turn.id,
        });

        let end = self
            .run_turn(session_id, flow, &turn, text, current_step)
            .await;

        match end {
            Ok(TurnEnd::Done { content, info }) => {
                self.commit(session_id, &slot, &turn, user_message, content, info, !user_persisted)
                    .await
            }
            Ok(TurnEnd::Crisis(payload)) => {
                slot.lock().await.release(&turn);
                tracing::warn!(session_id, turn_id = turn.id, "Turn blocked by crisis interrupt");
                self.publish(TurnUpdate::Crisis {
                    session_id: session_id.to_string(),
                    turn_id: turn.id,
                    payload: payload.clone(),
                });
                Ok(TurnOutcome::Crisis(payload))
            }
            Ok(TurnEnd::Cancelled) => {
                slot.lock().await.release(&turn);
                self.publish_cancelled(session_id, turn.id);
                Ok(TurnOutcome::Cancelled)
            }
            Err(e) => {
                slot.lock().await.release(&turn);
                tracing::warn!(
                    session_id,
                    turn_id = turn.id,
                    error_code = e.error_code(),
                    error = %e,
                    "Turn failed"
                );
                self.publish(TurnUpdate::Failed {
                    session_id: session_id.to_string(),
                    turn_id: turn.id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn publish_cancelled(&self, session_id: &str, turn_id: u64) {
        tracing::info!(session_id, turn_id, "Turn cancelled");
        self.publish(TurnUpdate::Cancelled {
            session_id: session_id.to_string(),
            turn_id,
        });
    }

    async fn run_turn(
        &self,
        session_id: &str,
        flow: Flow,
        turn: &ActiveTurn,
        text: &str,
        step: Step,
    ) -> Result<TurnEnd, TurnError> {
        let opened = tokio::select! {
            () = turn.cancel.cancelled() => return Ok(TurnEnd::Cancelled),
            opened = self.api.open_turn(flow, session_id, text, step) => opened,
        };

        let response = match opened {
            Ok(response) => response,
            Err(HttpError::ServerError { status, message }) => {
                if let Some(StreamEvent::Crisis(payload)) = classify(&message) {
                    return Ok(TurnEnd::Crisis(payload));
                }
                return Err(TurnError::Transport(HttpError::ServerError { status, message }));
            }
            Err(e) => return Err(e.into()),
        };

        if response.is_json() {
            return self.read_single_body(response, turn).await;
        }

        let mut frames = decode_stream(response.body);
        let mut content = String::new();

        loop {
            let next = tokio::select! {
                () = turn.cancel.cancelled() => return Ok(TurnEnd::Cancelled),
                next = frames.next() => next,
            };

            let payload = match next {
                Some(Ok(Frame::Data(payload))) => payload,
                Some(Ok(Frame::End)) | None => {
                    return Err(TurnError::IncompleteStream {
                        received_chars: content.chars().count(),
                    })
                }
                Some(Err(e)) => return Err(TurnError::Transport(e)),
            };

            match classify(&payload) {
                Some(StreamEvent::Token { content: piece }) => {
                    content.push_str(&piece);
                    self.publish(TurnUpdate::Content {
                        session_id: session_id.to_string(),
                        turn_id: turn.id,
                        content: content.clone(),
                    });
                }
                Some(StreamEvent::Crisis(payload)) => return Ok(TurnEnd::Crisis(payload)),
                Some(StreamEvent::Done(info)) => return Ok(TurnEnd::Done { content, info }),
                Some(StreamEvent::Failed { code, message }) => {
                    return Err(TurnError::Backend { code, message })
                }
                None => {}
            }
        }
    }

    /// Non-streaming reply: one JSON object that is either a crisis block or
    /// the final reply with its done fields.
    async fn read_single_body(
        &self,
        response: StreamingResponse,
        turn: &ActiveTurn,
    ) -> Result<TurnEnd, TurnError> {
        let mut body = response.body;
        let mut bytes = Vec::new();
        loop {
            let next = tokio::select! {
                () = turn.cancel.cancelled() => return Ok(TurnEnd::Cancelled),
                next = body.next() => next,
            };
            match next {
                Some(Ok(chunk)) => bytes.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(TurnError::Transport(e)),
                None => break,
            }
        }

        let incomplete = TurnError::IncompleteStream { received_chars: 0 };
        let mut value: Value = serde_json::from_slice(&bytes).map_err(|_| incomplete)?;

        match classify_value(&value) {
            Some(StreamEvent::Crisis(payload)) => return Ok(TurnEnd::Crisis(payload)),
            Some(StreamEvent::Failed { code, message }) => {
                return Err(TurnError::Backend { code, message })
            }
            _ => {}
        }

        let content = match value.as_object_mut().and_then(|o| o.remove("content")) {
            Some(Value::String(content)) => Some(content),
            _ => None,
        };
        let info = match classify_value(&value) {
            Some(StreamEvent::Done(info)) => Some(info),
            _ => None,
        };

        match (content, info) {
            (None, None) => Err(TurnError::IncompleteStream { received_chars: 0 }),
            (content, info) => Ok(TurnEnd::Done {
                content: content.unwrap_or_default(),
                info: info.unwrap_or_default(),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit(
        &self,
        session_id: &str,
        slot: &Arc<Mutex<SessionSlot>>,
        turn: &ActiveTurn,
        user_message: Message,
        content: String,
        info: DoneInfo,
        mut ledger_degraded: bool,
    ) -> Result<TurnOutcome, TurnError> {
        let mut state = slot.lock().await;
        if !state.is_live(turn) {
            state.release(turn);
            drop(state);
            self.publish_cancelled(session_id, turn.id);
            return Ok(TurnOutcome::Cancelled);
        }

        let flow = state.session.flow;
        let pre_step = state.machine.current();
        let mut assistant = Message::assistant(pre_step, content)
            .with_emotion(info.emotion_detected.clone());
        if let Some(id) = &info.message_id {
            assistant = assistant.with_id(id.clone());
        }

        if !self.persist(session_id, &mut state, &assistant).await {
            ledger_degraded = true;
        }

        let transition = state.machine.advance(info.next_step);
        let session_complete = info.session_completed.unwrap_or(false)
            || (pre_step == flow.terminal() && info.next_step.is_none());

        state.session.current_step = state.machine.current();
        if session_complete {
            state.session.status = SessionStatus::Completed;
        }
        if !self.sync_snapshot(&mut state).await {
            ledger_degraded = true;
        }
        state.release(turn);
        let current_step = state.machine.current();
        drop(state);

        let options = match transition {
            Some(StepChange { to: Step::Options, .. }) => extract_options(&assistant.content),
            _ => Vec::new(),
        };

        tracing::info!(
            session_id,
            turn_id = turn.id,
            step = %pre_step,
            next_step = %current_step,
            session_complete,
            "Turn committed"
        );
        self.publish(TurnUpdate::Committed {
            session_id: session_id.to_string(),
            turn_id: turn.id,
            message: assistant.clone(),
            step: current_step,
        });

        Ok(TurnOutcome::Completed(CompletedTurn {
            user_message,
            assistant_message: assistant,
            transition,
            current_step,
            options,
            confidence: info.confidence,
            session_complete,
            ledger_degraded,
        }))
    }

    /// Cancel the in-flight turn of a session. Returns false if none was running.
    ///
    /// The slot is freed immediately so a new turn can start.
    pub async fn cancel(&self, session_id: &str) -> Result<bool, TurnError> {
        let slot = self.slot(session_id).await?;
        let mut state = slot.lock().await;
        match state.active.take() {
            Some(turn) => {
                turn.cancel.cancel();
                tracing::debug!(session_id, turn_id = turn.id, "Cancel requested");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Record the chosen option as a user message and move to the final step.
    pub async fn select_option(&self, session_id: &str, option: &str) -> Result<Message, TurnError> {
        let slot = self.slot(session_id).await?;
        let mut state = slot.lock().await;

        let message = Message::user(state.machine.current(), option.trim());
        self.persist(session_id, &mut state, &message).await;

        let terminal = state.session.flow.terminal();
        if let Some(change) = state.machine.realign(terminal) {
            tracing::info!(session_id, from = %change.from, to = %change.to, "Option selected");
        }
        state.session.current_step = state.machine.current();
        self.sync_snapshot(&mut state).await;

        Ok(message)
    }

    /// Finish a session with the user's first concrete action.
    pub async fn complete(
        &self,
        session_id: &str,
        first_step_action: &str,
        reminder_time: Option<DateTime<Utc>>,
    ) -> Result<(), TurnError> {
        let slot = self.slot(session_id).await?;
        let flow = slot.lock().await.session.flow;

        let mut patch =
            SessionPatch::status(SessionStatus::Completed).with_first_step_action(first_step_action);
        if let Some(at) = reminder_time {
            patch = patch.with_reminder_time(at);
        }
        self.api.patch_session(flow, session_id, &patch).await?;

        let mut state = slot.lock().await;
        state.session.status = SessionStatus::Completed;
        self.sync_snapshot(&mut state).await;
        tracing::info!(session_id, "Session completed");
        Ok(())
    }

    /// Stop a session early. Any in-flight turn is cancelled.
    pub async fn abandon(&self, session_id: &str) -> Result<(), TurnError> {
        self.cancel(session_id).await?;
        let slot = self.slot(session_id).await?;
        let mut state = slot.lock().await;
        state.session.status = SessionStatus::Abandoned;
        self.sync_snapshot(&mut state).await;

        let flow = state.session.flow;
        drop(state);

        if let Err(e) = self
            .api
            .patch_session(flow, session_id, &SessionPatch::status(SessionStatus::Abandoned))
            .await
        {
            tracing::warn!(session_id, error = %e, "Failed to report abandoned session");
        }
        tracing::info!(session_id, "Session abandoned");
        Ok(())
    }

    /// Current state of a registered session.
    pub async fn state(&self, session_id: &str) -> Result<SessionState, TurnError> {
        let slot = self.slot(session_id).await?;
        let state = slot.lock().await;
        Ok(SessionState {
            session: state.session.clone(),
            progress_index: state.machine.progress_index(),
            step_count: state.machine.step_count(),
            in_flight: state.active.is_some(),
            unsynced: state.unsynced.len(),
        })
    }

    pub async fn current_step(&self, session_id: &str) -> Result<Step, TurnError> {
        Ok(self.slot(session_id).await?.lock().await.machine.current())
    }

    /// Committed messages of a session.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Message>, TurnError> {
        Ok(self.ledger.list(session_id).await?)
    }

    pub async fn step_history(&self, session_id: &str) -> Result<Vec<StepHistoryEntry>, TurnError> {
        Ok(self.ledger.step_history(session_id).await?)
    }
}
