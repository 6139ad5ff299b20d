//! Stepflow - streaming client for guided reflection sessions
//!
//! A session walks a fixed sequence of steps (receive, clarify, reframe,
//! options, commit for the solve flow). Each user turn is answered by the
//! backend with an incremental event stream; the [`orchestrator`] decodes it,
//! commits the reply to the [`ledger`] and advances the step machine.
//!
//! This library exposes modules for use by the binary and integration tests.

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod ledger;
pub mod models;
pub mod options;
pub mod orchestrator;
pub mod sse;
pub mod traits;

pub use api::{SessionApi, SessionPatch};
pub use config::ClientConfig;
pub use error::{ApiError, LedgerError, TurnError};
pub use flow::{Flow, Step, StepMachine};
pub use ledger::MessageLedger;
pub use models::{Message, Role, Session, SessionStatus};
pub use orchestrator::{CompletedTurn, Orchestrator, TurnOutcome, TurnUpdate};
