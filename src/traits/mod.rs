//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, PATCH, streaming)
//!
//! The storage seam lives with the ledger as [`crate::ledger::LedgerStore`].

pub mod http;

pub use http::{
    header_value, ByteStream, Headers, HttpClient, HttpError, Response, StreamingResponse,
};
