//! Error types for stepflow.
//!
//! - [`TurnError`]: a single submit/stream/commit cycle failed
//! - [`LedgerError`]: local message storage failed
//! - [`ApiError`]: a non-streaming session endpoint failed
//!
//! Each error reports an [`ErrorCategory`], a short code for logs, and
//! whether a retry makes sense. Nothing in the crate retries on its own;
//! offering a retry is up to the caller.
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Connection, timeout, dropped stream | Yes |
//! | Server | Error status or error frame | Yes |
//! | Protocol | Stream ended without a terminal event | Yes |
//! | Storage | Ledger read/write failure | No |
//! | Client | Unknown session, uninitialized ledger | No |

mod category;
mod ledger;
mod network;
mod stream;

pub use category::ErrorCategory;
pub use ledger::LedgerError;
pub use network::ApiError;
pub use stream::TurnError;
