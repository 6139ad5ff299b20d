//! Incremental response protocol
//!
//! The backend answers a turn with a text event stream:
//! - `event: <type>` - type line, ignored (classification is by payload shape)
//! - `data: <json>` - payload line
//! - `data: [DONE]` - optional end-of-stream sentinel
//! - Empty line - separates events
//! - Lines starting with `:` - comments (ignored)
//!
//! # Module structure
//! - `events` - Line, frame and semantic event types
//! - `frames` - Chunk reassembly (FrameDecoder, decode_stream)
//! - `classifier` - Payload to StreamEvent mapping
//! - `payloads` - Internal payload deserialization structs

mod classifier;
mod events;
mod frames;
mod payloads;

pub use classifier::{classify, classify_value, is_crisis, CRISIS_REASON};
pub use events::{CrisisPayload, DoneInfo, Frame, SseLine, StreamEvent, DONE_SENTINEL};
pub use frames::{
    decode_all, decode_line, decode_stream, parse_sse_line, FrameDecoder, FrameStream,
};
