//! Frame decoder
//!
//! Turns byte chunks, split at arbitrary boundaries, into ordered
//! [`Frame`]s. Bytes are buffered until a full line is available, so a chunk
//! boundary inside a line (or inside a multi-byte character) never changes
//! the output.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::stream::{self, Stream};
use futures_util::StreamExt;

use super::events::{Frame, SseLine, DONE_SENTINEL};
use crate::traits::{ByteStream, HttpError};

/// Stream of decoded frames. Yields at most one transport error, then ends.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, HttpError>> + Send>>;

/// Parse a single line into its component type.
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.trim().is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(rest.trim().to_string());
    }

    SseLine::Comment(line.to_string())
}

/// Map one complete line to a frame, if it carries one.
pub fn decode_line(line: &str) -> Option<Frame> {
    match parse_sse_line(line) {
        SseLine::Data(payload) if payload.is_empty() => None,
        SseLine::Data(payload) if payload == DONE_SENTINEL => Some(Frame::End),
        SseLine::Data(payload) => Some(Frame::Data(payload)),
        SseLine::Event(_) | SseLine::Empty | SseLine::Comment(_) => None,
    }
}

/// Stateful line reassembler.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk and return every frame it completes.
    ///
    /// Nothing is returned once the end sentinel has been seen.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let frame = {
                let text = String::from_utf8_lossy(&self.buffer[consumed..end]);
                decode_line(text.trim_end_matches('\r'))
            };
            consumed = end + 1;

            match frame {
                Some(Frame::End) => {
                    frames.push(Frame::End);
                    self.finished = true;
                    break;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }

        if self.finished {
            self.buffer.clear();
        } else {
            self.buffer.drain(..consumed);
        }
        frames
    }

    /// Signal end of input. An unterminated trailing line is discarded.
    ///
    /// Returns the number of bytes dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 {
            tracing::debug!(bytes = dropped, "Discarding unterminated trailing line");
        }
        self.buffer.clear();
        self.finished = true;
        dropped
    }

    /// Whether the end sentinel (or end of input) has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode a whole byte slice in one go.
pub fn decode_all(bytes: &[u8]) -> Vec<Frame> {
    let mut decoder = FrameDecoder::new();
    let frames = decoder.feed(bytes);
    decoder.finish();
    frames
}

/// Adapt a response body into a stream of frames.
///
/// A transport error is forwarded once and ends the stream; there is no retry.
pub fn decode_stream(bytes: ByteStream) -> FrameStream {
    let frames = stream::unfold(
        Some((bytes, FrameDecoder::new(), VecDeque::new())),
        |state| async move {
            let (mut bytes, mut decoder, mut pending) = state?;
            loop {
                if let Some(frame) = pending.pop_front() {
                    return Some((Ok(frame), Some((bytes, decoder, pending))));
                }
                if decoder.is_finished() {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        decoder.finish();
                        return None;
                    }
                }
            }
        },
    );

    Box::pin(frames)
}
