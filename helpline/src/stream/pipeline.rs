// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Stream pipeline
//
// Composes byte decoding, line splitting, classification and delta decoding
// for one response body. The session pushes transport chunks in and applies
// the returned events to the transcript; everything between two pushes is
// synchronous.

use super::classifier::{classify_line, Frame};
use super::decoder::ByteDecoder;
use super::delta::DeltaDecoder;
use super::splitter::FrameSplitter;
use super::types::{ReassemblyLimits, StreamError, StreamEvent};

/// Per-response decoding state. Create one per turn.
#[derive(Debug)]
pub struct StreamPipeline {
    decoder: ByteDecoder,
    splitter: FrameSplitter,
    delta: DeltaDecoder,
    done: bool,
}

impl Default for StreamPipeline {
    fn default() -> Self {
        Self::new(ReassemblyLimits::default())
    }
}

impl StreamPipeline {
    pub fn new(limits: ReassemblyLimits) -> Self {
        Self {
            decoder: ByteDecoder::new(),
            splitter: FrameSplitter::new(),
            delta: DeltaDecoder::new(limits),
            done: false,
        }
    }

    /// Run one transport chunk through the pipeline.
    ///
    /// Lines after a terminator are never looked at, whether they arrive in
    /// the same chunk or a later one.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, StreamError> {
        if self.done {
            return Ok(Vec::new());
        }

        let text = self.decoder.decode(chunk);
        let mut events = Vec::new();

        for line in self.splitter.push(&text) {
            match classify_line(&line) {
                Frame::Keepalive | Frame::Blank => {}
                Frame::Data(payload) => {
                    if let Some(fragment) = self.delta.decode(payload)? {
                        events.push(StreamEvent::Fragment(fragment));
                    }
                }
                Frame::Terminator => {
                    self.done = true;
                    self.release();
                    events.push(StreamEvent::Done);
                    break;
                }
                Frame::Unknown(raw) => {
                    if self.delta.has_pending() {
                        if let Some(fragment) = self.delta.continue_pending(raw)? {
                            events.push(StreamEvent::Fragment(fragment));
                        }
                    } else {
                        tracing::trace!(len = raw.len(), "ignoring unrecognized line");
                    }
                }
            }
        }

        Ok(events)
    }

    /// Whether the terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// End of stream or cancellation: drop every partial buffer.
    pub fn finish(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        let carry = self.decoder.finish();
        let residue = self.splitter.finish();
        let fragment = self.delta.reset();
        if carry + residue + fragment > 0 {
            tracing::debug!(
                carry_bytes = carry,
                unterminated_bytes = residue,
                pending_json_bytes = fragment,
                "discarding incomplete stream data"
            );
        }
    }
}
