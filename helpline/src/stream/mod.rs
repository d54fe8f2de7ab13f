// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Streaming response decoding
//
// Responsibilities:
// - Decode transport chunks to text without splitting multi-byte characters
// - Reassemble lines split across chunk boundaries
// - Classify lines: keepalive, blank, data, terminator, unknown
// - Extract delta content from data payloads, stitching split JSON back
//   together within fixed bounds
// - Stop at `data: [DONE]`

mod classifier;
mod decoder;
mod delta;
mod pipeline;
mod splitter;
mod types;

pub use classifier::{classify_line, Frame, DATA_PREFIX, DONE_SENTINEL};
pub use decoder::ByteDecoder;
pub use delta::DeltaDecoder;
pub use pipeline::StreamPipeline;
pub use splitter::FrameSplitter;
pub use types::{
    ReassemblyLimits, StreamError, StreamEvent, DEFAULT_MAX_REASSEMBLY_ATTEMPTS,
    DEFAULT_MAX_REASSEMBLY_BYTES,
};
