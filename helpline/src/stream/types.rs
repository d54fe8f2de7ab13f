// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Events the pipeline hands to the session, the reassembly bounds for the
// delta decoder, and the errors that escape the pipeline.

// ---------------------------------------------------------------------------
// Pipeline output
// ---------------------------------------------------------------------------

/// What one pushed chunk produced, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next piece of assistant text to append to the transcript.
    Fragment(String),
    /// `data: [DONE]` was seen. Nothing after it is processed.
    Done,
}

// ---------------------------------------------------------------------------
// Reassembly bounds
// ---------------------------------------------------------------------------

/// Default number of times a pending JSON fragment may be combined with a
/// following payload before the stream is declared broken.
pub const DEFAULT_MAX_REASSEMBLY_ATTEMPTS: usize = 4;

/// Default cap on the size of a pending JSON fragment in bytes.
pub const DEFAULT_MAX_REASSEMBLY_BYTES: usize = 65_536; // 64 KiB

/// Bounds applied by the delta decoder when it stitches split payloads
/// back together. Both must hold; exceeding either fails the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyLimits {
    pub max_attempts: usize,
    pub max_bytes: usize,
}

impl Default for ReassemblyLimits {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_REASSEMBLY_ATTEMPTS,
            max_bytes: DEFAULT_MAX_REASSEMBLY_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that escape the pipeline. Framing anomalies never do; they are
/// absorbed where they are found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// A data payload never became valid JSON within the reassembly bounds.
    #[error(
        "malformed stream payload: no valid JSON after {attempts} reassembly attempt(s) \
         ({bytes} bytes pending)"
    )]
    ReassemblyExhausted { attempts: usize, bytes: usize },
}
