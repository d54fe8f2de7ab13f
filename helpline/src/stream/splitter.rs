// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

/// Splits decoded text into complete lines.
///
/// Text after the last newline stays buffered until a later push completes
/// it. A line is emitted exactly once, without its `\n` and without one
/// trailing `\r`.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buffer: String,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and drain every line it completes.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].find('\n') {
            let end = start + pos;
            let raw = &self.buffer[start..end];
            lines.push(raw.strip_suffix('\r').unwrap_or(raw).to_string());
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Bytes buffered without a terminating newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: an unterminated trailing fragment is discarded, never
    /// emitted. Returns how many bytes were dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }
}
