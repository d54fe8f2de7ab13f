// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Line classifier
//
// Decides what each complete line of the response body means. Rules are
// applied in order, and anything unrecognized is reported as Unknown so the
// caller can ignore it (or use it as a raw JSON continuation).

/// Prefix that marks a data frame. The space is part of the prefix.
pub const DATA_PREFIX: &str = "data: ";

/// Payload of the terminating data frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of a single line of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// `:`-prefixed comment, sent by servers to keep the connection alive.
    Keepalive,
    /// Empty line separating frames.
    Blank,
    /// `data: ` frame; the payload is trimmed.
    Data(&'a str),
    /// `data: [DONE]`.
    Terminator,
    /// Any other line shape, carried verbatim.
    Unknown(&'a str),
}

/// Classify one line (already stripped of its line terminator).
///
/// Order matters: a comment is checked before the empty-line rule, and the
/// terminator is a refinement of a data frame.
pub fn classify_line(line: &str) -> Frame<'_> {
    if line.starts_with(':') {
        return Frame::Keepalive;
    }

    if line.is_empty() {
        return Frame::Blank;
    }

    if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
        let payload = rest.trim();
        if payload == DONE_SENTINEL {
            return Frame::Terminator;
        }
        return Frame::Data(payload);
    }

    Frame::Unknown(line)
}
