// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Delta decoder
//
// Extracts `choices[0].delta.content` from each data payload. A payload that
// does not parse is kept and combined with the next one, which recovers JSON
// bodies that were cut across frame boundaries. The number of combinations
// and the size of the held fragment are both bounded, so a payload that is
// simply malformed fails the stream instead of being re-queued forever.

use super::types::{ReassemblyLimits, StreamError};

/// Stateful decoder for chat-completion delta payloads.
#[derive(Debug)]
pub struct DeltaDecoder {
    limits: ReassemblyLimits,
    /// Payload text that has not yet formed a complete JSON document.
    pending: Option<String>,
    /// Failed combinations since the fragment was first held.
    attempts: usize,
}

impl Default for DeltaDecoder {
    fn default() -> Self {
        Self::new(ReassemblyLimits::default())
    }
}

impl DeltaDecoder {
    pub fn new(limits: ReassemblyLimits) -> Self {
        Self {
            limits,
            pending: None,
            attempts: 0,
        }
    }

    /// Decode one data payload.
    ///
    /// Returns the text fragment it carries, `None` for frames without
    /// content (role-only, finish, metadata) or while a split payload is
    /// still being collected.
    pub fn decode(&mut self, payload: &str) -> Result<Option<String>, StreamError> {
        let Some(pending) = self.pending.take() else {
            return match serde_json::from_str::<serde_json::Value>(payload) {
                Ok(json) => Ok(extract_content(&json)),
                Err(e) => {
                    tracing::debug!(error = %e, len = payload.len(), "holding incomplete payload");
                    self.hold(payload.to_string())?;
                    Ok(None)
                }
            };
        };

        // The split can fall anywhere, including inside a string, so the
        // pieces are joined with nothing in between.
        let joined = format!("{pending}{payload}");
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&joined) {
            tracing::debug!(attempts = self.attempts + 1, "reassembled split payload");
            self.attempts = 0;
            return Ok(extract_content(&json));
        }

        // A payload that is a complete object on its own is a fresh frame,
        // not a continuation; the held fragment was garbage.
        if let Ok(json @ serde_json::Value::Object(_)) =
            serde_json::from_str::<serde_json::Value>(payload)
        {
            tracing::debug!(
                dropped_bytes = pending.len(),
                attempts = self.attempts,
                "dropping unparseable fragment before complete payload"
            );
            self.attempts = 0;
            return Ok(extract_content(&json));
        }

        self.attempts += 1;
        if self.attempts >= self.limits.max_attempts {
            let err = StreamError::ReassemblyExhausted {
                attempts: self.attempts,
                bytes: joined.len(),
            };
            self.reset();
            return Err(err);
        }
        self.hold(joined)?;
        Ok(None)
    }

    /// Feed a raw line that is not a data frame. Only meaningful while a
    /// fragment is pending; otherwise the line is ignored.
    pub fn continue_pending(&mut self, raw: &str) -> Result<Option<String>, StreamError> {
        if self.pending.is_none() {
            return Ok(None);
        }
        self.decode(raw)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any held fragment. Returns its size in bytes.
    pub fn reset(&mut self) -> usize {
        self.attempts = 0;
        self.pending.take().map(|p| p.len()).unwrap_or(0)
    }

    fn hold(&mut self, fragment: String) -> Result<(), StreamError> {
        if fragment.len() > self.limits.max_bytes {
            let err = StreamError::ReassemblyExhausted {
                attempts: self.attempts,
                bytes: fragment.len(),
            };
            self.reset();
            return Err(err);
        }
        self.pending = Some(fragment);
        Ok(())
    }
}

/// `choices[0].delta.content`, when present and non-empty.
fn extract_content(json: &serde_json::Value) -> Option<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}
