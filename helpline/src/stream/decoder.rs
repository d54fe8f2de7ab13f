// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Byte decoder
//
// Turns transport chunks into text. A multi-byte character cut in half by a
// chunk boundary is held back and completed by the next chunk, so the text
// handed downstream never contains a replacement character that the wire
// did not put there.

/// Incremental UTF-8 decoder with carry-over between chunks.
#[derive(Debug, Default)]
pub struct ByteDecoder {
    /// Trailing bytes of an incomplete character (at most 3).
    carry: Vec<u8>,
}

impl ByteDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, prefixed by whatever the previous chunk left over.
    ///
    /// Bytes that can never start or continue a valid character are replaced
    /// with U+FFFD; decoding itself never fails.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let bytes = if self.carry.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = std::mem::take(&mut self.carry);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more.
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Number of bytes held back for the next chunk.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// Forget any carried bytes, ready for a new response.
    pub fn reset(&mut self) {
        self.carry.clear();
    }

    /// End of stream: drop any incomplete character and report its size.
    pub fn finish(&mut self) -> usize {
        let dropped = self.carry.len();
        self.carry.clear();
        dropped
    }
}
