// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Transcript accumulation
//
// Owns the ordered conversation for one chat session. Whether the tail may
// still grow is tracked by an explicit flag instead of being re-derived from
// the roles of neighbouring messages.

use crate::message::Message;

/// Ordered conversation with at most one in-progress assistant message.
///
/// Invariants:
/// - when `tail_open` is set, the last message is an assistant message
///   directly preceded by a user message;
/// - appending a user message closes the tail for good;
/// - fragments only ever extend the tail, in the order they are applied.
#[derive(Debug, Clone, Default)]
pub struct TranscriptAccumulator {
    messages: Vec<Message>,
    tail_open: bool,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript seeded with a closed assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.append_closed_assistant(greeting);
        transcript
    }

    /// Append a user turn. Any in-progress assistant message is closed.
    pub fn append_user(&mut self, text: impl Into<String>) {
        self.tail_open = false;
        self.messages.push(Message::user(text));
    }

    /// Apply one assistant fragment: extend the open tail, or open a new
    /// assistant message with the fragment as its content.
    pub fn append_fragment(&mut self, fragment: &str) {
        if self.tail_open {
            if let Some(tail) = self.messages.last_mut() {
                tail.content.push_str(fragment);
                return;
            }
        }
        self.messages.push(Message::assistant(fragment));
        self.tail_open = true;
    }

    /// Append a finished assistant message (greeting, fallback).
    pub fn append_closed_assistant(&mut self, text: impl Into<String>) {
        self.tail_open = false;
        self.messages.push(Message::assistant(text));
    }

    /// Remove the in-progress assistant message, if there is one.
    pub fn discard_open(&mut self) -> Option<Message> {
        if !self.tail_open {
            return None;
        }
        self.tail_open = false;
        self.messages.pop()
    }

    pub fn has_open_tail(&self) -> bool {
        self.tail_open
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }


    /// Owned copy for observers.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn greeting_is_closed() {
        let mut t = TranscriptAccumulator::with_greeting("Hello!");
        assert_eq!(t.len(), 1);
        assert!(!t.has_open_tail());

        // A fragment never extends the greeting.
        t.append_user("hi");
        t.append_fragment("Hey");
        assert_eq!(t.messages()[0].content, "Hello!");
        assert_eq!(t.messages()[2].content, "Hey");
    }

    #[test]
    fn fragments_extend_the_open_tail_in_order() {
        let mut t = TranscriptAccumulator::with_greeting("g");
        t.append_user("balance?");
        for piece in ["Your ", "balance ", "is ", "$10."] {
            t.append_fragment(piece);
        }
        assert_eq!(t.len(), 3);
        assert_eq!(t.last().unwrap().role, Role::Assistant);
        assert_eq!(t.last().unwrap().content, "Your balance is $10.");
        assert!(t.has_open_tail());
    }

    #[test]
    fn user_message_closes_the_tail() {
        let mut t = TranscriptAccumulator::new();
        t.append_user("one");
        t.append_fragment("first answer");
        t.append_user("two");
        assert!(!t.has_open_tail());
        t.append_fragment("second answer");

        let contents: Vec<_> = t.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "first answer", "two", "second answer"]);
    }

    #[test]
    fn discard_open_removes_only_the_open_tail() {
        let mut t = TranscriptAccumulator::with_greeting("g");
        assert_eq!(t.discard_open(), None);
        assert_eq!(t.len(), 1);

        t.append_user("q");
        t.append_fragment("half an ans");
        let dropped = t.discard_open().unwrap();
        assert_eq!(dropped.content, "half an ans");
        assert_eq!(t.len(), 2);
        assert_eq!(t.last().unwrap().role, Role::User);
        assert_eq!(t.discard_open(), None);
    }

    #[test]
    fn closed_assistant_closes_tail() {
        let mut t = TranscriptAccumulator::new();
        t.append_user("q");
        t.append_fragment("a");
        t.append_closed_assistant("fallback");
        t.append_fragment("b");
        assert_eq!(t.len(), 4);
        assert_eq!(t.messages()[2].content, "fallback");
        assert_eq!(t.messages()[3].content, "b");
    }
}
