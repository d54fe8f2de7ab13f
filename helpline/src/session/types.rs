// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

use uuid::Uuid;

use crate::config::Config;
use crate::message::Message;
use crate::stream::{ReassemblyLimits, StreamError};
use crate::transport::TransportError;

/// Where the session is in its turn cycle.
///
/// A turn runs `Idle -> Sending -> Streaming -> Idle`; how it ended is
/// reported as a [`TurnOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Request handed to the transport, no response yet.
    Sending,
    /// Upstream accepted; chunks are being applied.
    Streaming,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Sending => "sending",
            Phase::Streaming => "streaming",
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Terminator seen or the body ended cleanly.
    Completed,
    /// Stopped on request; partial assistant text is kept.
    Cancelled,
    /// The fallback message was appended in place of a reply.
    Failed(String),
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Completed => "completed",
            TurnOutcome::Cancelled => "cancelled",
            TurnOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyInput,

    #[error("a reply is still in progress")]
    Busy,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("session task has stopped")]
    Closed,
}

/// Immutable view of a session, published after every transcript mutation
/// and phase change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    /// Number of turns started so far.
    pub turn: u64,
    pub phase: Phase,
    pub transcript: Vec<Message>,
    pub last_error: Option<String>,
    pub last_outcome: Option<TurnOutcome>,
}

impl SessionSnapshot {
    /// Assistant text of the reply at `index`, if it exists yet.
    pub fn reply_at(&self, index: usize) -> Option<&str> {
        self.transcript.get(index).map(|m| m.content.as_str())
    }
}

/// Fixed texts and bounds a session runs with.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub greeting: String,
    pub fallback: String,
    pub limits: ReassemblyLimits,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            greeting: config.assistant.greeting.clone(),
            fallback: config.assistant.fallback.clone(),
            limits: config.stream.limits,
        }
    }
}
