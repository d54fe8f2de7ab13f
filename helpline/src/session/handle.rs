// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Session task
//
// A ChatSession lives on one spawned task and is driven over a command
// channel, so callers on other tasks can start, observe and cancel turns
// without sharing the transcript. While a turn is in flight the task keeps
// reading commands: cancellation fires the turn's token and a second
// start is rejected as busy.

use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::controller::ChatSession;
use super::types::{SessionError, SessionSnapshot, TurnOutcome};

const COMMAND_CAPACITY: usize = 16;

enum Command {
    StartTurn {
        text: String,
        reply: oneshot::Sender<Result<Turn, SessionError>>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
}

/// A started turn.
///
/// `snapshots` yields one snapshot per transcript mutation or phase change
/// of this turn, starting with the appended user message, and ends after
/// the final idle snapshot.
pub struct Turn {
    pub snapshots: UnboundedReceiverStream<SessionSnapshot>,
    outcome: oneshot::Receiver<TurnOutcome>,
}

impl Turn {
    pub async fn outcome(self) -> Result<TurnOutcome, SessionError> {
        self.outcome.await.map_err(|_| SessionError::Closed)
    }
}

/// Cloneable front end of a session task.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Move `session` onto its own task. The task exits once every handle
    /// is dropped and the current turn, if any, has been cancelled.
    pub fn spawn(session: ChatSession) -> Self {
        let session_id = session.id();
        let snapshots = session.subscribe();
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        tokio::spawn(run_session(session, rx));
        Self {
            session_id,
            commands,
            snapshots,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Start a turn. Fails with `EmptyInput` or `Busy` without touching
    /// the transcript.
    pub async fn start_turn(&self, text: impl Into<String>) -> Result<Turn, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::StartTurn {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Cancel the in-flight turn. Returns whether there was one.
    pub async fn cancel(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Cancel { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Latest-value view of the session, for observers outside a turn.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.snapshots.borrow().last_error.clone()
    }
}

async fn run_session(mut session: ChatSession, mut commands: mpsc::Receiver<Command>) {
    let session_id = session.id();

    while let Some(command) = commands.recv().await {
        let (text, reply) = match command {
            Command::StartTurn { text, reply } => (text, reply),
            Command::Cancel { reply } => {
                let _ = reply.send(false);
                continue;
            }
        };

        let (observer, observed) = mpsc::unbounded_channel();
        let request = match session.begin_turn(&text, Some(observer)) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "turn rejected");
                let _ = reply.send(Err(e));
                continue;
            }
        };

        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let _ = reply.send(Ok(Turn {
            snapshots: UnboundedReceiverStream::new(observed),
            outcome: outcome_rx,
        }));

        let mut handles_gone = false;
        let outcome = {
            let turn = session.drive_turn(request, &cancel);
            tokio::pin!(turn);
            loop {
                // A cancelled turn must finish before the next command is read.
                tokio::select! {
                    biased;
                    outcome = &mut turn => break outcome,
                    command = commands.recv(), if !handles_gone => match command {
                        Some(Command::Cancel { reply }) => {
                            cancel.cancel();
                            let _ = reply.send(true);
                        }
                        Some(Command::StartTurn { reply, .. }) => {
                            let _ = reply.send(Err(SessionError::Busy));
                        }
                        None => {
                            handles_gone = true;
                            cancel.cancel();
                        }
                    },
                }
            }
        };
        let _ = outcome_tx.send(outcome);

        if handles_gone {
            break;
        }
    }

    tracing::debug!(session_id = %session_id, "session task stopped");
}
