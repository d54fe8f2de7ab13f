// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Session controller
//
// Single owner of one chat transcript. A turn appends the user message,
// opens the transport, and applies fragments in arrival order until the
// terminator, the end of the body, cancellation, or an error. Failures are
// folded into the transcript as the fallback message; they never escape as
// errors from a started turn.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::types::{Phase, SessionError, SessionSettings, SessionSnapshot, TurnOutcome};
use crate::message::Message;
use crate::stream::{ReassemblyLimits, StreamEvent, StreamPipeline};
use crate::transcript::TranscriptAccumulator;
use crate::transport::{ChatRequest, ChatTransport};

pub struct ChatSession {
    id: Uuid,
    transport: Arc<dyn ChatTransport>,
    transcript: TranscriptAccumulator,
    fallback: String,
    limits: ReassemblyLimits,
    phase: Phase,
    turn: u64,
    last_error: Option<SessionError>,
    last_outcome: Option<TurnOutcome>,
    snapshots: watch::Sender<SessionSnapshot>,
    turn_observer: Option<mpsc::UnboundedSender<SessionSnapshot>>,
}

impl ChatSession {
    pub fn new(settings: SessionSettings, transport: Arc<dyn ChatTransport>) -> Self {
        let id = Uuid::new_v4();
        let transcript = TranscriptAccumulator::with_greeting(settings.greeting);
        let initial = SessionSnapshot {
            session_id: id,
            turn: 0,
            phase: Phase::Idle,
            transcript: transcript.snapshot(),
            last_error: None,
            last_outcome: None,
        };
        let (snapshots, _) = watch::channel(initial);

        tracing::info!(session_id = %id, "chat session created");

        Self {
            id,
            transport,
            transcript,
            fallback: settings.fallback,
            limits: settings.limits,
            phase: Phase::Idle,
            turn: 0,
            last_error: None,
            last_outcome: None,
            snapshots,
            turn_observer: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &[Message] {
        self.transcript.messages()
    }

    /// Error of the most recent failed turn. Cleared when a new turn starts.
    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            turn: self.turn,
            phase: self.phase,
            transcript: self.transcript.snapshot(),
            last_error: self.last_error.as_ref().map(ToString::to_string),
            last_outcome: self.last_outcome.clone(),
        }
    }

    /// Send `text` and stream the reply into the transcript.
    ///
    /// Only rejections are errors (`EmptyInput`, `Busy`); once the user
    /// message is appended the turn always ends with an outcome.
    pub async fn run_turn(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, SessionError> {
        let request = self.begin_turn(text, None)?;
        Ok(self.drive_turn(request, cancel).await)
    }

    /// Validate input, append the user message and move to `Sending`.
    /// `observer` receives every snapshot of this turn and is dropped when
    /// the turn ends.
    pub(super) fn begin_turn(
        &mut self,
        text: &str,
        observer: Option<mpsc::UnboundedSender<SessionSnapshot>>,
    ) -> Result<ChatRequest, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if self.phase.is_busy() {
            return Err(SessionError::Busy);
        }

        self.turn_observer = observer;
        self.turn += 1;
        self.last_error = None;
        self.transcript.append_user(text);
        self.phase = Phase::Sending;
        self.publish();

        Ok(ChatRequest::new(self.transcript.snapshot()))
    }

    pub(super) async fn drive_turn(
        &mut self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let started = Instant::now();
        let request_id = request.request_id;
        tracing::info!(
            session_id = %self.id,
            turn = self.turn,
            request_id = %request_id,
            "turn started"
        );

        let mut fragments = 0usize;
        let outcome = match self.stream_reply(request, cancel, &mut fragments).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let discarded = self
                    .transcript
                    .discard_open()
                    .map(|m| m.content.len())
                    .unwrap_or(0);
                self.transcript.append_closed_assistant(self.fallback.clone());
                tracing::warn!(
                    session_id = %self.id,
                    turn = self.turn,
                    request_id = %request_id,
                    error = %error,
                    discarded_bytes = discarded,
                    "turn failed, fallback message appended"
                );
                let outcome = TurnOutcome::Failed(error.to_string());
                self.last_error = Some(error);
                outcome
            }
        };

        self.phase = Phase::Idle;
        self.last_outcome = Some(outcome.clone());
        self.publish();
        self.turn_observer = None;

        tracing::info!(
            session_id = %self.id,
            turn = self.turn,
            request_id = %request_id,
            outcome = outcome.as_str(),
            fragments,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn finished"
        );
        outcome
    }

    async fn stream_reply(
        &mut self,
        request: ChatRequest,
        cancel: &CancellationToken,
        fragments: &mut usize,
    ) -> Result<TurnOutcome, SessionError> {
        let transport = Arc::clone(&self.transport);
        let mut body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnOutcome::Cancelled),
            opened = transport.open(request) => opened?,
        };

        self.phase = Phase::Streaming;
        self.publish();

        let mut pipeline = StreamPipeline::new(self.limits);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    pipeline.finish();
                    return Ok(TurnOutcome::Cancelled);
                }
                next = body.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    pipeline.finish();
                    return Err(e.into());
                }
                None => {
                    if !pipeline.is_done() {
                        tracing::debug!(
                            session_id = %self.id,
                            turn = self.turn,
                            "body ended without terminator"
                        );
                    }
                    pipeline.finish();
                    return Ok(TurnOutcome::Completed);
                }
            };

            let events = match pipeline.push(&chunk) {
                Ok(events) => events,
                Err(e) => {
                    pipeline.finish();
                    return Err(e.into());
                }
            };

            for event in events {
                match event {
                    StreamEvent::Fragment(fragment) => {
                        self.transcript.append_fragment(&fragment);
                        *fragments += 1;
                        self.publish();
                    }
                    StreamEvent::Done => return Ok(TurnOutcome::Completed),
                }
            }
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        if let Some(observer) = &self.turn_observer {
            // A caller that dropped its turn stream still gets the outcome.
            let _ = observer.send(snapshot.clone());
        }
        self.snapshots.send_replace(snapshot);
    }
}
