// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Session tests
//
// Tests cover:
//  1. Happy path through ChatSession
//  2. Request carries the full transcript
//  3. Failure fallback (status, mid-stream drop, reassembly exhaustion)
//  4. Input rejection
//  5. Cancellation, busy rejection and per-turn snapshots via SessionHandle

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::message::{Message, Role};
use crate::stream::{ReassemblyLimits, StreamError};
use crate::transport::{ChatRequest, ChatTransport, ChunkStream, TransportError};

const GREETING: &str = "Hi! How can I help?";
const FALLBACK: &str = "Sorry, please try again later.";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

enum Reply {
    Body(ChunkStream),
    Reject(TransportError),
}

/// Hands out scripted replies in order and records every request.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn push_chunks(&self, chunks: Vec<Result<Bytes, TransportError>>) {
        self.push(Reply::Body(Box::pin(futures_util::stream::iter(chunks))));
    }

    /// A body fed by the returned sender, for tests that act mid-stream.
    fn push_live(&self) -> mpsc::UnboundedSender<Result<Bytes, TransportError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Reply::Body(Box::pin(UnboundedReceiverStream::new(rx))));
        tx
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Reject(e)) => Err(e),
            None => Err(TransportError::Transport("no scripted reply".to_string())),
        }
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        greeting: GREETING.to_string(),
        fallback: FALLBACK.to_string(),
        limits: ReassemblyLimits::default(),
    }
}

fn session(transport: &Arc<ScriptedTransport>) -> ChatSession {
    ChatSession::new(settings(), transport.clone())
}

fn delta(content: &str) -> Bytes {
    let json = serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]});
    Bytes::from(format!("data: {json}\n\n"))
}

fn done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

async fn wait_for_reply(
    snapshots: &mut UnboundedReceiverStream<SessionSnapshot>,
    expected: &str,
) -> SessionSnapshot {
    while let Some(snapshot) = snapshots.next().await {
        if snapshot.transcript.last().map(|m| m.content.as_str()) == Some(expected) {
            return snapshot;
        }
    }
    panic!("turn ended before the reply reached {expected:?}");
}

// ---------------------------------------------------------------------------
// Test 1: happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_deltas_then_done_builds_one_reply() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("Hi")), Ok(delta(" there")), Ok(done())]);
    let mut session = session(&transport);

    let outcome = session
        .run_turn("hello", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(contents(session.transcript()), [GREETING, "hello", "Hi there"]);
    assert_eq!(session.transcript()[2].role, Role::Assistant);
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.last_error().is_none());

    let snapshot = session.snapshot();
    assert_eq!(snapshot.turn, 1);
    assert_eq!(snapshot.last_outcome, Some(TurnOutcome::Completed));
}

#[tokio::test]
async fn body_end_without_terminator_completes() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("partial"))]);
    let mut session = session(&transport);

    let outcome = session.run_turn("q", &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Completed);
    assert_eq!(contents(session.transcript()), [GREETING, "q", "partial"]);
}

#[tokio::test]
async fn chunks_after_terminator_are_not_applied() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("kept")), Ok(done()), Ok(delta(" ignored"))]);
    let mut session = session(&transport);

    session.run_turn("q", &CancellationToken::new()).await.unwrap();
    assert_eq!(session.transcript()[2].content, "kept");
}

#[tokio::test]
async fn consecutive_turns_keep_replies_separate() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("first")), Ok(done())]);
    transport.push_chunks(vec![Ok(delta("second")), Ok(done())]);
    let mut session = session(&transport);
    let cancel = CancellationToken::new();

    session.run_turn("one", &cancel).await.unwrap();
    session.run_turn("two", &cancel).await.unwrap();
    assert_eq!(
        contents(session.transcript()),
        [GREETING, "one", "first", "two", "second"]
    );
    assert_eq!(session.snapshot().turn, 2);
}

// ---------------------------------------------------------------------------
// Test 2: request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_carries_full_transcript() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("a1")), Ok(done())]);
    transport.push_chunks(vec![Ok(done())]);
    let mut session = session(&transport);
    let cancel = CancellationToken::new();

    session.run_turn("q1", &cancel).await.unwrap();
    session.run_turn("q2", &cancel).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(contents(&requests[0].messages), [GREETING, "q1"]);
    assert_eq!(contents(&requests[1].messages), [GREETING, "q1", "a1", "q2"]);
    assert_ne!(requests[0].request_id, requests[1].request_id);
}

// ---------------------------------------------------------------------------
// Test 3: failure fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_request_appends_exactly_one_fallback() {
    let transport = Arc::new(ScriptedTransport::default());
    let rejection = TransportError::Status {
        status: 500,
        body: "internal".to_string(),
    };
    transport.push(Reply::Reject(rejection.clone()));
    let mut session = session(&transport);

    let outcome = session.run_turn("q", &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(contents(session.transcript()), [GREETING, "q", FALLBACK]);
    assert_eq!(session.last_error(), Some(&SessionError::Transport(rejection)));
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.snapshot().last_error.unwrap().contains("500"));
}

#[tokio::test]
async fn mid_stream_drop_replaces_partial_reply_with_fallback() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![
        Ok(delta("Your balance")),
        Err(TransportError::Transport("connection reset".to_string())),
    ]);
    let mut session = session(&transport);

    let outcome = session.run_turn("q", &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert_eq!(contents(session.transcript()), [GREETING, "q", FALLBACK]);
}

#[tokio::test]
async fn reassembly_exhaustion_fails_the_turn() {
    let transport = Arc::new(ScriptedTransport::default());
    let garbage = "data: {never valid\n".repeat(8);
    transport.push_chunks(vec![Ok(Bytes::from(garbage))]);
    let mut session = session(&transport);

    let outcome = session.run_turn("q", &CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, TurnOutcome::Failed(_)));
    assert!(matches!(
        session.last_error(),
        Some(SessionError::Stream(StreamError::ReassemblyExhausted { .. }))
    ));
    assert_eq!(session.transcript().last().unwrap().content, FALLBACK);
}

#[tokio::test]
async fn next_successful_turn_clears_last_error() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(Reply::Reject(TransportError::Timeout("slow".to_string())));
    transport.push_chunks(vec![Ok(delta("ok")), Ok(done())]);
    let mut session = session(&transport);
    let cancel = CancellationToken::new();

    session.run_turn("one", &cancel).await.unwrap();
    assert!(session.last_error().is_some());

    session.run_turn("two", &cancel).await.unwrap();
    assert!(session.last_error().is_none());
    assert_eq!(
        contents(session.transcript()),
        [GREETING, "one", FALLBACK, "two", "ok"]
    );
}

// ---------------------------------------------------------------------------
// Test 4: input rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_input_is_rejected_without_side_effects() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut session = session(&transport);

    for input in ["", "   ", "\n\t"] {
        let err = session
            .run_turn(input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::EmptyInput);
    }
    assert_eq!(session.transcript().len(), 1);
    assert!(transport.requests().is_empty());
    assert_eq!(session.snapshot().turn, 0);
}

#[tokio::test]
async fn cancelled_before_open_keeps_user_message() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("never"))]);
    let mut session = session(&transport);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = session.run_turn("q", &cancel).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Cancelled);
    assert_eq!(contents(session.transcript()), [GREETING, "q"]);
    assert_eq!(session.phase(), Phase::Idle);
}

// ---------------------------------------------------------------------------
// Test 5: session task
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_after_two_fragments_keeps_exactly_those() {
    let transport = Arc::new(ScriptedTransport::default());
    let body = transport.push_live();
    let handle = SessionHandle::spawn(session(&transport));

    let mut turn = handle.start_turn("hello").await.unwrap();
    body.send(Ok(delta("Hi"))).unwrap();
    body.send(Ok(delta(" there"))).unwrap();
    wait_for_reply(&mut turn.snapshots, "Hi there").await;

    assert!(handle.cancel().await.unwrap());
    assert_eq!(turn.outcome().await.unwrap(), TurnOutcome::Cancelled);

    // Chunks sent after cancellation are never read.
    let _ = body.send(Ok(delta(" and more")));

    let snapshot = handle.snapshot();
    assert_eq!(contents(&snapshot.transcript), [GREETING, "hello", "Hi there"]);
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.last_outcome, Some(TurnOutcome::Cancelled));
    assert!(handle.last_error().is_none());

    // Ready for the next turn.
    transport.push_chunks(vec![Ok(delta("again")), Ok(done())]);
    let turn = handle.start_turn("next").await.unwrap();
    assert_eq!(turn.outcome().await.unwrap(), TurnOutcome::Completed);
    assert_eq!(
        contents(&handle.snapshot().transcript),
        [GREETING, "hello", "Hi there", "next", "again"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_right_after_cancel_is_accepted() {
    let transport = Arc::new(ScriptedTransport::default());
    let handle = SessionHandle::spawn(session(&transport));

    for round in 0..100 {
        let body = transport.push_live();
        let mut turn = handle.start_turn(format!("question {round}")).await.unwrap();
        body.send(Ok(delta("Hi"))).unwrap();
        wait_for_reply(&mut turn.snapshots, "Hi").await;
        assert!(handle.cancel().await.unwrap());

        // No waiting on the cancelled turn's outcome first.
        transport.push_chunks(vec![Ok(delta("again")), Ok(done())]);
        let next = handle
            .start_turn(format!("follow-up {round}"))
            .await
            .unwrap_or_else(|e| panic!("round {round}: {e}"));

        assert_eq!(turn.outcome().await.unwrap(), TurnOutcome::Cancelled);
        assert_eq!(next.outcome().await.unwrap(), TurnOutcome::Completed);
    }
    assert_eq!(handle.snapshot().turn, 200);
}

#[tokio::test]
async fn second_start_while_streaming_is_busy() {
    let transport = Arc::new(ScriptedTransport::default());
    let body = transport.push_live();
    let handle = SessionHandle::spawn(session(&transport));

    let mut turn = handle.start_turn("first").await.unwrap();
    body.send(Ok(delta("working"))).unwrap();
    wait_for_reply(&mut turn.snapshots, "working").await;

    let other = handle.clone();
    let err = tokio::spawn(async move { other.start_turn("second").await })
        .await
        .unwrap()
        .err()
        .unwrap();
    assert_eq!(err, SessionError::Busy);

    body.send(Ok(done())).unwrap();
    assert_eq!(turn.outcome().await.unwrap(), TurnOutcome::Completed);
    assert_eq!(
        contents(&handle.snapshot().transcript),
        [GREETING, "first", "working"]
    );
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn cancel_without_turn_reports_nothing_in_flight() {
    let transport = Arc::new(ScriptedTransport::default());
    let handle = SessionHandle::spawn(session(&transport));
    assert!(!handle.cancel().await.unwrap());
}

#[tokio::test]
async fn empty_input_is_rejected_by_the_task() {
    let transport = Arc::new(ScriptedTransport::default());
    let handle = SessionHandle::spawn(session(&transport));
    let err = handle.start_turn("  ").await.err().unwrap();
    assert_eq!(err, SessionError::EmptyInput);
    assert_eq!(handle.snapshot().transcript.len(), 1);
}

#[tokio::test]
async fn turn_snapshots_run_from_sending_to_idle() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_chunks(vec![Ok(delta("A")), Ok(delta("B")), Ok(done())]);
    let handle = SessionHandle::spawn(session(&transport));

    let turn = handle.start_turn("q").await.unwrap();
    let snapshots: Vec<SessionSnapshot> = turn.snapshots.collect().await;

    let phases: Vec<Phase> = snapshots.iter().map(|s| s.phase).collect();
    assert_eq!(
        phases,
        [
            Phase::Sending,
            Phase::Streaming,
            Phase::Streaming,
            Phase::Streaming,
            Phase::Idle
        ]
    );
    assert_eq!(snapshots[0].transcript.last().unwrap().content, "q");
    assert_eq!(snapshots[2].reply_at(2), Some("A"));
    assert_eq!(snapshots[3].reply_at(2), Some("AB"));
    let last = snapshots.last().unwrap();
    assert_eq!(last.last_outcome, Some(TurnOutcome::Completed));
    assert_eq!(last.session_id, handle.session_id());
}

#[tokio::test]
async fn failed_turn_is_visible_to_subscribers() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push(Reply::Reject(TransportError::Status {
        status: 429,
        body: "slow down".to_string(),
    }));
    let handle = SessionHandle::spawn(session(&transport));
    let mut watcher = handle.subscribe();

    let turn = handle.start_turn("q").await.unwrap();
    assert!(matches!(turn.outcome().await.unwrap(), TurnOutcome::Failed(_)));

    watcher
        .wait_for(|s| s.last_outcome.is_some())
        .await
        .unwrap();
    let error = handle.last_error().unwrap();
    assert!(error.contains("429"), "{error}");
    assert_eq!(handle.snapshot().transcript.last().unwrap().content, FALLBACK);
}
