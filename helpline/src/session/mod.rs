// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Chat sessions
//
// `ChatSession` owns the transcript and runs turns; `SessionHandle` puts one
// on its own task for callers that need to cancel or observe from elsewhere.

mod controller;
mod handle;
mod types;

pub use controller::ChatSession;
pub use handle::{SessionHandle, Turn};
pub use types::{Phase, SessionError, SessionSettings, SessionSnapshot, TurnOutcome};

#[cfg(test)]
mod tests;
