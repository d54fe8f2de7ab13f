// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod message;
pub mod session;
pub mod stream;
pub mod transcript;
pub mod transport;
