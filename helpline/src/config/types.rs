// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

use crate::stream::ReassemblyLimits;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level parsed and validated helpline config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Config schema version. Always "v1".
    pub version: String,
    /// Upstream chat-completions endpoint.
    pub endpoint: EndpointConfig,
    /// What the assistant says on its own.
    pub assistant: AssistantConfig,
    /// Response decoding bounds.
    pub stream: StreamConfig,
    /// SHA256 of the raw YAML before interpolation: "sha256:{hex}".
    /// Secrets pulled from the environment never affect it.
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where and how to open a streaming chat request.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Full URL of the chat-completions route.
    pub url: String,
    /// Model name sent in every request body.
    pub model: String,
    /// Sent as `Authorization: Bearer ...` when present.
    pub api_key: Option<String>,
    /// Extra request headers, validated at load time.
    pub headers: Vec<(String, String)>,
    /// TCP connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Bounds the whole exchange, streamed body included.
    pub request_timeout_ms: Option<u64>,
}

/// Fixed assistant texts and the optional system prompt.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Seed message of every new transcript.
    pub greeting: String,
    /// Appended when a turn fails.
    pub fallback: String,
    /// Prepended to each request as a `system` message. Never part of the
    /// transcript.
    pub system_prompt: Option<String>,
}

/// Delta reassembly bounds.
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    pub limits: ReassemblyLimits,
}
