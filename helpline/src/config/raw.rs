// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
//
// Interpolation and defaults run between parsing and building the public
// Config, so every optional field stays an Option here.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub helpline: String,
    pub endpoint: RawEndpointConfig,
    pub assistant: Option<RawAssistantConfig>,
    pub stream: Option<RawStreamConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RawEndpointConfig {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RawAssistantConfig {
    pub greeting: Option<String>,
    pub fallback: Option<String>,
    pub system_prompt: Option<String>,
    /// If false and no system_prompt is given, send none. Default: true.
    pub use_default_system_prompt: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RawStreamConfig {
    pub max_reassembly_attempts: Option<usize>,
    pub max_reassembly_bytes: Option<usize>,
}
