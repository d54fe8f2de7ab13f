// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

use reqwest::header::{HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::stream::ReassemblyLimits;

use super::defaults::{default_system_prompt, DEFAULT_FALLBACK, DEFAULT_GREETING};
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a helpline config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash (before interpolation)
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version
/// 5. Resolve variable interpolation in endpoint and assistant strings
/// 6. Validate URL, headers, texts and stream bounds
/// 7. Build typed Config struct
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.helpline != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.helpline
        )));
    }

    let endpoint = build_endpoint_config(raw.endpoint)?;
    let assistant = build_assistant_config(raw.assistant)?;
    let stream = build_stream_config(raw.stream)?;

    Ok(Config {
        version: raw.helpline,
        endpoint,
        assistant,
        stream,
        config_hash,
    })
}

/// Deterministic fingerprint of the raw config text.
pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    let hash = hasher.finalize();
    format!("sha256:{:x}", hash)
}

fn build_endpoint_config(raw: raw::RawEndpointConfig) -> Result<EndpointConfig, ConfigError> {
    let url = resolve_variables(&raw.url)?;
    let parsed = reqwest::Url::parse(&url).map_err(|e| {
        ConfigError::Validation(format!("endpoint.url \"{url}\" is not a valid URL: {e}"))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "endpoint.url must use http or https, got \"{}\"",
            parsed.scheme()
        )));
    }

    let model = resolve_variables(&raw.model)?;
    if model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "endpoint.model must not be empty".to_string(),
        ));
    }

    // An api_key that interpolates to nothing means "no auth header".
    let api_key = match raw.api_key {
        Some(key) => Some(resolve_variables(&key)?).filter(|k| !k.is_empty()),
        None => None,
    };

    let mut headers = Vec::with_capacity(raw.headers.len());
    for (name, value) in raw.headers {
        let value = resolve_variables(&value)?;
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("endpoint.headers: invalid header name \"{name}\""))
        })?;
        HeaderValue::from_str(&value).map_err(|_| {
            ConfigError::Validation(format!(
                "endpoint.headers: invalid value for header \"{name}\""
            ))
        })?;
        headers.push((name, value));
    }

    for (field, value) in [
        ("connect_timeout_ms", raw.connect_timeout_ms),
        ("request_timeout_ms", raw.request_timeout_ms),
    ] {
        if value == Some(0) {
            return Err(ConfigError::Validation(format!(
                "endpoint.{field} must be greater than 0"
            )));
        }
    }

    Ok(EndpointConfig {
        url,
        model,
        api_key,
        headers,
        connect_timeout_ms: raw.connect_timeout_ms,
        request_timeout_ms: raw.request_timeout_ms,
    })
}

fn build_assistant_config(
    raw: Option<raw::RawAssistantConfig>,
) -> Result<AssistantConfig, ConfigError> {
    let Some(raw) = raw else {
        return Ok(AssistantConfig {
            greeting: DEFAULT_GREETING.to_string(),
            fallback: DEFAULT_FALLBACK.to_string(),
            system_prompt: Some(default_system_prompt()),
        });
    };

    let greeting = non_empty_text("assistant.greeting", raw.greeting, DEFAULT_GREETING)?;
    let fallback = non_empty_text("assistant.fallback", raw.fallback, DEFAULT_FALLBACK)?;

    let system_prompt = match raw.system_prompt {
        Some(prompt) => Some(resolve_variables(&prompt)?).filter(|p| !p.trim().is_empty()),
        None if raw.use_default_system_prompt != Some(false) => Some(default_system_prompt()),
        None => None,
    };

    Ok(AssistantConfig {
        greeting,
        fallback,
        system_prompt,
    })
}

fn non_empty_text(
    field: &str,
    value: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    match value {
        None => Ok(default.to_string()),
        Some(v) => {
            let v = resolve_variables(&v)?;
            if v.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} must not be empty")));
            }
            Ok(v)
        }
    }
}

fn build_stream_config(raw: Option<raw::RawStreamConfig>) -> Result<StreamConfig, ConfigError> {
    let defaults = ReassemblyLimits::default();
    let Some(raw) = raw else {
        return Ok(StreamConfig { limits: defaults });
    };

    let max_attempts = raw.max_reassembly_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        return Err(ConfigError::Validation(
            "stream.max_reassembly_attempts must be at least 1".to_string(),
        ));
    }

    let max_bytes = raw.max_reassembly_bytes.unwrap_or(defaults.max_bytes);
    if max_bytes == 0 {
        return Err(ConfigError::Validation(
            "stream.max_reassembly_bytes must be at least 1".to_string(),
        ));
    }

    Ok(StreamConfig {
        limits: ReassemblyLimits {
            max_attempts,
            max_bytes,
        },
    })
}
