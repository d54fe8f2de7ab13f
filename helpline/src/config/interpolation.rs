// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Resolves `${VAR}` and `${VAR:-fallback}` references from the environment.
///
/// A bare `${VAR}` that is not set is an error; the `:-` form substitutes the
/// fallback (possibly empty) instead. An unterminated `${` is kept literally.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next(); // '{'

        let mut body = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            body.push(c);
        }
        if !closed || body.is_empty() {
            result.push_str("${");
            result.push_str(&body);
            if closed {
                result.push('}');
            }
            continue;
        }

        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body.as_str(), None),
        };
        match (std::env::var(name), fallback) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(fallback)) => result.push_str(fallback),
            (Err(_), None) => {
                return Err(ConfigError::UndefinedVariable {
                    name: name.to_string(),
                })
            }
        }
    }

    Ok(result)
}
