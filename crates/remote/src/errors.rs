// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Translation of transport failures into the domain error taxonomy.

use jmd_core::Error;

use crate::transport::TransportError;

/// Maps a transport failure to a domain error. `context` names what was
/// being done, e.g. `"fetch ticket JMD-1"`.
pub fn to_domain(err: TransportError, context: &str) -> Error {
    match err {
        TransportError::Status { status, body } => {
            let message = detail(context, &body);
            match status {
                404 => Error::NotFound(message),
                401 | 403 => Error::Unauthorized(message),
                400 => Error::InvalidInput(message),
                409 => Error::Conflict(message),
                _ => Error::Remote { status: Some(status), message },
            }
        }
        TransportError::Request(reason) | TransportError::Serialization(reason) => {
            Error::Remote { status: None, message: format!("{context}: {reason}") }
        }
    }
}

// Tracker error bodies are JSON with `errorMessages`; fall back to the raw text.
fn detail(context: &str, body: &str) -> String {
    let messages: Vec<String> = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("errorMessages").and_then(|m| m.as_array()).cloned())
        .map(|items| items.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let body = body.trim();
    if !messages.is_empty() {
        format!("{context}: {}", messages.join("; "))
    } else if body.is_empty() {
        context.to_string()
    } else {
        format!("{context}: {body}")
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
