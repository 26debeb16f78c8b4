// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for jmd-core operations.
//!
//! Remote failures are translated into this same taxonomy at the
//! collaborator boundary, so the engine never branches on HTTP status codes.

use thiserror::Error;

/// All possible errors that can occur in jmd-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("empty key: {0}")]
    EmptyKey(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid operation type: '{0}'\n  hint: valid operations are: push_status, push_field, post_comment, pull_ticket, pull_comments")]
    InvalidOperation(String),

    #[error("invalid ticket key: '{0}'\n  hint: expected format PROJECT-NUMBER, e.g. JMD-123")]
    InvalidIdentifier(String),

    #[error("invalid project: {0}")]
    InvalidProject(String),

    #[error("invalid field value: {0}")]
    InvalidFieldValue(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A remote failure outside the domain taxonomy, wrapped as-is.
    #[error("remote error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

impl Error {
    /// Returns true for failures worth queueing for a later retry.
    ///
    /// Domain errors (not found, unauthorized, conflict, bad input) will not
    /// heal by themselves and are surfaced instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Remote { .. } | Error::Io(_) => true,
            Error::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Returns true if this is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Returns true if this is a [`Error::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

/// A specialized Result type for jmd-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
