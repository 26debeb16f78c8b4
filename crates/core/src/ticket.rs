// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ticket aggregate and its identifiers.
//!
//! A [`Ticket`] mirrors one work item from the remote tracker. Its
//! [`content_hash`](Ticket::content_hash) is the digest stored alongside the
//! sync state to tell whether content actually changed between reconciliations.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// `PROJECT-NUMBER`, with a 2-10 character project part.
static TICKET_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"^([A-Z][A-Z0-9]{1,9})-(\d+)$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });

/// Length in bytes of the truncated content digest (128 bits).
const DIGEST_LEN: usize = 16;

/// A validated ticket identifier such as `JMD-123`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TicketKey(String);

impl TicketKey {
    /// Parses and validates a ticket key, trimming surrounding whitespace.
    pub fn new(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !TICKET_KEY_PATTERN.is_match(trimmed) {
            return Err(Error::InvalidIdentifier(value.to_string()));
        }
        Ok(TicketKey(trimmed.to_string()))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the project part, the substring before the dash.
    pub fn project_key(&self) -> &str {
        self.0.split_once('-').map(|(project, _)| project).unwrap_or(&self.0)
    }

    /// Returns the numeric part after the dash.
    pub fn number(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TicketKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TicketKey::new(s)
    }
}

impl TryFrom<String> for TicketKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TicketKey::new(&value)
    }
}

impl From<TicketKey> for String {
    fn from(key: TicketKey) -> Self {
        key.0
    }
}

impl AsRef<str> for TicketKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A typed custom-field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Converts an arbitrary JSON value from the tracker into a field value.
    ///
    /// Option-like objects collapse to their `value`, `name` or
    /// `displayName`; anything else unrecognized keeps its JSON text.
    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
            Value::String(s) => FieldValue::Text(s.clone()),
            Value::Array(items) => FieldValue::List(
                items
                    .iter()
                    .map(|item| FieldValue::from_json(item).to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Value::Object(map) => ["value", "name", "displayName"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
                .map(|s| FieldValue::Text(s.to_string()))
                .unwrap_or_else(|| FieldValue::Text(value.to_string())),
        }
    }

    /// Returns true for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Canonical encoding fed into the content digest.
    fn canonical(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Bool(b) => format!("bool:{b}"),
            FieldValue::Number(n) => format!("number:{n}"),
            FieldValue::Text(s) => format!("text:{s}"),
            FieldValue::List(items) => format!("list:{}", items.join("\u{1f}")),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// A work item mirrored from the remote tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    key: TicketKey,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub reporter: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, FieldValue>,
    created: DateTime<Utc>,
    /// Last modification time as reported by the remote tracker.
    pub updated: DateTime<Utc>,
}

impl Ticket {
    /// Creates a ticket with the required fields; everything else starts empty.
    pub fn new(
        key: TicketKey,
        summary: impl Into<String>,
        created: DateTime<Utc>,
        updated: DateTime<Utc>,
    ) -> Self {
        Ticket {
            key,
            summary: summary.into(),
            description: String::new(),
            status: String::new(),
            issue_type: String::new(),
            priority: String::new(),
            assignee: String::new(),
            reporter: String::new(),
            labels: Vec::new(),
            custom_fields: BTreeMap::new(),
            created,
            updated,
        }
    }

    pub fn key(&self) -> &TicketKey {
        &self.key
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Checks the invariants: non-blank summary, set created/updated times.
    pub fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(Error::InvalidInput(format!("ticket {} has no summary", self.key)));
        }
        if self.created == DateTime::<Utc>::UNIX_EPOCH {
            return Err(Error::InvalidTimestamp(format!("ticket {} has no created time", self.key)));
        }
        if self.updated == DateTime::<Utc>::UNIX_EPOCH {
            return Err(Error::InvalidTimestamp(format!("ticket {} has no updated time", self.key)));
        }
        Ok(())
    }

    /// Sets a custom field, replacing any previous value.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.custom_fields.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.custom_fields.get(name)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Computes the 128-bit content digest as 32 lowercase hex characters.
    ///
    /// Covers summary, description, status, priority, assignee, labels in
    /// their original order, and custom fields in sorted name order.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            &self.summary,
            &self.description,
            &self.status,
            &self.priority,
            &self.assignee,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1e]);
        }
        hasher.update(self.labels.join(",").as_bytes());
        hasher.update([0x1e]);
        for (name, value) in &self.custom_fields {
            hasher.update(name.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.canonical().as_bytes());
            hasher.update([0x1e]);
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..DIGEST_LEN])
    }
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
