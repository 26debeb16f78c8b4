// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronization state entities.
//!
//! These are the in-memory forms of what the [`StateStore`](crate::store::StateStore)
//! persists: per-ticket [`TicketState`], per-project [`SyncState`], and the
//! [`PendingOperation`] retry queue. Callers fetch a fresh copy, mutate it
//! locally, and write it back.

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::{ClockSource, SystemClock};
use crate::conflict;
use crate::error::{Error, Result};
use crate::ticket::TicketKey;

/// Attempts allowed before a pending operation becomes terminal.
pub const MAX_ATTEMPTS: u32 = 3;

/// A UTC instant with millisecond precision, or "never".
///
/// Never sorts before every real instant, so a real timestamp is always
/// [`after`](Self::after) never.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncTimestamp(Option<DateTime<Utc>>);

impl SyncTimestamp {
    /// Wraps an instant, normalizing to UTC and truncating to milliseconds.
    pub fn new<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        SyncTimestamp(Some(at.with_timezone(&Utc).trunc_subsecs(3)))
    }

    pub const fn never() -> Self {
        SyncTimestamp(None)
    }

    /// Current time from the given clock.
    pub fn now(clock: &impl ClockSource) -> Self {
        SyncTimestamp::new(clock.now())
    }

    pub fn from_millis(ms: i64) -> Result<Self> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(SyncTimestamp::new)
            .ok_or_else(|| Error::InvalidTimestamp(format!("{ms} ms is out of range")))
    }

    pub fn is_never(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    /// Strictly earlier than `other`.
    pub fn before(&self, other: &SyncTimestamp) -> bool {
        self < other
    }

    /// Strictly later than `other`.
    pub fn after(&self, other: &SyncTimestamp) -> bool {
        self > other
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for SyncTimestamp {
    fn from(at: DateTime<Tz>) -> Self {
        SyncTimestamp::new(at)
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(at) => write!(f, "{}", at.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => f.write_str("never"),
        }
    }
}

/// Sync status of a single ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local and remote agree.
    InSync,
    /// Local edits not yet pushed.
    LocalModified,
    /// Remote edits not yet pulled.
    RemoteModified,
    /// Both sides changed since the last reconciliation.
    Conflict,
    /// A remote operation is queued.
    Pending,
    /// The last reconciliation failed terminally.
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::InSync => "in_sync",
            SyncStatus::LocalModified => "local_modified",
            SyncStatus::RemoteModified => "remote_modified",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Pending => "pending",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in_sync" => Ok(SyncStatus::InSync),
            "local_modified" => Ok(SyncStatus::LocalModified),
            "remote_modified" => Ok(SyncStatus::RemoteModified),
            "conflict" => Ok(SyncStatus::Conflict),
            "pending" => Ok(SyncStatus::Pending),
            "error" => Ok(SyncStatus::Error),
            _ => Err(Error::InvalidInput(format!("invalid sync status: {s}"))),
        }
    }
}

/// Sync bookkeeping for one ticket, identified by its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
    pub project_key: String,
    pub ticket_key: TicketKey,
    /// Remote last-modified time.
    pub jira_updated: SyncTimestamp,
    /// Pending local edit time; `None` means nothing to push.
    pub local_modified: Option<SyncTimestamp>,
    pub last_synced: SyncTimestamp,
    /// Content digest at the last reconciliation.
    pub content_hash: String,
    pub status: SyncStatus,
}

impl TicketState {
    /// Starts tracking a ticket as in sync as of now.
    pub fn new(project_key: &str, ticket_key: TicketKey, jira_updated: SyncTimestamp) -> Result<Self> {
        Self::new_at(project_key, ticket_key, jira_updated, &SystemClock)
    }

    pub fn new_at(
        project_key: &str,
        ticket_key: TicketKey,
        jira_updated: SyncTimestamp,
        clock: &impl ClockSource,
    ) -> Result<Self> {
        let project_key = project_key.trim();
        if project_key.is_empty() {
            return Err(Error::EmptyKey("project key is required".into()));
        }
        Ok(TicketState {
            project_key: project_key.to_string(),
            ticket_key,
            jira_updated,
            local_modified: None,
            last_synced: SyncTimestamp::now(clock),
            content_hash: String::new(),
            status: SyncStatus::InSync,
        })
    }

    /// Records a local edit. Only the latest edit time is kept.
    pub fn mark_local_modified(&mut self, at: SyncTimestamp) {
        self.local_modified = Some(at);
        self.status = SyncStatus::LocalModified;
        self.detect_conflict();
    }

    /// Records a newer remote modification time observed on fetch.
    pub fn mark_remote_modified(&mut self, jira_updated: SyncTimestamp) {
        self.jira_updated = jira_updated;
        if self.detect_conflict() {
            return;
        }
        if self.local_modified.is_none() && jira_updated.after(&self.last_synced) {
            self.status = SyncStatus::RemoteModified;
        }
    }

    /// Returns true if both sides changed since the last sync, flipping the
    /// status to [`SyncStatus::Conflict`] when they did.
    pub fn detect_conflict(&mut self) -> bool {
        let conflict = conflict::is_conflict(self);
        if conflict {
            self.status = SyncStatus::Conflict;
        }
        conflict
    }

    /// Records a completed reconciliation as of now.
    pub fn update_synced(&mut self, content_hash: &str, jira_updated: SyncTimestamp) {
        self.update_synced_at(content_hash, jira_updated, &SystemClock);
    }

    /// The only transition that clears dirtiness.
    pub fn update_synced_at(
        &mut self,
        content_hash: &str,
        jira_updated: SyncTimestamp,
        clock: &impl ClockSource,
    ) {
        self.last_synced = SyncTimestamp::now(clock);
        self.content_hash = content_hash.to_string();
        self.jira_updated = jira_updated;
        self.local_modified = None;
        self.status = SyncStatus::InSync;
    }

    pub fn mark_pending(&mut self) {
        if self.status != SyncStatus::Conflict {
            self.status = SyncStatus::Pending;
        }
    }

    pub fn mark_error(&mut self) {
        if self.status != SyncStatus::Conflict {
            self.status = SyncStatus::Error;
        }
    }

    /// Forces the conflict status, e.g. after the remote rejected a push.
    pub fn mark_conflict(&mut self) {
        self.status = SyncStatus::Conflict;
    }

    /// Has local edits not yet pushed.
    pub fn is_dirty(&self) -> bool {
        self.local_modified.is_some()
    }

    pub fn is_conflicted(&self) -> bool {
        self.status == SyncStatus::Conflict
    }
}

/// Sync bookkeeping for a whole project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub project_key: String,
    pub last_full_sync: SyncTimestamp,
    pub last_incremental_sync: SyncTimestamp,
    pub ticket_count: u32,
}

impl SyncState {
    pub fn new(project_key: &str) -> Result<Self> {
        let project_key = project_key.trim();
        if project_key.is_empty() {
            return Err(Error::EmptyKey("project key is required".into()));
        }
        Ok(SyncState {
            project_key: project_key.to_string(),
            last_full_sync: SyncTimestamp::never(),
            last_incremental_sync: SyncTimestamp::never(),
            ticket_count: 0,
        })
    }

    pub fn update_full_sync(&mut self, clock: &impl ClockSource) {
        self.last_full_sync = SyncTimestamp::now(clock);
    }

    pub fn update_incremental_sync(&mut self, clock: &impl ClockSource) {
        self.last_incremental_sync = SyncTimestamp::now(clock);
    }

    /// The later of the two sync times; the lower bound for the next
    /// incremental fetch.
    pub fn last_sync(&self) -> SyncTimestamp {
        self.last_full_sync.max(self.last_incremental_sync)
    }
}

/// Outcome of one reconciliation attempt for a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub ticket_key: TicketKey,
    pub success: bool,
    pub error: Option<String>,
    pub conflict_detected: bool,
    pub operations: Vec<String>,
}

impl SyncResult {
    pub fn new(ticket_key: TicketKey) -> Self {
        SyncResult {
            ticket_key,
            success: true,
            error: None,
            conflict_detected: false,
            operations: Vec::new(),
        }
    }

    pub fn mark_failed(&mut self, err: &Error) {
        self.success = false;
        self.error = Some(err.to_string());
    }

    pub fn mark_conflict(&mut self) {
        self.conflict_detected = true;
        self.add_operation("conflict_detected");
    }

    pub fn add_operation(&mut self, operation: impl Into<String>) {
        self.operations.push(operation.into());
    }
}

/// Kinds of operations that can be queued against the remote tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    PushStatus,
    PushField,
    PostComment,
    PullTicket,
    PullComments,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::PushStatus => "push_status",
            OperationType::PushField => "push_field",
            OperationType::PostComment => "post_comment",
            OperationType::PullTicket => "pull_ticket",
            OperationType::PullComments => "pull_comments",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push_status" => Ok(OperationType::PushStatus),
            "push_field" => Ok(OperationType::PushField),
            "post_comment" => Ok(OperationType::PostComment),
            "pull_ticket" => Ok(OperationType::PullTicket),
            "pull_comments" => Ok(OperationType::PullComments),
            _ => Err(Error::InvalidOperation(s.to_string())),
        }
    }
}

/// A queued operation that must eventually reach the remote tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Assigned by the store; zero until enqueued.
    pub id: i64,
    pub project_key: String,
    pub ticket_key: TicketKey,
    pub operation: OperationType,
    /// Opaque serialized payload.
    pub payload: String,
    pub created_at: SyncTimestamp,
    pub attempts: u32,
    /// Empty until a failed attempt.
    pub last_error: String,
}

impl PendingOperation {
    pub fn new(
        project_key: &str,
        ticket_key: TicketKey,
        operation: OperationType,
        payload: impl Into<String>,
        clock: &impl ClockSource,
    ) -> Result<Self> {
        let project_key = project_key.trim();
        if project_key.is_empty() {
            return Err(Error::EmptyKey("project key is required".into()));
        }
        Ok(PendingOperation {
            id: 0,
            project_key: project_key.to_string(),
            ticket_key,
            operation,
            payload: payload.into(),
            created_at: SyncTimestamp::now(clock),
            attempts: 0,
            last_error: String::new(),
        })
    }

    /// Counts an attempt; `None` is a re-check that keeps the last error.
    pub fn record_attempt(&mut self, err: Option<&Error>) {
        self.attempts += 1;
        if let Some(err) = err {
            self.last_error = err.to_string();
        }
    }

    pub fn should_retry(&self) -> bool {
        self.attempts < MAX_ATTEMPTS
    }

    /// Out of attempts; must be surfaced rather than dropped.
    pub fn is_exhausted(&self) -> bool {
        !self.should_retry()
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
