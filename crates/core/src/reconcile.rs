// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation between the remote tracker and the local markdown mirror.
//!
//! ```text
//!            pull_ticket / sync_project
//! ┌────────┐ ───────────────────────────► ┌──────────┐
//! │ Remote │                              │ Markdown │
//! └────────┘ ◄─────────────────────────── └──────────┘
//!            push_ticket / push_status /
//!            post_comment
//!                     │
//!                     ▼
//!               ┌────────────┐   transient failure   ┌────────────┐
//!               │ StateStore │ ◄──────────────────── │ RetryQueue │
//!               └────────────┘                       └────────────┘
//! ```
//!
//! Every read-modify-write of a [`TicketState`] runs inside a store
//! transaction. Transactions never span an `.await`: remote calls happen
//! between a read step and a separate compare-and-swap step that re-reads
//! the state before writing it.
//!
//! Failures are folded into the returned [`SyncResult`]:
//! - a remote `Conflict` marks the ticket state `conflict`;
//! - a retryable failure queues the matching [`OperationType`] and marks
//!   the state `pending`;
//! - anything else marks the state `error`.

use std::sync::Arc;

use serde_json::json;

use crate::clock::{ClockSource, SystemClock};
use crate::error::{Error, Result};
use crate::markdown::MarkdownRepository;
use crate::project::validate_project_key;
use crate::queue::{DrainReport, ExecuteFuture, OperationExecutor, RetryQueue};
use crate::remote::RemoteRepository;
use crate::store::{StateRepository, StateStore};
use crate::sync::{
    OperationType, PendingOperation, SyncResult, SyncState, SyncStatus, SyncTimestamp, TicketState,
};
use crate::ticket::{Ticket, TicketKey};

/// How much of a project [`Reconciler::sync_project`] fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every ticket in the project.
    Full,
    /// Tickets updated since the last sync; falls back to full when the
    /// project has never synced.
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side wins when resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSide {
    /// Push the local copy over the remote one.
    Local,
    /// Overwrite the local copy with the remote one.
    Remote,
}

/// Outcome of one [`Reconciler::sync_project`] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSyncReport {
    pub project_key: String,
    pub mode: SyncMode,
    /// Tickets returned by the remote fetch.
    pub fetched: usize,
    /// Tickets found edited locally.
    pub local_changes: Vec<TicketKey>,
    pub results: Vec<SyncResult>,
}

impl ProjectSyncReport {
    fn new(project_key: &str, mode: SyncMode) -> Self {
        ProjectSyncReport {
            project_key: project_key.to_string(),
            mode,
            fetched: 0,
            local_changes: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &SyncResult> {
        self.results.iter().filter(|r| r.conflict_detected)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// No failures and no conflicts.
    pub fn is_clean(&self) -> bool {
        self.conflicts().next().is_none() && self.failures().next().is_none()
    }
}

/// Drives tickets between the remote tracker and the markdown mirror,
/// recording every transition in the [`StateStore`].
pub struct Reconciler<R, M, C = SystemClock> {
    store: Arc<StateStore>,
    remote: R,
    markdown: M,
    clock: C,
}

impl<R: RemoteRepository, M: MarkdownRepository> Reconciler<R, M, SystemClock> {
    pub fn new(store: Arc<StateStore>, remote: R, markdown: M) -> Self {
        Self::with_clock(store, remote, markdown, SystemClock)
    }
}

impl<R, M, C> Reconciler<R, M, C>
where
    R: RemoteRepository,
    M: MarkdownRepository,
    C: ClockSource,
{
    pub fn with_clock(store: Arc<StateStore>, remote: R, markdown: M, clock: C) -> Self {
        Reconciler { store, remote, markdown, clock }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Starts tracking a ticket whose local and remote copies match.
    ///
    /// Idempotent: an already tracked ticket keeps its existing state.
    pub fn track_ticket(&self, ticket: &Ticket) -> Result<TicketState> {
        ticket.validate()?;
        let key = ticket.key();
        let tx = self.store.begin_transaction()?;
        match tx.get_ticket_state(key.as_str()) {
            Ok(existing) => {
                tx.rollback()?;
                Ok(existing)
            }
            Err(e) if e.is_not_found() => {
                let updated = SyncTimestamp::new(ticket.updated);
                let mut state =
                    TicketState::new_at(key.project_key(), key.clone(), updated, &self.clock)?;
                state.update_synced_at(&ticket.content_hash(), updated, &self.clock);
                tx.save_ticket_state(&state)?;
                tx.commit()?;
                tracing::info!(ticket_key = %key, "tracking ticket");
                Ok(state)
            }
            Err(e) => Err(e),
        }
    }

    /// Records a local edit made at `at`, detecting a conflict if the
    /// remote has also moved on since the last sync.
    pub fn record_local_edit(&self, key: &TicketKey, at: SyncTimestamp) -> Result<TicketState> {
        let tx = self.store.begin_transaction()?;
        let mut state = tx.get_ticket_state(key.as_str())?;
        state.mark_local_modified(at);
        tx.save_ticket_state(&state)?;
        tx.commit()?;

        if state.is_conflicted() {
            tracing::warn!(ticket_key = %key, "local edit conflicts with remote changes");
        } else {
            tracing::debug!(ticket_key = %key, at = %at, "recorded local edit");
        }
        Ok(state)
    }

    /// Scans the project's tracked tickets for markdown files edited since
    /// their last sync and records each as a local edit.
    ///
    /// A file counts as edited only if it is newer than the last sync and
    /// its content digest differs from the one recorded then. Missing files
    /// are skipped.
    pub fn detect_local_changes(&self, project_key: &str) -> Result<Vec<TicketKey>> {
        let mut changed = Vec::new();
        for state in self.store.get_project_tickets(project_key)? {
            let path = self.markdown.ticket_path(&state.ticket_key);
            let modified = match self.markdown.modified_at(&path) {
                Ok(at) => at,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            if !modified.after(&state.last_synced) {
                continue;
            }
            if state.local_modified.is_some_and(|seen| !modified.after(&seen)) {
                continue;
            }
            let ticket = self.markdown.read_ticket(&path)?;
            if ticket.content_hash() == state.content_hash {
                continue;
            }
            self.record_local_edit(&state.ticket_key, modified)?;
            changed.push(state.ticket_key);
        }
        Ok(changed)
    }

    /// Fetches a ticket and writes it to the mirror unless local edits are
    /// pending.
    pub async fn pull_ticket(&self, key: &TicketKey) -> SyncResult {
        let outcome = self.pull_inner(key).await;
        self.settle(key, OperationType::PullTicket, "{}".to_string(), outcome)
    }

    /// Pushes the local copy of a ticket if it has unpushed edits.
    pub async fn push_ticket(&self, key: &TicketKey) -> SyncResult {
        let outcome = self.push_inner(key, None).await;
        self.settle(key, OperationType::PushField, "{}".to_string(), outcome)
    }

    /// Sets the ticket's status locally and pushes the whole ticket.
    pub async fn push_status(&self, key: &TicketKey, status: &str) -> SyncResult {
        let outcome = self.push_inner(key, Some(status)).await;
        let payload = json!({ "status": status }).to_string();
        self.settle(key, OperationType::PushStatus, payload, outcome)
    }

    /// Posts a comment and appends the tracker's copy to the mirror.
    pub async fn post_comment(&self, key: &TicketKey, body: &str) -> SyncResult {
        let outcome = self.post_comment_inner(key, body).await;
        let payload = json!({ "body": body }).to_string();
        self.settle(key, OperationType::PostComment, payload, outcome)
    }

    /// Replaces the mirrored comments with the tracker's.
    pub async fn pull_comments(&self, key: &TicketKey) -> SyncResult {
        let outcome = self.pull_comments_inner(key).await;
        self.settle(key, OperationType::PullComments, "{}".to_string(), outcome)
    }

    /// Resolves a recorded conflict by letting one side win.
    pub async fn resolve_conflict(&self, key: &TicketKey, side: ConflictSide) -> SyncResult {
        if let Err(err) = self.prepare_resolution(key, side) {
            let mut result = SyncResult::new(key.clone());
            result.mark_failed(&err);
            return result;
        }
        tracing::info!(ticket_key = %key, ?side, "resolving conflict");
        match side {
            ConflictSide::Local => self.push_ticket(key).await,
            ConflictSide::Remote => self.pull_ticket(key).await,
        }
    }

    /// Runs one sync pass over a project: fetch, detect local edits, apply
    /// remote changes, then push what is still dirty.
    ///
    /// Per-ticket failures land in the report. Only a failed fetch or a
    /// store failure aborts the pass.
    pub async fn sync_project(&self, project_key: &str, mode: SyncMode) -> Result<ProjectSyncReport> {
        validate_project_key(project_key)?;
        let mut project = match self.store.get_project_state(project_key) {
            Ok(state) => state,
            Err(e) if e.is_not_found() => SyncState::new(project_key)?,
            Err(e) => return Err(e),
        };

        // Stamped before the fetch; anything updated during the pass is
        // fetched again next time.
        let started = SyncTimestamp::now(&self.clock);
        let since = project.last_sync();
        let tickets = match mode {
            SyncMode::Incremental if !since.is_never() => {
                self.remote.fetch_tickets_modified_since(project_key, since).await?
            }
            _ => self.remote.fetch_all_tickets(project_key).await?,
        };

        let mut report = ProjectSyncReport::new(project_key, mode);
        report.fetched = tickets.len();
        report.local_changes = self.detect_local_changes(project_key)?;

        for ticket in &tickets {
            if ticket.key().project_key() != project_key {
                tracing::warn!(ticket_key = %ticket.key(), project_key, "skipping ticket from another project");
                continue;
            }
            let result = self.apply_remote(ticket).unwrap_or_else(|err| {
                let mut result = SyncResult::new(ticket.key().clone());
                result.mark_failed(&err);
                result
            });
            report.results.push(result);
        }

        for state in self.store.get_project_tickets(project_key)? {
            if state.is_dirty() && !state.is_conflicted() {
                report.results.push(self.push_ticket(&state.ticket_key).await);
            }
        }

        project.ticket_count =
            u32::try_from(self.store.get_project_tickets(project_key)?.len()).unwrap_or(u32::MAX);
        match mode {
            SyncMode::Full => project.last_full_sync = started,
            SyncMode::Incremental => project.last_incremental_sync = started,
        }
        self.store.save_project_state(&project)?;

        tracing::info!(
            project_key,
            mode = %mode,
            fetched = report.fetched,
            conflicts = report.conflicts().count(),
            failures = report.failures().count(),
            "project sync complete"
        );
        Ok(report)
    }

    /// Retries every queued operation once through this reconciler.
    pub async fn drain_queue(&self) -> Result<DrainReport> {
        RetryQueue::new(&self.store).drain(self).await
    }

    async fn pull_inner(&self, key: &TicketKey) -> Result<SyncResult> {
        let ticket = self.remote.fetch_ticket(key).await?;
        if ticket.key() != key {
            return Err(Error::InvalidInput(format!(
                "asked for {key}, remote returned {}",
                ticket.key()
            )));
        }
        self.apply_remote(&ticket)
    }

    /// Applies a fetched ticket to the mirror and its state.
    fn apply_remote(&self, ticket: &Ticket) -> Result<SyncResult> {
        let key = ticket.key();
        let mut result = SyncResult::new(key.clone());
        let remote_updated = SyncTimestamp::new(ticket.updated);
        let hash = ticket.content_hash();

        let tx = self.store.begin_transaction()?;
        let mut state = match tx.get_ticket_state(key.as_str()) {
            Ok(state) => state,
            Err(e) if e.is_not_found() => {
                self.write_ticket(ticket)?;
                let mut state =
                    TicketState::new_at(key.project_key(), key.clone(), remote_updated, &self.clock)?;
                state.update_synced_at(&hash, remote_updated, &self.clock);
                tx.save_ticket_state(&state)?;
                tx.commit()?;
                tracing::info!(ticket_key = %key, "pulled new ticket");
                result.add_operation(OperationType::PullTicket.as_str());
                return Ok(result);
            }
            Err(e) => return Err(e),
        };

        state.mark_remote_modified(remote_updated);
        if state.is_conflicted() {
            tx.save_ticket_state(&state)?;
            tx.commit()?;
            tracing::warn!(ticket_key = %key, "remote and local both changed");
            result.add_operation(OperationType::PullTicket.as_str());
            result.mark_conflict();
            return Ok(result);
        }
        if state.is_dirty() {
            tx.save_ticket_state(&state)?;
            tx.commit()?;
            result.add_operation("kept_local_changes");
            return Ok(result);
        }
        if state.content_hash == hash && !remote_updated.after(&state.last_synced) {
            if state.status == SyncStatus::InSync {
                tx.rollback()?;
            } else {
                // A pending or failed ticket is settled by any successful pull.
                state.update_synced_at(&hash, remote_updated, &self.clock);
                tx.save_ticket_state(&state)?;
                tx.commit()?;
                tracing::info!(ticket_key = %key, "ticket back in sync");
            }
            result.add_operation("up_to_date");
            return Ok(result);
        }

        self.write_ticket(ticket)?;
        state.update_synced_at(&hash, remote_updated, &self.clock);
        tx.save_ticket_state(&state)?;
        tx.commit()?;
        tracing::info!(ticket_key = %key, updated = %remote_updated, "pulled ticket");
        result.add_operation(OperationType::PullTicket.as_str());
        Ok(result)
    }

    async fn push_inner(&self, key: &TicketKey, status: Option<&str>) -> Result<SyncResult> {
        let mut result = SyncResult::new(key.clone());
        let state = self.store.get_ticket_state(key.as_str())?;
        if state.is_conflicted() {
            result.mark_conflict();
            return Ok(result);
        }
        if status.is_none() && !state.is_dirty() {
            result.add_operation("up_to_date");
            return Ok(result);
        }

        let path = self.markdown.ticket_path(key);
        let mut ticket = self.markdown.read_ticket(&path)?;
        if ticket.key() != key {
            return Err(Error::InvalidInput(format!("{} holds ticket {}", path.display(), ticket.key())));
        }
        if let Some(status) = status {
            ticket.status = status.to_string();
            self.markdown.write_ticket(&path, &ticket)?;
        }
        ticket.validate()?;

        let pushed = self.remote.update_ticket(&ticket).await?;
        self.complete_push(key, state.local_modified, &ticket.content_hash(), &pushed)?;

        tracing::info!(ticket_key = %key, "pushed ticket");
        let operation = if status.is_some() { OperationType::PushStatus } else { OperationType::PushField };
        result.add_operation(operation.as_str());
        Ok(result)
    }

    /// Marks a push synced. An edit recorded while the push was in flight
    /// stays pending.
    fn complete_push(
        &self,
        key: &TicketKey,
        pushed_edit: Option<SyncTimestamp>,
        hash: &str,
        pushed: &Ticket,
    ) -> Result<()> {
        let tx = self.store.begin_transaction()?;
        let mut state = tx.get_ticket_state(key.as_str())?;
        let newer_edit = state.local_modified.filter(|at| Some(*at) != pushed_edit);
        state.update_synced_at(hash, SyncTimestamp::new(pushed.updated), &self.clock);
        if let Some(at) = newer_edit {
            state.mark_local_modified(at);
        }
        tx.save_ticket_state(&state)?;
        tx.commit()
    }

    async fn post_comment_inner(&self, key: &TicketKey, body: &str) -> Result<SyncResult> {
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("comment body is empty".into()));
        }
        let comment = self.remote.add_comment(key, body).await?;
        let path = self.markdown.ticket_path(key);
        let mut comments = match self.markdown.read_comments(&path) {
            Ok(comments) => comments,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        comments.push(comment);
        self.markdown.write_comments(&path, &comments)?;

        let mut result = SyncResult::new(key.clone());
        result.add_operation(OperationType::PostComment.as_str());
        Ok(result)
    }

    async fn pull_comments_inner(&self, key: &TicketKey) -> Result<SyncResult> {
        let comments = self.remote.fetch_comments(key).await?;
        self.markdown.write_comments(&self.markdown.ticket_path(key), &comments)?;
        tracing::debug!(ticket_key = %key, count = comments.len(), "pulled comments");

        let mut result = SyncResult::new(key.clone());
        result.add_operation(OperationType::PullComments.as_str());
        Ok(result)
    }

    fn prepare_resolution(&self, key: &TicketKey, side: ConflictSide) -> Result<()> {
        let tx = self.store.begin_transaction()?;
        let mut state = tx.get_ticket_state(key.as_str())?;
        if !state.is_conflicted() {
            return Err(Error::InvalidInput(format!("ticket {key} is not in conflict")));
        }
        match side {
            ConflictSide::Local => {
                let at = state.local_modified.unwrap_or_else(|| SyncTimestamp::now(&self.clock));
                state.local_modified = Some(at);
                state.status = SyncStatus::LocalModified;
            }
            ConflictSide::Remote => {
                state.local_modified = None;
                // Forces the pull to rewrite the file.
                state.content_hash.clear();
                state.status = SyncStatus::RemoteModified;
            }
        }
        tx.save_ticket_state(&state)?;
        tx.commit()
    }

    fn write_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.markdown.write_ticket(&self.markdown.ticket_path(ticket.key()), ticket)
    }

    /// Folds a failure into a result, updating the state and the queue.
    fn settle(
        &self,
        key: &TicketKey,
        operation: OperationType,
        payload: String,
        outcome: Result<SyncResult>,
    ) -> SyncResult {
        let err = match outcome {
            Ok(result) => return result,
            Err(err) => err,
        };
        let mut result = SyncResult::new(key.clone());
        if let Err(store_err) = self.record_failure(key, operation, payload, &err, &mut result) {
            tracing::error!(ticket_key = %key, error = %store_err, "failed to record sync failure");
            result.mark_failed(&store_err);
        }
        result
    }

    fn record_failure(
        &self,
        key: &TicketKey,
        operation: OperationType,
        payload: String,
        err: &Error,
        result: &mut SyncResult,
    ) -> Result<()> {
        if err.is_conflict() {
            tracing::warn!(ticket_key = %key, %operation, "remote rejected change as conflict");
            result.add_operation(operation.as_str());
            result.mark_conflict();
            return self.update_state(key, TicketState::mark_conflict);
        }

        result.mark_failed(err);
        let touches_state = !matches!(operation, OperationType::PostComment | OperationType::PullComments);
        if err.is_retryable() {
            tracing::warn!(ticket_key = %key, %operation, error = %err, "queueing for retry");
            self.enqueue_once(key, operation, payload)?;
            result.add_operation("queued");
            if touches_state {
                self.update_state(key, TicketState::mark_pending)?;
            }
        } else {
            tracing::error!(ticket_key = %key, %operation, error = %err, "sync failed");
            if touches_state {
                self.update_state(key, TicketState::mark_error)?;
            }
        }
        Ok(())
    }

    /// Queues an operation unless an identical one is already waiting.
    fn enqueue_once(&self, key: &TicketKey, operation: OperationType, payload: String) -> Result<()> {
        let queued = self.store.get_retryable_operations()?.into_iter().any(|op| {
            op.ticket_key == *key && op.operation == operation && op.payload == payload
        });
        if queued {
            tracing::debug!(ticket_key = %key, %operation, "operation already queued");
            return Ok(());
        }
        let op = PendingOperation::new(key.project_key(), key.clone(), operation, payload, &self.clock)?;
        RetryQueue::new(&self.store).enqueue(&op)?;
        Ok(())
    }

    /// Applies `f` to a tracked ticket's state; untracked tickets are left alone.
    fn update_state(&self, key: &TicketKey, f: impl FnOnce(&mut TicketState)) -> Result<()> {
        let tx = self.store.begin_transaction()?;
        let mut state = match tx.get_ticket_state(key.as_str()) {
            Ok(state) => state,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        f(&mut state);
        tx.save_ticket_state(&state)?;
        tx.commit()
    }
}

/// Replays queued operations. Failures are returned untouched so the queue
/// can record the attempt.
impl<R, M, C> OperationExecutor for Reconciler<R, M, C>
where
    R: RemoteRepository,
    M: MarkdownRepository,
    C: ClockSource,
{
    fn execute<'a>(&'a self, op: &'a PendingOperation) -> ExecuteFuture<'a> {
        Box::pin(async move {
            let key = &op.ticket_key;
            let result = match op.operation {
                OperationType::PushField => self.push_inner(key, None).await?,
                OperationType::PushStatus => {
                    let status = payload_field(op, "status")?;
                    self.push_inner(key, Some(&status)).await?
                }
                OperationType::PostComment => {
                    let body = payload_field(op, "body")?;
                    self.post_comment_inner(key, &body).await?
                }
                OperationType::PullTicket => self.pull_inner(key).await?,
                OperationType::PullComments => self.pull_comments_inner(key).await?,
            };
            if result.conflict_detected {
                return Err(Error::Conflict(key.to_string()));
            }
            Ok(())
        })
    }
}

fn payload_field(op: &PendingOperation, field: &str) -> Result<String> {
    let payload: serde_json::Value = serde_json::from_str(&op.payload)?;
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::CorruptedData(format!("operation {} payload has no '{field}'", op.id)))
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
