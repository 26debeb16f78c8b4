// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable retry queue for operations bound for the remote tracker.
//!
//! ```text
//! enqueue ──► pending_operations ──► drain ──► executor
//!                  ▲                   │
//!                  └── record_attempt ◄┘ (failure, attempts < 3)
//! ```
//!
//! Successful operations are deleted. Failed ones keep their row with the
//! attempt count and last error; after three attempts they stop being
//! drained and stay visible through [`RetryQueue::exhausted`] until an
//! operator resets or deletes them.

use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, Result};
use crate::store::{StateRepository, StateStore};
use crate::sync::PendingOperation;

/// Boxed future returned by [`OperationExecutor::execute`].
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Carries out one queued operation against the remote tracker.
pub trait OperationExecutor: Send + Sync {
    fn execute<'a>(&'a self, op: &'a PendingOperation) -> ExecuteFuture<'a>;
}

/// What one [`RetryQueue::drain`] pass did, by operation id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: Vec<i64>,
    /// Failed but still has attempts left.
    pub failed: Vec<i64>,
    /// Failed and just ran out of attempts.
    pub exhausted: Vec<i64>,
    /// Rejected by the remote as a conflict; the ticket is now in conflict.
    pub conflicted: Vec<i64>,
    /// Not attempted because the ticket is in conflict.
    pub skipped: Vec<i64>,
}

impl DrainReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.exhausted.len() + self.conflicted.len()
    }
}

/// Queue view over the pending operations in a [`StateStore`].
pub struct RetryQueue<'s> {
    store: &'s StateStore,
}

impl<'s> RetryQueue<'s> {
    pub fn new(store: &'s StateStore) -> Self {
        RetryQueue { store }
    }

    /// Persists an operation, returning its id.
    pub fn enqueue(&self, op: &PendingOperation) -> Result<i64> {
        let id = self.store.enqueue_operation(op)?;
        tracing::info!(id, ticket_key = %op.ticket_key, operation = %op.operation, "queued operation");
        Ok(id)
    }

    /// Operations still eligible for retry, oldest first.
    pub fn pending(&self) -> Result<Vec<PendingOperation>> {
        self.store.get_retryable_operations()
    }

    /// Operations out of attempts.
    pub fn exhausted(&self) -> Result<Vec<PendingOperation>> {
        self.store.get_exhausted_operations()
    }

    /// Operator intervention: restore the full retry budget.
    pub fn reset(&self, id: i64) -> Result<()> {
        self.store.reset_operation(id)
    }

    /// Operator intervention: give up on an operation.
    pub fn discard(&self, id: i64) -> Result<()> {
        self.store.delete_operation(id)?;
        tracing::warn!(id, "discarded pending operation");
        Ok(())
    }

    /// Attempts every retryable operation once.
    ///
    /// Store failures abort the pass; executor failures are recorded on the
    /// operation and the pass continues.
    pub async fn drain<E: OperationExecutor>(&self, executor: &E) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        for mut op in self.pending()? {
            if self.ticket_in_conflict(&op)? {
                tracing::debug!(id = op.id, ticket_key = %op.ticket_key, "skipping operation for conflicted ticket");
                report.skipped.push(op.id);
                continue;
            }

            match executor.execute(&op).await {
                Ok(()) => {
                    self.store.delete_operation(op.id)?;
                    tracing::info!(id = op.id, ticket_key = %op.ticket_key, operation = %op.operation, "operation succeeded");
                    report.succeeded.push(op.id);
                }
                Err(err) => {
                    op.record_attempt(Some(&err));
                    self.store.update_operation(&op)?;
                    self.classify_failure(&op, &err, &mut report)?;
                }
            }
        }

        Ok(report)
    }

    fn ticket_in_conflict(&self, op: &PendingOperation) -> Result<bool> {
        match self.store.get_ticket_state(op.ticket_key.as_str()) {
            Ok(state) => Ok(state.is_conflicted()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn classify_failure(
        &self,
        op: &PendingOperation,
        err: &Error,
        report: &mut DrainReport,
    ) -> Result<()> {
        if err.is_conflict() {
            self.mark_ticket_conflict(op)?;
            tracing::warn!(id = op.id, ticket_key = %op.ticket_key, "remote rejected operation as conflict");
            report.conflicted.push(op.id);
        } else if op.is_exhausted() {
            tracing::error!(
                id = op.id,
                ticket_key = %op.ticket_key,
                operation = %op.operation,
                error = %err,
                "operation exhausted its retries"
            );
            report.exhausted.push(op.id);
        } else {
            tracing::warn!(id = op.id, attempts = op.attempts, error = %err, "operation failed");
            report.failed.push(op.id);
        }
        Ok(())
    }

    fn mark_ticket_conflict(&self, op: &PendingOperation) -> Result<()> {
        let tx = self.store.begin_transaction()?;
        match tx.get_ticket_state(op.ticket_key.as_str()) {
            Ok(mut state) => {
                state.mark_conflict();
                tx.save_ticket_state(&state)?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        tx.commit()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
