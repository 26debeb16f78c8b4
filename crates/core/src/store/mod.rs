// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed sync state store.
//!
//! [`StateStore`] owns the single connection. Every operation lives on the
//! [`StateRepository`] trait, which is implemented both by the store itself
//! (autocommit) and by a [`StoreTransaction`] handle returned from
//! [`StateStore::begin_transaction`]. Work issued through the handle applies
//! atomically on [`commit`](StoreTransaction::commit) and vanishes on
//! [`rollback`](StoreTransaction::rollback) or drop.
//!
//! ```text
//! ┌──────────────┐  begin_transaction  ┌──────────────────┐
//! │  StateStore  │────────────────────►│ StoreTransaction │
//! │ (autocommit) │◄────────────────────│  (holds the lock)│
//! └──────────────┘   commit/rollback   └──────────────────┘
//!         │                                     │
//!         └──────────── StateRepository ────────┘
//! ```
//!
//! While a thread holds an open transaction, that thread may not call the
//! store directly or begin another transaction; both fail with
//! [`Error::InvalidInput`]. Other threads simply wait for the lock.

mod migrations;
mod ops;
mod transaction;

pub use transaction::StoreTransaction;
use sealed::Connected as _;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::{PendingOperation, SyncState, SyncTimestamp, TicketState};

/// Connection settings for the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig { busy_timeout: Duration::from_secs(5) }
    }
}

mod sealed {
    use rusqlite::Connection;

    use crate::error::Result;

    /// Access to the connection an operation should run on.
    pub trait Connected {
        fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T>;
    }
}

/// Persistence operations for ticket, project and pending-operation state.
///
/// `save_*` calls are upserts with last-write-wins semantics per key. For
/// read-check-write atomicity, run the steps through a [`StoreTransaction`].
pub trait StateRepository: sealed::Connected {
    /// Insert or replace the state for `state.ticket_key`.
    fn save_ticket_state(&self, state: &TicketState) -> Result<()> {
        self.with_conn(|conn| ops::save_ticket_state(conn, state))
    }

    fn get_ticket_state(&self, key: &str) -> Result<TicketState> {
        self.with_conn(|conn| ops::get_ticket_state(conn, key))
    }

    /// Tickets with unpushed local edits, newest edit first.
    fn get_dirty_tickets(&self) -> Result<Vec<TicketState>> {
        self.with_conn(ops::get_dirty_tickets)
    }

    /// Tickets in conflict, newest local edit first.
    fn get_conflicted_tickets(&self) -> Result<Vec<TicketState>> {
        self.with_conn(ops::get_conflicted_tickets)
    }

    /// Tickets whose local edit is strictly after `since`, newest first.
    fn get_tickets_modified_since(&self, since: SyncTimestamp) -> Result<Vec<TicketState>> {
        self.with_conn(|conn| ops::get_tickets_modified_since(conn, &since))
    }

    /// All tracked tickets of one project, by key.
    fn get_project_tickets(&self, project_key: &str) -> Result<Vec<TicketState>> {
        self.with_conn(|conn| ops::get_project_tickets(conn, project_key))
    }

    fn delete_ticket_state(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| ops::delete_ticket_state(conn, key))
    }

    fn save_project_state(&self, state: &SyncState) -> Result<()> {
        self.with_conn(|conn| ops::save_project_state(conn, state))
    }

    fn get_project_state(&self, key: &str) -> Result<SyncState> {
        self.with_conn(|conn| ops::get_project_state(conn, key))
    }

    fn get_all_project_states(&self) -> Result<Vec<SyncState>> {
        self.with_conn(ops::get_all_project_states)
    }

    /// Removes the project plus every ticket state keyed `{key}-*` and its
    /// queued operations, atomically.
    fn delete_project_state(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| ops::delete_project_state(conn, key))
    }

    /// Persists a new operation and returns its id.
    fn enqueue_operation(&self, op: &PendingOperation) -> Result<i64> {
        self.with_conn(|conn| ops::enqueue_operation(conn, op))
    }

    fn get_operation(&self, id: i64) -> Result<PendingOperation> {
        self.with_conn(|conn| ops::get_operation(conn, id))
    }

    /// Operations with attempts left, oldest first.
    fn get_retryable_operations(&self) -> Result<Vec<PendingOperation>> {
        self.with_conn(ops::get_retryable_operations)
    }

    /// Operations out of attempts, awaiting an operator.
    fn get_exhausted_operations(&self) -> Result<Vec<PendingOperation>> {
        self.with_conn(ops::get_exhausted_operations)
    }

    /// Writes back attempts, last error and payload.
    fn update_operation(&self, op: &PendingOperation) -> Result<()> {
        self.with_conn(|conn| ops::update_operation(conn, op))
    }

    fn delete_operation(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| ops::delete_operation(conn, id))
    }

    /// Gives an exhausted operation a fresh retry budget.
    fn reset_operation(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| ops::reset_operation(conn, id))
    }
}

/// Durable store for sync state, backed by a single SQLite connection.
pub struct StateStore {
    conn: Mutex<Connection>,
    /// Thread holding the open transaction, if any.
    tx_owner: Mutex<Option<ThreadId>>,
}

impl StateStore {
    /// Open a store at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreConfig::default())
    }

    pub fn open_with(path: &Path, config: StoreConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // Single writer, concurrent readers through the write-ahead log
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.busy_timeout(config.busy_timeout)?;

        tracing::debug!(path = %path.display(), "opened state store");
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migrations::run_migrations(&mut conn)?;
        Ok(StateStore { conn: Mutex::new(conn), tx_owner: Mutex::new(None) })
    }

    /// Starts a unit of work. The returned handle holds the connection
    /// until it is committed, rolled back, or dropped.
    pub fn begin_transaction(&self) -> Result<StoreTransaction<'_>> {
        if self.owned_by_current_thread() {
            return Err(Error::InvalidInput("transaction already active".into()));
        }
        let conn = self.lock_conn();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        *self.lock_owner() = Some(thread::current().id());
        tracing::trace!("transaction started");
        Ok(StoreTransaction::new(self, conn))
    }

    /// Highest applied schema migration.
    pub fn schema_version(&self) -> Result<u32> {
        self.with_conn(migrations::current_version)
    }

    /// Verifies the connection answers a trivial query.
    pub fn health_check(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn owned_by_current_thread(&self) -> bool {
        *self.lock_owner() == Some(thread::current().id())
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_owner(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.tx_owner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn release_transaction(&self) {
        *self.lock_owner() = None;
    }
}

impl sealed::Connected for StateStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if self.owned_by_current_thread() {
            return Err(Error::InvalidInput(
                "a transaction is active on this thread; use its handle".into(),
            ));
        }
        let conn = self.lock_conn();
        f(&conn)
    }
}

impl StateRepository for StateStore {}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}
