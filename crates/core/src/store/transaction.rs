// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit transaction handle.

use rusqlite::Connection;
use std::sync::MutexGuard;

use super::{sealed, StateRepository, StateStore};
use crate::error::{Error, Result};

/// An open unit of work on a [`StateStore`].
///
/// Dropping the handle without committing rolls back.
pub struct StoreTransaction<'a> {
    store: &'a StateStore,
    conn: Option<MutexGuard<'a, Connection>>,
}

impl<'a> StoreTransaction<'a> {
    pub(super) fn new(store: &'a StateStore, conn: MutexGuard<'a, Connection>) -> Self {
        StoreTransaction { store, conn: Some(conn) }
    }

    /// Applies every operation issued through this handle.
    pub fn commit(mut self) -> Result<()> {
        self.finish("COMMIT")
    }

    /// Discards every operation issued through this handle.
    pub fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK")
    }

    fn active_conn(&self) -> Result<&Connection> {
        match self.conn.as_deref() {
            Some(conn) if !conn.is_autocommit() => Ok(conn),
            _ => Err(Error::InvalidInput("no active transaction".into())),
        }
    }

    fn finish(&mut self, sql: &str) -> Result<()> {
        self.active_conn()?.execute_batch(sql)?;
        tracing::trace!(action = sql, "transaction finished");
        self.release();
        Ok(())
    }

    /// Clears ownership while the lock is still held, then unlocks.
    fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.store.release_transaction();
            drop(conn);
        }
    }
}

impl sealed::Connected for StoreTransaction<'_> {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(self.active_conn()?)
    }
}

impl StateRepository for StoreTransaction<'_> {}

impl Drop for StoreTransaction<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.as_deref() {
            if !conn.is_autocommit() {
                match conn.execute_batch("ROLLBACK") {
                    Ok(()) => tracing::debug!("uncommitted transaction rolled back"),
                    Err(e) => tracing::warn!(error = %e, "rollback on drop failed"),
                }
            }
        }
        self.release();
    }
}

impl std::fmt::Debug for StoreTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreTransaction").field("active", &self.conn.is_some()).finish()
    }
}
