// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned schema migrations.
//!
//! Each migration runs once, inside its own transaction, and only when its
//! version is above the highest recorded in `schema_version`. Re-running on
//! an up-to-date database is a no-op.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;

/// A single schema migration.
pub(crate) struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

const INITIAL_SCHEMA: &str = r#"
-- Per-ticket sync state
CREATE TABLE IF NOT EXISTS ticket_sync_state (
    ticket_key TEXT PRIMARY KEY,
    last_synced TEXT,
    last_modified_local TEXT,
    last_modified_jira TEXT,
    is_dirty INTEGER NOT NULL DEFAULT 0,
    conflict_detected INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Per-project sync state
CREATE TABLE IF NOT EXISTS project_sync_state (
    project_key TEXT PRIMARY KEY,
    last_full_sync TEXT,
    last_incremental_sync TEXT,
    ticket_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Hot paths: work to push, conflicts to surface
CREATE INDEX IF NOT EXISTS idx_ticket_dirty
    ON ticket_sync_state(last_modified_local) WHERE is_dirty = 1;
CREATE INDEX IF NOT EXISTS idx_ticket_conflict
    ON ticket_sync_state(last_modified_local) WHERE conflict_detected = 1;
CREATE INDEX IF NOT EXISTS idx_ticket_local_modified
    ON ticket_sync_state(last_modified_local);
"#;

const PENDING_OPERATIONS: &str = r#"
ALTER TABLE ticket_sync_state ADD COLUMN project_key TEXT NOT NULL DEFAULT '';
ALTER TABLE ticket_sync_state ADD COLUMN content_hash TEXT NOT NULL DEFAULT '';
ALTER TABLE ticket_sync_state ADD COLUMN sync_status TEXT;

CREATE TABLE IF NOT EXISTS pending_operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_key TEXT NOT NULL,
    ticket_key TEXT NOT NULL,
    operation TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_pending_attempts ON pending_operations(attempts, created_at);
CREATE INDEX IF NOT EXISTS idx_pending_ticket ON pending_operations(ticket_key);
CREATE INDEX IF NOT EXISTS idx_ticket_project ON ticket_sync_state(project_key);
"#;

pub(crate) const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "initial_schema", sql: INITIAL_SCHEMA },
    Migration { version: 2, name: "pending_operations", sql: PENDING_OPERATIONS },
];

/// Highest applied migration version, 0 for a fresh database.
pub(crate) fn current_version(conn: &Connection) -> Result<u32> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)?;
    let version: u32 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version)
}

/// Applies every pending migration and returns the resulting version.
pub(crate) fn run_migrations(conn: &mut Connection) -> Result<u32> {
    let mut version = current_version(conn)?;

    for migration in MIGRATIONS {
        if migration.version <= version {
            tracing::debug!(version = migration.version, name = migration.name, "migration already applied");
            continue;
        }

        tracing::info!(version = migration.version, name = migration.name, "applying migration");
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![migration.version, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        version = migration.version;
    }

    Ok(version)
}

#[cfg(test)]
#[path = "migrations_tests.rs"]
mod tests;
