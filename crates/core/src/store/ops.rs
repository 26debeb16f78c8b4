// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQL behind every [`StateRepository`](super::StateRepository) operation.
//!
//! Each function takes a plain connection so the same code serves both
//! autocommit calls and calls inside a [`StoreTransaction`](super::StoreTransaction).

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::sync::{
    OperationType, PendingOperation, SyncState, SyncStatus, SyncTimestamp, TicketState,
    MAX_ATTEMPTS,
};
use crate::ticket::TicketKey;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format written by older builds; still accepted on read.
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const TICKET_COLUMNS: &str = "ticket_key, project_key, last_synced, last_modified_local,
    last_modified_jira, is_dirty, conflict_detected, content_hash, sync_status";

const PROJECT_COLUMNS: &str = "project_key, last_full_sync, last_incremental_sync, ticket_count";

const OPERATION_COLUMNS: &str =
    "id, project_key, ticket_key, operation, payload, created_at, attempts, last_error";

fn conversion_error(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(format!("invalid value '{value}' in column '{column}'"))),
    )
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| conversion_error(column, value))
}

pub(crate) fn format_timestamp(ts: &SyncTimestamp) -> Option<String> {
    ts.as_datetime().map(|at| at.format(TIMESTAMP_FORMAT).to_string())
}

/// Parse a stored timestamp. NULL, empty, and zero-epoch values read as never.
fn parse_timestamp(
    value: Option<String>,
    column: &str,
) -> std::result::Result<SyncTimestamp, rusqlite::Error> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(SyncTimestamp::never());
    };
    let parsed = DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&value, LEGACY_TIMESTAMP_FORMAT).map(|dt| dt.and_utc())
        })
        .map_err(|_| conversion_error(column, &value))?;

    if parsed.timestamp_millis() == 0 || parsed.year() <= 1 {
        return Ok(SyncTimestamp::never());
    }
    Ok(SyncTimestamp::new(parsed))
}

fn now_text() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

fn require_key<'a>(key: &'a str, what: &str) -> Result<&'a str> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::EmptyKey(format!("{what} key cannot be empty")));
    }
    Ok(key)
}

fn ticket_from_row(row: &Row<'_>) -> std::result::Result<TicketState, rusqlite::Error> {
    let key_str: String = row.get(0)?;
    let ticket_key: TicketKey = parse_db(&key_str, "ticket_key")?;
    let project_key: String = row.get(1)?;
    let is_dirty: bool = row.get(5)?;
    let conflict_detected: bool = row.get(6)?;
    let status_str: Option<String> = row.get(8)?;

    let status = match status_str {
        Some(s) => parse_db(&s, "sync_status")?,
        None if conflict_detected => SyncStatus::Conflict,
        None if is_dirty => SyncStatus::LocalModified,
        None => SyncStatus::InSync,
    };
    let local = parse_timestamp(row.get(3)?, "last_modified_local")?;

    Ok(TicketState {
        project_key: if project_key.is_empty() {
            ticket_key.project_key().to_string()
        } else {
            project_key
        },
        jira_updated: parse_timestamp(row.get(4)?, "last_modified_jira")?,
        local_modified: (!local.is_never()).then_some(local),
        last_synced: parse_timestamp(row.get(2)?, "last_synced")?,
        content_hash: row.get(7)?,
        status,
        ticket_key,
    })
}

fn project_from_row(row: &Row<'_>) -> std::result::Result<SyncState, rusqlite::Error> {
    Ok(SyncState {
        project_key: row.get(0)?,
        last_full_sync: parse_timestamp(row.get(1)?, "last_full_sync")?,
        last_incremental_sync: parse_timestamp(row.get(2)?, "last_incremental_sync")?,
        ticket_count: row.get(3)?,
    })
}

fn operation_from_row(row: &Row<'_>) -> std::result::Result<PendingOperation, rusqlite::Error> {
    let key_str: String = row.get(2)?;
    let op_str: String = row.get(3)?;
    Ok(PendingOperation {
        id: row.get(0)?,
        project_key: row.get(1)?,
        ticket_key: parse_db(&key_str, "ticket_key")?,
        operation: parse_db::<OperationType>(&op_str, "operation")?,
        payload: row.get(4)?,
        created_at: parse_timestamp(row.get(5)?, "created_at")?,
        attempts: row.get(6)?,
        last_error: row.get(7)?,
    })
}

fn query_tickets(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<TicketState>> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM ticket_sync_state {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let states = stmt
        .query_map(params, ticket_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(states)
}

fn query_operations(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<PendingOperation>> {
    let sql = format!("SELECT {OPERATION_COLUMNS} FROM pending_operations {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let ops = stmt
        .query_map(params, operation_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ops)
}

pub(crate) fn save_ticket_state(conn: &Connection, state: &TicketState) -> Result<()> {
    require_key(&state.project_key, "project")?;
    let now = now_text();
    conn.execute(
        "INSERT INTO ticket_sync_state (ticket_key, project_key, last_synced,
            last_modified_local, last_modified_jira, is_dirty, conflict_detected,
            content_hash, sync_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT(ticket_key) DO UPDATE SET
            project_key = excluded.project_key,
            last_synced = excluded.last_synced,
            last_modified_local = excluded.last_modified_local,
            last_modified_jira = excluded.last_modified_jira,
            is_dirty = excluded.is_dirty,
            conflict_detected = excluded.conflict_detected,
            content_hash = excluded.content_hash,
            sync_status = excluded.sync_status,
            updated_at = excluded.updated_at",
        params![
            state.ticket_key.as_str(),
            state.project_key,
            format_timestamp(&state.last_synced),
            state.local_modified.as_ref().and_then(format_timestamp),
            format_timestamp(&state.jira_updated),
            state.is_dirty(),
            state.is_conflicted(),
            state.content_hash,
            state.status.as_str(),
            now,
        ],
    )?;
    tracing::debug!(ticket_key = %state.ticket_key, status = %state.status, "saved ticket state");
    Ok(())
}

pub(crate) fn get_ticket_state(conn: &Connection, key: &str) -> Result<TicketState> {
    let key = require_key(key, "ticket")?;
    let sql = format!("SELECT {TICKET_COLUMNS} FROM ticket_sync_state WHERE ticket_key = ?1");
    conn.query_row(&sql, params![key], ticket_from_row)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("ticket state for {key}")))
}

pub(crate) fn get_dirty_tickets(conn: &Connection) -> Result<Vec<TicketState>> {
    query_tickets(conn, "WHERE is_dirty = 1 ORDER BY last_modified_local DESC", [])
}

pub(crate) fn get_conflicted_tickets(conn: &Connection) -> Result<Vec<TicketState>> {
    query_tickets(conn, "WHERE conflict_detected = 1 ORDER BY last_modified_local DESC", [])
}

pub(crate) fn get_tickets_modified_since(
    conn: &Connection,
    since: &SyncTimestamp,
) -> Result<Vec<TicketState>> {
    // Never sorts below every stored value.
    let since = format_timestamp(since).unwrap_or_default();
    query_tickets(
        conn,
        "WHERE last_modified_local > ?1 ORDER BY last_modified_local DESC",
        params![since],
    )
}

pub(crate) fn get_project_tickets(conn: &Connection, project_key: &str) -> Result<Vec<TicketState>> {
    let project_key = require_key(project_key, "project")?;
    query_tickets(
        conn,
        "WHERE project_key = ?1
            OR (project_key = '' AND substr(ticket_key, 1, length(?1) + 1) = ?1 || '-')
         ORDER BY ticket_key",
        params![project_key],
    )
}

pub(crate) fn delete_ticket_state(conn: &Connection, key: &str) -> Result<()> {
    let key = require_key(key, "ticket")?;
    let affected = conn.execute("DELETE FROM ticket_sync_state WHERE ticket_key = ?1", params![key])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("ticket state for {key}")));
    }
    tracing::debug!(ticket_key = key, "deleted ticket state");
    Ok(())
}

pub(crate) fn save_project_state(conn: &Connection, state: &SyncState) -> Result<()> {
    let key = require_key(&state.project_key, "project")?;
    let now = now_text();
    conn.execute(
        "INSERT INTO project_sync_state (project_key, last_full_sync, last_incremental_sync,
            ticket_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(project_key) DO UPDATE SET
            last_full_sync = excluded.last_full_sync,
            last_incremental_sync = excluded.last_incremental_sync,
            ticket_count = excluded.ticket_count,
            updated_at = excluded.updated_at",
        params![
            key,
            format_timestamp(&state.last_full_sync),
            format_timestamp(&state.last_incremental_sync),
            state.ticket_count,
            now,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_project_state(conn: &Connection, key: &str) -> Result<SyncState> {
    let key = require_key(key, "project")?;
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM project_sync_state WHERE project_key = ?1");
    conn.query_row(&sql, params![key], project_from_row)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("project state for {key}")))
}

pub(crate) fn get_all_project_states(conn: &Connection) -> Result<Vec<SyncState>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM project_sync_state ORDER BY project_key");
    let mut stmt = conn.prepare(&sql)?;
    let states = stmt
        .query_map([], project_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(states)
}

/// Deletes a project and every ticket state and queued operation under it.
///
/// Runs inside a savepoint so it is atomic both on its own and nested in a
/// caller's transaction.
pub(crate) fn delete_project_state(conn: &Connection, key: &str) -> Result<()> {
    let key = require_key(key, "project")?;
    conn.execute_batch("SAVEPOINT delete_project")?;
    match delete_project_rows(conn, key) {
        Ok(tickets) => {
            conn.execute_batch("RELEASE delete_project")?;
            tracing::info!(project_key = key, tickets, "deleted project state");
            Ok(())
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK TO delete_project; RELEASE delete_project")?;
            Err(e)
        }
    }
}

fn delete_project_rows(conn: &Connection, key: &str) -> Result<usize> {
    let tickets = conn.execute(
        "DELETE FROM ticket_sync_state WHERE substr(ticket_key, 1, length(?1) + 1) = ?1 || '-'",
        params![key],
    )?;
    conn.execute("DELETE FROM pending_operations WHERE project_key = ?1", params![key])?;
    let affected =
        conn.execute("DELETE FROM project_sync_state WHERE project_key = ?1", params![key])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("project state for {key}")));
    }
    Ok(tickets)
}

pub(crate) fn enqueue_operation(conn: &Connection, op: &PendingOperation) -> Result<i64> {
    require_key(&op.project_key, "project")?;
    let created_at = format_timestamp(&op.created_at).unwrap_or_else(now_text);
    conn.execute(
        "INSERT INTO pending_operations (project_key, ticket_key, operation, payload,
            created_at, attempts, last_error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            op.project_key,
            op.ticket_key.as_str(),
            op.operation.as_str(),
            op.payload,
            created_at,
            op.attempts,
            op.last_error,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(id, ticket_key = %op.ticket_key, operation = %op.operation, "enqueued operation");
    Ok(id)
}

pub(crate) fn get_operation(conn: &Connection, id: i64) -> Result<PendingOperation> {
    let sql = format!("SELECT {OPERATION_COLUMNS} FROM pending_operations WHERE id = ?1");
    conn.query_row(&sql, params![id], operation_from_row)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("pending operation {id}")))
}

pub(crate) fn get_retryable_operations(conn: &Connection) -> Result<Vec<PendingOperation>> {
    query_operations(conn, "WHERE attempts < ?1 ORDER BY created_at ASC, id ASC", params![
        MAX_ATTEMPTS
    ])
}

pub(crate) fn get_exhausted_operations(conn: &Connection) -> Result<Vec<PendingOperation>> {
    query_operations(conn, "WHERE attempts >= ?1 ORDER BY created_at ASC, id ASC", params![
        MAX_ATTEMPTS
    ])
}

pub(crate) fn update_operation(conn: &Connection, op: &PendingOperation) -> Result<()> {
    let affected = conn.execute(
        "UPDATE pending_operations SET payload = ?2, attempts = ?3, last_error = ?4 WHERE id = ?1",
        params![op.id, op.payload, op.attempts, op.last_error],
    )?;
    if affected == 0 {
        return Err(Error::NotFound(format!("pending operation {}", op.id)));
    }
    Ok(())
}

pub(crate) fn delete_operation(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM pending_operations WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(Error::NotFound(format!("pending operation {id}")));
    }
    Ok(())
}

pub(crate) fn reset_operation(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute(
        "UPDATE pending_operations SET attempts = 0, last_error = '' WHERE id = ?1",
        params![id],
    )?;
    if affected == 0 {
        return Err(Error::NotFound(format!("pending operation {id}")));
    }
    tracing::info!(id, "reset pending operation");
    Ok(())
}
