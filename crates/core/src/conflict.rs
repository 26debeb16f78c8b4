// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict detection.
//!
//! A conflict exists when a local edit is pending and both the local edit and
//! the remote modification strictly postdate the last reconciliation. Equal
//! timestamps are not "after". There is no tolerance window, so clocks with
//! different granularities can flip near-simultaneous edits either way.

use crate::sync::{SyncStatus, TicketState};

/// Returns true if the state is in conflict. Pure; never mutates.
pub fn is_conflict(state: &TicketState) -> bool {
    match &state.local_modified {
        None => false,
        Some(local) => {
            local.after(&state.last_synced) && state.jira_updated.after(&state.last_synced)
        }
    }
}

/// Derives the status the timestamps alone imply.
///
/// Queue-driven statuses (`pending`, `error`) cannot be derived and are
/// never returned.
pub fn classify(state: &TicketState) -> SyncStatus {
    if is_conflict(state) {
        SyncStatus::Conflict
    } else if state.local_modified.is_some() {
        SyncStatus::LocalModified
    } else if state.jira_updated.after(&state.last_synced) {
        SyncStatus::RemoteModified
    } else {
        SyncStatus::InSync
    }
}

/// Direction a reconciliation should take for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing to do.
    None,
    /// Fetch the remote copy.
    Pull,
    /// Send the local copy.
    Push,
    /// Needs an operator or explicit policy.
    Manual,
}

/// Decides what a reconciliation pass should do for a state.
///
/// A recorded conflict stays manual even if the timestamps alone no longer
/// imply one; only an explicit pull or push clears it.
pub fn resolution(state: &TicketState) -> Resolution {
    if state.status == SyncStatus::Conflict {
        return Resolution::Manual;
    }
    match classify(state) {
        SyncStatus::Conflict => Resolution::Manual,
        SyncStatus::LocalModified => Resolution::Push,
        SyncStatus::RemoteModified => Resolution::Pull,
        _ => Resolution::None,
    }
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
