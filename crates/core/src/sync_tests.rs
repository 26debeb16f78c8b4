// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::clock::ManualClock;
use chrono::{Duration, FixedOffset};
use yare::parameterized;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

fn key(s: &str) -> TicketKey {
    TicketKey::new(s).unwrap()
}

#[test]
fn sync_timestamp_normalizes_to_utc_and_truncates() {
    let offset = FixedOffset::west_opt(5 * 3600).unwrap();
    let local = offset.with_ymd_and_hms(2025, 6, 1, 4, 0, 0).unwrap()
        + Duration::nanoseconds(1_234_567);
    let ts = SyncTimestamp::new(local);
    assert_eq!(ts.as_datetime().unwrap(), t0() + Duration::milliseconds(1));
    assert_eq!(ts.to_string(), "2025-06-01T09:00:00.001Z");
}

#[test]
fn sync_timestamp_ordering() {
    let a = SyncTimestamp::new(t0());
    let b = SyncTimestamp::new(t0() + Duration::milliseconds(1));
    assert!(a.before(&b));
    assert!(b.after(&a));
    assert!(!a.after(&a));
    assert!(!a.before(&a));
    assert!(a.after(&SyncTimestamp::never()));
    assert!(!SyncTimestamp::never().after(&SyncTimestamp::never()));
    assert!(SyncTimestamp::never().is_never());
    assert_eq!(SyncTimestamp::never().to_string(), "never");
}

#[test]
fn sync_timestamp_from_millis() {
    let ts = SyncTimestamp::from_millis(t0().timestamp_millis()).unwrap();
    assert_eq!(ts, SyncTimestamp::new(t0()));
    assert!(SyncTimestamp::from_millis(i64::MAX).is_err());
}

#[parameterized(
    in_sync = { "in_sync", SyncStatus::InSync },
    local_modified = { "local_modified", SyncStatus::LocalModified },
    remote_modified = { "remote_modified", SyncStatus::RemoteModified },
    conflict = { "conflict", SyncStatus::Conflict },
    pending = { "pending", SyncStatus::Pending },
    error = { "error", SyncStatus::Error },
)]
fn sync_status_round_trip(input: &str, expected: SyncStatus) {
    assert_eq!(input.parse::<SyncStatus>().unwrap(), expected);
    assert_eq!(expected.as_str(), input);
}

#[test]
fn new_ticket_state_is_in_sync_at_now() {
    let clock = ManualClock::new(t0());
    let state = TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();
    assert_eq!(state.status, SyncStatus::InSync);
    assert_eq!(state.last_synced, SyncTimestamp::new(t0()));
    assert!(state.local_modified.is_none());
    assert!(!state.is_dirty());
}

#[test]
fn new_ticket_state_requires_project() {
    let err = TicketState::new("  ", key("JMD-1"), SyncTimestamp::never()).unwrap_err();
    assert!(matches!(err, Error::EmptyKey(_)));
}

#[test]
fn mark_local_modified_keeps_latest_only() {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();

    state.mark_local_modified(SyncTimestamp::new(t0() + Duration::minutes(5)));
    state.mark_local_modified(SyncTimestamp::new(t0() + Duration::minutes(10)));

    assert_eq!(state.status, SyncStatus::LocalModified);
    assert_eq!(state.local_modified, Some(SyncTimestamp::new(t0() + Duration::minutes(10))));
    assert!(state.is_dirty());
}

#[test]
fn mark_local_modified_after_remote_change_is_conflict() {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();
    state.jira_updated = SyncTimestamp::new(t0() + Duration::minutes(1));

    state.mark_local_modified(SyncTimestamp::new(t0() + Duration::minutes(2)));
    assert_eq!(state.status, SyncStatus::Conflict);
}

#[test]
fn mark_remote_modified_without_local_edit() {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();
    state.mark_remote_modified(SyncTimestamp::new(t0() + Duration::minutes(1)));
    assert_eq!(state.status, SyncStatus::RemoteModified);
}

#[test]
fn detect_conflict_false_leaves_status() {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();
    state.jira_updated = SyncTimestamp::new(t0() + Duration::hours(5));
    assert!(!state.detect_conflict());
    assert_eq!(state.status, SyncStatus::InSync);
}

#[parameterized(
    from_in_sync = { SyncStatus::InSync },
    from_local = { SyncStatus::LocalModified },
    from_remote = { SyncStatus::RemoteModified },
    from_conflict = { SyncStatus::Conflict },
    from_pending = { SyncStatus::Pending },
    from_error = { SyncStatus::Error },
)]
fn update_synced_always_resets(prior: SyncStatus) {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();
    state.local_modified = Some(SyncTimestamp::new(t0() + Duration::minutes(1)));
    state.status = prior;

    clock.advance(Duration::hours(1));
    let remote = SyncTimestamp::new(t0() + Duration::minutes(30));
    state.update_synced_at("abc", remote, &clock);

    assert_eq!(state.status, SyncStatus::InSync);
    assert!(state.local_modified.is_none());
    assert_eq!(state.content_hash, "abc");
    assert_eq!(state.jira_updated, remote);
    assert_eq!(state.last_synced, SyncTimestamp::new(t0() + Duration::hours(1)));
}

#[test]
fn pending_and_error_do_not_mask_conflict() {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-1"), SyncTimestamp::new(t0()), &clock).unwrap();
    state.mark_pending();
    assert_eq!(state.status, SyncStatus::Pending);

    state.mark_conflict();
    state.mark_pending();
    state.mark_error();
    assert_eq!(state.status, SyncStatus::Conflict);
}

#[test]
fn end_to_end_local_then_remote_edit() {
    let clock = ManualClock::new(t0());
    let mut state =
        TicketState::new_at("JMD", key("JMD-100"), SyncTimestamp::new(t0()), &clock).unwrap();

    state.mark_local_modified(SyncTimestamp::new(t0() + Duration::hours(1)));
    assert_eq!(state.status, SyncStatus::LocalModified);
    assert!(!state.detect_conflict());

    state.jira_updated = SyncTimestamp::new(t0() + Duration::hours(2));
    assert!(state.detect_conflict());
    assert_eq!(state.status, SyncStatus::Conflict);

    clock.set(t0() + Duration::hours(3));
    state.update_synced_at("newhash", SyncTimestamp::new(t0() + Duration::hours(2)), &clock);
    assert_eq!(state.status, SyncStatus::InSync);
    assert!(state.local_modified.is_none());
    assert!(!state.detect_conflict());
}

#[test]
fn sync_state_updates() {
    let clock = ManualClock::new(t0());
    let mut state = SyncState::new(" JMD ").unwrap();
    assert_eq!(state.project_key, "JMD");
    assert!(state.last_sync().is_never());

    state.update_full_sync(&clock);
    clock.advance(Duration::minutes(5));
    state.update_incremental_sync(&clock);

    assert_eq!(state.last_full_sync, SyncTimestamp::new(t0()));
    assert_eq!(state.last_sync(), SyncTimestamp::new(t0() + Duration::minutes(5)));
    assert!(matches!(SyncState::new(""), Err(Error::EmptyKey(_))));
}

#[test]
fn sync_result_helpers() {
    let mut result = SyncResult::new(key("JMD-1"));
    assert!(result.success);

    result.add_operation("pull_ticket");
    result.mark_conflict();
    result.mark_failed(&Error::Conflict("JMD-1".into()));

    assert!(!result.success);
    assert!(result.conflict_detected);
    assert_eq!(result.operations, ["pull_ticket", "conflict_detected"]);
    assert_eq!(result.error.as_deref(), Some("conflict: JMD-1"));
}

#[parameterized(
    push_status = { "push_status", OperationType::PushStatus },
    push_field = { "push_field", OperationType::PushField },
    post_comment = { "post_comment", OperationType::PostComment },
    pull_ticket = { "pull_ticket", OperationType::PullTicket },
    pull_comments = { "pull_comments", OperationType::PullComments },
)]
fn operation_type_round_trip(input: &str, expected: OperationType) {
    assert_eq!(input.parse::<OperationType>().unwrap(), expected);
    assert_eq!(expected.to_string(), input);
}

#[test]
fn operation_type_invalid() {
    let err = "delete_everything".parse::<OperationType>().unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
}

#[parameterized(
    zero = { 0, true },
    one = { 1, true },
    two = { 2, true },
    three = { 3, false },
    four = { 4, false },
)]
fn should_retry_by_attempts(attempts: u32, expected: bool) {
    let clock = ManualClock::new(t0());
    let mut op =
        PendingOperation::new("JMD", key("JMD-1"), OperationType::PushStatus, "{}", &clock).unwrap();
    op.attempts = attempts;
    assert_eq!(op.should_retry(), expected);
    assert_eq!(op.is_exhausted(), !expected);
}

#[test]
fn record_attempt_walks_to_exhaustion() {
    let clock = ManualClock::new(t0());
    let mut op =
        PendingOperation::new("JMD", key("JMD-1"), OperationType::PostComment, "{}", &clock).unwrap();
    assert_eq!(op.attempts, 0);
    assert!(op.last_error.is_empty());
    assert_eq!(op.created_at, SyncTimestamp::new(t0()));

    op.record_attempt(Some(&Error::Remote { status: Some(503), message: "down".into() }));
    assert_eq!(op.attempts, 1);
    assert!(op.last_error.contains("down"));

    op.record_attempt(None);
    assert_eq!(op.attempts, 2);
    assert!(op.last_error.contains("down"));
    assert!(op.should_retry());

    op.record_attempt(None);
    assert!(!op.should_retry());
}

#[test]
fn pending_operation_requires_project() {
    let clock = ManualClock::new(t0());
    let err = PendingOperation::new("", key("JMD-1"), OperationType::PullTicket, "", &clock)
        .unwrap_err();
    assert!(matches!(err, Error::EmptyKey(_)));
}
