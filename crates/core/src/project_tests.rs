// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::ticket::TicketKey;
use chrono::{TimeZone, Utc};
use yare::parameterized;

fn ticket_with_labels(labels: &[&str]) -> Ticket {
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut ticket = Ticket::new(TicketKey::new("JMD-1").unwrap(), "t", at, at);
    ticket.labels = labels.iter().map(|l| l.to_string()).collect();
    ticket
}

fn dev_field() -> CustomField {
    CustomField::new("dev_assignment", "Dev Assignment", "labels", SyncDirection::Bidirectional)
        .unwrap()
        .with_condition("has-label('dev1', \"dev2\", dev3)")
        .with_default("unassigned")
}

#[parameterized(
    upper = { "JMD", "JMD" },
    lower = { "jmd", "JMD" },
    padded = { "  ab1 ", "AB1" },
)]
fn project_key_normalized(input: &str, expected: &str) {
    assert_eq!(Project::new(input, "Project").unwrap().key, expected);
}

#[parameterized(
    empty = { "" },
    blank = { "   " },
)]
fn project_key_empty(input: &str) {
    assert!(matches!(Project::new(input, "P"), Err(Error::EmptyKey(_))));
}

#[parameterized(
    one_char = { "J" },
    eleven_chars = { "ABCDEFGHIJK" },
    leading_digit = { "1AB" },
    dash = { "AB-C" },
)]
fn project_key_invalid(input: &str) {
    assert!(matches!(Project::new(input, "P"), Err(Error::InvalidProject(_))));
}

#[test]
fn project_requires_name() {
    assert!(matches!(Project::new("JMD", " "), Err(Error::InvalidProject(_))));
}

#[parameterized(
    bidirectional = { "bidirectional", SyncDirection::Bidirectional },
    jira_to_local = { "jira_to_local", SyncDirection::JiraToLocal },
    local_only = { "LOCAL_ONLY", SyncDirection::LocalOnly },
)]
fn sync_direction_from_str(input: &str, expected: SyncDirection) {
    assert_eq!(input.parse::<SyncDirection>().unwrap(), expected);
}

#[test]
fn sync_direction_from_str_invalid() {
    assert!("sideways".parse::<SyncDirection>().is_err());
}

#[parameterized(
    no_name = { "", "Display", "labels" },
    no_display = { "name", "  ", "labels" },
    no_source = { "name", "Display", "" },
)]
fn custom_field_requires_fields(name: &str, display: &str, source: &str) {
    let err = CustomField::new(name, display, source, SyncDirection::LocalOnly).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn validate_value_whitelist() {
    let open = CustomField::new("team", "Team", "customfield_1", SyncDirection::JiraToLocal).unwrap();
    assert!(open.validate_value("anything").is_ok());

    let closed = open.with_valid_values(["core", "edge"]);
    assert!(closed.validate_value("core").is_ok());
    assert!(matches!(closed.validate_value("other"), Err(Error::InvalidFieldValue(_))));
}

#[test]
fn derive_picks_first_listed_label_present() {
    let field = dev_field();
    let ticket = ticket_with_labels(&["dev3", "dev2"]);
    let derived = field.derive(&ticket).unwrap().unwrap();
    assert_eq!(derived, DerivedValue { value: "dev2".into(), used_default: false });
}

#[test]
fn derive_falls_back_to_default() {
    let derived = dev_field().derive(&ticket_with_labels(&["ui"])).unwrap().unwrap();
    assert_eq!(derived.value, "unassigned");
    assert!(derived.used_default);
}

#[test]
fn derive_without_condition_is_none() {
    let field = CustomField::new("team", "Team", "labels", SyncDirection::LocalOnly).unwrap();
    assert!(field.derive(&ticket_with_labels(&[])).unwrap().is_none());
}

#[parameterized(
    unknown_function = { "has-any('a')" },
    no_arguments = { "has-label()" },
)]
fn derive_rejects_bad_condition(condition: &str) {
    let field = CustomField::new("f", "F", "labels", SyncDirection::LocalOnly)
        .unwrap()
        .with_condition(condition);
    assert!(matches!(field.derive(&ticket_with_labels(&[])), Err(Error::InvalidInput(_))));
}

#[test]
fn project_custom_field_registry() {
    let mut project = Project::new("JMD", "Jira Markdown").unwrap();
    project.add_custom_field(dev_field()).unwrap();
    project
        .add_custom_field(
            CustomField::new("team", "Team", "customfield_1", SyncDirection::JiraToLocal).unwrap(),
        )
        .unwrap();

    let dup = project.add_custom_field(dev_field()).unwrap_err();
    assert!(matches!(dup, Error::InvalidInput(_)));

    assert!(project.custom_field("team").is_some());
    assert_eq!(project.bidirectional_fields().count(), 1);
    assert_eq!(project.derived_fields().map(|f| f.name.as_str()).collect::<Vec<_>>(), [
        "dev_assignment"
    ]);

    assert!(project.remove_custom_field("team"));
    assert!(!project.remove_custom_field("team"));
    assert!(project.custom_field("team").is_none());
}
