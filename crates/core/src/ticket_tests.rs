// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
}

fn sample_ticket() -> Ticket {
    let mut ticket = Ticket::new(TicketKey::new("JMD-1").unwrap(), "Fix login", ts(1), ts(2));
    ticket.description = "Users cannot log in".into();
    ticket.status = "In Progress".into();
    ticket.priority = "High".into();
    ticket.assignee = "alex".into();
    ticket.labels = vec!["backend".into(), "auth".into()];
    ticket.set_field("story_points", 3.0);
    ticket.set_field("team", "core");
    ticket
}

#[parameterized(
    simple = { "JMD-123", "JMD", 123 },
    digits_in_project = { "AB2-7", "AB2", 7 },
    two_chars = { "AB-1", "AB", 1 },
    ten_chars = { "ABCDEFGHIJ-42", "ABCDEFGHIJ", 42 },
    padded = { "  JMD-9  ", "JMD", 9 },
)]
fn ticket_key_valid(input: &str, project: &str, number: u64) {
    let key = TicketKey::new(input).unwrap();
    assert_eq!(key.project_key(), project);
    assert_eq!(key.number(), number);
    assert_eq!(key.as_str(), input.trim());
}

#[parameterized(
    empty = { "" },
    whitespace = { "   " },
    lowercase = { "jmd-123" },
    missing_dash = { "JMD123" },
    missing_number = { "JMD-" },
    missing_project = { "-123" },
    underscore = { "JMD_123" },
    double_dash = { "JMD-123-456" },
    single_char_project = { "J-1" },
    eleven_chars = { "ABCDEFGHIJK-1" },
    leading_digit = { "1MD-1" },
)]
fn ticket_key_invalid(input: &str) {
    let err = TicketKey::new(input).unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier(_)));
}

#[test]
fn ticket_key_serde_round_trip_rejects_invalid() {
    let key: TicketKey = serde_json::from_str("\"JMD-5\"").unwrap();
    assert_eq!(serde_json::to_string(&key).unwrap(), "\"JMD-5\"");
    assert!(serde_json::from_str::<TicketKey>("\"nope\"").is_err());
}

#[test]
fn ticket_key_ordering_is_by_value() {
    let a = TicketKey::new("JMD-1").unwrap();
    let b = TicketKey::new("JMD-1").unwrap();
    assert_eq!(a, b);
    assert!(TicketKey::new("ABC-1").unwrap() < a);
}

#[test]
fn content_hash_is_32_hex_chars() {
    let hash = sample_ticket().content_hash();
    assert_eq!(hash.len(), 32);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn content_hash_ignores_custom_field_insertion_order() {
    let mut a = Ticket::new(TicketKey::new("JMD-1").unwrap(), "Same", ts(1), ts(2));
    a.set_field("zeta", "z");
    a.set_field("alpha", 1.0);
    a.set_field("mid", vec!["x".to_string(), "y".to_string()]);

    let mut b = Ticket::new(TicketKey::new("JMD-1").unwrap(), "Same", ts(1), ts(2));
    b.set_field("mid", vec!["x".to_string(), "y".to_string()]);
    b.set_field("alpha", 1.0);
    b.set_field("zeta", "z");

    assert_eq!(a.content_hash(), b.content_hash());
}

#[test]
fn content_hash_ignores_remote_timestamps() {
    let a = sample_ticket();
    let mut b = sample_ticket();
    b.updated = ts(9);
    assert_eq!(a.content_hash(), b.content_hash());
}

#[parameterized(
    summary = { |t: &mut Ticket| t.summary = "Other".into() },
    description = { |t: &mut Ticket| t.description.push('!') },
    status = { |t: &mut Ticket| t.status = "Done".into() },
    priority = { |t: &mut Ticket| t.priority = "Low".into() },
    assignee = { |t: &mut Ticket| t.assignee = "sam".into() },
    label_added = { |t: &mut Ticket| t.labels.push("ui".into()) },
    label_order = { |t: &mut Ticket| t.labels.reverse() },
    field_changed = { |t: &mut Ticket| t.set_field("team", "edge") },
    field_added = { |t: &mut Ticket| t.set_field("risk", true) },
    field_removed = { |t: &mut Ticket| { t.custom_fields.remove("team"); } },
    field_type = { |t: &mut Ticket| t.set_field("story_points", "3") },
)]
fn content_hash_changes_with_any_field(mutate: fn(&mut Ticket)) {
    let original = sample_ticket();
    let mut changed = sample_ticket();
    mutate(&mut changed);
    assert_ne!(original.content_hash(), changed.content_hash());
}

#[test]
fn content_hash_separates_adjacent_fields() {
    let mut a = sample_ticket();
    a.summary = "ab".into();
    a.description = "c".into();
    let mut b = sample_ticket();
    b.summary = "a".into();
    b.description = "bc".into();
    assert_ne!(a.content_hash(), b.content_hash());
}

#[test]
fn validate_accepts_complete_ticket() {
    assert!(sample_ticket().validate().is_ok());
}

#[test]
fn validate_rejects_blank_summary() {
    let ticket = Ticket::new(TicketKey::new("JMD-1").unwrap(), "  ", ts(1), ts(2));
    assert!(matches!(ticket.validate(), Err(Error::InvalidInput(_))));
}

#[test]
fn validate_rejects_unset_timestamps() {
    let key = TicketKey::new("JMD-1").unwrap();
    let ticket = Ticket::new(key.clone(), "x", DateTime::<Utc>::UNIX_EPOCH, ts(2));
    assert!(matches!(ticket.validate(), Err(Error::InvalidTimestamp(_))));

    let ticket = Ticket::new(key, "x", ts(1), DateTime::<Utc>::UNIX_EPOCH);
    assert!(matches!(ticket.validate(), Err(Error::InvalidTimestamp(_))));
}

#[test]
fn field_value_from_json() {
    let value = serde_json::json!({
        "option": { "value": "Gold", "id": "1" },
        "user": { "displayName": "Alex" },
        "multi": [{ "value": "a" }, "b"],
        "n": 5,
        "flag": true,
        "none": null,
    });
    assert_eq!(FieldValue::from_json(&value["option"]), FieldValue::Text("Gold".into()));
    assert_eq!(FieldValue::from_json(&value["user"]), FieldValue::Text("Alex".into()));
    assert_eq!(
        FieldValue::from_json(&value["multi"]),
        FieldValue::List(vec!["a".into(), "b".into()])
    );
    assert_eq!(FieldValue::from_json(&value["n"]), FieldValue::Number(5.0));
    assert_eq!(FieldValue::from_json(&value["flag"]), FieldValue::Bool(true));
    assert!(FieldValue::from_json(&value["none"]).is_null());
}

#[test]
fn ticket_json_round_trip() {
    let ticket = sample_ticket();
    let json = serde_json::to_string(&ticket).unwrap();
    let back: Ticket = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ticket);
    assert_eq!(back.content_hash(), ticket.content_hash());
}
