// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::issue_json;
use chrono::TimeZone;
use yare::parameterized;

fn key(value: &str) -> TicketKey {
    TicketKey::new(value).unwrap()
}

#[parameterized(
    offset_millis = { "2025-06-01T12:30:00.000+0000", 12, 30 },
    shifted_offset = { "2025-06-01T14:30:00.000+0200", 12, 30 },
    negative_offset = { "2025-06-01T07:30:00.000-0500", 12, 30 },
    zulu_millis = { "2025-06-01T12:30:00.000Z", 12, 30 },
    rfc3339 = { "2025-06-01T12:30:00+00:00", 12, 30 },
    rfc3339_nanos = { "2025-06-01T12:30:00.123456789Z", 12, 30 },
    no_fraction = { "2025-06-01T12:30:00+0000", 12, 30 },
)]
fn parses_tracker_times(input: &str, hour: u32, minute: u32) {
    let parsed = parse_time(input).unwrap();
    let expected = Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap();
    assert_eq!(parsed.timestamp(), expected.timestamp());
}

#[parameterized(
    empty = { "" },
    date_only = { "2025-06-01" },
    garbage = { "yesterday" },
)]
fn rejects_bad_times(input: &str) {
    assert!(matches!(parse_time(input), Err(Error::InvalidTimestamp(_))));
}

#[test]
fn maps_issue_fields() {
    let ticket = map_issue_value(issue_json("JMD-7", "Fix sync", "2025-06-01T12:00:00.000+0000")).unwrap();

    assert_eq!(ticket.key().as_str(), "JMD-7");
    assert_eq!(ticket.summary, "Fix sync");
    assert_eq!(ticket.description, "Body text");
    assert_eq!(ticket.status, "In Progress");
    assert_eq!(ticket.issue_type, "Task");
    assert_eq!(ticket.priority, "High");
    assert_eq!(ticket.assignee, "Ada Lovelace");
    assert_eq!(ticket.reporter, "Grace Hopper");
    assert_eq!(ticket.labels, vec!["backend", "sync"]);
    assert_eq!(ticket.created(), Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap());
    assert_eq!(ticket.updated, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    assert!(ticket.custom_fields.is_empty());
}

#[test]
fn optional_fields_may_be_absent() {
    let value = json!({
        "key": "JMD-8",
        "fields": {
            "summary": "Bare",
            "description": null,
            "assignee": null,
            "created": "2025-05-01T08:00:00.000+0000",
            "updated": "2025-05-02T08:00:00.000+0000"
        }
    });
    let ticket = map_issue_value(value).unwrap();
    assert_eq!(ticket.description, "");
    assert_eq!(ticket.assignee, "");
    assert_eq!(ticket.status, "");
    assert!(ticket.labels.is_empty());
}

#[test]
fn assignee_falls_back_to_account_id() {
    let mut value = issue_json("JMD-9", "Anon", "2025-06-01T12:00:00.000+0000");
    value["fields"]["assignee"] = json!({ "accountId": "5b10ac8d" });
    assert_eq!(map_issue_value(value).unwrap().assignee, "5b10ac8d");
}

#[test]
fn custom_fields_are_collected() {
    let mut value = issue_json("JMD-10", "Custom", "2025-06-01T12:00:00.000+0000");
    value["fields"]["customfield_10010"] = json!({ "value": "Platform" });
    value["fields"]["customfield_10020"] = json!(5.0);
    value["fields"]["customfield_10030"] = json!(["a", "b"]);
    value["fields"]["customfield_10040"] = Value::Null;
    value["fields"]["watches"] = json!({ "watchCount": 1 });

    let ticket = map_issue_value(value).unwrap();
    assert_eq!(ticket.field("customfield_10010"), Some(&FieldValue::Text("Platform".into())));
    assert_eq!(ticket.field("customfield_10020"), Some(&FieldValue::Number(5.0)));
    assert_eq!(
        ticket.field("customfield_10030"),
        Some(&FieldValue::List(vec!["a".into(), "b".into()]))
    );
    assert_eq!(ticket.field("customfield_10040"), None);
    assert_eq!(ticket.custom_fields.len(), 3);
}

#[parameterized(
    bad_key = { "not a key", "2025-06-01T12:00:00.000+0000" },
    bad_updated = { "JMD-11", "soon" },
)]
fn unmappable_issues_fail(issue_key: &str, updated: &str) {
    assert!(map_issue_value(issue_json(issue_key, "x", updated)).is_err());
}

#[test]
fn missing_updated_is_rejected() {
    let mut value = issue_json("JMD-12", "x", "2025-06-01T12:00:00.000+0000");
    value["fields"].as_object_mut().unwrap().remove("updated");
    assert!(matches!(map_issue_value(value), Err(Error::InvalidTimestamp(_))));
}

#[test]
fn blank_summary_is_rejected() {
    let value = issue_json("JMD-13", "  ", "2025-06-01T12:00:00.000+0000");
    assert!(matches!(map_issue_value(value), Err(Error::InvalidInput(_))));
}

#[test]
fn maps_comment() {
    let value = json!({
        "id": "10100",
        "author": { "displayName": "Ada Lovelace" },
        "body": "Looks good",
        "created": "2025-06-01T12:00:00.000+0000",
        "updated": "2025-06-01T13:00:00.000+0000"
    });
    let comment = map_comment_value(value, &key("JMD-1")).unwrap();
    assert_eq!(comment.id, "10100");
    assert_eq!(comment.ticket_key, key("JMD-1"));
    assert_eq!(comment.author, "Ada Lovelace");
    assert_eq!(comment.body, "Looks good");
    assert!(comment.is_edited());
}

#[test]
fn comment_without_author_is_rejected() {
    let value = json!({
        "id": "10101",
        "body": "ghost",
        "created": "2025-06-01T12:00:00.000+0000",
        "updated": "2025-06-01T12:00:00.000+0000"
    });
    assert!(matches!(map_comment_value(value, &key("JMD-1")), Err(Error::InvalidInput(_))));
}

#[test]
fn maps_project() {
    let dto = ProjectDto { key: "jmd".into(), name: "Jira Markdown".into(), description: Some("Mirror".into()) };
    let project = map_project(dto).unwrap();
    assert_eq!(project.key, "JMD");
    assert_eq!(project.name, "Jira Markdown");
    assert_eq!(project.description, "Mirror");
}

#[test]
fn project_without_name_is_rejected() {
    let dto = ProjectDto { key: "JMD".into(), name: String::new(), description: None };
    assert!(matches!(map_project(dto), Err(Error::InvalidProject(_))));
}

#[test]
fn update_body_carries_editable_fields() {
    let mut ticket = map_issue_value(issue_json("JMD-1", "Fix sync", "2025-06-01T12:00:00.000+0000")).unwrap();
    ticket.set_field("customfield_10010", "Platform");
    ticket.set_field("team", "not sent");

    let body = update_body(&ticket);
    let fields = &body["fields"];
    assert_eq!(fields["summary"], "Fix sync");
    assert_eq!(fields["description"], "Body text");
    assert_eq!(fields["labels"], json!(["backend", "sync"]));
    assert_eq!(fields["priority"], json!({ "name": "High" }));
    assert_eq!(fields["assignee"], json!({ "name": "Ada Lovelace" }));
    assert_eq!(fields["customfield_10010"], "Platform");
    assert!(fields.get("team").is_none());
    assert!(fields.get("status").is_none());
}

#[test]
fn update_body_omits_empty_fields() {
    let ticket = Ticket::new(
        key("JMD-2"),
        "Only a summary",
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap(),
    );
    let body = update_body(&ticket);
    assert_eq!(body, json!({ "fields": { "summary": "Only a summary" } }));
}

#[test]
fn finds_transition_by_target_status() {
    let transitions: TransitionsDto = serde_json::from_value(json!({
        "transitions": [
            { "id": "11", "name": "Start", "to": { "name": "In Progress" } },
            { "id": "31", "name": "Done", "to": { "name": "Closed" } }
        ]
    }))
    .unwrap();

    assert_eq!(transitions.find("in progress").unwrap().id, "11");
    assert_eq!(transitions.find("Closed").unwrap().id, "31");
    assert_eq!(transitions.find("done").unwrap().id, "31");
    assert!(transitions.find("Blocked").is_none());
}

#[test]
fn request_bodies() {
    assert_eq!(comment_body("hi"), json!({ "body": "hi" }));
    assert_eq!(transition_body("31"), json!({ "transition": { "id": "31" } }));
}
