// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Serde shapes of the tracker's REST JSON and their mapping to domain
//! entities.
//!
//! Only the fields the engine uses are declared; everything else in a
//! payload is ignored. Custom fields (`customfield_*`) are kept as
//! [`FieldValue`]s keyed by their tracker id.

use chrono::{DateTime, Utc};
use jmd_core::{Comment, Error, FieldValue, Project, Result, Ticket, TicketKey};
use serde::Deserialize;
use serde_json::{json, Map, Value};

const CUSTOM_FIELD_PREFIX: &str = "customfield_";

/// Timestamp layouts the tracker is known to emit, tried in order.
const TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.3f%z", "%Y-%m-%dT%H:%M:%S%z"];

#[derive(Debug, Deserialize)]
pub struct IssueDto {
    pub key: String,
    pub fields: IssueFieldsDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFieldsDto {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<NamedDto>,
    #[serde(default, rename = "issuetype")]
    pub issue_type: Option<NamedDto>,
    #[serde(default)]
    pub priority: Option<NamedDto>,
    #[serde(default)]
    pub assignee: Option<UserDto>,
    #[serde(default)]
    pub reporter: Option<UserDto>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct NamedDto {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub account_id: String,
}

impl UserDto {
    fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.account_id
        } else {
            &self.display_name
        }
    }
}

/// One page of `/search` results. Issues stay raw so a malformed one can be
/// skipped without losing the page.
#[derive(Debug, Deserialize)]
pub struct SearchPageDto {
    #[serde(default)]
    pub issues: Vec<Value>,
}

/// One page of `/issue/{key}/comment`.
#[derive(Debug, Deserialize)]
pub struct CommentPageDto {
    #[serde(default)]
    pub comments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CommentDto {
    pub id: String,
    #[serde(default)]
    pub author: Option<UserDto>,
    #[serde(default)]
    pub body: String,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectDto {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionsDto {
    #[serde(default)]
    pub transitions: Vec<TransitionDto>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionDto {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub to: Option<NamedDto>,
}

impl TransitionsDto {
    /// The transition leading to `status`, matched case-insensitively on the
    /// target status name, then on the transition name.
    pub fn find(&self, status: &str) -> Option<&TransitionDto> {
        let target = |t: &&TransitionDto| {
            t.to.as_ref().is_some_and(|to| to.name.eq_ignore_ascii_case(status))
        };
        self.transitions
            .iter()
            .find(target)
            .or_else(|| self.transitions.iter().find(|t| t.name.eq_ignore_ascii_case(status)))
    }
}

/// Parses a tracker timestamp into UTC.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidTimestamp("empty timestamp".into()));
    }
    TIME_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidTimestamp(format!("failed to parse time '{value}'")))
}

fn required_time(value: Option<&str>, what: &str, key: &str) -> Result<DateTime<Utc>> {
    match value {
        Some(v) => parse_time(v),
        None => Err(Error::InvalidTimestamp(format!("{key} has no {what} time"))),
    }
}

pub fn map_issue(issue: IssueDto) -> Result<Ticket> {
    let key = TicketKey::new(&issue.key)?;
    let fields = issue.fields;
    let created = required_time(fields.created.as_deref(), "created", &issue.key)?;
    let updated = required_time(fields.updated.as_deref(), "updated", &issue.key)?;

    let mut ticket = Ticket::new(key, fields.summary, created, updated);
    ticket.description = fields.description.unwrap_or_default();
    ticket.status = fields.status.map(|s| s.name).unwrap_or_default();
    ticket.issue_type = fields.issue_type.map(|t| t.name).unwrap_or_default();
    ticket.priority = fields.priority.map(|p| p.name).unwrap_or_default();
    ticket.assignee = fields.assignee.as_ref().map(|u| u.label().to_string()).unwrap_or_default();
    ticket.reporter = fields.reporter.as_ref().map(|u| u.label().to_string()).unwrap_or_default();
    ticket.labels = fields.labels;
    for (name, value) in fields.other {
        if name.starts_with(CUSTOM_FIELD_PREFIX) && !value.is_null() {
            ticket.set_field(name, FieldValue::from_json(&value));
        }
    }
    ticket.validate()?;
    Ok(ticket)
}

/// Decodes and maps a raw issue.
pub fn map_issue_value(value: Value) -> Result<Ticket> {
    map_issue(serde_json::from_value(value)?)
}

pub fn map_comment(comment: CommentDto, ticket_key: &TicketKey) -> Result<Comment> {
    let created = parse_time(&comment.created)?;
    let updated = parse_time(&comment.updated)?;
    let author = comment.author.as_ref().map(UserDto::label).unwrap_or_default();
    Comment::new(&comment.id, ticket_key.clone(), author, comment.body, created, updated)
}

pub fn map_comment_value(value: Value, ticket_key: &TicketKey) -> Result<Comment> {
    map_comment(serde_json::from_value(value)?, ticket_key)
}

pub fn map_project(project: ProjectDto) -> Result<Project> {
    let mut mapped = Project::new(&project.key, &project.name)?;
    mapped.description = project.description.unwrap_or_default();
    Ok(mapped)
}

/// Editable fields for `PUT /issue/{key}`. Empty values are left out so
/// they never blank the tracker's copy; status moves through transitions.
pub fn update_body(ticket: &Ticket) -> Value {
    let mut fields = Map::new();
    fields.insert("summary".into(), json!(ticket.summary));
    if !ticket.description.is_empty() {
        fields.insert("description".into(), json!(ticket.description));
    }
    if !ticket.labels.is_empty() {
        fields.insert("labels".into(), json!(ticket.labels));
    }
    if !ticket.priority.is_empty() {
        fields.insert("priority".into(), json!({ "name": ticket.priority }));
    }
    if !ticket.assignee.is_empty() {
        fields.insert("assignee".into(), json!({ "name": ticket.assignee }));
    }
    for (name, value) in &ticket.custom_fields {
        if name.starts_with(CUSTOM_FIELD_PREFIX) {
            fields.insert(name.clone(), field_json(value));
        }
    }
    json!({ "fields": fields })
}

fn field_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => json!(b),
        FieldValue::Number(n) => json!(n),
        FieldValue::Text(s) => json!(s),
        FieldValue::List(items) => json!(items),
    }
}

pub fn comment_body(body: &str) -> Value {
    json!({ "body": body })
}

pub fn transition_body(transition_id: &str) -> Value {
    json!({ "transition": { "id": transition_id } })
}

#[cfg(test)]
#[path = "mapper_tests.rs"]
mod tests;
