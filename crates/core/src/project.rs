// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Projects and their custom-field configuration.
//!
//! A custom field is either copied from a source on the ticket or derived
//! from a condition. The only condition understood today is
//! `has-label('a','b',...)`: the first listed label present on the ticket
//! becomes the value, otherwise the field's default applies.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::ticket::Ticket;

static PROJECT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"^[A-Z][A-Z0-9]{1,9}$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });

static HAS_LABEL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"^has-label\((.*)\)$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });

/// Which way a custom field flows between the tracker and the local mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Tracker and local copy both write.
    Bidirectional,
    /// Read-only mirror of the tracker value.
    JiraToLocal,
    /// Never leaves the local mirror.
    LocalOnly,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Bidirectional => "bidirectional",
            SyncDirection::JiraToLocal => "jira_to_local",
            SyncDirection::LocalOnly => "local_only",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bidirectional" => Ok(SyncDirection::Bidirectional),
            "jira_to_local" => Ok(SyncDirection::JiraToLocal),
            "local_only" => Ok(SyncDirection::LocalOnly),
            _ => Err(Error::InvalidInput(format!("invalid sync direction: {s}"))),
        }
    }
}

/// Configuration for one user-defined field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub display_name: String,
    /// Where the value comes from, e.g. `labels` or `customfield_10001`.
    pub source: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub default_value: String,
    /// Allowed values; empty means anything goes.
    #[serde(default)]
    pub valid_values: Vec<String>,
    pub sync_direction: SyncDirection,
}

impl CustomField {
    pub fn new(
        name: &str,
        display_name: &str,
        source: &str,
        sync_direction: SyncDirection,
    ) -> Result<Self> {
        let field = CustomField {
            name: name.trim().to_string(),
            display_name: display_name.trim().to_string(),
            source: source.trim().to_string(),
            condition: None,
            default_value: String::new(),
            valid_values: Vec::new(),
            sync_direction,
        };
        field.validate()?;
        Ok(field)
    }

    /// Sets the derivation condition.
    pub fn with_condition(mut self, condition: &str) -> Self {
        let condition = condition.trim();
        self.condition = (!condition.is_empty()).then(|| condition.to_string());
        self
    }

    pub fn with_default(mut self, default_value: &str) -> Self {
        self.default_value = default_value.to_string();
        self
    }

    pub fn with_valid_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("custom field name is required".into()));
        }
        if self.display_name.trim().is_empty() {
            return Err(Error::InvalidInput("custom field display name is required".into()));
        }
        if self.source.trim().is_empty() {
            return Err(Error::InvalidInput("custom field source is required".into()));
        }
        Ok(())
    }

    /// Checks a value against the whitelist.
    pub fn validate_value(&self, value: &str) -> Result<()> {
        if self.valid_values.is_empty() || self.valid_values.iter().any(|v| v == value) {
            return Ok(());
        }
        Err(Error::InvalidFieldValue(format!(
            "value '{}' not in valid values for field '{}': [{}]",
            value,
            self.name,
            self.valid_values.join(", ")
        )))
    }

    pub fn is_bidirectional(&self) -> bool {
        self.sync_direction == SyncDirection::Bidirectional
    }

    pub fn is_derived(&self) -> bool {
        self.condition.is_some()
    }

    /// Evaluates a derived field against a ticket.
    ///
    /// Returns `Ok(None)` for fields without a condition.
    pub fn derive(&self, ticket: &Ticket) -> Result<Option<DerivedValue>> {
        let Some(condition) = &self.condition else {
            return Ok(None);
        };
        let labels = parse_has_label(condition)?;
        let derived = match labels.into_iter().find(|l| ticket.has_label(l)) {
            Some(label) => DerivedValue { value: label, used_default: false },
            None => DerivedValue { value: self.default_value.clone(), used_default: true },
        };
        Ok(Some(derived))
    }
}

/// Result of evaluating a derived field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedValue {
    pub value: String,
    pub used_default: bool,
}

/// Parses `has-label('a', "b", c)` into its label arguments.
fn parse_has_label(condition: &str) -> Result<Vec<String>> {
    let args = HAS_LABEL_PATTERN
        .captures(condition.trim())
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| Error::InvalidInput(format!("unsupported condition: {condition}")))?;

    let labels: Vec<String> = args
        .as_str()
        .split(',')
        .map(|arg| arg.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|arg| !arg.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(Error::InvalidInput(format!("has-label needs at least one label: {condition}")));
    }
    Ok(labels)
}

/// A tracker project with its custom-field configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

impl Project {
    /// Creates a project, upper-casing and trimming the key.
    pub fn new(key: &str, name: &str) -> Result<Self> {
        let project = Project {
            key: key.trim().to_uppercase(),
            name: name.trim().to_string(),
            description: String::new(),
            custom_fields: Vec::new(),
        };
        project.validate()?;
        Ok(project)
    }

    pub fn validate(&self) -> Result<()> {
        validate_project_key(&self.key)?;
        if self.name.trim().is_empty() {
            return Err(Error::InvalidProject("project name is required".into()));
        }
        Ok(())
    }

    /// Adds a field configuration, rejecting duplicate names.
    pub fn add_custom_field(&mut self, field: CustomField) -> Result<()> {
        field.validate()?;
        if self.custom_field(&field.name).is_some() {
            return Err(Error::InvalidInput(format!(
                "custom field '{}' already exists",
                field.name
            )));
        }
        self.custom_fields.push(field);
        Ok(())
    }

    pub fn custom_field(&self, name: &str) -> Option<&CustomField> {
        self.custom_fields.iter().find(|f| f.name == name)
    }

    /// Removes a field by name, returning whether it existed.
    pub fn remove_custom_field(&mut self, name: &str) -> bool {
        let before = self.custom_fields.len();
        self.custom_fields.retain(|f| f.name != name);
        self.custom_fields.len() != before
    }

    pub fn bidirectional_fields(&self) -> impl Iterator<Item = &CustomField> {
        self.custom_fields.iter().filter(|f| f.is_bidirectional())
    }

    pub fn derived_fields(&self) -> impl Iterator<Item = &CustomField> {
        self.custom_fields.iter().filter(|f| f.is_derived())
    }
}

/// Validates a bare project key such as `JMD`.
pub fn validate_project_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::EmptyKey("project key is required".into()));
    }
    if !PROJECT_KEY_PATTERN.is_match(key) {
        return Err(Error::InvalidProject(format!(
            "project key '{key}' (expected 2-10 uppercase letters/digits)"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
