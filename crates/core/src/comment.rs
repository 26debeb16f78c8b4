// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Comments attached to a ticket.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ticket::TicketKey;

/// A comment on a ticket, identified by the tracker-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub ticket_key: TicketKey,
    pub author: String,
    pub body: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Comment {
    /// Builds and validates a comment, normalizing both timestamps to UTC.
    pub fn new<Tz: TimeZone>(
        id: &str,
        ticket_key: TicketKey,
        author: &str,
        body: impl Into<String>,
        created: DateTime<Tz>,
        updated: DateTime<Tz>,
    ) -> Result<Self> {
        let comment = Comment {
            id: id.trim().to_string(),
            ticket_key,
            author: author.trim().to_string(),
            body: body.into(),
            created: created.with_timezone(&Utc),
            updated: updated.with_timezone(&Utc),
        };
        comment.validate()?;
        Ok(comment)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("comment id is required".into()));
        }
        if self.author.trim().is_empty() {
            return Err(Error::InvalidInput("comment author is required".into()));
        }
        if self.created == DateTime::<Utc>::UNIX_EPOCH {
            return Err(Error::InvalidTimestamp("comment created time is required".into()));
        }
        if self.updated == DateTime::<Utc>::UNIX_EPOCH {
            return Err(Error::InvalidTimestamp("comment updated time is required".into()));
        }
        Ok(())
    }

    /// Returns true if the comment was edited after it was posted.
    pub fn is_edited(&self) -> bool {
        self.updated > self.created
    }
}

#[cfg(test)]
#[path = "comment_tests.rs"]
mod tests;
