// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local markdown mirror collaborator.
//!
//! The engine never parses markdown. It asks this collaborator for ticket
//! content (to hash) and file modification times (to mark tickets dirty),
//! and hands it tickets to write after a pull.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::comment::Comment;
use crate::error::Result;
use crate::sync::SyncTimestamp;
use crate::ticket::{Ticket, TicketKey};

/// Reads and writes tickets as files in the local mirror.
pub trait MarkdownRepository: Send + Sync {
    /// Where the file for a ticket lives.
    fn ticket_path(&self, key: &TicketKey) -> PathBuf;

    fn read_ticket(&self, path: &Path) -> Result<Ticket>;

    fn write_ticket(&self, path: &Path, ticket: &Ticket) -> Result<()>;

    fn read_comments(&self, path: &Path) -> Result<Vec<Comment>>;

    fn write_comments(&self, path: &Path, comments: &[Comment]) -> Result<()>;

    fn list_ticket_files(&self, directory: &Path) -> Result<Vec<PathBuf>>;

    fn generate_index(&self, index_path: &Path, tickets: &[Ticket]) -> Result<()>;

    fn validate_template(&self, template_path: &Path) -> Result<()>;

    /// Last modification time of a file.
    fn modified_at(&self, path: &Path) -> Result<SyncTimestamp>;
}

impl<M: MarkdownRepository + ?Sized> MarkdownRepository for Arc<M> {
    fn ticket_path(&self, key: &TicketKey) -> PathBuf {
        (**self).ticket_path(key)
    }

    fn read_ticket(&self, path: &Path) -> Result<Ticket> {
        (**self).read_ticket(path)
    }

    fn write_ticket(&self, path: &Path, ticket: &Ticket) -> Result<()> {
        (**self).write_ticket(path, ticket)
    }

    fn read_comments(&self, path: &Path) -> Result<Vec<Comment>> {
        (**self).read_comments(path)
    }

    fn write_comments(&self, path: &Path, comments: &[Comment]) -> Result<()> {
        (**self).write_comments(path, comments)
    }

    fn list_ticket_files(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        (**self).list_ticket_files(directory)
    }

    fn generate_index(&self, index_path: &Path, tickets: &[Ticket]) -> Result<()> {
        (**self).generate_index(index_path, tickets)
    }

    fn validate_template(&self, template_path: &Path) -> Result<()> {
        (**self).validate_template(template_path)
    }

    fn modified_at(&self, path: &Path) -> Result<SyncTimestamp> {
        (**self).modified_at(path)
    }
}
