// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote tracker collaborator.
//!
//! Implementations must translate transport failures into [`Error`]:
//! 404 to `NotFound`, 401/403 to `Unauthorized`, 400 to `InvalidInput`,
//! 409 to `Conflict`, and anything else to `Remote` with the status kept.
//! List operations page transparently; callers never see partial pages.
//!
//! [`Error`]: crate::error::Error

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::comment::Comment;
use crate::error::Result;
use crate::project::Project;
use crate::sync::SyncTimestamp;
use crate::ticket::{Ticket, TicketKey};

/// Boxed future returned by [`RemoteRepository`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Access to tickets, comments and projects on the remote tracker.
///
/// Dropping a returned future cancels the call, including any backoff
/// sleep in progress.
pub trait RemoteRepository: Send + Sync {
    fn fetch_ticket<'a>(&'a self, key: &'a TicketKey) -> RemoteFuture<'a, Ticket>;

    /// Tickets updated at or after `since`, oldest update first.
    fn fetch_tickets_modified_since<'a>(
        &'a self,
        project_key: &'a str,
        since: SyncTimestamp,
    ) -> RemoteFuture<'a, Vec<Ticket>>;

    fn fetch_all_tickets<'a>(&'a self, project_key: &'a str) -> RemoteFuture<'a, Vec<Ticket>>;

    /// Pushes the ticket and returns the tracker's copy afterwards, whose
    /// `updated` is authoritative.
    fn update_ticket<'a>(&'a self, ticket: &'a Ticket) -> RemoteFuture<'a, Ticket>;

    fn fetch_comments<'a>(&'a self, key: &'a TicketKey) -> RemoteFuture<'a, Vec<Comment>>;

    fn add_comment<'a>(&'a self, key: &'a TicketKey, body: &'a str) -> RemoteFuture<'a, Comment>;

    fn fetch_project<'a>(&'a self, key: &'a str) -> RemoteFuture<'a, Project>;

    fn fetch_projects(&self) -> RemoteFuture<'_, Vec<Project>>;
}

impl<R: RemoteRepository + ?Sized> RemoteRepository for Arc<R> {
    fn fetch_ticket<'a>(&'a self, key: &'a TicketKey) -> RemoteFuture<'a, Ticket> {
        (**self).fetch_ticket(key)
    }

    fn fetch_tickets_modified_since<'a>(
        &'a self,
        project_key: &'a str,
        since: SyncTimestamp,
    ) -> RemoteFuture<'a, Vec<Ticket>> {
        (**self).fetch_tickets_modified_since(project_key, since)
    }

    fn fetch_all_tickets<'a>(&'a self, project_key: &'a str) -> RemoteFuture<'a, Vec<Ticket>> {
        (**self).fetch_all_tickets(project_key)
    }

    fn update_ticket<'a>(&'a self, ticket: &'a Ticket) -> RemoteFuture<'a, Ticket> {
        (**self).update_ticket(ticket)
    }

    fn fetch_comments<'a>(&'a self, key: &'a TicketKey) -> RemoteFuture<'a, Vec<Comment>> {
        (**self).fetch_comments(key)
    }

    fn add_comment<'a>(&'a self, key: &'a TicketKey, body: &'a str) -> RemoteFuture<'a, Comment> {
        (**self).add_comment(key, body)
    }

    fn fetch_project<'a>(&'a self, key: &'a str) -> RemoteFuture<'a, Project> {
        (**self).fetch_project(key)
    }

    fn fetch_projects(&self) -> RemoteFuture<'_, Vec<Project>> {
        (**self).fetch_projects()
    }
}
