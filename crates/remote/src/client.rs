// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! [`RemoteRepository`] over the tracker's REST API (version 2).
//!
//! Every call goes through an [`HttpTransport`]; production clients wrap
//! [`ReqwestTransport`] in a [`RetryTransport`]. Failures leave this module
//! already translated into the domain taxonomy by [`to_domain`].

use jmd_core::config::JiraConfig;
use jmd_core::project::validate_project_key;
use jmd_core::{
    Comment, Error, Project, RemoteFuture, RemoteRepository, Result, SyncTimestamp, Ticket,
    TicketKey,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::to_domain;
use crate::mapper::{
    comment_body, map_comment, map_comment_value, map_issue, map_issue_value, map_project,
    transition_body, update_body, CommentDto, CommentPageDto, IssueDto, ProjectDto, SearchPageDto,
    TransitionsDto,
};
use crate::pagination::{collect_pages, PAGE_SIZE};
use crate::retry::{RetryPolicy, RetryTransport};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Path prefix of every API call.
pub const API_PREFIX: &str = "/rest/api/2";

/// Minute-resolution layout the search language accepts for dates.
const JQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Search query for a project's tickets updated at or after `since`.
pub fn modified_since_jql(project_key: &str, since: SyncTimestamp) -> String {
    match since.as_datetime() {
        Some(at) => format!(
            "project = {project_key} AND updated >= \"{}\" ORDER BY updated ASC",
            at.format(JQL_TIME_FORMAT)
        ),
        None => format!("project = {project_key} ORDER BY updated ASC"),
    }
}

/// Search query for every ticket in a project.
pub fn all_tickets_jql(project_key: &str) -> String {
    format!("project = {project_key} ORDER BY updated DESC")
}

/// Tracker client.
pub struct JiraClient<T = RetryTransport<ReqwestTransport>> {
    transport: T,
}

impl JiraClient {
    /// Builds the production client: HTTPS with basic auth and rate-limit
    /// backoff.
    pub fn connect(config: &JiraConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.base_url, &config.email, &config.token)
            .map_err(|e| Error::Config(format!("failed to create tracker client: {e}")))?;
        Ok(JiraClient::with_transport(RetryTransport::new(transport, RetryPolicy::default())))
    }
}

impl<T: HttpTransport> JiraClient<T> {
    pub fn with_transport(transport: T) -> Self {
        JiraClient { transport }
    }

    async fn send(&self, request: HttpRequest, context: &str) -> Result<HttpResponse> {
        self.transport
            .send(request)
            .await
            .and_then(HttpResponse::into_result)
            .map_err(|e| to_domain(e, context))
    }

    async fn send_json<D: DeserializeOwned>(&self, request: HttpRequest, context: &str) -> Result<D> {
        let response = self.send(request, context).await?;
        response.json().map_err(|e| to_domain(e, context))
    }

    async fn get_issue(&self, key: &TicketKey) -> Result<Ticket> {
        let path = format!("{API_PREFIX}/issue/{key}");
        let issue: IssueDto = self.send_json(HttpRequest::get(path), &format!("fetch ticket {key}")).await?;
        map_issue(issue)
    }

    async fn search_page(&self, jql: &str, start_at: usize) -> Result<Vec<Value>> {
        let request = HttpRequest::get(format!("{API_PREFIX}/search"))
            .with_query("jql", jql)
            .with_query("startAt", start_at)
            .with_query("maxResults", PAGE_SIZE);
        let page: SearchPageDto = self.send_json(request, "search tickets").await?;
        Ok(page.issues)
    }

    async fn search(&self, jql: String) -> Result<Vec<Ticket>> {
        tracing::debug!(%jql, "searching tickets");
        let jql = jql.as_str();
        let raw = collect_pages(move |start_at| self.search_page(jql, start_at)).await?;

        let mut tickets = Vec::with_capacity(raw.len());
        for value in raw {
            let issue_key = value.get("key").and_then(Value::as_str).unwrap_or("?").to_string();
            match map_issue_value(value) {
                Ok(ticket) => tickets.push(ticket),
                Err(e) => tracing::warn!(ticket_key = %issue_key, error = %e, "skipping unmappable ticket"),
            }
        }
        tracing::info!(count = tickets.len(), "fetched tickets");
        Ok(tickets)
    }

    async fn transition(&self, key: &TicketKey, status: &str) -> Result<()> {
        let path = format!("{API_PREFIX}/issue/{key}/transitions");
        let context = format!("transition ticket {key}");
        let available: TransitionsDto = self.send_json(HttpRequest::get(&path), &context).await?;
        let Some(transition) = available.find(status) else {
            return Err(Error::InvalidInput(format!(
                "no transition to status '{status}' available for {key}"
            )));
        };

        tracing::info!(ticket_key = %key, status, transition = %transition.id, "transitioning ticket");
        self.send(HttpRequest::post(path, transition_body(&transition.id)), &context).await?;
        Ok(())
    }

    async fn update(&self, ticket: &Ticket) -> Result<Ticket> {
        ticket.validate()?;
        let key = ticket.key();
        let path = format!("{API_PREFIX}/issue/{key}");
        self.send(HttpRequest::put(path, update_body(ticket)), &format!("update ticket {key}")).await?;

        let mut current = self.get_issue(key).await?;
        let wanted = ticket.status.trim();
        if !wanted.is_empty() && !current.status.eq_ignore_ascii_case(wanted) {
            self.transition(key, wanted).await?;
            current = self.get_issue(key).await?;
        }
        tracing::info!(ticket_key = %key, updated = %current.updated, "updated ticket");
        Ok(current)
    }

    async fn comments_page(&self, key: &TicketKey, start_at: usize) -> Result<Vec<Value>> {
        let request = HttpRequest::get(format!("{API_PREFIX}/issue/{key}/comment"))
            .with_query("startAt", start_at)
            .with_query("maxResults", PAGE_SIZE);
        let page: CommentPageDto = self.send_json(request, &format!("fetch comments for {key}")).await?;
        Ok(page.comments)
    }

    async fn comments(&self, key: &TicketKey) -> Result<Vec<Comment>> {
        let raw = collect_pages(move |start_at| self.comments_page(key, start_at)).await?;
        let mut comments = Vec::with_capacity(raw.len());
        for value in raw {
            match map_comment_value(value, key) {
                Ok(comment) => comments.push(comment),
                Err(e) => tracing::warn!(ticket_key = %key, error = %e, "skipping unmappable comment"),
            }
        }
        Ok(comments)
    }

    async fn post_comment(&self, key: &TicketKey, body: &str) -> Result<Comment> {
        if body.trim().is_empty() {
            return Err(Error::InvalidInput("comment body is required".into()));
        }
        let path = format!("{API_PREFIX}/issue/{key}/comment");
        let created: CommentDto =
            self.send_json(HttpRequest::post(path, comment_body(body)), &format!("add comment to {key}")).await?;
        let comment = map_comment(created, key)?;
        tracing::info!(ticket_key = %key, comment_id = %comment.id, "added comment");
        Ok(comment)
    }

    async fn project(&self, key: &str) -> Result<Project> {
        validate_project_key(key)?;
        let path = format!("{API_PREFIX}/project/{key}");
        let project: ProjectDto = self.send_json(HttpRequest::get(path), &format!("fetch project {key}")).await?;
        map_project(project)
    }

    async fn projects(&self) -> Result<Vec<Project>> {
        let listed: Vec<ProjectDto> =
            self.send_json(HttpRequest::get(format!("{API_PREFIX}/project")), "fetch projects").await?;
        let mut projects = Vec::with_capacity(listed.len());
        for dto in listed {
            let key = dto.key.clone();
            match map_project(dto) {
                Ok(project) => projects.push(project),
                Err(e) => tracing::warn!(project_key = %key, error = %e, "skipping unmappable project"),
            }
        }
        Ok(projects)
    }
}

impl<T: HttpTransport> RemoteRepository for JiraClient<T> {
    fn fetch_ticket<'a>(&'a self, key: &'a TicketKey) -> RemoteFuture<'a, Ticket> {
        Box::pin(self.get_issue(key))
    }

    fn fetch_tickets_modified_since<'a>(
        &'a self,
        project_key: &'a str,
        since: SyncTimestamp,
    ) -> RemoteFuture<'a, Vec<Ticket>> {
        Box::pin(async move {
            validate_project_key(project_key)?;
            self.search(modified_since_jql(project_key, since)).await
        })
    }

    fn fetch_all_tickets<'a>(&'a self, project_key: &'a str) -> RemoteFuture<'a, Vec<Ticket>> {
        Box::pin(async move {
            validate_project_key(project_key)?;
            self.search(all_tickets_jql(project_key)).await
        })
    }

    fn update_ticket<'a>(&'a self, ticket: &'a Ticket) -> RemoteFuture<'a, Ticket> {
        Box::pin(self.update(ticket))
    }

    fn fetch_comments<'a>(&'a self, key: &'a TicketKey) -> RemoteFuture<'a, Vec<Comment>> {
        Box::pin(self.comments(key))
    }

    fn add_comment<'a>(&'a self, key: &'a TicketKey, body: &'a str) -> RemoteFuture<'a, Comment> {
        Box::pin(self.post_comment(key, body))
    }

    fn fetch_project<'a>(&'a self, key: &'a str) -> RemoteFuture<'a, Project> {
        Box::pin(self.project(key))
    }

    fn fetch_projects(&self) -> RemoteFuture<'_, Vec<Project>> {
        Box::pin(self.projects())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
