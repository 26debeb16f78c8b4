// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for transport and client tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError, TransportFuture};

/// Mock transport for testing without real sockets.
///
/// Replies are served in order; running out of replies is a 500.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<VecDeque<Result<HttpResponse, TransportError>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply with the given status and JSON body.
    pub fn reply(&self, status: u16, body: Value) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse::new(status, body.to_string())));
        self
    }

    /// Queues a reply with a raw body.
    pub fn reply_raw(&self, status: u16, body: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queues a failure before any response.
    pub fn fail(&self, message: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Err(TransportError::Request(message.into())));
        self
    }

    /// All requests sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            let reply = self.replies.lock().unwrap().pop_front();
            reply.unwrap_or_else(|| Ok(HttpResponse::new(500, "no reply queued")))
        })
    }
}

/// A tracker issue as JSON.
pub fn issue_json(key: &str, summary: &str, updated: &str) -> Value {
    serde_json::json!({
        "id": "10001",
        "key": key,
        "fields": {
            "summary": summary,
            "description": "Body text",
            "status": { "name": "In Progress" },
            "issuetype": { "name": "Task" },
            "priority": { "name": "High" },
            "assignee": { "displayName": "Ada Lovelace", "accountId": "abc123" },
            "reporter": { "displayName": "Grace Hopper" },
            "labels": ["backend", "sync"],
            "created": "2025-05-01T08:00:00.000+0000",
            "updated": updated
        }
    })
}
