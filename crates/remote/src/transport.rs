// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for HTTP communication with the tracker.
//!
//! Provides a trait-based transport layer that enables:
//! - Real HTTPS requests for production ([`ReqwestTransport`])
//! - Mock transports for unit testing
//!
//! A transport returns every response it receives, whatever the status.
//! Turning a non-success status into an error is the caller's decision
//! ([`HttpResponse::into_result`]), so wrappers such as the retry layer can
//! look at the status first.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// The HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = TransportResult<HttpResponse>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// A request relative to the tracker's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path starting with `/`, e.g. `/rest/api/2/issue/JMD-1`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        HttpRequest { method: Method::Get, path: path.into(), query: Vec::new(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        HttpRequest { method: Method::Post, path: path.into(), query: Vec::new(), body: Some(body) }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        HttpRequest { method: Method::Put, path: path.into(), query: Vec::new(), body: Some(body) }
    }

    pub fn with_query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Looks up a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

/// A response with its body read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-success status into [`TransportError::Status`].
    pub fn into_result(self) -> TransportResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status { status: self.status, body: self.body })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> TransportResult<T> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::Serialization(e.to_string()))
    }
}

/// Transport trait for request/response communication.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// HTTPS transport using reqwest with basic authentication.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    email: String,
    token: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, email: &str, token: &str) -> TransportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build http client: {e}")))?;
        Ok(ReqwestTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            token: token.to_string(),
        })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let url = format!("{}{}", self.base_url, request.path);
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Post => reqwest::Method::POST,
                Method::Put => reqwest::Method::PUT,
            };

            let mut builder = self
                .client
                .request(method, &url)
                .basic_auth(&self.email, Some(&self.token))
                .header(ACCEPT, "application/json")
                .query(&request.query);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| TransportError::Request(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| TransportError::Request(e.to_string()))?;
            tracing::debug!(method = request.method.as_str(), path = %request.path, status, "http request");
            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
