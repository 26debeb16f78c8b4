// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! jmd-remote: the tracker side of the sync engine.
//!
//! Implements [`jmd_core::RemoteRepository`] over the tracker's REST API.
//!
//! ```text
//!   Reconciler ──▶ JiraClient ──▶ RetryTransport ──▶ ReqwestTransport ──▶ HTTPS
//!                  │  mapper        (429 backoff)      (basic auth, 30s)
//!                  │  pagination
//!                  └─ errors: status ──▶ jmd_core::Error
//! ```

pub mod client;
pub mod errors;
pub mod mapper;
pub mod pagination;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use client::{JiraClient, API_PREFIX};
pub use errors::to_domain;
pub use pagination::{collect_pages, PAGE_SIZE};
pub use retry::{RetryPolicy, RetryTransport};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TransportError,
    TransportResult,
};
