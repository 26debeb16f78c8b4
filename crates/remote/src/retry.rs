// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limit backoff for a transport.
//!
//! Only HTTP 429 is retried. Every other status, and every request that
//! produced no response, passes straight through; retrying those is the
//! pending-operation queue's job.
//!
//! Backoff sleeps on the tokio timer. Dropping the future returned by
//! [`HttpTransport::send`] cancels the sleep and no further attempt is made.

use std::time::Duration;

use crate::transport::{HttpRequest, HttpTransport, TransportFuture};

/// The status that triggers a retry.
pub const RATE_LIMITED: u16 = 429;

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based): doubles each time,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Wraps a transport with [`RetryPolicy`] backoff on 429 responses.
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        RetryTransport { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<T: HttpTransport> HttpTransport for RetryTransport<T> {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let mut retry = 0;
            loop {
                let response = self.inner.send(request.clone()).await?;
                if response.status != RATE_LIMITED || retry == self.policy.max_retries {
                    return Ok(response);
                }

                let delay = self.policy.delay_for(retry);
                retry += 1;
                tracing::warn!(
                    path = %request.path,
                    retry,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        })
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
