// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock sources.
//!
//! Every "now" taken by the engine goes through a [`ClockSource`] so tests can
//! pin time and walk it forward deterministically.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Trait for providing the current time.
pub trait ClockSource: Send + Sync {
    /// Returns the current UTC instant.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using `chrono::Utc::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: ClockSource> ClockSource for &C {
    fn now(&self) -> DateTime<Utc> {
        (*self).now()
    }
}

impl<C: ClockSource> ClockSource for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// A manually driven clock with millisecond resolution.
#[derive(Debug)]
pub struct ManualClock {
    time_ms: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { time_ms: AtomicI64::new(start.timestamp_millis()) }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        self.time_ms.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Moves the clock forward by the given duration.
    pub fn advance(&self, by: chrono::Duration) {
        self.time_ms.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.time_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
