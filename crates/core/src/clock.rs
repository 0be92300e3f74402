// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Tether Contributors

//! Injectable wall-clock abstraction.
//!
//! All timestamp comparisons (conflict detection, validation, liveness)
//! go through a `ClockSource` so tests can pin time instead of sleeping.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;

/// Trait for getting the current wall clock time.
///
/// This allows injecting a mock clock for testing.
pub trait ClockSource: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64 {
        let ms = self.now().timestamp_millis();
        u64::try_from(ms).unwrap_or(0)
    }
}

/// System clock implementation using `chrono::Utc::now`.
#[derive(Debug, Default)]
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

/// A manually advanced clock for tests.
#[derive(Debug)]
pub struct FixedClock {
    now_ms: Mutex<i64>,
}

impl FixedClock {
    /// Creates a clock pinned at the given milliseconds since epoch.
    pub fn at_ms(ms: i64) -> Self {
        FixedClock {
            now_ms: Mutex::new(ms),
        }
    }

    /// Advances the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        let mut now = self.now_ms.lock().unwrap_or_else(|e| e.into_inner());
        *now += ms;
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = *self.now_ms.lock().unwrap_or_else(|e| e.into_inner());
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
