// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of the current time in Unix seconds.
///
/// Injected into the cache and orchestrator so TTL behavior can be
/// driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format Unix seconds as RFC3339, for log fields.
pub fn format_unix_rfc3339(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(format_utc_rfc3339)
        .unwrap_or_else(|| secs.to_string())
}

/// Parse an RFC3339 timestamp into Unix seconds.
pub fn parse_rfc3339_secs(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp())
}
