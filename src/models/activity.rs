// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity records as observed on the event network, and their
//! classified form used for leaderboard aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Activity types tracked by the season leaderboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Running,
    Walking,
    Cycling,
}

impl ActivityType {
    /// All tracked types, in display order.
    pub const ALL: [ActivityType; 3] = [
        ActivityType::Running,
        ActivityType::Walking,
        ActivityType::Cycling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Running => "running",
            ActivityType::Walking => "walking",
            ActivityType::Cycling => "cycling",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = UnknownActivityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(ActivityType::Running),
            "walking" => Ok(ActivityType::Walking),
            "cycling" => Ok(ActivityType::Cycling),
            _ => Err(UnknownActivityType(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown activity type: {0}")]
pub struct UnknownActivityType(pub String);

/// Inclusive time bounds (Unix seconds) for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: i64,
    pub until: i64,
}

impl TimeWindow {
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.since && timestamp <= self.until
    }
}

/// A workout record published on the event network.
///
/// Immutable once observed. The same `id` may be delivered by several
/// relays and must only ever be counted once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Globally unique event identifier
    pub id: String,
    /// Owner (participant identifier)
    pub owner: String,
    /// Free-text activity label ("Morning run", "hike", ...)
    pub label: String,
    /// Distance exactly as published; parsed by the classifier
    pub distance: Option<String>,
    /// Distance unit as published ("km", "mi", "m")
    pub unit: Option<String>,
    /// Optional charity attribution
    pub charity: Option<String>,
    /// Creation timestamp (Unix seconds)
    pub created_at: i64,
}

/// A record that passed classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedWorkout {
    pub record_id: String,
    pub participant: String,
    pub activity_type: ActivityType,
    /// Distance in kilometers, always positive
    pub distance_km: f64,
    pub charity: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_parse_is_case_insensitive() {
        assert_eq!(
            "Running".parse::<ActivityType>().unwrap(),
            ActivityType::Running
        );
        assert_eq!(
            " cycling ".parse::<ActivityType>().unwrap(),
            ActivityType::Cycling
        );
        assert!("swimming".parse::<ActivityType>().is_err());
    }

    #[test]
    fn test_activity_type_serializes_lowercase() {
        let json = serde_json::to_string(&ActivityType::Walking).unwrap();
        assert_eq!(json, "\"walking\"");
    }

    #[test]
    fn test_time_window_is_inclusive() {
        let window = TimeWindow {
            since: 100,
            until: 200,
        };
        assert!(window.contains(100));
        assert!(window.contains(200));
        assert!(!window.contains(99));
        assert!(!window.contains(201));
    }
}
