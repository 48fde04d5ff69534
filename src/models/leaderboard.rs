// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Leaderboard output models.

use crate::models::{ActivityType, Participant};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Charity aggregate for one activity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CharityRanking {
    pub charity_id: String,
    pub name: String,
    pub payment_destination: String,
    /// Charity baseline plus tagged fresh distance (km)
    pub total_distance: f64,
    /// Distinct participants with at least one tagged fresh record
    pub participant_count: u32,
    pub rank: u32,
}

/// Ranked result for one activity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Leaderboard {
    pub activity_type: ActivityType,
    /// Descending by distance
    pub participants: Vec<Participant>,
    /// Descending by distance
    pub charities: Vec<CharityRanking>,
    /// Computation time (Unix seconds)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub last_updated: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub ttl_secs: u64,
}

impl Leaderboard {
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn charity(&self, charity_id: &str) -> Option<&CharityRanking> {
        self.charities.iter().find(|c| c.charity_id == charity_id)
    }
}

/// One leaderboard per tracked activity type, built from a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AllLeaderboards {
    pub running: Leaderboard,
    pub walking: Leaderboard,
    pub cycling: Leaderboard,
}

impl AllLeaderboards {
    pub fn get(&self, activity_type: ActivityType) -> &Leaderboard {
        match activity_type {
            ActivityType::Running => &self.running,
            ActivityType::Walking => &self.walking,
            ActivityType::Cycling => &self.cycling,
        }
    }

    pub fn into_leaderboard(self, activity_type: ActivityType) -> Leaderboard {
        match activity_type {
            ActivityType::Running => self.running,
            ActivityType::Walking => self.walking,
            ActivityType::Cycling => self.cycling,
        }
    }

    /// Oldest computation timestamp among the three boards.
    pub fn last_updated(&self) -> i64 {
        self.running
            .last_updated
            .min(self.walking.last_updated)
            .min(self.cycling.last_updated)
    }
}
