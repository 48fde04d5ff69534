//! Season data file layout.
//!
//! The file is produced before live tracking begins and holds the official
//! roster, the charity list, and the two frozen baseline tables.

use crate::models::{ActivityType, Charity};
use serde::{Deserialize, Serialize};

/// Top-level season data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonFile {
    pub season_id: String,
    /// Bumped whenever the baseline tables are regenerated
    pub baseline_version: u32,
    /// Season start (RFC3339)
    pub starts_at: String,
    /// Season end (RFC3339)
    pub ends_at: String,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    #[serde(default)]
    pub charities: Vec<Charity>,
    /// Rows keyed by participant id
    #[serde(default)]
    pub participant_baseline: Vec<BaselineRow>,
    /// Rows keyed by charity id (independent of participant rows)
    #[serde(default)]
    pub charity_baseline: Vec<BaselineRow>,
}

/// Official roster member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    /// Charity the participant supports
    pub charity: Option<String>,
}

/// One frozen baseline row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineRow {
    /// Participant id or charity id, depending on the table
    pub key: String,
    pub activity_type: ActivityType,
    pub distance_km: f64,
    #[serde(default)]
    pub count: u32,
}

/// Frozen totals for one (key, activity type) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BaselineEntry {
    pub distance_km: f64,
    pub count: u32,
}
