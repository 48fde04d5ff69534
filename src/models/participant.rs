//! Participant and registration models.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One ranked entrant on a leaderboard.
///
/// Materialized fresh on every build; only ever persisted inside a
/// cached `Leaderboard` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Participant {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub selected_charity: Option<String>,
    /// Baseline plus fresh distance (km)
    pub total_distance: f64,
    pub workout_count: u32,
    /// Joined locally without being on the official roster
    pub is_local_join: bool,
    /// Set only on the requesting viewer's own unofficial entry
    pub is_private_competitor: bool,
    /// 1-based position
    pub rank: u32,
}

/// Opt-in record for a participant who is not on the official roster.
///
/// Stored at: `local_joins/{participant_id}`. Never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalJoinRecord {
    pub participant_id: String,
    /// Join time (Unix seconds)
    pub joined_at: i64,
}

/// How an identifier relates to the season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    Official,
    LocalOnly,
    Absent,
}

/// Display data for a participant. Unknown ids resolve to a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// Charity that participants can attribute distance to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charity {
    pub id: String,
    pub name: String,
    /// Where donations are sent (e.g. a lightning address)
    pub payment_destination: String,
}
