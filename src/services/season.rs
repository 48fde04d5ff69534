// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Season data loading: roster, charities, window, and baselines.

use crate::models::{Charity, Profile, SeasonFile, TimeWindow};
use crate::services::BaselineStore;
use crate::time_utils::parse_rfc3339_secs;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Official roster with profile and charity lookups.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    /// Official participant ids, in file order
    official: Vec<String>,
    official_set: HashSet<String>,
    profiles: HashMap<String, Profile>,
    /// Roster-selected charity per participant
    selected_charities: HashMap<String, String>,
    charities: HashMap<String, Charity>,
}

impl Roster {
    pub fn official_ids(&self) -> &[String] {
        &self.official
    }

    pub fn official_set(&self) -> &HashSet<String> {
        &self.official_set
    }

    pub fn is_official(&self, participant_id: &str) -> bool {
        self.official_set.contains(participant_id)
    }

    /// Profile lookup, yielding a placeholder for unknown ids.
    pub fn profile(&self, participant_id: &str) -> Profile {
        self.profiles
            .get(participant_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn selected_charity(&self, participant_id: &str) -> Option<&str> {
        self.selected_charities
            .get(participant_id)
            .map(String::as_str)
    }

    pub fn charity(&self, charity_id: &str) -> Option<&Charity> {
        self.charities.get(charity_id)
    }
}

/// Everything frozen for one season.
#[derive(Debug, Clone)]
pub struct Season {
    pub id: String,
    pub window: TimeWindow,
    pub baseline: BaselineStore,
    /// Shared with the participant registry
    pub roster: Arc<Roster>,
}

impl Season {
    /// Load season data from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SeasonDataError> {
        let json_data = fs::read_to_string(path.as_ref())
            .map_err(|e| SeasonDataError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load season data from a JSON string.
    pub fn load_from_json(json_data: &str) -> Result<Self, SeasonDataError> {
        let file: SeasonFile = serde_json::from_str(json_data)
            .map_err(|e| SeasonDataError::ParseError(e.to_string()))?;
        Self::from_file(file)
    }

    pub fn from_file(file: SeasonFile) -> Result<Self, SeasonDataError> {
        let since = parse_rfc3339_secs(&file.starts_at)
            .ok_or_else(|| SeasonDataError::InvalidWindow(file.starts_at.clone()))?;
        let until = parse_rfc3339_secs(&file.ends_at)
            .ok_or_else(|| SeasonDataError::InvalidWindow(file.ends_at.clone()))?;
        if until < since {
            return Err(SeasonDataError::InvalidWindow(format!(
                "{} ends before it starts",
                file.season_id
            )));
        }

        let mut roster = Roster::default();
        for entry in &file.roster {
            if !roster.official_set.insert(entry.id.clone()) {
                return Err(SeasonDataError::DuplicateParticipant(entry.id.clone()));
            }
            roster.official.push(entry.id.clone());
            roster.profiles.insert(
                entry.id.clone(),
                Profile {
                    display_name: entry.display_name.clone(),
                    avatar: entry.avatar.clone(),
                },
            );
            if let Some(charity) = &entry.charity {
                roster
                    .selected_charities
                    .insert(entry.id.clone(), charity.clone());
            }
        }
        for charity in &file.charities {
            roster.charities.insert(charity.id.clone(), charity.clone());
        }

        let baseline = BaselineStore::from_rows(
            file.baseline_version,
            &file.participant_baseline,
            &file.charity_baseline,
        );

        tracing::info!(
            season = %file.season_id,
            participants = roster.official.len(),
            charities = roster.charities.len(),
            baseline_version = file.baseline_version,
            "Loaded season data"
        );

        Ok(Self {
            id: file.season_id,
            window: TimeWindow { since, until },
            baseline,
            roster: Arc::new(roster),
        })
    }
}

/// Errors from season data loading.
#[derive(Debug, thiserror::Error)]
pub enum SeasonDataError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse season data: {0}")]
    ParseError(String),

    #[error("Invalid season window: {0}")]
    InvalidWindow(String),

    #[error("Participant listed twice on the roster: {0}")]
    DuplicateParticipant(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityType;

    const SEASON_JSON: &str = r#"{
        "season_id": "spring-2026",
        "baseline_version": 4,
        "starts_at": "2026-03-01T00:00:00Z",
        "ends_at": "2026-05-31T23:59:59Z",
        "roster": [
            {"id": "p1", "display_name": "Ada", "avatar": "https://img/ada.png", "charity": "alpha"},
            {"id": "p2", "display_name": null, "avatar": null, "charity": null}
        ],
        "charities": [
            {"id": "alpha", "name": "Alpha Fund", "payment_destination": "alpha@pay.example"}
        ],
        "participant_baseline": [
            {"key": "p1", "activity_type": "running", "distance_km": 10.0, "count": 2}
        ],
        "charity_baseline": [
            {"key": "alpha", "activity_type": "running", "distance_km": 2.0, "count": 1}
        ]
    }"#;

    #[test]
    fn test_load_from_json() {
        let season = Season::load_from_json(SEASON_JSON).expect("season should load");

        assert_eq!(season.id, "spring-2026");
        assert_eq!(season.baseline.version(), 4);
        assert_eq!(season.roster.official_ids(), &["p1", "p2"]);
        assert!(season.roster.is_official("p2"));
        assert_eq!(season.roster.selected_charity("p1"), Some("alpha"));
        assert_eq!(
            season.roster.profile("p1").display_name.as_deref(),
            Some("Ada")
        );
        assert_eq!(
            season
                .baseline
                .participant("p1", ActivityType::Running)
                .distance_km,
            10.0
        );
        assert!(season.window.since < season.window.until);
    }

    #[test]
    fn test_unknown_profile_is_placeholder() {
        let season = Season::load_from_json(SEASON_JSON).unwrap();
        assert_eq!(season.roster.profile("stranger"), Profile::default());
    }

    #[test]
    fn test_rejects_inverted_window() {
        let json = SEASON_JSON.replace("2026-05-31T23:59:59Z", "2026-01-01T00:00:00Z");
        assert!(matches!(
            Season::load_from_json(&json),
            Err(SeasonDataError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_roster_entry() {
        let json = SEASON_JSON.replace("\"id\": \"p2\"", "\"id\": \"p1\"");
        assert!(matches!(
            Season::load_from_json(&json),
            Err(SeasonDataError::DuplicateParticipant(_))
        ));
    }
}
