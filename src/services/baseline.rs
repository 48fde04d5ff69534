// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Frozen per-participant and per-charity baseline totals.
//!
//! The two tables are kept as independent ledgers: charity totals are
//! never derived from participant rows.

use crate::models::{ActivityType, BaselineEntry, BaselineRow};
use std::collections::HashMap;

type BaselineTable = HashMap<(String, ActivityType), BaselineEntry>;

/// Read-only baseline tables for one season.
#[derive(Debug, Clone, Default)]
pub struct BaselineStore {
    version: u32,
    participants: BaselineTable,
    charities: BaselineTable,
}

impl BaselineStore {
    /// Build the store from the season file's rows.
    ///
    /// Repeated rows for the same key and type are summed.
    pub fn from_rows(
        version: u32,
        participant_rows: &[BaselineRow],
        charity_rows: &[BaselineRow],
    ) -> Self {
        Self {
            version,
            participants: Self::table(participant_rows),
            charities: Self::table(charity_rows),
        }
    }

    fn table(rows: &[BaselineRow]) -> BaselineTable {
        let mut table = BaselineTable::new();
        for row in rows {
            if !row.distance_km.is_finite() || row.distance_km < 0.0 {
                tracing::warn!(
                    key = %row.key,
                    activity_type = %row.activity_type,
                    distance_km = row.distance_km,
                    "Skipping invalid baseline row"
                );
                continue;
            }
            let entry = table
                .entry((row.key.clone(), row.activity_type))
                .or_default();
            entry.distance_km += row.distance_km;
            entry.count += row.count;
        }
        table
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Baseline for a participant, zero if absent.
    pub fn participant(&self, participant_id: &str, activity_type: ActivityType) -> BaselineEntry {
        self.participants
            .get(&(participant_id.to_string(), activity_type))
            .copied()
            .unwrap_or_default()
    }

    /// Every charity with a baseline for this activity type.
    pub fn charities_for(
        &self,
        activity_type: ActivityType,
    ) -> impl Iterator<Item = (&str, BaselineEntry)> + '_ {
        self.charities
            .iter()
            .filter(move |((_, ty), _)| *ty == activity_type)
            .map(|((id, _), entry)| (id.as_str(), *entry))
    }

    /// Baseline for a charity, zero if absent.
    pub fn charity(&self, charity_id: &str, activity_type: ActivityType) -> BaselineEntry {
        self.charities
            .get(&(charity_id.to_string(), activity_type))
            .copied()
            .unwrap_or_default()
    }
}
