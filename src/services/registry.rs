// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Participant registry: official roster plus opt-in local joiners.
//!
//! Local joins are persisted in the durable store and mirrored in memory
//! so memory-only refreshes can resolve participants without I/O. A
//! local join is only ever visible to its own owner.

use crate::db::DurableStore;
use crate::error::AppError;
use crate::models::{LocalJoinRecord, Profile, Registration};
use crate::services::Roster;
use crate::time_utils::Clock;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct ParticipantRegistry {
    roster: Arc<Roster>,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    /// In-memory mirror of the durable join records
    joins: Arc<DashMap<String, LocalJoinRecord>>,
}

impl ParticipantRegistry {
    pub fn new(roster: Arc<Roster>, store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            roster,
            store,
            clock,
            joins: Arc::new(DashMap::new()),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Reload the join mirror from the durable store.
    ///
    /// On failure the existing mirror is kept and the error returned.
    pub async fn load(&self) -> Result<usize, AppError> {
        let records = self.store.list_local_joins().await?;
        let count = records.len();
        for record in records {
            self.joins.insert(record.participant_id.clone(), record);
        }
        tracing::debug!(count, "Local joins loaded");
        Ok(count)
    }

    /// Official roster, plus the viewer when they hold a local join.
    ///
    /// Other participants' local joins are never included.
    pub fn list_participants(&self, viewer_id: Option<&str>) -> Vec<String> {
        let mut ids = self.roster.official_ids().to_vec();
        if let Some(viewer) = viewer_id {
            if !self.roster.is_official(viewer) && self.joins.contains_key(viewer) {
                ids.push(viewer.to_string());
            }
        }
        ids
    }

    /// The viewer's own local join, as the set the builder expects.
    pub fn visible_local_joins(&self, viewer_id: Option<&str>) -> HashSet<String> {
        viewer_id
            .filter(|viewer| self.joins.contains_key(*viewer))
            .map(|viewer| HashSet::from([viewer.to_string()]))
            .unwrap_or_default()
    }

    /// Opt a participant in. Repeat calls are a no-op.
    pub async fn join(&self, participant_id: &str) -> Result<Registration, AppError> {
        if self.roster.is_official(participant_id) {
            return Ok(Registration::Official);
        }
        if self.joins.contains_key(participant_id) {
            return Ok(Registration::LocalOnly);
        }

        let record = LocalJoinRecord {
            participant_id: participant_id.to_string(),
            joined_at: self.clock.now(),
        };
        let created = self.store.insert_local_join(&record).await?;
        if created {
            tracing::info!(participant_id, "Participant joined locally");
        }
        self.joins
            .entry(participant_id.to_string())
            .or_insert(record);

        Ok(Registration::LocalOnly)
    }

    pub fn is_registered(&self, participant_id: &str) -> Registration {
        if self.roster.is_official(participant_id) {
            Registration::Official
        } else if self.joins.contains_key(participant_id) {
            Registration::LocalOnly
        } else {
            Registration::Absent
        }
    }

    pub fn profile(&self, participant_id: &str) -> Profile {
        self.roster.profile(participant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::SeasonFile;
    use crate::services::Season;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    fn registry_with(store: Arc<MemoryStore>) -> ParticipantRegistry {
        let file: SeasonFile = serde_json::from_value(serde_json::json!({
            "season_id": "s1",
            "baseline_version": 1,
            "starts_at": "2026-03-01T00:00:00Z",
            "ends_at": "2026-05-31T00:00:00Z",
            "roster": [
                {"id": "official-1", "display_name": "One", "avatar": null, "charity": null},
                {"id": "official-2", "display_name": "Two", "avatar": null, "charity": null}
            ]
        }))
        .unwrap();
        let season = Season::from_file(file).unwrap();
        ParticipantRegistry::new(season.roster, store, Arc::new(FixedClock(42)))
    }

    #[tokio::test]
    async fn test_local_join_visible_only_to_owner() {
        let registry = registry_with(Arc::new(MemoryStore::new()));
        registry.join("local-a").await.unwrap();

        assert_eq!(
            registry.list_participants(Some("local-a")),
            vec!["official-1", "official-2", "local-a"]
        );
        assert_eq!(
            registry.list_participants(Some("someone-else")),
            vec!["official-1", "official-2"]
        );
        assert_eq!(
            registry.list_participants(None),
            vec!["official-1", "official-2"]
        );
        assert!(registry.visible_local_joins(Some("someone-else")).is_empty());
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(store.clone());

        assert_eq!(registry.join("local-a").await.unwrap(), Registration::LocalOnly);
        assert_eq!(registry.join("local-a").await.unwrap(), Registration::LocalOnly);

        let joins = store.list_local_joins().await.unwrap();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].joined_at, 42);
    }

    #[tokio::test]
    async fn test_official_join_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let registry = registry_with(store.clone());

        assert_eq!(
            registry.join("official-1").await.unwrap(),
            Registration::Official
        );
        assert!(store.list_local_joins().await.unwrap().is_empty());
        assert_eq!(
            registry.list_participants(Some("official-1")),
            vec!["official-1", "official-2"]
        );
    }

    #[tokio::test]
    async fn test_is_registered() {
        let registry = registry_with(Arc::new(MemoryStore::new()));
        registry.join("local-a").await.unwrap();

        assert_eq!(registry.is_registered("official-2"), Registration::Official);
        assert_eq!(registry.is_registered("local-a"), Registration::LocalOnly);
        assert_eq!(registry.is_registered("nobody"), Registration::Absent);
    }

    #[tokio::test]
    async fn test_load_restores_joins_from_store() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_local_join(&LocalJoinRecord {
                participant_id: "local-b".to_string(),
                joined_at: 7,
            })
            .await
            .unwrap();

        let registry = registry_with(store);
        assert_eq!(registry.is_registered("local-b"), Registration::Absent);

        assert_eq!(registry.load().await.unwrap(), 1);
        assert_eq!(registry.is_registered("local-b"), Registration::LocalOnly);
    }
}
