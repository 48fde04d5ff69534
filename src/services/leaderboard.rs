// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh orchestration: the cache-or-compute decision.
//!
//! Entry points never fail. Network trouble degrades to baseline totals
//! and cache trouble degrades to recomputation.

use crate::error::AppError;
use crate::models::{ActivityType, AllLeaderboards, Leaderboard, Registration, TimeWindow};
use crate::services::cache::{subject_for, CacheKey, CacheService, ResidentRecords, Scope};
use crate::services::classifier;
use crate::services::{BuildRequest, EventGateway, LeaderboardBuilder, ParticipantRegistry, Season};
use crate::time_utils::Clock;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

/// Per-subject compute locks.
///
/// Entries live only while a rebuild holds or awaits them.
pub type ComputeLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Held compute lock for one subject.
///
/// On release, a lock nobody else is waiting on is evicted together with
/// the subject's built boards, so both maps stay bounded by the rebuilds
/// in flight.
struct SubjectGuard<'a> {
    service: &'a LeaderboardService,
    subject: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SubjectGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let evicted = self
            .service
            .compute_locks
            .remove_if(&self.subject, |_, lock| Arc::strong_count(lock) == 1);
        if evicted.is_some() {
            self.service.cache.memory().invalidate_subject(&self.subject);
        }
    }
}

/// Tunables for the refresh path.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    /// Wall-clock bound on one network fetch
    pub fetch_timeout: Duration,
    /// Lifetime of durable cache entries
    pub ttl_secs: u64,
}

/// Inputs shared by the three per-type builds.
struct BuildContext {
    season: Arc<Season>,
    participant_ids: Vec<String>,
    records: Arc<ResidentRecords>,
    local_joins: HashSet<String>,
    viewer_id: Option<String>,
    computed_at: i64,
    ttl_secs: u64,
}

impl BuildContext {
    fn build(&self, activity_type: ActivityType) -> Leaderboard {
        let builder = LeaderboardBuilder::new(&self.season.baseline, &self.season.roster);
        builder.build(&BuildRequest {
            activity_type,
            participant_ids: &self.participant_ids,
            workouts: &self.records.workouts,
            local_joins: &self.local_joins,
            official_ids: self.season.roster.official_set(),
            viewer_id: self.viewer_id.as_deref(),
            computed_at: self.computed_at,
            ttl_secs: self.ttl_secs,
        })
    }
}

/// Top-level leaderboard service.
///
/// This service encapsulates:
/// - Durable cache lookups with TTL
/// - One shared, timeout-bound network fetch per rebuild
/// - Concurrent per-type builds
/// - Fire-and-forget write-through
/// - Per-subject locking so concurrent identical requests share one rebuild
#[derive(Clone)]
pub struct LeaderboardService {
    season: Arc<Season>,
    registry: ParticipantRegistry,
    gateway: EventGateway,
    cache: Arc<CacheService>,
    clock: Arc<dyn Clock>,
    settings: RefreshSettings,
    compute_locks: ComputeLocks,
}

impl LeaderboardService {
    pub fn new(
        season: Arc<Season>,
        registry: ParticipantRegistry,
        gateway: EventGateway,
        cache: Arc<CacheService>,
        clock: Arc<dyn Clock>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            season,
            registry,
            gateway,
            cache,
            clock,
            settings,
            compute_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn season(&self) -> &Season {
        &self.season
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    // ─── Entry Points ────────────────────────────────────────────────────────

    /// Leaderboard for one activity type.
    ///
    /// A fresh durable entry is returned without touching the network
    /// unless `force_refresh` is set.
    pub async fn get_leaderboard(
        &self,
        activity_type: ActivityType,
        viewer_id: Option<&str>,
        force_refresh: bool,
    ) -> Leaderboard {
        if !force_refresh {
            let key = CacheKey::new(viewer_id, Scope::Single(activity_type));
            if let Some(board) = self.cache.get::<Leaderboard>(&key).await {
                return board;
            }
        }

        let boards = self.refresh(viewer_id).await;
        boards.get(activity_type).clone()
    }

    /// All three leaderboards from one shared fetch.
    pub async fn get_all_leaderboards(
        &self,
        viewer_id: Option<&str>,
        force_refresh: bool,
    ) -> AllLeaderboards {
        if !force_refresh {
            let key = CacheKey::new(viewer_id, Scope::All);
            if let Some(boards) = self.cache.get::<AllLeaderboards>(&key).await {
                return boards;
            }
        }

        let boards = self.refresh(viewer_id).await;
        (*boards).clone()
    }

    /// Rebuild one leaderboard from resident records, without durable I/O.
    pub async fn get_leaderboard_from_memory(
        &self,
        activity_type: ActivityType,
        viewer_id: Option<&str>,
    ) -> Leaderboard {
        let Some(records) = self.cache.memory().resident().await else {
            tracing::info!("No resident records, using standard path");
            return self.get_leaderboard(activity_type, viewer_id, false).await;
        };

        let context = self.context(viewer_id, records);
        context.build(activity_type)
    }

    /// Rebuild all three leaderboards from resident records, without durable I/O.
    pub async fn get_all_leaderboards_from_memory(
        &self,
        viewer_id: Option<&str>,
    ) -> AllLeaderboards {
        let Some(records) = self.cache.memory().resident().await else {
            tracing::info!("No resident records, using standard path");
            return self.get_all_leaderboards(viewer_id, false).await;
        };

        let context = self.context(viewer_id, records);
        build_all(Arc::new(context)).await
    }

    /// Opt a participant in and drop their cached views.
    pub async fn join(&self, participant_id: &str) -> Result<Registration, AppError> {
        let registration = self.registry.join(participant_id).await?;

        // Wait out any rebuild for this subject so its write-through is
        // queued ahead of the invalidation
        let _guard = self.lock_subject(&subject_for(Some(participant_id))).await;
        self.cache.invalidate(Some(participant_id)).await;

        Ok(registration)
    }

    pub fn is_registered(&self, participant_id: &str) -> Registration {
        self.registry.is_registered(participant_id)
    }

    // ─── Rebuild ─────────────────────────────────────────────────────────────

    fn compute_lock(&self, subject: &str) -> Arc<Mutex<()>> {
        self.compute_locks
            .entry(subject.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn lock_subject(&self, subject: &str) -> SubjectGuard<'_> {
        let guard = self.compute_lock(subject).lock_owned().await;
        SubjectGuard {
            service: self,
            subject: subject.to_string(),
            guard: Some(guard),
        }
    }

    /// Subjects with a rebuild in flight or queued.
    pub fn subjects_in_flight(&self) -> usize {
        self.compute_locks.len()
    }

    fn context(&self, viewer_id: Option<&str>, records: Arc<ResidentRecords>) -> BuildContext {
        BuildContext {
            season: self.season.clone(),
            participant_ids: self.registry.list_participants(viewer_id),
            records,
            local_joins: self.registry.visible_local_joins(viewer_id),
            viewer_id: viewer_id.map(String::from),
            computed_at: self.clock.now(),
            ttl_secs: self.settings.ttl_secs,
        }
    }

    /// Fetch, classify, build, and write through all scopes for a subject.
    async fn refresh(&self, viewer_id: Option<&str>) -> Arc<AllLeaderboards> {
        let subject = subject_for(viewer_id);
        let subject = subject.as_str();
        let started = self.cache.memory().generation();

        // ─────────────────────────────────────────────────────────────
        // STEP 1: Acquire per-subject lock
        // ─────────────────────────────────────────────────────────────
        let _guard = self.lock_subject(subject).await;

        // ─────────────────────────────────────────────────────────────
        // STEP 2: Reuse a rebuild that finished while we waited
        // ─────────────────────────────────────────────────────────────
        if let Some(boards) = self.cache.memory().built_since(subject, started) {
            tracing::debug!(subject, "Reusing concurrent rebuild");
            return boards;
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 3: Resolve participants and fetch once
        // ─────────────────────────────────────────────────────────────
        let timer = Instant::now();
        if let Err(e) = self.registry.load().await {
            tracing::warn!(error = %e, "Failed to reload local joins, using mirror");
        }
        let participant_ids = self.registry.list_participants(viewer_id);

        let now = self.clock.now();
        let window = TimeWindow {
            since: self.season.window.since,
            until: self.season.window.until.min(now),
        };
        let records = self
            .gateway
            .fetch(&participant_ids, window, self.settings.fetch_timeout)
            .await;
        let fetched = records.len();

        // ─────────────────────────────────────────────────────────────
        // STEP 4: Classify and merge into the resident records
        // ─────────────────────────────────────────────────────────────
        let workouts = classifier::classify_all(&records);
        let classified = workouts.len();
        let resident = self.cache.memory().merge_records(workouts, now).await;

        // ─────────────────────────────────────────────────────────────
        // STEP 5: Build all three types concurrently
        // ─────────────────────────────────────────────────────────────
        let context = BuildContext {
            season: self.season.clone(),
            participant_ids,
            records: resident,
            local_joins: self.registry.visible_local_joins(viewer_id),
            viewer_id: viewer_id.map(String::from),
            computed_at: self.clock.now(),
            ttl_secs: self.settings.ttl_secs,
        };
        let computed_at = context.computed_at;
        let participants = context.participant_ids.len();
        let boards = Arc::new(build_all(Arc::new(context)).await);

        // ─────────────────────────────────────────────────────────────
        // STEP 6: Remember and write through without waiting
        // ─────────────────────────────────────────────────────────────
        self.cache.memory().store_built(subject, boards.clone());
        self.write_through(viewer_id, &boards, computed_at);

        tracing::info!(
            subject,
            participants,
            fetched,
            classified,
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Leaderboards rebuilt"
        );

        boards
    }

    fn write_through(&self, viewer_id: Option<&str>, boards: &AllLeaderboards, computed_at: i64) {
        let ttl_secs = self.settings.ttl_secs;
        for activity_type in ActivityType::ALL {
            let key = CacheKey::new(viewer_id, Scope::Single(activity_type));
            self.cache
                .set(&key, boards.get(activity_type), computed_at, ttl_secs);
        }
        self.cache
            .set(&CacheKey::new(viewer_id, Scope::All), boards, computed_at, ttl_secs);
    }
}

/// Run the three builds on the blocking pool.
async fn build_all(context: Arc<BuildContext>) -> AllLeaderboards {
    let [running, walking, cycling] = ActivityType::ALL.map(|activity_type| {
        let context = context.clone();
        tokio::task::spawn_blocking(move || context.build(activity_type))
    });

    AllLeaderboards {
        running: finish_build(running, ActivityType::Running, &context).await,
        walking: finish_build(walking, ActivityType::Walking, &context).await,
        cycling: finish_build(cycling, ActivityType::Cycling, &context).await,
    }
}

async fn finish_build(
    handle: JoinHandle<Leaderboard>,
    activity_type: ActivityType,
    context: &BuildContext,
) -> Leaderboard {
    match handle.await {
        Ok(board) => board,
        Err(e) => {
            tracing::error!(
                activity_type = %activity_type,
                error = %e,
                "Build task failed, rebuilding inline"
            );
            context.build(activity_type)
        }
    }
}
