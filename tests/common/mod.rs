// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use season_leaderboard::config::Config;
use season_leaderboard::db::{DurableStore, FirestoreDb, MemoryStore};
use season_leaderboard::error::AppError;
use season_leaderboard::middleware::auth::create_jwt;
use season_leaderboard::models::{ActivityRecord, CacheEntry, LocalJoinRecord};
use season_leaderboard::routes::create_router;
use season_leaderboard::services::{
    ActivityFilter, CacheService, EventGateway, EventTransport, GatewayError, LeaderboardService,
    ParticipantRegistry, RefreshSettings, RelayMessage, Season,
};
use season_leaderboard::time_utils::{parse_rfc3339_secs, Clock};
use season_leaderboard::AppState;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Fixtures ────────────────────────────────────────────────

/// Season used by the integration tests.
///
/// Official roster: p1 (supports alpha) and p2. Baselines: p1 has 10 km
/// of running; alpha has 2 km of running.
pub const SEASON_JSON: &str = r#"{
    "season_id": "spring-2026",
    "baseline_version": 1,
    "starts_at": "2026-03-01T00:00:00Z",
    "ends_at": "2026-05-31T23:59:59Z",
    "roster": [
        {"id": "p1", "display_name": "Pat One", "avatar": null, "charity": "alpha"},
        {"id": "p2", "display_name": "Pat Two", "avatar": null, "charity": null}
    ],
    "charities": [
        {"id": "alpha", "name": "Alpha Trails", "payment_destination": "alpha@example.com"},
        {"id": "beta", "name": "Beta Parks", "payment_destination": "beta@example.com"}
    ],
    "participant_baseline": [
        {"key": "p1", "activity_type": "running", "distance_km": 10.0, "count": 2}
    ],
    "charity_baseline": [
        {"key": "alpha", "activity_type": "running", "distance_km": 2.0, "count": 1}
    ]
}"#;

/// Unix seconds for an RFC3339 timestamp.
#[allow(dead_code)]
pub fn ts(raw: &str) -> i64 {
    parse_rfc3339_secs(raw).expect("valid timestamp")
}

/// Default "now" for tests, mid-season.
#[allow(dead_code)]
pub fn mid_season() -> i64 {
    ts("2026-04-01T00:00:00Z")
}

/// Build a workout record as a relay would deliver it.
#[allow(dead_code)]
pub fn workout(id: &str, owner: &str, label: &str, km: f64, charity: Option<&str>) -> ActivityRecord {
    ActivityRecord {
        id: id.to_string(),
        owner: owner.to_string(),
        label: label.to_string(),
        distance: Some(km.to_string()),
        unit: Some("km".to_string()),
        charity: charity.map(String::from),
        created_at: ts("2026-03-15T12:00:00Z"),
    }
}

/// Session token for a participant.
#[allow(dead_code)]
pub fn token_for(participant_id: &str) -> String {
    create_jwt(participant_id, &Config::default().jwt_signing_key).expect("jwt")
}

// ─── Test Doubles ────────────────────────────────────────────

/// Clock moved by hand.
pub struct ManualClock(AtomicI64);

#[allow(dead_code)]
impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Transport serving whatever records have been published to it.
#[derive(Default)]
pub struct ScriptedTransport {
    records: Mutex<Vec<ActivityRecord>>,
    offline: AtomicBool,
    delay_ms: AtomicUsize,
    subscriptions: AtomicUsize,
    filters: Mutex<Vec<ActivityFilter>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn publish(&self, record: ActivityRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay before the first record is delivered.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    /// Number of subscriptions opened so far.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn last_filter(&self) -> Option<ActivityFilter> {
        self.filters.lock().unwrap().last().cloned()
    }
}

impl EventTransport for ScriptedTransport {
    fn subscribe<'a>(
        &'a self,
        filter: &'a ActivityFilter,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<RelayMessage>, GatewayError>> {
        async move {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            self.filters.lock().unwrap().push(filter.clone());
            if self.offline.load(Ordering::SeqCst) {
                return Err(GatewayError::NetworkUnavailable("offline".to_string()));
            }

            let records = self.records.lock().unwrap().clone();
            let delay = Duration::from_millis(self.delay_ms.load(Ordering::SeqCst) as u64);
            let (tx, rx) = mpsc::channel(records.len() + 1);
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                for record in records {
                    if tx.send(RelayMessage::Record(record)).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(RelayMessage::EndOfStoredEvents).await;
            });
            Ok(rx)
        }
        .boxed()
    }
}

/// Memory store that counts calls and can fail writes.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DurableStore for CountingStore {
    fn get_cache_entry<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, AppError>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_cache_entry(key)
    }

    fn set_cache_entry<'a>(&'a self, entry: &'a CacheEntry) -> BoxFuture<'a, Result<(), AppError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return async { Err(AppError::Database("write rejected".to_string())) }.boxed();
        }
        self.inner.set_cache_entry(entry)
    }

    fn delete_cache_entry<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), AppError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_cache_entry(key)
    }

    fn list_local_joins(&self) -> BoxFuture<'_, Result<Vec<LocalJoinRecord>, AppError>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_local_joins()
    }

    fn insert_local_join<'a>(
        &'a self,
        record: &'a LocalJoinRecord,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_local_join(record)
    }
}

// ─── Harness ─────────────────────────────────────────────────

/// Fully wired service over test doubles.
#[allow(dead_code)]
pub struct TestHarness {
    pub service: LeaderboardService,
    pub cache: Arc<CacheService>,
    pub store: Arc<CountingStore>,
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<ManualClock>,
}

/// Build a harness. Must run inside a Tokio runtime.
#[allow(dead_code)]
pub fn harness() -> TestHarness {
    let config = Config::default();
    let season = Arc::new(Season::load_from_json(SEASON_JSON).expect("season fixture"));
    let store = Arc::new(CountingStore::default());
    let transport = Arc::new(ScriptedTransport::default());
    let clock = Arc::new(ManualClock::new(mid_season()));

    let cache = Arc::new(CacheService::start(
        store.clone(),
        clock.clone(),
        season.baseline.version(),
    ));
    let registry = ParticipantRegistry::new(season.roster.clone(), store.clone(), clock.clone());
    let gateway = EventGateway::new(
        transport.clone(),
        config.workout_event_kind,
        config.fetch_result_limit,
    );
    let service = LeaderboardService::new(
        season,
        registry,
        gateway,
        cache.clone(),
        clock.clone(),
        RefreshSettings {
            fetch_timeout: Duration::from_secs(2),
            ttl_secs: config.cache_ttl_secs,
        },
    );

    TestHarness {
        service,
        cache,
        store,
        transport,
        clock,
    }
}

/// Create a test app over the harness.
/// Returns the router, the shared state, and the harness.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, TestHarness) {
    let harness = harness();
    let state = Arc::new(AppState {
        config: Config::default(),
        leaderboards: harness.service.clone(),
    });

    (create_router(state.clone()), state, harness)
}
