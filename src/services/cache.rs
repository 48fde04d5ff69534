// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Two-tier leaderboard cache.
//!
//! The durable tier persists serialized leaderboards with an absolute
//! expiry. Reads return `None` on any kind of miss; writes go through a
//! background writer task and never fail the caller.
//!
//! The memory tier lives for the process lifetime. It holds the resident
//! record cache (every classified workout observed so far) and the most
//! recently built boards per subject, so pull-to-refresh can rebuild
//! without touching the durable store.

use crate::db::DurableStore;
use crate::models::{ActivityType, AllLeaderboards, CacheEntry, ClassifiedWorkout};
use crate::time_utils::Clock;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Subject used for callers without an identity.
pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Prefix of every signed-in subject, so no viewer id can name the
/// anonymous subject.
const VIEWER_SUBJECT_PREFIX: &str = "user:";

/// What a cached value covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Single(ActivityType),
    All,
}

impl Scope {
    /// Every scope stored for one subject.
    pub const EVERY: [Scope; 4] = [
        Scope::Single(ActivityType::Running),
        Scope::Single(ActivityType::Walking),
        Scope::Single(ActivityType::Cycling),
        Scope::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Single(activity_type) => activity_type.as_str(),
            Scope::All => "all",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite cache key: (subject, scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject: String,
    scope: Scope,
}

impl CacheKey {
    pub fn new(viewer_id: Option<&str>, scope: Scope) -> Self {
        Self {
            subject: subject_for(viewer_id),
            scope,
        }
    }

    /// Keys for every scope of one subject.
    pub fn every_scope(viewer_id: Option<&str>) -> impl Iterator<Item = CacheKey> + '_ {
        Scope::EVERY
            .into_iter()
            .map(move |scope| CacheKey::new(viewer_id, scope))
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Key in the durable store: `leaderboard:{subject}:{scope}`.
    pub fn storage_key(&self) -> String {
        format!("leaderboard:{}:{}", self.subject, self.scope)
    }
}

/// Cache subject for an optional viewer: `anonymous` or `user:{id}`.
///
/// The id is URL-encoded, so a subject never contains a bare `:` past
/// its prefix.
pub fn subject_for(viewer_id: Option<&str>) -> String {
    match viewer_id {
        Some(id) => format!("{}{}", VIEWER_SUBJECT_PREFIX, urlencoding::encode(id)),
        None => ANONYMOUS_SUBJECT.to_string(),
    }
}

/// Work for the background writer, processed strictly in order.
#[derive(Debug)]
enum WriteJob {
    Put(CacheEntry),
    Delete(String),
    /// Signalled once every earlier job is done
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Every workout seen so far, deduplicated by record id.
#[derive(Debug, Default)]
pub struct ResidentRecords {
    /// Sorted by record id
    pub workouts: Vec<ClassifiedWorkout>,
    /// Time of the most recent merge (Unix seconds)
    pub fetched_at: i64,
}

/// Boards built on the full path, tagged with a build generation.
#[derive(Debug, Clone)]
pub struct BuiltBoards {
    pub generation: u64,
    pub boards: Arc<AllLeaderboards>,
}

/// Process-lifetime memory tier.
#[derive(Debug, Default)]
pub struct MemoryCache {
    resident: RwLock<Option<Arc<ResidentRecords>>>,
    built: DashMap<String, BuiltBoards>,
    generation: AtomicU64,
}

impl MemoryCache {
    /// Merge freshly classified workouts into the resident record cache.
    ///
    /// Records already resident are kept even when a later fetch misses
    /// them; a record seen again replaces the earlier copy.
    pub async fn merge_records(
        &self,
        fresh: Vec<ClassifiedWorkout>,
        fetched_at: i64,
    ) -> Arc<ResidentRecords> {
        let mut resident = self.resident.write().await;

        let mut merged: BTreeMap<String, ClassifiedWorkout> = resident
            .as_ref()
            .map(|r| {
                r.workouts
                    .iter()
                    .map(|w| (w.record_id.clone(), w.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let before = merged.len();
        for workout in fresh {
            merged.insert(workout.record_id.clone(), workout);
        }
        tracing::debug!(
            resident = merged.len(),
            added = merged.len() - before,
            "Resident records merged"
        );

        let records = Arc::new(ResidentRecords {
            workouts: merged.into_values().collect(),
            fetched_at,
        });
        *resident = Some(records.clone());
        records
    }

    /// Current resident records, if any fetch has completed.
    pub async fn resident(&self) -> Option<Arc<ResidentRecords>> {
        self.resident.read().await.clone()
    }

    /// Latest build generation handed out.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Remember boards built for a subject.
    pub fn store_built(&self, subject: &str, boards: Arc<AllLeaderboards>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.built.insert(
            subject.to_string(),
            BuiltBoards { generation, boards },
        );
        generation
    }

    /// Boards for a subject built after `generation`.
    pub fn built_since(&self, subject: &str, generation: u64) -> Option<Arc<AllLeaderboards>> {
        self.built
            .get(subject)
            .filter(|b| b.generation > generation)
            .map(|b| b.boards.clone())
    }

    /// Subjects with built boards held.
    pub fn built_subjects(&self) -> usize {
        self.built.len()
    }

    pub fn invalidate_subject(&self, subject: &str) {
        self.built.remove(subject);
    }
}

/// Cache service owning both tiers and the durable writer task.
pub struct CacheService {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    baseline_version: u32,
    jobs: mpsc::UnboundedSender<WriteJob>,
    writer: Mutex<Option<JoinHandle<()>>>,
    memory: MemoryCache,
}

impl CacheService {
    /// Create the service and spawn its background writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>, baseline_version: u32) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(store.clone(), rx));

        Self {
            store,
            clock,
            baseline_version,
            jobs,
            writer: Mutex::new(Some(writer)),
            memory: MemoryCache::default(),
        }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn baseline_version(&self) -> u32 {
        self.baseline_version
    }

    // ─── Durable Tier ────────────────────────────────────────────────────────

    /// Read a fresh durable entry.
    ///
    /// Absent, expired, unreadable, corrupt, and version-mismatched entries
    /// are all misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let storage_key = key.storage_key();

        let entry = match self.store.get_cache_entry(&storage_key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::debug!(key = %storage_key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let now = self.clock.now();
        if !entry.is_fresh(now) {
            tracing::debug!(key = %storage_key, expires_at = entry.expires_at, now, "Cache entry expired");
            return None;
        }
        if entry.baseline_version != self.baseline_version {
            tracing::debug!(
                key = %storage_key,
                cached = entry.baseline_version,
                current = self.baseline_version,
                "Cache entry from another baseline"
            );
            return None;
        }

        match serde_json::from_str(&entry.payload) {
            Ok(value) => {
                tracing::debug!(key = %storage_key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Corrupt cache payload, treating as miss");
                None
            }
        }
    }

    /// Queue a write-through. Returns without waiting for the store.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T, computed_at: i64, ttl_secs: u64) {
        let storage_key = key.storage_key();
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %storage_key, error = %e, "Failed to serialize cache payload");
                return;
            }
        };

        let entry = CacheEntry {
            key: storage_key,
            payload,
            stored_at: computed_at,
            expires_at: computed_at.saturating_add(ttl_secs.min(i64::MAX as u64) as i64),
            baseline_version: self.baseline_version,
        };
        self.submit(WriteJob::Put(entry));
    }

    /// Drop every durable and memory entry for a subject.
    ///
    /// Waits for the deletes so a later read cannot observe the old entries.
    pub async fn invalidate(&self, viewer_id: Option<&str>) {
        for key in CacheKey::every_scope(viewer_id) {
            self.submit(WriteJob::Delete(key.storage_key()));
        }
        self.memory.invalidate_subject(&subject_for(viewer_id));
        self.flush().await;
    }

    /// Wait until every previously queued write has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.submit(WriteJob::Flush(done)) {
            let _ = wait.await;
        }
    }

    /// Finish queued writes and stop the writer task.
    pub async fn shutdown(&self) {
        let handle = self.writer.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        self.submit(WriteJob::Shutdown);
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Cache writer task failed");
        }
    }

    fn submit(&self, job: WriteJob) -> bool {
        if self.jobs.send(job).is_err() {
            tracing::warn!("Cache writer stopped, dropping cache job");
            return false;
        }
        true
    }
}

/// Background writer loop. Its failures are logged, never returned.
async fn run_writer(store: Arc<dyn DurableStore>, mut jobs: mpsc::UnboundedReceiver<WriteJob>) {
    let mut written = 0usize;

    while let Some(job) = jobs.recv().await {
        match job {
            WriteJob::Put(entry) => match store.set_cache_entry(&entry).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!(key = %entry.key, error = %e, "Cache write failed");
                }
            },
            WriteJob::Delete(key) => {
                if let Err(e) = store.delete_cache_entry(&key).await {
                    tracing::warn!(key = %key, error = %e, "Cache invalidation failed");
                }
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
            WriteJob::Shutdown => break,
        }
    }

    tracing::debug!(written, "Cache writer stopped");
}
