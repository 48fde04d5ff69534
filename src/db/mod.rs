//! Database layer (Firestore, or an in-process store for development).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{CacheEntry, LocalJoinRecord};
use futures_util::future::BoxFuture;

/// Collection names as constants.
pub mod collections {
    /// Durable leaderboard cache (keyed by cache key)
    pub const LEADERBOARD_CACHE: &str = "leaderboard_cache";
    /// Local join records (keyed by participant id)
    pub const LOCAL_JOINS: &str = "local_joins";
}

/// Durable key-value storage used by the cache and the registry.
///
/// Methods return boxed futures so the store can live behind
/// `Arc<dyn DurableStore>`.
pub trait DurableStore: Send + Sync {
    /// Fetch a cache entry, regardless of expiry.
    fn get_cache_entry<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, AppError>>;

    /// Create or replace a cache entry.
    fn set_cache_entry<'a>(&'a self, entry: &'a CacheEntry) -> BoxFuture<'a, Result<(), AppError>>;

    /// Remove a cache entry. Removing a missing entry is not an error.
    fn delete_cache_entry<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), AppError>>;

    /// All local join records.
    fn list_local_joins(&self) -> BoxFuture<'_, Result<Vec<LocalJoinRecord>, AppError>>;

    /// Store a join record unless one already exists for the participant.
    ///
    /// Returns `true` if the record was created.
    fn insert_local_join<'a>(
        &'a self,
        record: &'a LocalJoinRecord,
    ) -> BoxFuture<'a, Result<bool, AppError>>;
}
