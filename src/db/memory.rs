// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process durable store.
//!
//! Used for local development (`STORE_BACKEND=memory`) and tests. Data
//! lives only as long as the process.

use crate::db::DurableStore;
use crate::error::AppError;
use crate::models::{CacheEntry, LocalJoinRecord};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryStore {
    cache: Arc<DashMap<String, CacheEntry>>,
    joins: Arc<DashMap<String, LocalJoinRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache entries currently stored.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl DurableStore for MemoryStore {
    fn get_cache_entry<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, AppError>> {
        let entry = self.cache.get(key).map(|e| e.value().clone());
        async move { Ok(entry) }.boxed()
    }

    fn set_cache_entry<'a>(&'a self, entry: &'a CacheEntry) -> BoxFuture<'a, Result<(), AppError>> {
        self.cache.insert(entry.key.clone(), entry.clone());
        async { Ok(()) }.boxed()
    }

    fn delete_cache_entry<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), AppError>> {
        self.cache.remove(key);
        async { Ok(()) }.boxed()
    }

    fn list_local_joins(&self) -> BoxFuture<'_, Result<Vec<LocalJoinRecord>, AppError>> {
        let mut records: Vec<LocalJoinRecord> =
            self.joins.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        async move { Ok(records) }.boxed()
    }

    fn insert_local_join<'a>(
        &'a self,
        record: &'a LocalJoinRecord,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        let created = match self.joins.entry(record.participant_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                true
            }
        };
        async move { Ok(created) }.boxed()
    }
}
