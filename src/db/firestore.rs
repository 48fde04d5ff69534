// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Leaderboard cache entries (TTL-stamped, opaque payloads)
//! - Local join records (one per participant, never expire)

use crate::db::{collections, DurableStore};
use crate::error::AppError;
use crate::models::{CacheEntry, LocalJoinRecord};
use firestore::errors::FirestoreError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns an error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Cache Operations ────────────────────────────────────────

    /// Get a cache entry by key.
    pub async fn get_cached(&self, key: &str) -> Result<Option<CacheEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LEADERBOARD_CACHE)
            .obj()
            .one(key)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a cache entry.
    pub async fn set_cached(&self, entry: &CacheEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::LEADERBOARD_CACHE)
            .document_id(&entry.key)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a cache entry.
    pub async fn delete_cached(&self, key: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::LEADERBOARD_CACHE)
            .document_id(key)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Local Join Operations ───────────────────────────────────

    /// List every local join record.
    pub async fn local_joins(&self) -> Result<Vec<LocalJoinRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::LOCAL_JOINS)
            .order_by([("joined_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a join record if none exists for the participant.
    ///
    /// The write is create-only, so the first join time wins even when two
    /// joins race; the loser gets `Ok(false)`.
    pub async fn create_local_join(&self, record: &LocalJoinRecord) -> Result<bool, AppError> {
        let doc_id = urlencoding::encode(&record.participant_id).into_owned();

        let result: Result<LocalJoinRecord, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::LOCAL_JOINS)
            .document_id(&doc_id)
            .object(record)
            .execute()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(participant_id = %record.participant_id, "Local join stored");
                Ok(true)
            }
            Err(FirestoreError::DataConflictError(_)) => {
                tracing::debug!(
                    participant_id = %record.participant_id,
                    "Local join already recorded"
                );
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

impl DurableStore for FirestoreDb {
    fn get_cache_entry<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, AppError>> {
        self.get_cached(key).boxed()
    }

    fn set_cache_entry<'a>(&'a self, entry: &'a CacheEntry) -> BoxFuture<'a, Result<(), AppError>> {
        self.set_cached(entry).boxed()
    }

    fn delete_cache_entry<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), AppError>> {
        self.delete_cached(key).boxed()
    }

    fn list_local_joins(&self) -> BoxFuture<'_, Result<Vec<LocalJoinRecord>, AppError>> {
        self.local_joins().boxed()
    }

    fn insert_local_join<'a>(
        &'a self,
        record: &'a LocalJoinRecord,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        self.create_local_join(record).boxed()
    }
}
