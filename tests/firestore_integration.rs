// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Set FIRESTORE_EMULATOR_HOST to run them; otherwise they are skipped.
//!
//! The emulator provides a clean state for each test run.

use season_leaderboard::db::{DurableStore, FirestoreDb};
use season_leaderboard::models::{CacheEntry, LocalJoinRecord};
use season_leaderboard::services::{CacheKey, Scope};

mod common;
use common::test_db;

/// Generate a unique participant id for test isolation.
fn unique_participant_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("npub-test-{}", nanos)
}

fn entry(key: &str, payload: &str) -> CacheEntry {
    CacheEntry {
        key: key.to_string(),
        payload: payload.to_string(),
        stored_at: 1_000,
        expires_at: 1_300,
        baseline_version: 3,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_cache_entry_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let participant_id = unique_participant_id();
    let key = CacheKey::new(Some(&participant_id), Scope::All).storage_key();

    assert!(db.get_cache_entry(&key).await.unwrap().is_none());

    db.set_cache_entry(&entry(&key, "{\"a\":1}")).await.unwrap();
    let fetched = db.get_cache_entry(&key).await.unwrap().unwrap();
    assert_eq!(fetched, entry(&key, "{\"a\":1}"));

    // Overwrite replaces the payload
    db.set_cache_entry(&entry(&key, "{\"a\":2}")).await.unwrap();
    let fetched = db.get_cache_entry(&key).await.unwrap().unwrap();
    assert_eq!(fetched.payload, "{\"a\":2}");

    db.delete_cache_entry(&key).await.unwrap();
    assert!(db.get_cache_entry(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_missing_cache_entry_is_ok() {
    require_emulator!();

    let db = test_db().await;
    let key = CacheKey::new(Some(&unique_participant_id()), Scope::All).storage_key();
    db.delete_cache_entry(&key).await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// LOCAL JOIN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_local_join_is_created_once() {
    require_emulator!();

    let db = test_db().await;
    let participant_id = unique_participant_id();

    let first = LocalJoinRecord {
        participant_id: participant_id.clone(),
        joined_at: 100,
    };
    assert!(db.insert_local_join(&first).await.unwrap());

    let second = LocalJoinRecord {
        participant_id: participant_id.clone(),
        joined_at: 200,
    };
    assert!(!db.insert_local_join(&second).await.unwrap());

    let joins = db.list_local_joins().await.unwrap();
    let stored: Vec<_> = joins
        .iter()
        .filter(|j| j.participant_id == participant_id)
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].joined_at, 100);
}

#[tokio::test]
async fn test_concurrent_local_joins_keep_first_record() {
    require_emulator!();

    let db = test_db().await;
    let participant_id = unique_participant_id();

    let early = LocalJoinRecord {
        participant_id: participant_id.clone(),
        joined_at: 100,
    };
    let late = LocalJoinRecord {
        participant_id: participant_id.clone(),
        joined_at: 200,
    };
    let (a, b) = tokio::join!(db.insert_local_join(&early), db.insert_local_join(&late));
    let (a, b) = (a.unwrap(), b.unwrap());

    // Exactly one create succeeds and its record is never overwritten
    assert!(a ^ b);
    let winner = if a { 100 } else { 200 };

    let joins = db.list_local_joins().await.unwrap();
    let stored: Vec<_> = joins
        .iter()
        .filter(|j| j.participant_id == participant_id)
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].joined_at, winner);
}

// ═══════════════════════════════════════════════════════════════════════════
// OFFLINE MODE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_client_reports_errors() {
    let db = FirestoreDb::new_mock();

    assert!(db.get_cache_entry("leaderboard:anonymous:all").await.is_err());
    assert!(db.list_local_joins().await.is_err());
}
