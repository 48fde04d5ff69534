// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event source gateway.
//!
//! Fetches workout records from the event network within a wall-clock
//! bound. The network has no delivery guarantee, so a fetch returns
//! whatever unique records arrived before the end-of-stored-events signal
//! or the timeout, whichever comes first. It never fails: an unreachable
//! network yields an empty list and the leaderboards fall back to
//! baseline totals.

use crate::models::{ActivityRecord, TimeWindow};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Subscription filter sent to the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityFilter {
    pub authors: Vec<String>,
    pub kinds: Vec<u32>,
    pub since: i64,
    pub until: i64,
    pub limit: usize,
}

/// One item on a subscription stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Record(ActivityRecord),
    /// No more stored records for now
    EndOfStoredEvents,
}

/// Transport that opens subscriptions on the event network.
pub trait EventTransport: Send + Sync {
    /// Open a subscription. Dropping the receiver cancels it.
    fn subscribe<'a>(
        &'a self,
        filter: &'a ActivityFilter,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<RelayMessage>, GatewayError>>;
}

/// Errors from the transport. None of them escape `EventGateway::fetch`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Event network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Relay protocol error: {0}")]
    Protocol(String),
}

/// Why a fetch stopped collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    EndOfStoredEvents,
    StreamClosed,
    LimitReached,
    TimedOut,
}

#[derive(Clone)]
pub struct EventGateway {
    transport: Arc<dyn EventTransport>,
    workout_kind: u32,
    result_limit: usize,
}

impl EventGateway {
    pub fn new(transport: Arc<dyn EventTransport>, workout_kind: u32, result_limit: usize) -> Self {
        Self {
            transport,
            workout_kind,
            result_limit,
        }
    }

    /// Fetch deduplicated records for the given participants and window.
    ///
    /// No retry happens here; callers decide whether to fetch again.
    pub async fn fetch(
        &self,
        participant_ids: &[String],
        window: TimeWindow,
        timeout: Duration,
    ) -> Vec<ActivityRecord> {
        if participant_ids.is_empty() || window.until < window.since {
            return Vec::new();
        }

        let filter = ActivityFilter {
            authors: participant_ids.to_vec(),
            kinds: vec![self.workout_kind],
            since: window.since,
            until: window.until,
            limit: self.result_limit,
        };
        let deadline = Instant::now() + timeout;

        let mut rx = match tokio::time::timeout_at(deadline, self.transport.subscribe(&filter)).await
        {
            Ok(Ok(rx)) => rx,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Event network unavailable, using baseline totals");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out opening subscription, using baseline totals"
                );
                return Vec::new();
            }
        };

        let authors: HashSet<&str> = participant_ids.iter().map(String::as_str).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut duplicates = 0usize;
        let mut rejected = 0usize;

        let outcome = loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(RelayMessage::Record(record))) => {
                    // Relays are not trusted to honor the filter
                    if !authors.contains(record.owner.as_str()) || !window.contains(record.created_at)
                    {
                        rejected += 1;
                        continue;
                    }
                    if !seen.insert(record.id.clone()) {
                        duplicates += 1;
                        continue;
                    }
                    records.push(record);
                    if records.len() >= self.result_limit {
                        break FetchOutcome::LimitReached;
                    }
                }
                Ok(Some(RelayMessage::EndOfStoredEvents)) => break FetchOutcome::EndOfStoredEvents,
                Ok(None) => break FetchOutcome::StreamClosed,
                Err(_) => break FetchOutcome::TimedOut,
            }
        };

        if outcome == FetchOutcome::TimedOut {
            tracing::info!(
                collected = records.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Fetch timed out, using partial results"
            );
        } else {
            tracing::debug!(
                collected = records.len(),
                outcome = ?outcome,
                "Fetch complete"
            );
        }
        if duplicates > 0 || rejected > 0 {
            tracing::debug!(duplicates, rejected, "Dropped records during fetch");
        }

        records
    }
}
