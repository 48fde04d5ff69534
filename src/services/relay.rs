// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relay pool: HTTP transport for event network subscriptions.
//!
//! Each relay accepts `POST {relay}/req` with a `["REQ", id, filter]`
//! body and streams newline-delimited frames back:
//! - `["EVENT", id, event]`
//! - `["EOSE", id]`
//! - `["CLOSED", id, reason]`
//! - `["NOTICE", message]`
//!
//! Relays are read concurrently. Records from every relay are forwarded
//! to one channel, and a single end-of-stored-events signal is sent once
//! every connected relay has finished.

use crate::models::ActivityRecord;
use crate::services::gateway::{ActivityFilter, EventTransport, GatewayError, RelayMessage};
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const RELAY_CHANNEL_CAPACITY: usize = 512;

/// Raw event as published on a relay.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
}

impl RawEvent {
    fn tag(&self, name: &str) -> Option<&[String]> {
        self.tags
            .iter()
            .find(|t| t.first().is_some_and(|n| n == name))
            .map(|t| &t[1..])
    }

    /// Map a workout event to an activity record.
    ///
    /// The label comes from the `exercise` tag, falling back to the content.
    pub fn into_record(self) -> ActivityRecord {
        let label = self
            .tag("exercise")
            .and_then(|v| v.first().cloned())
            .unwrap_or_else(|| self.content.clone());
        let distance = self.tag("distance");
        let distance_value = distance.and_then(|v| v.first().cloned());
        let distance_unit = distance.and_then(|v| v.get(1).cloned());
        let charity = self.tag("charity").and_then(|v| v.first().cloned());

        ActivityRecord {
            id: self.id,
            owner: self.pubkey,
            label,
            distance: distance_value,
            unit: distance_unit,
            charity,
            created_at: self.created_at,
        }
    }
}

/// Parsed relay frame.
#[derive(Debug)]
enum Frame {
    Event(RawEvent),
    EndOfStoredEvents,
    Closed(String),
    Notice(String),
}

/// Parse one line of a relay stream. Unknown or malformed frames yield `None`.
fn parse_frame(line: &[u8], subscription_id: &str) -> Option<Frame> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let parts = value.as_array()?;
    let for_us = || parts.get(1).and_then(|v| v.as_str()) == Some(subscription_id);

    match parts.first()?.as_str()? {
        "EVENT" if for_us() => {
            let event: RawEvent = serde_json::from_value(parts.get(2)?.clone()).ok()?;
            Some(Frame::Event(event))
        }
        "EOSE" if for_us() => Some(Frame::EndOfStoredEvents),
        "CLOSED" if for_us() => Some(Frame::Closed(
            parts
                .get(2)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        )),
        "NOTICE" => Some(Frame::Notice(parts.get(1)?.as_str()?.to_string())),
        _ => None,
    }
}

/// Pool of relays queried in parallel.
pub struct RelayPool {
    http: reqwest::Client,
    relays: Vec<String>,
    connect_timeout: Duration,
    next_subscription: AtomicU64,
}

impl RelayPool {
    pub fn new(relays: Vec<String>, connect_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to configure relay client, using defaults");
                reqwest::Client::new()
            });

        Self {
            http,
            relays,
            connect_timeout,
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    async fn open(
        &self,
        filter: &ActivityFilter,
    ) -> Result<mpsc::Receiver<RelayMessage>, GatewayError> {
        if self.relays.is_empty() {
            return Err(GatewayError::NetworkUnavailable(
                "no relays configured".to_string(),
            ));
        }

        let subscription_id = format!(
            "season-{}",
            self.next_subscription.fetch_add(1, Ordering::Relaxed)
        );
        let body = serde_json::json!(["REQ", subscription_id, filter]);

        let attempts = self.relays.iter().map(|relay| {
            let url = format!("{}/req", relay);
            let request = self.http.post(url).json(&body).send();
            async move {
                let result = tokio::time::timeout(self.connect_timeout, request).await;
                (relay.as_str(), result)
            }
        });

        let mut connected = Vec::new();
        for (relay, result) in join_all(attempts).await {
            match result {
                Ok(Ok(response)) if response.status().is_success() => {
                    connected.push((relay.to_string(), response));
                }
                Ok(Ok(response)) => {
                    tracing::warn!(relay, status = %response.status(), "Relay rejected subscription");
                }
                Ok(Err(e)) => {
                    tracing::warn!(relay, error = %e, "Relay connection failed");
                }
                Err(_) => {
                    tracing::warn!(relay, "Relay connection timed out");
                }
            }
        }

        if connected.is_empty() {
            return Err(GatewayError::NetworkUnavailable(format!(
                "none of {} relays reachable",
                self.relays.len()
            )));
        }

        tracing::debug!(
            subscription = %subscription_id,
            relays = connected.len(),
            "Subscription opened"
        );

        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(connected.len()));
        let kinds = filter.kinds.clone();
        for (relay, response) in connected {
            let reader = RelayReader {
                relay,
                subscription_id: subscription_id.clone(),
                kinds: kinds.clone(),
                tx: tx.clone(),
                pending: pending.clone(),
            };
            tokio::spawn(reader.run(response));
        }

        Ok(rx)
    }
}

impl EventTransport for RelayPool {
    fn subscribe<'a>(
        &'a self,
        filter: &'a ActivityFilter,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<RelayMessage>, GatewayError>> {
        self.open(filter).boxed()
    }
}

/// Reads one relay's response stream.
struct RelayReader {
    relay: String,
    subscription_id: String,
    kinds: Vec<u32>,
    tx: mpsc::Sender<RelayMessage>,
    /// Relays that have not finished yet
    pending: Arc<AtomicUsize>,
}

/// What to do after handling a line.
enum Step {
    Continue,
    Finished,
    /// Nobody is listening anymore
    Abandoned,
}

impl RelayReader {
    async fn run(self, mut response: reqwest::Response) {
        let mut buffer: Vec<u8> = Vec::new();
        let mut forwarded = 0usize;

        let step = 'read: loop {
            // A silent relay must not outlive the subscriber
            let next = tokio::select! {
                next = response.chunk() => next,
                _ = self.tx.closed() => break 'read Step::Abandoned,
            };
            let chunk = match next {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    // Stream ended; a final frame may lack its newline
                    let rest = std::mem::take(&mut buffer);
                    break 'read match self.handle_line(&rest, &mut forwarded).await {
                        Step::Abandoned => Step::Abandoned,
                        _ => Step::Finished,
                    };
                }
                Err(e) => {
                    tracing::warn!(relay = %self.relay, error = %e, "Relay stream failed");
                    break 'read Step::Finished;
                }
            };

            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match self.handle_line(&line, &mut forwarded).await {
                    Step::Continue => {}
                    step => break 'read step,
                }
            }
        };

        tracing::debug!(relay = %self.relay, forwarded, "Relay subscription finished");

        if matches!(step, Step::Finished) && self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.tx.send(RelayMessage::EndOfStoredEvents).await;
        }
    }

    async fn handle_line(&self, line: &[u8], forwarded: &mut usize) -> Step {
        match parse_frame(line, &self.subscription_id) {
            Some(Frame::Event(event)) => {
                if !self.kinds.contains(&event.kind) {
                    return Step::Continue;
                }
                if self
                    .tx
                    .send(RelayMessage::Record(event.into_record()))
                    .await
                    .is_err()
                {
                    return Step::Abandoned;
                }
                *forwarded += 1;
                Step::Continue
            }
            Some(Frame::EndOfStoredEvents) => Step::Finished,
            Some(Frame::Closed(reason)) => {
                tracing::debug!(relay = %self.relay, reason = %reason, "Relay closed subscription");
                Step::Finished
            }
            Some(Frame::Notice(message)) => {
                tracing::debug!(relay = %self.relay, notice = %message, "Relay notice");
                Step::Continue
            }
            None => {
                if !line.iter().all(u8::is_ascii_whitespace) {
                    tracing::debug!(relay = %self.relay, "Skipping malformed relay frame");
                }
                Step::Continue
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_json(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "pubkey": "p1",
            "created_at": 1_700_000_000,
            "kind": 1301,
            "tags": [
                ["exercise", "running"],
                ["distance", "5.20", "km"],
                ["charity", "alpha"]
            ],
            "content": "Morning jog"
        })
    }

    #[test]
    fn test_parse_event_frame() {
        let line = serde_json::json!(["EVENT", "sub-1", event_json("e1")]).to_string();
        let Some(Frame::Event(event)) = parse_frame(line.as_bytes(), "sub-1") else {
            panic!("expected event frame");
        };

        let record = event.into_record();
        assert_eq!(record.id, "e1");
        assert_eq!(record.owner, "p1");
        assert_eq!(record.label, "running");
        assert_eq!(record.distance.as_deref(), Some("5.20"));
        assert_eq!(record.unit.as_deref(), Some("km"));
        assert_eq!(record.charity.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_parse_ignores_other_subscriptions() {
        let line = serde_json::json!(["EVENT", "sub-2", event_json("e1")]).to_string();
        assert!(parse_frame(line.as_bytes(), "sub-1").is_none());

        let eose = serde_json::json!(["EOSE", "sub-2"]).to_string();
        assert!(parse_frame(eose.as_bytes(), "sub-1").is_none());
    }

    #[test]
    fn test_parse_eose_and_notice() {
        let eose = serde_json::json!(["EOSE", "sub-1"]).to_string();
        assert!(matches!(
            parse_frame(eose.as_bytes(), "sub-1"),
            Some(Frame::EndOfStoredEvents)
        ));

        let notice = serde_json::json!(["NOTICE", "slow down"]).to_string();
        assert!(matches!(
            parse_frame(notice.as_bytes(), "sub-1"),
            Some(Frame::Notice(_))
        ));
    }

    #[test]
    fn test_parse_malformed_frames() {
        assert!(parse_frame(b"not json", "sub-1").is_none());
        assert!(parse_frame(b"{\"EVENT\": 1}", "sub-1").is_none());
        assert!(parse_frame(b"[\"EVENT\", \"sub-1\", {\"id\": 3}]", "sub-1").is_none());
        assert!(parse_frame(b"   \n", "sub-1").is_none());
    }

    #[test]
    fn test_label_falls_back_to_content() {
        let event: RawEvent = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "pubkey": "p1",
            "created_at": 1,
            "kind": 1301,
            "tags": [["distance", "3"]],
            "content": "Evening walk"
        }))
        .unwrap();

        let record = event.into_record();
        assert_eq!(record.label, "Evening walk");
        assert_eq!(record.distance.as_deref(), Some("3"));
        assert_eq!(record.unit, None);
    }

    #[tokio::test]
    async fn test_no_relays_is_network_unavailable() {
        let pool = RelayPool::new(Vec::new(), Duration::from_millis(100));
        let filter = ActivityFilter {
            authors: vec!["p1".to_string()],
            kinds: vec![1301],
            since: 0,
            until: 10,
            limit: 10,
        };
        assert!(matches!(
            pool.subscribe(&filter).await,
            Err(GatewayError::NetworkUnavailable(_))
        ));
    }
}
