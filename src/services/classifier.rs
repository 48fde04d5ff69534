// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout classification.
//!
//! Maps a record's free-text label and distance onto one of the tracked
//! activity types, or discards it. Discards are silent: one bad record
//! never aborts a batch.

use crate::models::{ActivityRecord, ActivityType, ClassifiedWorkout};
use std::collections::HashSet;

const KM_PER_MILE: f64 = 1.609344;

/// Label fragments per type, checked in this order.
const VOCABULARY: [(ActivityType, &[&str]); 3] = [
    (ActivityType::Running, &["run", "jog", "marathon", "sprint"]),
    (
        ActivityType::Walking,
        &["walk", "hike", "hiking", "trek", "ruck"],
    ),
    (ActivityType::Cycling, &["cycl", "bike", "biking", "ride"]),
];

/// Labels that carry no activity information. Counted as running.
const GENERIC_LABELS: [&str; 4] = ["other", "uncategorized", "workout", "general"];

/// Result of resolving a free-text label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelClass {
    Tracked(ActivityType),
    /// Generic label, resolved by the running fallback
    Generic,
    Unrecognized,
}

impl LabelClass {
    /// The activity type a label counts toward, if any.
    pub fn activity_type(self) -> Option<ActivityType> {
        match self {
            LabelClass::Tracked(activity_type) => Some(activity_type),
            LabelClass::Generic => Some(ActivityType::Running),
            LabelClass::Unrecognized => None,
        }
    }
}

/// Resolve a label by case-insensitive substring match.
pub fn resolve_label(label: &str) -> LabelClass {
    let normalized = label.trim().to_lowercase();

    for (activity_type, fragments) in VOCABULARY {
        if fragments.iter().any(|f| normalized.contains(f)) {
            return LabelClass::Tracked(activity_type);
        }
    }

    if GENERIC_LABELS.contains(&normalized.as_str()) {
        LabelClass::Generic
    } else {
        LabelClass::Unrecognized
    }
}

/// Parse a published distance into kilometers.
///
/// Returns `None` for missing, unparsable, non-positive, or unknown-unit values.
pub fn parse_distance_km(raw: Option<&str>, unit: Option<&str>) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let unit = unit.map(|u| u.trim().to_lowercase());
    let km = match unit.as_deref() {
        None | Some("") | Some("km") | Some("kilometers") | Some("kilometres") => value,
        Some("mi") | Some("mile") | Some("miles") => value * KM_PER_MILE,
        Some("m") | Some("meters") | Some("metres") => value / 1000.0,
        Some(_) => return None,
    };

    (km.is_finite() && km > 0.0).then_some(km)
}

/// Classify one record, or discard it.
pub fn classify(record: &ActivityRecord) -> Option<ClassifiedWorkout> {
    let activity_type = resolve_label(&record.label).activity_type()?;
    let distance_km = parse_distance_km(record.distance.as_deref(), record.unit.as_deref())?;

    let charity = record
        .charity
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from);

    Some(ClassifiedWorkout {
        record_id: record.id.clone(),
        participant: record.owner.clone(),
        activity_type,
        distance_km,
        charity,
        created_at: record.created_at,
    })
}

/// Classify a batch, collapsing duplicate record ids.
pub fn classify_all(records: &[ActivityRecord]) -> Vec<ClassifiedWorkout> {
    let mut seen = HashSet::new();
    let mut discarded = 0usize;

    let workouts: Vec<ClassifiedWorkout> = records
        .iter()
        .filter(|r| seen.insert(r.id.as_str()))
        .filter_map(|r| {
            let classified = classify(r);
            if classified.is_none() {
                discarded += 1;
            }
            classified
        })
        .collect();

    if discarded > 0 {
        tracing::debug!(
            discarded,
            kept = workouts.len(),
            "Discarded unclassifiable records"
        );
    }
    workouts
}
