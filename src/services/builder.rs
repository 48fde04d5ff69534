// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard construction.
//!
//! `LeaderboardBuilder::build` is a pure function of its inputs: baseline
//! seeds, classified workouts, registration sets, viewer, and timestamp.
//! It holds no state across calls and is shared by the cache-miss and
//! memory-only paths.

use crate::models::{
    ActivityType, CharityRanking, ClassifiedWorkout, Leaderboard, Participant,
};
use crate::services::{BaselineStore, Roster};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Inputs for one leaderboard.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub activity_type: ActivityType,
    /// Full participant set, official roster plus visible local joins
    pub participant_ids: &'a [String],
    pub workouts: &'a [ClassifiedWorkout],
    pub local_joins: &'a HashSet<String>,
    pub official_ids: &'a HashSet<String>,
    pub viewer_id: Option<&'a str>,
    /// Computation timestamp (Unix seconds)
    pub computed_at: i64,
    pub ttl_secs: u64,
}

#[derive(Debug, Default)]
struct ParticipantTotals {
    distance_km: f64,
    count: u32,
    /// Most recent tagged fresh record: (created_at, charity)
    latest_charity: Option<(i64, String)>,
}

#[derive(Debug, Default)]
struct CharityTotals {
    distance_km: f64,
    /// Participants with at least one tagged fresh record
    members: HashSet<String>,
}

/// Builds leaderboards against one season's frozen data.
#[derive(Debug, Clone, Copy)]
pub struct LeaderboardBuilder<'a> {
    baseline: &'a BaselineStore,
    roster: &'a Roster,
}

impl<'a> LeaderboardBuilder<'a> {
    pub fn new(baseline: &'a BaselineStore, roster: &'a Roster) -> Self {
        Self { baseline, roster }
    }

    pub fn build(&self, request: &BuildRequest<'_>) -> Leaderboard {
        let activity_type = request.activity_type;
        let in_set: HashSet<&str> = request.participant_ids.iter().map(String::as_str).collect();

        // 1. Seed from the two independent baseline tables
        let mut participants: HashMap<&str, ParticipantTotals> = request
            .participant_ids
            .iter()
            .map(|id| {
                let seed = self.baseline.participant(id, activity_type);
                (
                    id.as_str(),
                    ParticipantTotals {
                        distance_km: seed.distance_km,
                        count: seed.count,
                        latest_charity: None,
                    },
                )
            })
            .collect();

        // BTreeMap keeps charity iteration order independent of hashing
        let mut charities: BTreeMap<&str, CharityTotals> = self
            .baseline
            .charities_for(activity_type)
            .filter(|(id, _)| self.roster.charity(id).is_some())
            .map(|(id, seed)| {
                (
                    id,
                    CharityTotals {
                        distance_km: seed.distance_km,
                        members: HashSet::new(),
                    },
                )
            })
            .collect();

        // 2. Fold fresh workouts, each record id at most once. Folding in
        //    record id order keeps float sums independent of arrival order.
        let mut eligible: Vec<&ClassifiedWorkout> = request
            .workouts
            .iter()
            .filter(|w| {
                w.activity_type == activity_type && in_set.contains(w.participant.as_str())
            })
            .collect();
        eligible.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        eligible.dedup_by(|a, b| a.record_id == b.record_id);

        for workout in eligible {
            let Some(totals) = participants.get_mut(workout.participant.as_str()) else {
                continue;
            };
            totals.distance_km += workout.distance_km;
            totals.count += 1;

            let Some(charity_id) = workout.charity.as_deref() else {
                continue;
            };
            let newer = totals
                .latest_charity
                .as_ref()
                .map_or(true, |(at, id)| (workout.created_at, charity_id) > (*at, id.as_str()));
            if newer {
                totals.latest_charity = Some((workout.created_at, charity_id.to_string()));
            }

            let Some(charity) = self.roster.charity(charity_id) else {
                continue;
            };
            let acc = charities.entry(charity.id.as_str()).or_default();
            acc.distance_km += workout.distance_km;
            acc.members.insert(workout.participant.clone());
        }

        // 3. Materialize every participant, including zero-activity ones
        let mut ranked: Vec<Participant> = request
            .participant_ids
            .iter()
            .filter_map(|id| {
                let totals = participants.remove(id.as_str())?;
                let profile = self.roster.profile(id);
                let is_official = request.official_ids.contains(id);
                let selected_charity = self
                    .roster
                    .selected_charity(id)
                    .map(String::from)
                    .or(totals.latest_charity.map(|(_, charity)| charity));

                Some(Participant {
                    id: id.clone(),
                    display_name: profile.display_name,
                    avatar: profile.avatar,
                    selected_charity,
                    total_distance: totals.distance_km,
                    workout_count: totals.count,
                    is_local_join: request.local_joins.contains(id) && !is_official,
                    is_private_competitor: request.viewer_id == Some(id.as_str())
                        && !is_official,
                    rank: 0,
                })
            })
            .collect();

        // 4. Descending by distance, ties by id
        ranked.sort_by(|a, b| {
            by_distance_desc(a.total_distance, b.total_distance).then_with(|| a.id.cmp(&b.id))
        });
        for (i, participant) in ranked.iter_mut().enumerate() {
            participant.rank = i as u32 + 1;
        }

        // 5. Charity rankings
        let mut charity_rankings: Vec<CharityRanking> = charities
            .into_iter()
            .filter_map(|(id, totals)| {
                let charity = self.roster.charity(id)?;
                Some(CharityRanking {
                    charity_id: charity.id.clone(),
                    name: charity.name.clone(),
                    payment_destination: charity.payment_destination.clone(),
                    total_distance: totals.distance_km,
                    participant_count: totals.members.len() as u32,
                    rank: 0,
                })
            })
            .collect();

        charity_rankings.sort_by(|a, b| {
            by_distance_desc(a.total_distance, b.total_distance)
                .then_with(|| a.charity_id.cmp(&b.charity_id))
        });
        for (i, ranking) in charity_rankings.iter_mut().enumerate() {
            ranking.rank = i as u32 + 1;
        }

        Leaderboard {
            activity_type,
            participants: ranked,
            charities: charity_rankings,
            last_updated: request.computed_at,
            ttl_secs: request.ttl_secs,
        }
    }
}

fn by_distance_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
