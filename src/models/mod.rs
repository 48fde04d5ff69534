// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod cache;
pub mod leaderboard;
pub mod participant;
pub mod season;

pub use activity::{ActivityRecord, ActivityType, ClassifiedWorkout, TimeWindow};
pub use cache::CacheEntry;
pub use leaderboard::{AllLeaderboards, CharityRanking, Leaderboard};
pub use participant::{Charity, LocalJoinRecord, Participant, Profile, Registration};
pub use season::{BaselineEntry, BaselineRow, RosterEntry, SeasonFile};
