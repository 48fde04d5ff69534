// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Season Leaderboard: distance rankings for a time-boxed fitness season
//!
//! This crate merges frozen baseline totals with workout records fetched
//! from a decentralized event network, ranks participants and charities
//! per activity type, and caches the results in two tiers.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::LeaderboardService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub leaderboards: LeaderboardService,
}
