// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod baseline;
pub mod builder;
pub mod cache;
pub mod classifier;
pub mod gateway;
pub mod leaderboard;
pub mod registry;
pub mod relay;
pub mod season;

pub use baseline::BaselineStore;
pub use builder::{BuildRequest, LeaderboardBuilder};
pub use cache::{CacheKey, CacheService, Scope};
pub use gateway::{ActivityFilter, EventGateway, EventTransport, GatewayError, RelayMessage};
pub use leaderboard::{LeaderboardService, RefreshSettings};
pub use registry::ParticipantRegistry;
pub use relay::RelayPool;
pub use season::{Roster, Season, SeasonDataError};
