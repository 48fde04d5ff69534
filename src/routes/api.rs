// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard and season registration routes.

use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, Viewer};
use crate::models::{ActivityType, AllLeaderboards, Leaderboard, Registration};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Leaderboard routes. Anonymous callers are allowed; the optional auth
/// middleware is applied in routes/mod.rs.
pub fn leaderboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leaderboards", get(get_all_leaderboards))
        .route("/api/leaderboards/{activity_type}", get(get_leaderboard))
}

/// Season routes (require authentication via JWT).
pub fn season_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/season/join", post(join_season))
        .route("/api/season/registration", get(get_registration))
}

// ─── Leaderboards ────────────────────────────────────────────

/// Query parameters for leaderboard reads.
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// Skip the durable cache and rebuild
    #[serde(default)]
    pub refresh: bool,
    /// Rebuild from resident records only
    #[serde(default)]
    pub fast: bool,
}

/// How a leaderboard read is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    Cached,
    Forced,
    MemoryOnly,
}

impl LeaderboardQuery {
    fn mode(&self) -> Result<ReadMode> {
        match (self.refresh, self.fast) {
            (true, true) => Err(AppError::BadRequest(
                "refresh and fast cannot be combined".to_string(),
            )),
            (true, false) => Ok(ReadMode::Forced),
            (false, true) => Ok(ReadMode::MemoryOnly),
            (false, false) => Ok(ReadMode::Cached),
        }
    }
}

/// All three leaderboards.
async fn get_all_leaderboards(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<AllLeaderboards>> {
    let service = &state.leaderboards;
    let boards = match query.mode()? {
        ReadMode::Cached => service.get_all_leaderboards(viewer.id(), false).await,
        ReadMode::Forced => service.get_all_leaderboards(viewer.id(), true).await,
        ReadMode::MemoryOnly => service.get_all_leaderboards_from_memory(viewer.id()).await,
    };

    Ok(Json(boards))
}

/// Leaderboard for one activity type.
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(activity_type): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>> {
    let activity_type = activity_type
        .parse::<ActivityType>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let service = &state.leaderboards;
    let board = match query.mode()? {
        ReadMode::Cached => {
            service
                .get_leaderboard(activity_type, viewer.id(), false)
                .await
        }
        ReadMode::Forced => service.get_leaderboard(activity_type, viewer.id(), true).await,
        ReadMode::MemoryOnly => {
            service
                .get_leaderboard_from_memory(activity_type, viewer.id())
                .await
        }
    };

    Ok(Json(board))
}

// ─── Season Registration ─────────────────────────────────────

/// Registration status for the current participant.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegistrationResponse {
    pub participant_id: String,
    pub season_id: String,
    pub registration: Registration,
}

/// Opt the current participant into the season.
async fn join_season(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RegistrationResponse>> {
    let registration = state.leaderboards.join(&user.participant_id).await?;

    tracing::info!(
        participant_id = %user.participant_id,
        registration = ?registration,
        "Season join requested"
    );

    Ok(Json(RegistrationResponse {
        season_id: state.leaderboards.season().id.clone(),
        participant_id: user.participant_id,
        registration,
    }))
}

/// Current participant's registration.
async fn get_registration(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<RegistrationResponse> {
    let registration = state.leaderboards.is_registered(&user.participant_id);

    Json(RegistrationResponse {
        season_id: state.leaderboards.season().id.clone(),
        participant_id: user.participant_id,
        registration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_modes() {
        let query = |refresh, fast| LeaderboardQuery { refresh, fast };

        assert_eq!(query(false, false).mode().unwrap(), ReadMode::Cached);
        assert_eq!(query(true, false).mode().unwrap(), ReadMode::Forced);
        assert_eq!(query(false, true).mode().unwrap(), ReadMode::MemoryOnly);
        assert!(matches!(
            query(true, true).mode(),
            Err(AppError::BadRequest(_))
        ));
    }
}
