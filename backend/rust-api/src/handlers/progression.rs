use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    models::progression::{LeaderboardQuery, ProgressionResponse},
    services::AppState,
};

const MAX_LEADERBOARD: usize = 100;

pub async fn get_progression(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let account = state.progression.account(&claims.sub).await?;

    Ok(Json(ProgressionResponse {
        next_level_threshold: state.progression.next_level_threshold(account.total_xp),
        total_xp: account.total_xp,
        level: account.level,
        streak_days: account.streak_days,
    }))
}

pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let limit = query
        .limit
        .unwrap_or(state.config.engine.leaderboard_limit)
        .clamp(1, MAX_LEADERBOARD);

    let entries = state.progression.leaderboard(limit).await?;
    Ok(Json(entries))
}
