use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde_json::json;
use std::sync::Arc;

use crate::{
    extractors::{AppJson, OptionalJson},
    middlewares::auth::JwtClaims,
    models::focus::{ArmFocusRequest, FocusTransitionRequest, FocusTransitionResponse},
    services::{focus_monitor::DEFAULT_REASON, AppState},
};

pub async fn focus_status(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> impl IntoResponse {
    Json(state.focus.monitor(&claims.sub).snapshot())
}

/// Arms observation while an activity is on screen; `active: false` disarms.
pub async fn arm_focus(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<ArmFocusRequest>,
) -> impl IntoResponse {
    let monitor = state.focus.monitor(&claims.sub);
    monitor.start(req.active);
    Json(monitor.snapshot())
}

/// The page lost visibility. `paused` tells the client to halt media playback.
pub async fn left_focus(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> impl IntoResponse {
    let monitor = state.focus.monitor(&claims.sub);
    let paused = monitor.left_focus();
    Json(json!({
        "paused": paused,
        "focus": monitor.snapshot(),
    }))
}

pub async fn returned_focus(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    OptionalJson(req): OptionalJson<FocusTransitionRequest>,
) -> impl IntoResponse {
    let monitor = state.focus.monitor(&claims.sub);
    let reason = req.reason.as_deref().unwrap_or(DEFAULT_REASON);
    let outcome = monitor.returned_focus(reason);

    Json(FocusTransitionResponse {
        outcome,
        focus: monitor.snapshot(),
    })
}

/// Dismisses the overlay. 409 while the cool-down is still running.
pub async fn acknowledge_focus(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let snapshot = state.focus.monitor(&claims.sub).acknowledge()?;
    Ok(Json(snapshot))
}
