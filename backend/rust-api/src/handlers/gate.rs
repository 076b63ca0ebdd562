use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    extractors::OptionalJson,
    middlewares::auth::JwtClaims,
    models::activity::{ActivityView, TypeHint},
    services::AppState,
};

#[derive(Debug, Deserialize, Default)]
pub struct UnlockRequest {
    #[serde(default, rename = "type")]
    pub type_hint: TypeHint,
}

pub async fn check_gate(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let status = state.gate.check(&claims.sub, &intent_id).await?;
    Ok(Json(status))
}

/// Issues the gate challenge for a locked topic.
pub async fn unlock_gate(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intent_id): Path<String>,
    OptionalJson(req): OptionalJson<UnlockRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Gate challenge requested: learner={}, intent={}",
        claims.sub,
        intent_id
    );

    let activity = state.gate.unlock(&claims.sub, &intent_id, req.type_hint).await?;
    state.focus.monitor(&claims.sub).reset_violations();

    Ok((StatusCode::CREATED, Json(ActivityView::from(&activity))))
}
