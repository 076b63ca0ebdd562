use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    extractors::ValidatedJson,
    middlewares::auth::JwtClaims,
    models::{ListIntentsResponse, PlanIntentRequest},
    services::AppState,
};

pub async fn plan_intent(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<PlanIntentRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Planning intent: learner={}, subject={}, topic={}",
        claims.sub,
        req.subject,
        req.topic
    );

    let intent = state
        .intents
        .plan(&claims.sub, &req.subject, &req.topic)
        .await?;

    Ok((StatusCode::CREATED, Json(intent)))
}

pub async fn list_intents(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let intents = state.intents.list(&claims.sub).await?;

    Ok(Json(ListIntentsResponse {
        count: intents.len(),
        intents,
    }))
}
