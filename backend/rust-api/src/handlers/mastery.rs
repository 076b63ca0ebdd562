use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    middlewares::auth::JwtClaims,
    models::mastery::{MasteryResponse, MasteryUpdate},
    services::{learning_loop::LoopTrigger, AppState},
};

pub async fn list_mastery(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let records = state.ledger.list(&claims.sub).await?;
    let records: Vec<MasteryResponse> = records.into_iter().map(MasteryResponse::from).collect();
    Ok(Json(records))
}

pub async fn get_mastery(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state.intents.get(&claims.sub, &intent_id).await?;
    let record = state.ledger.current(&claims.sub, &intent_id).await?;
    Ok(Json(MasteryResponse::from(record)))
}

/// The learner finished the topic's primary material. Refused while gated.
pub async fn complete_material(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let update = state.gate.complete_material(&claims.sub, &intent_id).await?;
    Ok(Json(update_body(update)))
}

pub async fn complete_remediation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    trigger(&state, &claims.sub, &intent_id, LoopTrigger::RemediationCompleted).await
}

pub async fn request_review(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(intent_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    trigger(&state, &claims.sub, &intent_id, LoopTrigger::Review).await
}

async fn trigger(
    state: &AppState,
    learner_id: &str,
    intent_id: &str,
    trigger: LoopTrigger,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state.intents.get(learner_id, intent_id).await?;
    let update = state.ledger.advance(learner_id, intent_id, trigger).await?;
    Ok(Json(update_body(update)))
}

fn update_body(update: MasteryUpdate) -> serde_json::Value {
    serde_json::json!({
        "mastery": MasteryResponse::from(update.record),
        "loop_status": update.loop_status,
        "changed": update.applied,
    })
}
