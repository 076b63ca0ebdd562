use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    extractors::{AppJson, ValidatedJson},
    middlewares::auth::JwtClaims,
    models::activity::{
        ActivityView, GenerateChallengeRequest, GenerateQuizRequest, RequestActivityRequest,
        SubmitActivityRequest, Submission,
    },
    services::AppState,
};

/// POST /api/v1/activities
///
/// A fresh activity starts a fresh attempt, so the learner's focus
/// violation counter is reset here.
pub async fn request_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(req): ValidatedJson<RequestActivityRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let activity = state
        .engine
        .request(&claims.sub, &req.subject, &req.topic, req.type_hint)
        .await?;

    state.focus.monitor(&claims.sub).reset_violations();

    Ok((StatusCode::CREATED, Json(ActivityView::from(&activity))))
}

/// POST /api/v1/activities/{challenge_id}/submit
pub async fn submit_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(challenge_id): Path<String>,
    AppJson(req): AppJson<SubmitActivityRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let violation_count = req
        .violation_count
        .unwrap_or_else(|| state.focus.monitor(&claims.sub).violation_count());

    let submission = Submission {
        challenge_id,
        answer: req.answer,
        violation_count,
        submitted_at: Utc::now(),
    };

    let result = state.engine.submit(&claims.sub, submission).await?;
    Ok(Json(result))
}

pub async fn generate_quiz(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<GenerateQuizRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(
        "Generating quiz: subject={}, topic={}, count={}",
        req.subject,
        req.topic,
        req.count
    );
    let quiz = state
        .engine
        .generate_quiz(&req.subject, &req.topic, req.count)
        .await?;
    Ok(Json(quiz))
}

pub async fn generate_challenge(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<GenerateChallengeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let challenge = state
        .engine
        .generate_challenge(&req.subject, req.level)
        .await?;
    Ok(Json(challenge))
}
