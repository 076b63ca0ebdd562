use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{middlewares::auth::JwtClaims, services::AppState};

pub async fn learning_health(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let health = state.analytics.learning_health(&claims.sub).await?;
    Ok(Json(health))
}
