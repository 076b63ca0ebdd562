use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use mongodb::Database;
use redis::aio::ConnectionManager;
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::{AppState, Backend};

pub mod activities;
pub mod analytics;
pub mod focus;
pub mod gate;
pub mod intents;
pub mod mastery;
pub mod progression;
pub mod sse;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    match &state.backend {
        Backend::Memory => {
            dependencies.insert(
                "storage".to_string(),
                json!({ "status": "healthy", "message": "In-memory storage" }),
            );
        }
        Backend::Persistent { mongo, redis } => {
            dependencies.insert("mongodb".to_string(), json!(check_mongodb(mongo).await));
            dependencies.insert("redis".to_string(), json!(check_redis(redis).await));
        }
    }

    let all_healthy = dependencies
        .values()
        .all(|dep| dep.get("status").and_then(|v| v.as_str()) == Some("healthy"));
    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "focuslearner-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

async fn check_mongodb(mongo: &Database) -> serde_json::Value {
    match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => json!({ "status": "healthy", "message": "MongoDB connection successful" }),
        Ok(Err(e)) => json!({ "status": "unhealthy", "error": format!("MongoDB error: {}", e) }),
        Err(_) => json!({ "status": "unhealthy", "error": "MongoDB timeout after 1s" }),
    }
}

async fn check_redis(redis: &ConnectionManager) -> serde_json::Value {
    let mut conn = redis.clone();
    match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    {
        Ok(Ok(_)) => json!({ "status": "healthy", "message": "Redis connection successful" }),
        Ok(Err(e)) => json!({ "status": "unhealthy", "error": format!("Redis error: {}", e) }),
        Err(_) => json!({ "status": "unhealthy", "error": "Redis timeout after 500ms" }),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic auth for `/metrics`; credentials come from `METRICS_AUTH` ("user:password").
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
