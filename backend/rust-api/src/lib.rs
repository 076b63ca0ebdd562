use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use error::EngineError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Learner endpoints (require JWT)
        .nest(
            "/api/v1",
            learner_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(
                    middlewares::trace::trace_context_middleware,
                ))
                .layer(middleware::from_fn(
                    middlewares::metrics::metrics_middleware,
                ))
                .layer(cors),
        )
}

fn learner_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/intents",
            get(handlers::intents::list_intents).post(handlers::intents::plan_intent),
        )
        // Activities
        .route("/activities", post(handlers::activities::request_activity))
        .route(
            "/activities/{challenge_id}/submit",
            post(handlers::activities::submit_activity),
        )
        .route("/quizzes", post(handlers::activities::generate_quiz))
        .route("/challenges", post(handlers::activities::generate_challenge))
        // Mastery and the learning loop
        .route("/mastery", get(handlers::mastery::list_mastery))
        .route("/mastery/{intent_id}", get(handlers::mastery::get_mastery))
        .route(
            "/mastery/{intent_id}/material-complete",
            post(handlers::mastery::complete_material),
        )
        .route(
            "/mastery/{intent_id}/remediation-complete",
            post(handlers::mastery::complete_remediation),
        )
        .route(
            "/mastery/{intent_id}/review",
            post(handlers::mastery::request_review),
        )
        // Content gate
        .route("/gate/{intent_id}", get(handlers::gate::check_gate))
        .route("/gate/{intent_id}/unlock", post(handlers::gate::unlock_gate))
        // Focus
        .route("/focus", get(handlers::focus::focus_status))
        .route("/focus/arm", post(handlers::focus::arm_focus))
        .route("/focus/left", post(handlers::focus::left_focus))
        .route("/focus/returned", post(handlers::focus::returned_focus))
        .route("/focus/acknowledge", post(handlers::focus::acknowledge_focus))
        .route("/focus/cooldown", get(handlers::sse::cooldown_stream))
        // Progression
        .route("/progression", get(handlers::progression::get_progression))
        .route("/leaderboard", get(handlers::progression::leaderboard))
        .route("/analytics/health", get(handlers::analytics::learning_health))
}
