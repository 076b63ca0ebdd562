mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use common::{create_test_app, TestApp, CORRECT_ANSWER};
use serial_test::serial;
use tower::ServiceExt;

async fn earn(app: &TestApp, learner: &str, topic: &str, answer: &str, violations: u32) {
    let activity = app.request_activity(learner, "CS", topic).await;
    let (status, _) = app
        .submit(
            learner,
            activity["challenge_id"].as_str().unwrap(),
            answer,
            Some(violations),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn new_learner_starts_at_level_one() {
    let app = create_test_app();
    let (status, progression) = app.call("GET", "/api/v1/progression", "fresh", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(progression["total_xp"], 0);
    assert_eq!(progression["level"], 1);
    assert_eq!(progression["streak_days"], 0);
    assert_eq!(progression["next_level_threshold"], 100);
}

#[tokio::test]
async fn leaderboard_orders_by_xp() {
    let app = create_test_app();
    earn(&app, "alice", "Sorting", CORRECT_ANSWER, 0).await;
    earn(&app, "alice", "Graphs", CORRECT_ANSWER, 0).await;
    earn(&app, "bob", "Sorting", CORRECT_ANSWER, 5).await;

    let (status, board) = app.call("GET", "/api/v1/leaderboard?limit=5", "carol", None).await;
    assert_eq!(status, StatusCode::OK);

    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0]["learner_id"], "alice");
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["total_xp"], 200);
    assert_eq!(board[1]["learner_id"], "bob");
    assert_eq!(board[1]["total_xp"], 50);
}

#[tokio::test]
async fn learning_health_reflects_history() {
    let app = create_test_app();
    earn(&app, "l1", "Sorting", CORRECT_ANSWER, 2).await;
    earn(&app, "l1", "Graphs", "wrong", 0).await;

    let (status, health) = app.call("GET", "/api/v1/analytics/health", "l1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["metrics"]["consistency"], 10.0);
    assert_eq!(health["metrics"]["focus"], 90.0);
    assert_eq!(health["insights"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn health_is_public() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-trace-id"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["dependencies"]["storage"]["status"], "healthy");
}

#[tokio::test]
#[serial]
async fn metrics_require_basic_auth() {
    std::env::set_var("METRICS_AUTH", "ops:secret");
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode("ops:secret");
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    std::env::remove_var("METRICS_AUTH");
}
