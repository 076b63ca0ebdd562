mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{create_test_app, CORRECT_ANSWER, PARTIAL_ANSWER};
use serde_json::json;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

#[tokio::test]
async fn requires_bearer_token() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/intents")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/intents")
                .header("authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn issued_activity_hides_answer_key() {
    let app = create_test_app();
    let activity = app.request_activity("l1", "CS", "Sorting").await;

    assert_eq!(activity["type"], "coding");
    assert!(activity["challenge_id"].is_string());
    assert!(activity["payload"]["question"].is_string());
    assert!(activity.get("answer_key").is_none());
}

#[tokio::test]
async fn empty_subject_is_rejected() {
    let app = create_test_app();
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/activities",
            "l1",
            Some(json!({ "subject": "", "topic": "Sorting" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resubmission_returns_the_original_result() {
    let app = create_test_app();
    let activity = app.request_activity("l1", "CS", "Graphs").await;
    let challenge_id = activity["challenge_id"].as_str().unwrap();

    let (status, first) = app.submit("l1", challenge_id, CORRECT_ANSWER, Some(0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["xp_earned"], 100);

    // a different answer does not re-grade
    let (status, second) = app.submit("l1", challenge_id, "wrong", Some(0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(app.evaluator.calls.load(Ordering::SeqCst), 1);

    let (_, progression) = app.call("GET", "/api/v1/progression", "l1", None).await;
    assert_eq!(progression["total_xp"], 100);

    let (_, records) = app.call("GET", "/api/v1/mastery", "l1", None).await;
    assert_eq!(records[0]["attempts"], 1);
}

#[tokio::test]
async fn unknown_challenge_is_not_found() {
    let app = create_test_app();
    let (status, _) = app.submit("l1", "missing-challenge", CORRECT_ANSWER, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let activity = app.request_activity("owner", "CS", "Tries").await;
    let (status, _) = app
        .submit(
            "intruder",
            activity["challenge_id"].as_str().unwrap(),
            CORRECT_ANSWER,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generator_outage_is_service_unavailable() {
    let app = create_test_app();
    app.generator.unavailable.store(true, Ordering::SeqCst);

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/activities",
            "l1",
            Some(json!({ "subject": "CS", "topic": "Heaps" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/quizzes",
            "l1",
            Some(json!({ "subject": "Math", "topic": "Algebra" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn evaluator_outage_leaves_no_trace_and_can_be_retried() {
    let app = create_test_app();
    let activity = app.request_activity("l1", "CS", "Queues").await;
    let challenge_id = activity["challenge_id"].as_str().unwrap();
    let intent_id = activity["intent_id"].as_str().unwrap();

    app.evaluator.unavailable.store(true, Ordering::SeqCst);
    let (status, _) = app.submit("l1", challenge_id, CORRECT_ANSWER, Some(0)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, record) = app
        .call("GET", &format!("/api/v1/mastery/{}", intent_id), "l1", None)
        .await;
    assert_eq!(record["attempts"], 0);
    assert_eq!(record["proficiency"], 0.0);

    app.evaluator.unavailable.store(false, Ordering::SeqCst);
    let (status, result) = app.submit("l1", challenge_id, CORRECT_ANSWER, Some(0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["is_correct"], true);
}

#[tokio::test]
async fn violations_reduce_xp() {
    let app = create_test_app();
    let activity = app.request_activity("l1", "CS", "Stacks").await;
    let (_, result) = app
        .submit(
            "l1",
            activity["challenge_id"].as_str().unwrap(),
            PARTIAL_ANSWER,
            Some(3),
        )
        .await;

    // 50 xp for a half score, minus 30%
    assert_eq!(result["score"], 0.5);
    assert_eq!(result["xp_earned"], 35);
    assert_eq!(result["new_proficiency"], 25.0);
}

#[tokio::test]
async fn quiz_and_challenge_passthrough() {
    let app = create_test_app();

    let (status, quiz) = app
        .call(
            "POST",
            "/api/v1/quizzes",
            "l1",
            Some(json!({ "subject": "Math", "topic": "Algebra", "count": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(quiz["questions"].as_array().unwrap().len() <= 2);

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/quizzes",
            "l1",
            Some(json!({ "subject": "Math", "topic": "Algebra", "count": 50 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, challenge) = app
        .call(
            "POST",
            "/api/v1/challenges",
            "l1",
            Some(json!({ "subject": "Math", "level": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(challenge.is_object());
}
