#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use focuslearner_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::activity::{ActivityType, Evaluation, EvaluationRequest, GeneratedActivity, Quiz},
    services::{
        generator_client::{ContentGenerator, Evaluator, LocalGenerator},
        telemetry_service::MemoryTelemetry,
        AppState, Backend, Collaborators,
    },
    storage::Stores,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";
pub const CORRECT_ANSWER: &str = "42";
/// Graded correct at half score.
pub const PARTIAL_ANSWER: &str = "about 42";

/// Generator that issues fixed payloads and can be switched off.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub unavailable: AtomicBool,
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_activity(
        &self,
        subject: &str,
        topic: &str,
        activity_type: ActivityType,
    ) -> anyhow::Result<GeneratedActivity> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("generator offline");
        }
        Ok(GeneratedActivity {
            activity_type,
            payload: serde_json::json!({
                "question": format!("{} / {}: what is the answer?", subject, topic)
            }),
            answer_key: serde_json::json!({ "answer": CORRECT_ANSWER }),
            points: 100,
        })
    }

    async fn generate_quiz(&self, subject: &str, topic: &str, count: u32) -> anyhow::Result<Quiz> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("generator offline");
        }
        LocalGenerator.generate_quiz(subject, topic, count).await
    }

    async fn generate_challenge(&self, subject: &str, level: u32) -> anyhow::Result<Value> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("generator offline");
        }
        LocalGenerator.generate_challenge(subject, level).await
    }
}

/// Evaluator with a kill switch and a call counter.
#[derive(Default)]
pub struct ScriptedEvaluator {
    pub unavailable: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> anyhow::Result<Evaluation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("evaluator offline");
        }
        let score = match request.answer.as_str() {
            Some(CORRECT_ANSWER) => 1.0,
            Some(PARTIAL_ANSWER) => 0.5,
            _ => 0.0,
        };
        let is_correct = score > 0.0;
        Ok(Evaluation {
            is_correct,
            score,
            xp_earned: (request.points as f64 * score).round() as u32,
            explanation: (!is_correct).then(|| "The answer is 42".to_string()),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub generator: Arc<ScriptedGenerator>,
    pub evaluator: Arc<ScriptedEvaluator>,
    pub telemetry: Arc<MemoryTelemetry>,
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(|_| {})
}

/// Builds an in-memory app; `tweak` adjusts the config before wiring.
pub fn create_test_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let mut config = Config::in_memory(JWT_SECRET);
    tweak(&mut config);

    let generator = Arc::new(ScriptedGenerator::default());
    let evaluator = Arc::new(ScriptedEvaluator::default());
    let telemetry = Arc::new(MemoryTelemetry::default());

    let state = Arc::new(AppState::assemble(
        config,
        Backend::Memory,
        Stores::in_memory(),
        Collaborators {
            generator: generator.clone(),
            evaluator: evaluator.clone(),
            telemetry: telemetry.clone(),
        },
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        generator,
        evaluator,
        telemetry,
    }
}

pub fn token_for(learner_id: &str) -> String {
    JwtService::new(JWT_SECRET)
        .generate_token(&JwtClaims::for_learner(learner_id, 3600))
        .unwrap()
}

impl TestApp {
    /// Sends an authenticated request and returns the status with the body
    /// parsed as JSON (plain-text bodies come back as a JSON string).
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        learner_id: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token_for(learner_id)));
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn plan_intent(&self, learner_id: &str, subject: &str, topic: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/intents",
                learner_id,
                Some(serde_json::json!({ "subject": subject, "topic": topic })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "plan failed: {}", body);
        body["_id"].as_str().unwrap().to_string()
    }

    pub async fn request_activity(&self, learner_id: &str, subject: &str, topic: &str) -> Value {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/activities",
                learner_id,
                Some(serde_json::json!({ "subject": subject, "topic": topic, "type": "coding" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "request failed: {}", body);
        body
    }

    pub async fn submit(
        &self,
        learner_id: &str,
        challenge_id: &str,
        answer: &str,
        violation_count: Option<u32>,
    ) -> (StatusCode, Value) {
        let mut body = serde_json::json!({ "answer": answer });
        if let Some(count) = violation_count {
            body["violation_count"] = count.into();
        }
        self.call(
            "POST",
            &format!("/api/v1/activities/{}/submit", challenge_id),
            learner_id,
            Some(body),
        )
        .await
    }
}
