use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::generator_client::{ContentGenerator, Evaluator};
use super::intent_service::IntentRegistry;
use super::mastery_ledger::MasteryLedger;
use super::policy::Policies;
use super::progression_service::ProgressionService;
use crate::config::EngineSettings;
use crate::error::{EngineError, Result};
use crate::metrics::{record_submission, ACTIVITIES_GENERATED_TOTAL, SUBMISSION_REPLAYS_TOTAL};
use crate::models::activity::{
    Activity, ActivityResultRecord, EvaluationRequest, Quiz, Submission, SubmissionResult,
    TypeHint,
};
use crate::models::LearningIntent;
use crate::storage::Stores;

/// Issues activities and turns submissions into ledger and progression updates.
pub struct ActivityEngine {
    stores: Stores,
    intents: Arc<IntentRegistry>,
    ledger: Arc<MasteryLedger>,
    progression: Arc<ProgressionService>,
    generator: Arc<dyn ContentGenerator>,
    evaluator: Arc<dyn Evaluator>,
    policies: Arc<Policies>,
    activity_ttl: chrono::Duration,
    collaborator_timeout: Duration,
}

pub struct ActivityEngineDeps {
    pub stores: Stores,
    pub intents: Arc<IntentRegistry>,
    pub ledger: Arc<MasteryLedger>,
    pub progression: Arc<ProgressionService>,
    pub generator: Arc<dyn ContentGenerator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub policies: Arc<Policies>,
}

impl ActivityEngine {
    pub fn new(deps: ActivityEngineDeps, settings: &EngineSettings) -> Self {
        Self {
            stores: deps.stores,
            intents: deps.intents,
            ledger: deps.ledger,
            progression: deps.progression,
            generator: deps.generator,
            evaluator: deps.evaluator,
            policies: deps.policies,
            activity_ttl: chrono::Duration::seconds(settings.activity_ttl_seconds as i64),
            collaborator_timeout: Duration::from_millis(settings.collaborator_timeout_ms),
        }
    }

    /// Plans (or reuses) the intent for `subject`/`topic` and issues an activity for it.
    pub async fn request(
        &self,
        learner_id: &str,
        subject: &str,
        topic: &str,
        type_hint: TypeHint,
    ) -> Result<Activity> {
        let intent = self.intents.plan(learner_id, subject, topic).await?;
        self.request_for_intent(learner_id, &intent, type_hint).await
    }

    pub async fn request_for_intent(
        &self,
        learner_id: &str,
        intent: &LearningIntent,
        type_hint: TypeHint,
    ) -> Result<Activity> {
        let activity_type = type_hint.resolve(&intent.subject);

        let generated = match tokio::time::timeout(
            self.collaborator_timeout,
            self.generator
                .generate_activity(&intent.subject, &intent.topic, activity_type),
        )
        .await
        {
            Ok(Ok(generated)) => generated,
            Ok(Err(e)) => {
                ACTIVITIES_GENERATED_TOTAL
                    .with_label_values(&[activity_type.as_str(), "error"])
                    .inc();
                tracing::warn!("Activity generation failed: {:#}", e);
                return Err(EngineError::GenerationUnavailable(e.to_string()));
            }
            Err(_) => {
                ACTIVITIES_GENERATED_TOTAL
                    .with_label_values(&[activity_type.as_str(), "timeout"])
                    .inc();
                tracing::warn!(
                    "Activity generation timed out after {:?}",
                    self.collaborator_timeout
                );
                return Err(EngineError::GenerationUnavailable(
                    "content generator timed out".to_string(),
                ));
            }
        };

        let now = Utc::now();
        let activity = Activity {
            challenge_id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            intent_id: intent.id.clone(),
            activity_type: generated.activity_type,
            subject: intent.subject.clone(),
            topic: intent.topic.clone(),
            payload: generated.payload,
            answer_key: generated.answer_key,
            points: generated.points,
            created_at: now,
            expires_at: now + self.activity_ttl,
        };
        self.stores.activities.put(&activity).await?;

        ACTIVITIES_GENERATED_TOTAL
            .with_label_values(&[activity.activity_type.as_str(), "success"])
            .inc();
        tracing::info!(
            "Activity issued: learner={}, intent={}, challenge={}, type={}",
            learner_id,
            intent.id,
            activity.challenge_id,
            activity.activity_type.as_str()
        );

        Ok(activity)
    }

    /// Grades a submission and applies it. The ledger, the account and the result log
    /// are all updated or, on error, the submission can be retried as if it never ran.
    /// Re-submitting a challenge returns the original result without touching them again.
    pub async fn submit(&self, learner_id: &str, submission: Submission) -> Result<SubmissionResult> {
        let replay_key = format!("{}:{}", learner_id, submission.challenge_id);
        if let Some(previous) = self.stores.replays.get(&replay_key).await? {
            SUBMISSION_REPLAYS_TOTAL.inc();
            tracing::info!(
                "Returning cached result for challenge={}",
                submission.challenge_id
            );
            return Ok(previous);
        }

        let activity = self
            .stores
            .activities
            .get(&submission.challenge_id)
            .await?
            .filter(|a| a.learner_id == learner_id)
            .ok_or_else(|| EngineError::UnknownChallenge(submission.challenge_id.clone()))?;

        let request = EvaluationRequest {
            challenge_id: activity.challenge_id.clone(),
            activity_type: activity.activity_type,
            subject: activity.subject.clone(),
            topic: activity.topic.clone(),
            payload: activity.payload.clone(),
            answer_key: activity.answer_key.clone(),
            answer: submission.answer.clone(),
            points: activity.points,
            violation_count: submission.violation_count,
        };

        let evaluation =
            match tokio::time::timeout(self.collaborator_timeout, self.evaluator.evaluate(&request))
                .await
            {
                Ok(Ok(evaluation)) if evaluation.score.is_finite() => evaluation,
                Ok(Ok(evaluation)) => {
                    return Err(EngineError::EvaluationFailed(format!(
                        "evaluator returned invalid score {}",
                        evaluation.score
                    )))
                }
                Ok(Err(e)) => {
                    tracing::warn!("Evaluation failed: {:#}", e);
                    return Err(EngineError::EvaluationFailed(e.to_string()));
                }
                Err(_) => {
                    return Err(EngineError::EvaluationFailed(
                        "evaluator timed out".to_string(),
                    ))
                }
            };

        let score = evaluation.score.clamp(0.0, 1.0);
        let xp = self
            .policies
            .xp
            .adjust(evaluation.xp_earned, submission.violation_count);

        // the ledger record is saved last; credit and log are keyed by challenge for retries
        let staged = self
            .ledger
            .stage(
                learner_id,
                &activity.intent_id,
                &activity.challenge_id,
                evaluation.is_correct,
                score,
            )
            .await?;
        let applied = staged.update().applied;
        let xp_earned = if applied { xp } else { 0 };

        if applied {
            if xp_earned > 0 {
                self.progression
                    .credit(learner_id, &activity.challenge_id, xp_earned)
                    .await?;
            }
            self.stores
                .results
                .insert(&ActivityResultRecord {
                    id: ActivityResultRecord::record_id(learner_id, &activity.challenge_id),
                    learner_id: learner_id.to_string(),
                    challenge_id: activity.challenge_id.clone(),
                    intent_id: activity.intent_id.clone(),
                    is_correct: evaluation.is_correct,
                    score,
                    xp_earned,
                    violation_count: submission.violation_count,
                    created_at: submission.submitted_at,
                })
                .await?;
        }

        let update = staged.commit().await?;
        if applied {
            record_submission(evaluation.is_correct);
        }

        let result = SubmissionResult {
            challenge_id: activity.challenge_id.clone(),
            is_correct: evaluation.is_correct,
            score,
            xp_earned,
            new_proficiency: update.record.proficiency,
            mastery_state: update.record.state,
            loop_status: update.loop_status,
            explanation: evaluation.explanation,
        };

        if let Err(e) = self.stores.replays.put(&replay_key, &result).await {
            tracing::warn!("Failed to cache submission result: {:#}", e);
        }

        tracing::info!(
            "Submission processed: learner={}, challenge={}, correct={}, xp={}, violations={}",
            learner_id,
            result.challenge_id,
            result.is_correct,
            result.xp_earned,
            submission.violation_count
        );

        Ok(result)
    }

    pub async fn generate_quiz(&self, subject: &str, topic: &str, count: u32) -> Result<Quiz> {
        tokio::time::timeout(
            self.collaborator_timeout,
            self.generator.generate_quiz(subject, topic, count),
        )
        .await
        .map_err(|_| EngineError::GenerationUnavailable("content generator timed out".into()))?
        .map_err(|e| EngineError::GenerationUnavailable(e.to_string()))
    }

    pub async fn generate_challenge(&self, subject: &str, level: u32) -> Result<serde_json::Value> {
        tokio::time::timeout(
            self.collaborator_timeout,
            self.generator.generate_challenge(subject, level),
        )
        .await
        .map_err(|_| EngineError::GenerationUnavailable("content generator timed out".into()))?
        .map_err(|e| EngineError::GenerationUnavailable(e.to_string()))
    }
}
