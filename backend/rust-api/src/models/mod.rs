use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod activity;
pub mod analytics;
pub mod focus;
pub mod mastery;
pub mod progression;

/// A learner's declared study target. Immutable once planned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningIntent {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub subject: String,
    pub topic: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlanIntentRequest {
    #[validate(length(min = 1, max = 100, message = "Subject must be between 1 and 100 characters"))]
    pub subject: String,

    #[validate(length(min = 1, max = 200, message = "Topic must be between 1 and 200 characters"))]
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct ListIntentsResponse {
    pub intents: Vec<LearningIntent>,
    pub count: usize,
}
