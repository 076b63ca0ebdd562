use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::mastery::{LoopStatus, MasteryState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Coding,
    Lab,
    Crossword,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Coding => "coding",
            ActivityType::Lab => "lab",
            ActivityType::Crossword => "crossword",
        }
    }

    /// Pick an activity type from the subject name when the caller asked for "auto".
    pub fn for_subject(subject: &str) -> Self {
        let lower = subject.to_lowercase();
        let any = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));

        // "CS" is matched case-sensitively so "physics" does not count as computing.
        if subject.contains("CS") || any(&["computer", "algorithm", "web", "programming"]) {
            ActivityType::Coding
        } else if any(&["physics", "chemistry", "biology", "medical"]) {
            ActivityType::Lab
        } else {
            ActivityType::Crossword
        }
    }
}

/// Requested type: a concrete type or "auto".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypeHint {
    #[default]
    Auto,
    Coding,
    Lab,
    Crossword,
}

impl TypeHint {
    pub fn resolve(self, subject: &str) -> ActivityType {
        match self {
            TypeHint::Auto => ActivityType::for_subject(subject),
            TypeHint::Coding => ActivityType::Coding,
            TypeHint::Lab => ActivityType::Lab,
            TypeHint::Crossword => ActivityType::Crossword,
        }
    }
}

/// What the content generator hands back. `answer_key` never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedActivity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub payload: serde_json::Value,
    pub answer_key: serde_json::Value,
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub challenge_id: String,
    pub learner_id: String,
    pub intent_id: String,
    pub activity_type: ActivityType,
    pub subject: String,
    pub topic: String,
    pub payload: serde_json::Value,
    pub answer_key: serde_json::Value,
    pub points: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Client-facing projection of an [`Activity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityView {
    pub challenge_id: String,
    pub intent_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub subject: String,
    pub topic: String,
    pub payload: serde_json::Value,
    pub points: u32,
    pub expires_at: DateTime<Utc>,
}

impl From<&Activity> for ActivityView {
    fn from(activity: &Activity) -> Self {
        ActivityView {
            challenge_id: activity.challenge_id.clone(),
            intent_id: activity.intent_id.clone(),
            activity_type: activity.activity_type,
            subject: activity.subject.clone(),
            topic: activity.topic.clone(),
            payload: activity.payload.clone(),
            points: activity.points,
            expires_at: activity.expires_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub challenge_id: String,
    pub answer: serde_json::Value,
    pub violation_count: u32,
    pub submitted_at: DateTime<Utc>,
}

/// What the evaluator receives.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRequest {
    pub challenge_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub subject: String,
    pub topic: String,
    pub payload: serde_json::Value,
    pub answer_key: serde_json::Value,
    pub answer: serde_json::Value,
    pub points: u32,
    pub violation_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_correct: bool,
    pub score: f64,
    pub xp_earned: u32,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionResult {
    pub challenge_id: String,
    pub is_correct: bool,
    pub score: f64,
    pub xp_earned: u32,
    pub new_proficiency: f64,
    pub mastery_state: MasteryState,
    pub loop_status: LoopStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Persisted log line for every submission that reached the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResultRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub challenge_id: String,
    pub intent_id: String,
    pub is_correct: bool,
    pub score: f64,
    pub xp_earned: u32,
    pub violation_count: u32,
    pub created_at: DateTime<Utc>,
}

impl ActivityResultRecord {
    /// One log entry per learner and challenge.
    pub fn record_id(learner_id: &str, challenge_id: &str) -> String {
        format!("{}:{}", learner_id, challenge_id)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestActivityRequest {
    #[validate(length(min = 1, max = 100, message = "Subject must be between 1 and 100 characters"))]
    pub subject: String,

    #[validate(length(min = 1, max = 200, message = "Topic must be between 1 and 200 characters"))]
    pub topic: String,

    #[serde(default, rename = "type")]
    pub type_hint: TypeHint,
}

#[derive(Debug, Deserialize)]
pub struct SubmitActivityRequest {
    pub answer: serde_json::Value,
    /// Falls back to the learner's live focus counter when omitted.
    #[serde(default)]
    pub violation_count: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,

    #[validate(length(min = 1, max = 200))]
    pub topic: String,

    #[validate(range(min = 1, max = 20, message = "Count must be between 1 and 20"))]
    #[serde(default = "default_quiz_count")]
    pub count: u32,
}

fn default_quiz_count() -> u32 {
    5
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateChallengeRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,

    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_challenge_level")]
    pub level: u32,
}

fn default_challenge_level() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: u32,
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub subject: String,
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_hint_follows_subject() {
        assert_eq!(TypeHint::Auto.resolve("CS/Algorithms"), ActivityType::Coding);
        assert_eq!(TypeHint::Auto.resolve("Web Development"), ActivityType::Coding);
        assert_eq!(TypeHint::Auto.resolve("Physics"), ActivityType::Lab);
        assert_eq!(TypeHint::Auto.resolve("Biology"), ActivityType::Lab);
        assert_eq!(TypeHint::Auto.resolve("History"), ActivityType::Crossword);
    }

    #[test]
    fn explicit_hint_wins() {
        assert_eq!(TypeHint::Lab.resolve("Computer Science"), ActivityType::Lab);
    }

    #[test]
    fn view_hides_answer_key() {
        let now = Utc::now();
        let activity = Activity {
            challenge_id: "c1".into(),
            learner_id: "l1".into(),
            intent_id: "i1".into(),
            activity_type: ActivityType::Crossword,
            subject: "History".into(),
            topic: "Rome".into(),
            payload: serde_json::json!({"grid": []}),
            answer_key: serde_json::json!({"answer": "secret"}),
            points: 100,
            created_at: now,
            expires_at: now,
        };
        let json = serde_json::to_string(&ActivityView::from(&activity)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"type\":\"crossword\""));
    }
}
