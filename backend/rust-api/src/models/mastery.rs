use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopStage {
    Understand,
    Apply,
    Remediate,
    Mastered,
}

impl LoopStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStage::Understand => "UNDERSTAND",
            LoopStage::Apply => "APPLY",
            LoopStage::Remediate => "REMEDIATE",
            LoopStage::Mastered => "MASTERED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasteryState {
    NotStarted,
    InProgress,
    Mastered,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopStatus {
    pub stage: LoopStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Authoritative per-(learner, intent) proficiency and loop stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasteryRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub learner_id: String,
    pub intent_id: String,
    pub proficiency: f64,
    pub state: MasteryState,
    pub loop_stage: LoopStage,
    pub attempts: u32,
    pub correct_count: u32,
    #[serde(default)]
    pub last_feedback: Option<String>,
    /// Challenge ids already folded into this record.
    #[serde(default)]
    pub applied_challenges: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl MasteryRecord {
    pub fn record_id(learner_id: &str, intent_id: &str) -> String {
        format!("{}:{}", learner_id, intent_id)
    }

    pub fn new(learner_id: &str, intent_id: &str) -> Self {
        Self {
            id: Self::record_id(learner_id, intent_id),
            learner_id: learner_id.to_string(),
            intent_id: intent_id.to_string(),
            proficiency: 0.0,
            state: MasteryState::NotStarted,
            loop_stage: LoopStage::Understand,
            attempts: 0,
            correct_count: 0,
            last_feedback: None,
            applied_challenges: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn has_applied(&self, challenge_id: &str) -> bool {
        self.applied_challenges.iter().any(|c| c == challenge_id)
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.attempts as f64 * 100.0
        }
    }

    /// Re-derive `state` from the stage and activity so far.
    pub fn derive_state(&self) -> MasteryState {
        match self.loop_stage {
            LoopStage::Mastered => MasteryState::Mastered,
            LoopStage::Understand if self.attempts == 0 && self.proficiency == 0.0 => {
                MasteryState::NotStarted
            }
            _ => MasteryState::InProgress,
        }
    }
}

/// Outcome of a single ledger mutation.
#[derive(Debug, Clone)]
pub struct MasteryUpdate {
    pub record: MasteryRecord,
    pub loop_status: LoopStatus,
    /// False when the challenge had already been applied and nothing changed.
    pub applied: bool,
}

#[derive(Debug, Serialize)]
pub struct MasteryResponse {
    pub intent_id: String,
    pub proficiency: f64,
    pub state: MasteryState,
    pub loop_stage: LoopStage,
    pub attempts: u32,
    pub success_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_feedback: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<MasteryRecord> for MasteryResponse {
    fn from(record: MasteryRecord) -> Self {
        MasteryResponse {
            success_rate: record.success_rate(),
            intent_id: record.intent_id,
            proficiency: record.proficiency,
            state: record.state,
            loop_stage: record.loop_stage,
            attempts: record.attempts,
            last_feedback: record.last_feedback,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateStatus {
    pub intent_id: String,
    pub locked: bool,
    pub proficiency: f64,
    pub threshold: f64,
}
