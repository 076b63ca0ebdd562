use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressionAccount {
    #[serde(rename = "_id")]
    pub learner_id: String,
    pub total_xp: u64,
    pub level: u32,
    pub streak_days: u32,
    #[serde(default)]
    pub last_active_on: Option<NaiveDate>,
    /// Recently credited challenge ids; a challenge is credited at most once.
    #[serde(default)]
    pub credited_challenges: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressionAccount {
    pub fn new(learner_id: &str) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            total_xp: 0,
            level: 1,
            streak_days: 0,
            last_active_on: None,
            credited_challenges: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditOutcome {
    /// False when the challenge had already been credited.
    pub credited: bool,
    pub total_xp: u64,
    pub level: u32,
    pub streak_days: u32,
    pub leveled_up: bool,
    pub next_level_threshold: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ProgressionResponse {
    pub total_xp: u64,
    pub level: u32,
    pub streak_days: u32,
    pub next_level_threshold: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub learner_id: String,
    pub total_xp: u64,
    pub level: u32,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}
