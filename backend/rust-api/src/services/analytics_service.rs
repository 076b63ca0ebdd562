use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::models::activity::ActivityResultRecord;
use crate::models::analytics::{HealthMetrics, LearningHealth};
use crate::models::mastery::{MasteryRecord, MasteryState};
use crate::storage::{MasteryStore, ResultStore};

const RECENT_RESULTS: usize = 50;
const CONSISTENCY_TARGET: f64 = 20.0;

/// Learning health scores derived from results and mastery records.
pub struct AnalyticsService {
    results: Arc<dyn ResultStore>,
    mastery: Arc<dyn MasteryStore>,
}

impl AnalyticsService {
    pub fn new(results: Arc<dyn ResultStore>, mastery: Arc<dyn MasteryStore>) -> Self {
        Self { results, mastery }
    }

    pub async fn learning_health(&self, learner_id: &str) -> Result<LearningHealth> {
        let results = self.results.recent(learner_id, RECENT_RESULTS).await?;
        let records = self.mastery.list_for_learner(learner_id).await?;
        Ok(compute_health(&results, &records, Utc::now()))
    }
}

pub fn compute_health(
    results: &[ActivityResultRecord],
    records: &[MasteryRecord],
    now: DateTime<Utc>,
) -> LearningHealth {
    let week_ago = now - Duration::days(7);
    let this_week = results.iter().filter(|r| r.created_at >= week_ago).count() as f64;
    let consistency = (this_week / CONSISTENCY_TARGET * 100.0).min(100.0);

    let focus = if results.is_empty() {
        100.0
    } else {
        let violations: u32 = results.iter().map(|r| r.violation_count).sum();
        let avg = violations as f64 / results.len() as f64;
        (100.0 - avg * 10.0).max(0.0)
    };

    let resilience = if records.is_empty() {
        80.0
    } else {
        let points: f64 = records
            .iter()
            .map(|r| {
                if r.state == MasteryState::Mastered && r.attempts > 1 {
                    1.0
                } else if r.state != MasteryState::Mastered && r.attempts > 5 {
                    -0.5
                } else {
                    0.0
                }
            })
            .sum();
        (70.0 + points * 5.0).clamp(0.0, 100.0)
    };

    let stability = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.proficiency).sum::<f64>() / records.len() as f64
    };

    let overall = (consistency + focus + resilience + stability) / 4.0;

    let insights = vec![
        if focus > 90.0 {
            "Keep your focus streak alive!".to_string()
        } else {
            "Try to minimize tab switching.".to_string()
        },
        if consistency > 80.0 {
            "Great consistency!".to_string()
        } else {
            "Try to practice daily.".to_string()
        },
    ];

    LearningHealth {
        overall_health: round1(overall),
        metrics: HealthMetrics {
            consistency: round1(consistency),
            focus: round1(focus),
            resilience: round1(resilience),
            stability: round1(stability),
        },
        insights,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
