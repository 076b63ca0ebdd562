use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthMetrics {
    pub consistency: f64,
    pub focus: f64,
    pub resilience: f64,
    pub stability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningHealth {
    pub overall_health: f64,
    pub metrics: HealthMetrics,
    pub insights: Vec<String>,
}
