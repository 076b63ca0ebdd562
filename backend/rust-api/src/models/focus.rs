use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One attention loss that outlasted the noise threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistractionEvent {
    pub learner_id: String,
    pub duration_seconds: u32,
    pub reason: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    Focused,
    /// Blocking overlay shown until the learner acknowledges.
    Unfocused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSnapshot {
    pub armed: bool,
    pub state: FocusState,
    pub away: bool,
    pub violation_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_distraction_seconds: Option<u32>,
    pub cooldown_remaining_seconds: u32,
}

/// What a returned-focus transition produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReturnOutcome {
    /// No pending left-focus timestamp (disarmed or duplicate event).
    NotAway,
    /// Below the noise threshold, discarded.
    Ignored { duration_seconds: u32 },
    Recorded { duration_seconds: u32 },
}

#[derive(Debug, Deserialize)]
pub struct ArmFocusRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct FocusTransitionRequest {
    /// Reason reported with the distraction, e.g. "tab_switch" or "window_blur".
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FocusTransitionResponse {
    #[serde(flatten)]
    pub outcome: ReturnOutcome,
    pub focus: FocusSnapshot,
}

/// Server-sent events for the cool-down overlay.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CooldownEvent {
    CooldownTick(CooldownTick),
    ResumeReady(ResumeReady),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CooldownTick {
    pub remaining_seconds: u32,
    pub distraction_seconds: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResumeReady {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl CooldownEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            CooldownEvent::CooldownTick(_) => "cooldown-tick",
            CooldownEvent::ResumeReady(_) => "resume-ready",
        }
    }
}
