use axum::http::StatusCode;
use thiserror::Error;

/// Errors the learning engine surfaces to callers.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Content generator unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Evaluator failed: {0}")]
    EvaluationFailed(String),

    #[error("Challenge '{0}' not found or expired")]
    UnknownChallenge(String),

    /// Logged by the focus monitor and swallowed; never returned from a handler.
    #[error("Telemetry delivery failed: {0}")]
    TelemetryDeliveryFailed(String),

    #[error("Learning intent '{0}' not found")]
    UnknownIntent(String),

    #[error("Content for intent '{intent_id}' is locked below proficiency {threshold}")]
    ContentLocked { intent_id: String, threshold: f64 },

    #[error("Transition '{trigger}' is not supported from stage {stage}")]
    UnsupportedTransition { stage: String, trigger: String },

    #[error("Cool-down active, {remaining_seconds}s remaining")]
    CooldownActive { remaining_seconds: u32 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::GenerationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::EvaluationFailed(_) => StatusCode::BAD_GATEWAY,
            EngineError::UnknownChallenge(_) | EngineError::UnknownIntent(_) => {
                StatusCode::NOT_FOUND
            }
            EngineError::ContentLocked { .. } => StatusCode::FORBIDDEN,
            EngineError::UnsupportedTransition { .. } | EngineError::CooldownActive { .. } => {
                StatusCode::CONFLICT
            }
            EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            EngineError::TelemetryDeliveryFailed(_) | EngineError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Handler-side conversion into the `(StatusCode, String)` error shape.
impl From<EngineError> for (StatusCode, String) {
    fn from(err: EngineError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        } else {
            tracing::debug!("Request rejected: {}", err);
        }
        match err {
            EngineError::Storage(_) => (status, "Internal storage error".to_string()),
            other => (status, other.to_string()),
        }
    }
}
