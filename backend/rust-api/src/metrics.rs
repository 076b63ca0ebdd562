use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Storage
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Learning engine
    pub static ref ACTIVITIES_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "activities_generated_total",
        "Activities requested from the content generator",
        &["type", "status"]
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "submissions_total",
        "Activity submissions applied to the mastery ledger",
        &["correct"]
    )
    .unwrap();

    pub static ref SUBMISSION_REPLAYS_TOTAL: IntCounter = register_int_counter!(
        "submission_replays_total",
        "Re-submissions answered from the replay cache"
    )
    .unwrap();

    pub static ref LOOP_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "loop_transitions_total",
        "Learning loop stage transitions",
        &["from", "to"]
    )
    .unwrap();

    pub static ref GATE_CHECKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "gate_checks_total",
        "Content gate checks",
        &["locked"]
    )
    .unwrap();

    pub static ref XP_CREDITED_TOTAL: IntCounter = register_int_counter!(
        "xp_credited_total",
        "Experience points credited to progression accounts"
    )
    .unwrap();

    // Focus
    pub static ref DISTRACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "distractions_total",
        "Returned-focus transitions by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref TELEMETRY_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "telemetry_failures_total",
        "Distraction events the telemetry sink failed to accept"
    )
    .unwrap();

    pub static ref MEDIA_PAUSES_TOTAL: IntCounter = register_int_counter!(
        "media_pauses_total",
        "Left-focus transitions that paused media playback"
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active cool-down streams"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Times a MongoDB operation and records its outcome.
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();
    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(start.elapsed().as_secs_f64());

    result
}

/// Times a Redis operation and records its outcome.
pub async fn track_cache_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    result
}

pub fn record_submission(is_correct: bool) {
    let label = if is_correct { "true" } else { "false" };
    SUBMISSIONS_TOTAL.with_label_values(&[label]).inc();
}

pub fn record_gate_check(locked: bool) {
    let label = if locked { "true" } else { "false" };
    GATE_CHECKS_TOTAL.with_label_values(&[label]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        record_submission(true);

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("submissions_total"));
    }

    #[tokio::test]
    async fn track_db_operation_counts_errors() {
        let before = DB_OPERATIONS_TOTAL
            .with_label_values(&["find", "metrics_test", "error"])
            .get();

        let res: Result<(), _> =
            track_db_operation("find", "metrics_test", async { Err(anyhow::anyhow!("boom")) })
                .await;

        assert!(res.is_err());
        let after = DB_OPERATIONS_TOTAL
            .with_label_values(&["find", "metrics_test", "error"])
            .get();
        assert_eq!(after, before + 1);
    }
}
