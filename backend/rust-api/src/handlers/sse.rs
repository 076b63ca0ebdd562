use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Extension,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    metrics::SSE_CONNECTIONS_ACTIVE,
    middlewares::auth::JwtClaims,
    models::focus::{CooldownEvent, CooldownTick, FocusState, ResumeReady},
    services::{focus_monitor::FocusMonitor, AppState},
};

/// GET /api/v1/focus/cooldown
///
/// Streams one `cooldown-tick` per interval while the overlay is up, then a
/// single `resume-ready`.
pub async fn cooldown_stream(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let monitor = state.focus.monitor(&claims.sub);
    if monitor.snapshot().state != FocusState::Unfocused {
        return Err((StatusCode::CONFLICT, "No active cool-down".to_string()));
    }

    tracing::info!("Client connected to cool-down stream: learner={}", claims.sub);
    let stream = create_cooldown_stream(monitor, tick_interval_ms());

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn tick_interval_ms() -> u64 {
    std::env::var("SSE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1000)
}

/// Keeps the active-streams gauge in step with the stream's lifetime.
struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        ConnectionGuard
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

struct StreamState {
    monitor: Arc<FocusMonitor>,
    _guard: ConnectionGuard,
    first: bool,
    finished: bool,
}

fn create_cooldown_stream(
    monitor: Arc<FocusMonitor>,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = StreamState {
        monitor,
        _guard: ConnectionGuard::open(),
        first: true,
        finished: false,
    };

    stream::unfold(initial, move |mut st| async move {
        if st.finished {
            return None;
        }
        if !st.first {
            sleep(Duration::from_millis(tick_interval_ms)).await;
        }
        st.first = false;

        let snapshot = st.monitor.snapshot();
        let event = if snapshot.cooldown_remaining_seconds > 0 {
            CooldownEvent::CooldownTick(CooldownTick {
                remaining_seconds: snapshot.cooldown_remaining_seconds,
                distraction_seconds: snapshot.last_distraction_seconds,
                timestamp: Utc::now(),
            })
        } else {
            st.finished = true;
            CooldownEvent::ResumeReady(ResumeReady {
                timestamp: Utc::now(),
                message: "You can resume now".to_string(),
            })
        };

        let sse = Event::default()
            .event(event.event_name())
            .data(event.to_sse_data());
        Some((Ok(sse), st))
    })
}
