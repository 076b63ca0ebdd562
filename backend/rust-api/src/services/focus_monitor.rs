//! Attention tracking for a learner's study surface.
//!
//! A `FocusMonitor` turns left-focus / returned-focus transitions into violations.
//! Returns within the noise window are dropped. Longer absences are reported to the
//! telemetry sink without waiting on it, bump the shared violation counter, and put
//! the monitor into `Unfocused` until the learner acknowledges after the cool-down.
//!
//! All transition methods have an `_at` form taking the current time so the
//! timing rules can be driven deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::telemetry_service::TelemetrySink;
use crate::config::EngineSettings;
use crate::error::{EngineError, Result};
use crate::metrics::{DISTRACTIONS_TOTAL, MEDIA_PAUSES_TOTAL, TELEMETRY_FAILURES_TOTAL};
use crate::models::focus::{DistractionEvent, FocusSnapshot, FocusState, ReturnOutcome};

pub const DEFAULT_REASON: &str = "tab_switch";

/// Side effect run once per left-focus transition, e.g. pausing media playback.
pub type PauseHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Pause signal installed by the service: the client pauses playback on the
/// `paused` flag of the left-focus response, this records that it was asked to.
pub fn media_pause_hook() -> PauseHook {
    Arc::new(|learner_id| {
        MEDIA_PAUSES_TOTAL.inc();
        tracing::info!("Pausing media for learner={}", learner_id);
    })
}

#[derive(Debug, Clone, Copy)]
pub struct FocusSettings {
    pub noise_seconds: u32,
    pub cooldown_seconds: u32,
}

impl From<&EngineSettings> for FocusSettings {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            noise_seconds: settings.distraction_noise_seconds,
            cooldown_seconds: settings.focus_cooldown_seconds,
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    armed: bool,
    state: FocusState,
    left_at: Option<DateTime<Utc>>,
    unfocused_since: Option<DateTime<Utc>>,
    last_distraction_seconds: Option<u32>,
}

pub struct FocusMonitor {
    learner_id: String,
    settings: FocusSettings,
    inner: Mutex<MonitorState>,
    violations: AtomicU32,
    telemetry: Arc<dyn TelemetrySink>,
    pause_hook: Option<PauseHook>,
}

impl FocusMonitor {
    pub fn new(
        learner_id: &str,
        settings: FocusSettings,
        telemetry: Arc<dyn TelemetrySink>,
        pause_hook: Option<PauseHook>,
    ) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            settings,
            inner: Mutex::new(MonitorState {
                armed: false,
                state: FocusState::Focused,
                left_at: None,
                unfocused_since: None,
                last_distraction_seconds: None,
            }),
            violations: AtomicU32::new(0),
            telemetry,
            pause_hook,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // state is plain data, a poisoned lock is still consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arms or disarms observation. Disarming drops any pending absence and the overlay.
    pub fn start(&self, active: bool) {
        let mut inner = self.lock();
        inner.armed = active;
        if !active {
            inner.left_at = None;
            inner.state = FocusState::Focused;
            inner.unfocused_since = None;
        }
        tracing::debug!("Focus monitor armed={} for learner={}", active, self.learner_id);
    }

    pub fn left_focus(&self) -> bool {
        self.left_focus_at(Utc::now())
    }

    /// Records the start of an absence. Returns false when disarmed or already away.
    pub fn left_focus_at(&self, now: DateTime<Utc>) -> bool {
        {
            let mut inner = self.lock();
            if !inner.armed || inner.left_at.is_some() {
                return false;
            }
            inner.left_at = Some(now);
        }

        if let Some(hook) = &self.pause_hook {
            hook(&self.learner_id);
        }
        true
    }

    pub fn returned_focus(&self, reason: &str) -> ReturnOutcome {
        self.returned_focus_at(Utc::now(), reason)
    }

    pub fn returned_focus_at(&self, now: DateTime<Utc>, reason: &str) -> ReturnOutcome {
        let event = {
            let mut inner = self.lock();
            let Some(started_at) = inner.left_at.take() else {
                return ReturnOutcome::NotAway;
            };

            let duration_seconds = (now - started_at).num_seconds().max(0) as u32;
            if duration_seconds <= self.settings.noise_seconds {
                DISTRACTIONS_TOTAL.with_label_values(&["ignored"]).inc();
                tracing::debug!(
                    "Ignoring {}s focus flicker for learner={}",
                    duration_seconds,
                    self.learner_id
                );
                return ReturnOutcome::Ignored { duration_seconds };
            }

            self.violations.fetch_add(1, Ordering::SeqCst);
            inner.state = FocusState::Unfocused;
            inner.unfocused_since = Some(now);
            inner.last_distraction_seconds = Some(duration_seconds);

            DistractionEvent {
                learner_id: self.learner_id.clone(),
                duration_seconds,
                reason: reason.to_string(),
                started_at,
            }
        };

        DISTRACTIONS_TOTAL.with_label_values(&["recorded"]).inc();
        tracing::info!(
            "Distraction recorded: learner={}, duration={}s, reason={}",
            event.learner_id,
            event.duration_seconds,
            event.reason
        );

        let duration_seconds = event.duration_seconds;
        self.dispatch(event);
        ReturnOutcome::Recorded { duration_seconds }
    }

    fn dispatch(&self, event: DistractionEvent) {
        let sink = self.telemetry.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(deliver(sink, event));
            }
            Err(_) => {
                TELEMETRY_FAILURES_TOTAL.inc();
                tracing::warn!(
                    "{}",
                    EngineError::TelemetryDeliveryFailed("no async runtime".to_string())
                );
            }
        }
    }

    fn remaining(&self, inner: &MonitorState, now: DateTime<Utc>) -> u32 {
        match (inner.state, inner.unfocused_since) {
            (FocusState::Unfocused, Some(since)) => {
                let total_ms = self.settings.cooldown_seconds as i64 * 1000;
                let left_ms = total_ms - (now - since).num_milliseconds();
                if left_ms <= 0 {
                    0
                } else {
                    ((left_ms + 999) / 1000) as u32
                }
            }
            _ => 0,
        }
    }

    pub fn acknowledge(&self) -> Result<FocusSnapshot> {
        self.acknowledge_at(Utc::now())
    }

    /// Returns to `Focused` once the cool-down has elapsed.
    pub fn acknowledge_at(&self, now: DateTime<Utc>) -> Result<FocusSnapshot> {
        let mut inner = self.lock();
        let remaining_seconds = self.remaining(&inner, now);
        if remaining_seconds > 0 {
            return Err(EngineError::CooldownActive { remaining_seconds });
        }

        if inner.state == FocusState::Unfocused {
            tracing::info!("Learner {} acknowledged distraction", self.learner_id);
        }
        inner.state = FocusState::Focused;
        inner.unfocused_since = None;
        Ok(self.snapshot_of(&inner, now))
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> FocusSnapshot {
        let inner = self.lock();
        self.snapshot_of(&inner, now)
    }

    fn snapshot_of(&self, inner: &MonitorState, now: DateTime<Utc>) -> FocusSnapshot {
        FocusSnapshot {
            armed: inner.armed,
            state: inner.state,
            away: inner.left_at.is_some(),
            violation_count: self.violation_count(),
            last_distraction_seconds: inner.last_distraction_seconds,
            cooldown_remaining_seconds: self.remaining(inner, now),
        }
    }

    /// Disarmed, focused and with nothing counted: indistinguishable from a new monitor.
    fn is_idle(&self) -> bool {
        let inner = self.lock();
        !inner.armed
            && inner.state == FocusState::Focused
            && inner.left_at.is_none()
            && self.violation_count() == 0
    }

    pub fn violation_count(&self) -> u32 {
        self.violations.load(Ordering::SeqCst)
    }

    /// Starts a fresh count for a new activity.
    pub fn reset_violations(&self) {
        self.violations.store(0, Ordering::SeqCst);
    }
}

async fn deliver(sink: Arc<dyn TelemetrySink>, event: DistractionEvent) {
    if let Err(e) = sink.report(&event).await {
        TELEMETRY_FAILURES_TOTAL.inc();
        let err = EngineError::TelemetryDeliveryFailed(format!("{:#}", e));
        tracing::warn!("{} (learner={})", err, event.learner_id);
    }
}

/// One monitor per learner, created on first use. Idle monitors nobody holds are
/// dropped when a new learner is added.
pub struct FocusRegistry {
    monitors: Mutex<HashMap<String, Arc<FocusMonitor>>>,
    settings: FocusSettings,
    telemetry: Arc<dyn TelemetrySink>,
    pause_hook: Option<PauseHook>,
}

impl FocusRegistry {
    pub fn new(settings: FocusSettings, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            monitors: Mutex::new(HashMap::new()),
            settings,
            telemetry,
            pause_hook: None,
        }
    }

    pub fn with_pause_hook(mut self, hook: PauseHook) -> Self {
        self.pause_hook = Some(hook);
        self
    }

    pub fn monitor(&self, learner_id: &str) -> Arc<FocusMonitor> {
        let mut monitors = self.monitors.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(monitor) = monitors.get(learner_id) {
            return monitor.clone();
        }

        monitors.retain(|_, m| Arc::strong_count(m) > 1 || !m.is_idle());
        let monitor = Arc::new(FocusMonitor::new(
            learner_id,
            self.settings,
            self.telemetry.clone(),
            self.pause_hook.clone(),
        ));
        monitors.insert(learner_id.to_string(), monitor.clone());
        monitor
    }

    fn tracked(&self) -> usize {
        self.monitors.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
