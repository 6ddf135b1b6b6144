use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_analyzed: usize,
    pub frames_without_pose: usize,
    pub good_frames: usize,
    pub bad_frames: usize,
    pub ticks_dropped: usize,
    pub alerts_emitted: usize,
    pub alerts_suppressed: usize,
    pub alerts_blocked: usize,
}

/// Shared pipeline counters. Clones record into the same totals.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_frame(&self, pose_present: bool, good: bool) {
        self.update(|m| {
            m.frames_analyzed += 1;
            if !pose_present {
                m.frames_without_pose += 1;
            }
            if good {
                m.good_frames += 1;
            } else {
                m.bad_frames += 1;
            }
        });
    }

    pub fn record_dropped_tick(&self) {
        self.update(|m| m.ticks_dropped += 1);
    }

    pub fn record_alert_emitted(&self) {
        self.update(|m| m.alerts_emitted += 1);
    }

    pub fn record_alert_suppressed(&self) {
        self.update(|m| m.alerts_suppressed += 1);
    }

    pub fn record_alert_blocked(&self) {
        self.update(|m| m.alerts_blocked += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}
