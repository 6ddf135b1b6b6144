use std::sync::Arc;

use serde::Serialize;

use crate::alerts::gate::{FireOutcome, NotificationGate};
use crate::alerts::tracker::{TemporalStatusTracker, TrackerState, TrackerUpdate};
use crate::analysis::engine::{AnalysisResult, PostureMetricEngine};
use crate::calibration::profile::CalibrationProfile;
use crate::calibration::store::{CalibrationStatus, CalibrationStore};
use crate::pose::Pose;
use crate::prelude::{CalibrationResult, Clock, Millis};
use crate::settings::EffectiveSettings;
use crate::telemetry::metrics::MetricsRecorder;

/// Everything one frame produced.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub timestamp: Millis,
    pub analysis: AnalysisResult,
    pub settings: EffectiveSettings,
    pub tracker: TrackerUpdate,
    pub alert: Option<FireOutcome>,
}

/// Composes classification, calibration, tracking and alert gating for a
/// single instance.
pub struct PosturePipeline {
    base_settings: EffectiveSettings,
    calibration: CalibrationStore,
    tracker: TemporalStatusTracker,
    gate: NotificationGate,
    clock: Arc<dyn Clock>,
    metrics: MetricsRecorder,
}

impl PosturePipeline {
    pub fn new(
        base_settings: EffectiveSettings,
        calibration: CalibrationStore,
        gate: NotificationGate,
        clock: Arc<dyn Clock>,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            base_settings,
            calibration,
            tracker: TemporalStatusTracker::new(),
            gate,
            clock,
            metrics,
        }
    }

    pub fn process(&mut self, pose: Option<&Pose>) -> FrameReport {
        let now = self.clock.now_ms();
        let settings = self.calibration.derive_settings(&self.base_settings, now);
        self.gate.apply_settings(&settings);

        let analysis = PostureMetricEngine::analyze(pose, &settings);
        self.metrics
            .record_frame(pose.is_some(), analysis.is_good_posture);

        self.gate.poll_broadcasts();
        let tracker = self.tracker.update(analysis.is_good_posture, now);
        let alert = tracker
            .alert
            .as_ref()
            .map(|due| self.gate.fire(&due.message, now));

        FrameReport {
            timestamp: now,
            analysis,
            settings,
            tracker,
            alert,
        }
    }

    pub fn calibrate(&mut self, pose: &Pose) -> CalibrationResult<CalibrationProfile> {
        let now = self.clock.now_ms();
        self.calibration.capture(pose, now)
    }

    pub fn calibration_needed(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.calibration.is_needed(now)
    }

    pub fn calibration_status(&mut self) -> CalibrationStatus {
        let now = self.clock.now_ms();
        self.calibration.status(now)
    }

    pub fn clear_calibration(&mut self) {
        self.calibration.clear();
    }

    pub fn effective_settings(&mut self) -> EffectiveSettings {
        let now = self.clock.now_ms();
        self.calibration.derive_settings(&self.base_settings, now)
    }

    pub fn tracker_state(&self) -> TrackerState {
        self.tracker.state()
    }

    /// Ends any bad-posture session.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::alerts::sink::testing::RecordingSink;
    use crate::alerts::tracker::AlertTier;
    use crate::clock::ManualClock;

    #[test]
    fn sustained_slouch_alerts_through_the_gate() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let mut pipeline = pipeline(&clock, &sink);

        let mut outcomes = Vec::new();
        for _ in 0..=210 {
            let report = pipeline.process(Some(&slouched()));
            if let (Some(due), Some(outcome)) = (report.tracker.alert, report.alert) {
                outcomes.push((report.timestamp, due.tier, outcome));
            }
            clock.advance(100);
        }

        // Tier 2 at 10s falls inside the 10s cooldown from the 5s alert.
        assert_eq!(outcomes[0], (5_000, AlertTier::Initial, FireOutcome::Emitted));
        assert!(matches!(
            outcomes[1],
            (10_000, AlertTier::Frequent, FireOutcome::Suppressed { .. })
        ));
        assert_eq!(outcomes[2], (20_000, AlertTier::Frequent, FireOutcome::Emitted));
        assert_eq!(sink.emitted().len(), 2);
        assert_eq!(pipeline.metrics().snapshot().alerts_suppressed, 1);
        assert_eq!(pipeline.tracker_state(), TrackerState::BadActive);
    }

    #[test]
    fn good_frame_ends_session() {
        let clock = ManualClock::starting_at(0);
        let sink = RecordingSink::granted();
        let mut pipeline = pipeline(&clock, &sink);

        pipeline.process(Some(&slouched()));
        clock.advance(3_000);
        let report = pipeline.process(Some(&upright()));
        assert!(report.analysis.is_good_posture);
        assert_eq!(report.tracker.duration_ms, 0);
        assert_eq!(pipeline.tracker_state(), TrackerState::Neutral);
        assert_eq!(pipeline.metrics().snapshot().good_frames, 1);
    }

    #[test]
    fn calibration_changes_effective_thresholds() {
        let clock = ManualClock::starting_at(1_000);
        let sink = RecordingSink::granted();
        let mut pipeline = pipeline(&clock, &sink);
        assert!(pipeline.calibration_needed());

        pipeline.calibrate(&upright()).unwrap();
        assert!(!pipeline.calibration_needed());
        let settings = pipeline.effective_settings();
        assert!((settings.shoulder_alignment_threshold_px - 10.5).abs() < 1e-4);

        let report = pipeline.process(Some(&upright()));
        assert_eq!(report.settings, settings);

        pipeline.clear_calibration();
        assert_eq!(pipeline.effective_settings(), EffectiveSettings::default());
    }
}
