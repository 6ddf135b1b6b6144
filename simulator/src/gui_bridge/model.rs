use posturecore::alerts::TrackerState;
use posturecore::math::geometry::Point2;
use posturecore::telemetry::MetricsSnapshot;
use posturecore::{AnalysisResult, EffectiveSettings, FrameReport, PostureMetricEngine};
use serde::Serialize;

/// Latest frame as served to overlay clients.
#[derive(Debug, Clone, Serialize)]
pub struct VisualizationModel {
    pub instance: usize,
    pub timestamp: u64,
    /// Left shoulder, right shoulder, left ear, right ear, nose.
    pub critical_points: Vec<Point2>,
    pub feedback: String,
    pub is_good_posture: bool,
    pub shoulder_alignment: f32,
    pub slouch_level: f32,
    pub tracker_state: TrackerState,
    pub bad_duration_ms: u64,
    pub fps: f64,
    pub settings: EffectiveSettings,
    pub metrics: Option<MetricsSnapshot>,
}

impl Default for VisualizationModel {
    fn default() -> Self {
        let settings = EffectiveSettings::default();
        Self::from_analysis(&PostureMetricEngine::analyze(None, &settings), settings)
    }
}

impl VisualizationModel {
    pub fn from_analysis(analysis: &AnalysisResult, settings: EffectiveSettings) -> Self {
        Self {
            instance: 0,
            timestamp: 0,
            critical_points: analysis.critical_points.clone(),
            feedback: analysis.feedback.clone(),
            is_good_posture: analysis.is_good_posture,
            shoulder_alignment: analysis.shoulder_alignment,
            slouch_level: analysis.slouch_level,
            tracker_state: TrackerState::Neutral,
            bad_duration_ms: 0,
            fps: 0.0,
            settings,
            metrics: None,
        }
    }

    pub fn from_report(instance: usize, report: &FrameReport, fps: f64) -> Self {
        Self {
            instance,
            timestamp: report.timestamp,
            tracker_state: report.tracker.state,
            bad_duration_ms: report.tracker.duration_ms,
            fps,
            ..Self::from_analysis(&report.analysis, report.settings)
        }
    }
}
