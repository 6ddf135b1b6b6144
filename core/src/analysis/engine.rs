use serde::{Deserialize, Serialize};

use crate::analysis::metrics::PostureMetrics;
use crate::math::geometry::Point2;
use crate::pose::{Pose, UpperBody};
use crate::settings::EffectiveSettings;

/// Slouch levels up to this multiple of the threshold count as slight.
const SLIGHT_SLOUCH_FACTOR: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn label(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    fn other(&self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlouchSeverity {
    Slight,
    Significant,
}

/// Typed classification outcome; `feedback` is rendered from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    NoPerson,
    MissingJoints,
    Good,
    UnevenShoulders { higher: Side },
    Slouching { severity: SlouchSeverity },
    UnevenAndSlouching { higher: Side },
}

impl Verdict {
    pub fn feedback(&self) -> String {
        match self {
            Self::NoPerson => "No person detected".to_string(),
            Self::MissingJoints => "Cannot detect key body points".to_string(),
            Self::Good => "Great posture! Keep it up".to_string(),
            Self::UnevenShoulders { higher } => format!(
                "Your {} shoulder is higher than your {}. Try to level your shoulders",
                higher.label(),
                higher.other().label()
            ),
            Self::Slouching {
                severity: SlouchSeverity::Slight,
            } => "You're slightly slouching. Straighten your back".to_string(),
            Self::Slouching {
                severity: SlouchSeverity::Significant,
            } => "You're slouching significantly! Sit up straight".to_string(),
            Self::UnevenAndSlouching { higher } => format!(
                "You're slouching and your {} shoulder is higher. Sit up straight and level your shoulders",
                higher.label()
            ),
        }
    }
}

/// Per-frame classification. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub shoulder_alignment: f32,
    pub slouch_level: f32,
    pub is_good_posture: bool,
    pub verdict: Verdict,
    pub feedback: String,
    /// Left shoulder, right shoulder, left ear, right ear, nose. Empty when the
    /// pose could not be resolved.
    pub critical_points: Vec<Point2>,
}

impl AnalysisResult {
    fn unresolved(verdict: Verdict) -> Self {
        Self {
            shoulder_alignment: 0.0,
            slouch_level: 0.0,
            is_good_posture: false,
            verdict,
            feedback: verdict.feedback(),
            critical_points: Vec::new(),
        }
    }
}

/// Stateless geometric posture classifier.
pub struct PostureMetricEngine;

impl PostureMetricEngine {
    pub fn analyze(pose: Option<&Pose>, settings: &EffectiveSettings) -> AnalysisResult {
        let Some(pose) = pose else {
            return AnalysisResult::unresolved(Verdict::NoPerson);
        };
        let body = match UpperBody::from_pose(pose, settings.min_keypoint_confidence) {
            Ok(body) => body,
            Err(_) => return AnalysisResult::unresolved(Verdict::MissingJoints),
        };
        Self::classify(&body, settings)
    }

    pub fn classify(body: &UpperBody, settings: &EffectiveSettings) -> AnalysisResult {
        let metrics = PostureMetrics::measure(body);
        let shoulder_alignment = metrics.shoulder_alignment;
        let slouch_level = metrics.slouch_level();

        let shoulder_ok = shoulder_alignment < settings.shoulder_alignment_threshold_px;
        let slouch_ok = slouch_level < settings.slouch_threshold_deg;
        // Smaller y is higher on screen.
        let higher = if body.left_shoulder.y <= body.right_shoulder.y {
            Side::Left
        } else {
            Side::Right
        };

        let verdict = match (shoulder_ok, slouch_ok) {
            (false, false) => Verdict::UnevenAndSlouching { higher },
            (false, true) => Verdict::UnevenShoulders { higher },
            (true, false) => {
                let severity = if slouch_level <= settings.slouch_threshold_deg * SLIGHT_SLOUCH_FACTOR
                {
                    SlouchSeverity::Slight
                } else {
                    SlouchSeverity::Significant
                };
                Verdict::Slouching { severity }
            }
            (true, true) => Verdict::Good,
        };

        AnalysisResult {
            shoulder_alignment,
            slouch_level,
            is_good_posture: shoulder_ok && slouch_ok,
            verdict,
            feedback: verdict.feedback(),
            critical_points: PostureMetrics::critical_points(body),
        }
    }
}
