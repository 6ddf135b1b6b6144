use serde::{Deserialize, Serialize};

use crate::analysis::metrics::PostureMetrics;
use crate::math::geometry::Point2;
use crate::prelude::Millis;
use crate::pose::UpperBody;
use crate::settings::EffectiveSettings;

/// Adaptive thresholds never drop below this share of the configured ones.
const THRESHOLD_FLOOR_FACTOR: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceKeypoints {
    pub left_shoulder: Point2,
    pub right_shoulder: Point2,
    pub left_ear: Point2,
    pub right_ear: Point2,
    pub nose: Point2,
}

/// Reference "good posture" captured for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub reference_shoulder_alignment: f32,
    pub reference_left_slouch_angle: f32,
    pub reference_right_slouch_angle: f32,
    pub reference_keypoints: ReferenceKeypoints,
    pub captured_at: Millis,
}

impl CalibrationProfile {
    pub fn from_body(body: &UpperBody, captured_at: Millis) -> Self {
        let metrics = PostureMetrics::measure(body);
        Self {
            reference_shoulder_alignment: metrics.shoulder_alignment,
            reference_left_slouch_angle: metrics.left_slouch_angle,
            reference_right_slouch_angle: metrics.right_slouch_angle,
            reference_keypoints: ReferenceKeypoints {
                left_shoulder: body.left_shoulder.point(),
                right_shoulder: body.right_shoulder.point(),
                left_ear: body.left_ear.point(),
                right_ear: body.right_ear.point(),
                nose: body.nose.point(),
            },
            captured_at,
        }
    }

    pub fn reference_slouch(&self) -> f32 {
        (self.reference_left_slouch_angle + self.reference_right_slouch_angle) / 2.0
    }

    pub fn age_ms(&self, now: Millis) -> Millis {
        now.saturating_sub(self.captured_at)
    }

    pub fn is_expired(&self, now: Millis, ttl_ms: Millis) -> bool {
        self.age_ms(now) > ttl_ms
    }

    /// Personalised thresholds. Small references receive proportionally more
    /// headroom, and the floor keeps a near-perfect capture usable.
    pub fn adapt(&self, base: &EffectiveSettings) -> EffectiveSettings {
        let shoulder = self.reference_shoulder_alignment.max(0.0);
        let shoulder_threshold = (shoulder * (1.5 + 10.0 / (shoulder + 5.0)))
            .max(base.shoulder_alignment_threshold_px * THRESHOLD_FLOOR_FACTOR);

        let slouch = self.reference_slouch().max(0.0);
        let slouch_threshold = (slouch * (1.2 + 10.0 / (slouch + 10.0)))
            .max(base.slouch_threshold_deg * THRESHOLD_FLOOR_FACTOR);

        base.with_thresholds(shoulder_threshold, slouch_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(shoulder: f32, left: f32, right: f32) -> CalibrationProfile {
        let origin = Point2::default();
        CalibrationProfile {
            reference_shoulder_alignment: shoulder,
            reference_left_slouch_angle: left,
            reference_right_slouch_angle: right,
            reference_keypoints: ReferenceKeypoints {
                left_shoulder: origin,
                right_shoulder: origin,
                left_ear: origin,
                right_ear: origin,
                nose: origin,
            },
            captured_at: 1_000,
        }
    }

    #[test]
    fn perfect_reference_falls_back_to_floor() {
        let base = EffectiveSettings::default();
        let adapted = profile(0.0, 0.0, 0.0).adapt(&base);
        assert!((adapted.shoulder_alignment_threshold_px - 10.5).abs() < 1e-4);
        assert!((adapted.slouch_threshold_deg - 14.0).abs() < 1e-4);
        assert_eq!(adapted.notification_cooldown_ms, base.notification_cooldown_ms);
    }

    #[test]
    fn larger_reference_scales_threshold() {
        let base = EffectiveSettings::default();
        // 20 * (1.5 + 10/25) = 38, 30 * (1.2 + 10/40) = 43.5
        let adapted = profile(20.0, 25.0, 35.0).adapt(&base);
        assert!((adapted.shoulder_alignment_threshold_px - 38.0).abs() < 1e-3);
        assert!((adapted.slouch_threshold_deg - 43.5).abs() < 1e-3);
    }

    #[test]
    fn expiry_is_strictly_after_ttl() {
        let p = profile(0.0, 0.0, 0.0);
        assert!(!p.is_expired(1_000 + 500, 500));
        assert!(p.is_expired(1_000 + 501, 500));
        assert_eq!(p.age_ms(0), 0);
    }
}
