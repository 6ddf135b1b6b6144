use serde::{Deserialize, Serialize};

pub const DEFAULT_SHOULDER_THRESHOLD_PX: f32 = 15.0;
pub const DEFAULT_SLOUCH_THRESHOLD_DEG: f32 = 20.0;
pub const DEFAULT_MIN_KEYPOINT_CONFIDENCE: f32 = 0.3;
pub const DEFAULT_NOTIFICATION_COOLDOWN_MS: u64 = 10_000;

/// Thresholds and alert switches in force for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectiveSettings {
    pub shoulder_alignment_threshold_px: f32,
    pub slouch_threshold_deg: f32,
    pub min_keypoint_confidence: f32,
    pub notification_cooldown_ms: u64,
    pub notifications_enabled: bool,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            shoulder_alignment_threshold_px: DEFAULT_SHOULDER_THRESHOLD_PX,
            slouch_threshold_deg: DEFAULT_SLOUCH_THRESHOLD_DEG,
            min_keypoint_confidence: DEFAULT_MIN_KEYPOINT_CONFIDENCE,
            notification_cooldown_ms: DEFAULT_NOTIFICATION_COOLDOWN_MS,
            notifications_enabled: true,
        }
    }
}

impl EffectiveSettings {
    pub fn with_thresholds(self, shoulder_px: f32, slouch_deg: f32) -> Self {
        Self {
            shoulder_alignment_threshold_px: shoulder_px,
            slouch_threshold_deg: slouch_deg,
            ..self
        }
    }
}
