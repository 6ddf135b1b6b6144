use serde::Serialize;

use crate::analysis::metrics::PostureMetrics;
use crate::calibration::profile::CalibrationProfile;
use crate::pose::{Pose, UpperBody, REQUIRED_JOINTS};
use crate::prelude::{
    CalibrationResult, KeyValueStore, Millis, RejectReason, StorageError, StorageResult,
};
use crate::settings::EffectiveSettings;
use crate::telemetry::log::LogManager;

pub const CALIBRATION_KEY: &str = "posture_calibration";
pub const CALIBRATION_TIMESTAMP_KEY: &str = "posture_calibration_timestamp";
pub const CALIBRATION_TTL_MS: Millis = 24 * 60 * 60 * 1000;

pub const MIN_CAPTURE_CONFIDENCE: f32 = 0.4;
pub const MAX_CAPTURE_SHOULDER_ALIGNMENT_PX: f32 = 30.0;
pub const MAX_CAPTURE_HEAD_TILT_PX: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalibrationStatus {
    Uncalibrated,
    Valid { expires_in_ms: Millis },
    Expired { age_ms: Millis },
}

/// Owns the persisted calibration record and everything derived from it.
pub struct CalibrationStore {
    storage: Box<dyn KeyValueStore>,
    ttl_ms: Millis,
    /// `None` until the first read from storage.
    cached: Option<Option<CalibrationProfile>>,
    logger: LogManager,
}

impl CalibrationStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self::with_ttl(storage, CALIBRATION_TTL_MS)
    }

    pub fn with_ttl(storage: Box<dyn KeyValueStore>, ttl_ms: Millis) -> Self {
        Self {
            storage,
            ttl_ms,
            cached: None,
            logger: LogManager::new("posture::calibration"),
        }
    }

    /// Checks a candidate reference pose, stopping at the first failed rule.
    pub fn validate(pose: &Pose) -> Result<UpperBody, RejectReason> {
        let missing: Vec<_> = REQUIRED_JOINTS
            .iter()
            .copied()
            .filter(|id| pose.keypoint(*id).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(RejectReason::MissingJoints(missing));
        }

        for id in REQUIRED_JOINTS {
            if let Some(kp) = pose.keypoint(id) {
                if kp.confidence < MIN_CAPTURE_CONFIDENCE {
                    return Err(RejectReason::LowConfidence {
                        joint: id,
                        confidence: kp.confidence,
                        minimum: MIN_CAPTURE_CONFIDENCE,
                    });
                }
            }
        }

        let body = UpperBody::from_pose(pose, MIN_CAPTURE_CONFIDENCE)
            .map_err(|incomplete| RejectReason::MissingJoints(incomplete.missing))?;

        let alignment = PostureMetrics::measure(&body).shoulder_alignment;
        if alignment > MAX_CAPTURE_SHOULDER_ALIGNMENT_PX {
            return Err(RejectReason::ShouldersNotLevel {
                alignment,
                limit: MAX_CAPTURE_SHOULDER_ALIGNMENT_PX,
            });
        }

        let tilt = PostureMetrics::head_tilt(&body);
        if tilt > MAX_CAPTURE_HEAD_TILT_PX {
            return Err(RejectReason::HeadTilted {
                tilt,
                limit: MAX_CAPTURE_HEAD_TILT_PX,
            });
        }

        let (ear_min, ear_max) = if body.left_ear.x <= body.right_ear.x {
            (body.left_ear.x, body.right_ear.x)
        } else {
            (body.right_ear.x, body.left_ear.x)
        };
        if body.nose.x < ear_min || body.nose.x > ear_max {
            return Err(RejectReason::NotFacingCamera);
        }

        Ok(body)
    }

    /// Validates `pose` and persists it as the new reference. A rejected pose
    /// or a failed write leaves any stored profile untouched.
    pub fn capture(&mut self, pose: &Pose, now: Millis) -> CalibrationResult<CalibrationProfile> {
        let body = match Self::validate(pose) {
            Ok(body) => body,
            Err(reason) => {
                self.logger.record(&format!("calibration rejected: {}", reason));
                return Err(reason.into());
            }
        };

        let profile = CalibrationProfile::from_body(&body, now);
        if let Err(err) = self.persist(&profile) {
            self.cached = None;
            return Err(err.into());
        }
        self.cached = Some(Some(profile));
        self.logger.record(&format!(
            "calibration captured: shoulder {:.1}px, slouch {:.1}/{:.1} deg",
            profile.reference_shoulder_alignment,
            profile.reference_left_slouch_angle,
            profile.reference_right_slouch_angle
        ));
        Ok(profile)
    }

    fn persist(&mut self, profile: &CalibrationProfile) -> StorageResult<()> {
        let encoded = serde_json::to_string(profile)?;
        let previous = self.storage.get(CALIBRATION_KEY)?;
        self.storage.set(CALIBRATION_KEY, &encoded)?;

        let stamp = profile.captured_at.to_string();
        if let Err(err) = self.storage.set(CALIBRATION_TIMESTAMP_KEY, &stamp) {
            // Put back the profile that matches the timestamp still stored.
            let rollback = match previous {
                Some(previous) => self.storage.set(CALIBRATION_KEY, &previous),
                None => self.storage.remove(CALIBRATION_KEY),
            };
            if let Err(rollback_err) = rollback {
                self.logger.warn(&format!(
                    "cannot roll back calibration profile: {}",
                    rollback_err
                ));
            }
            return Err(err);
        }
        Ok(())
    }

    /// Stored profile regardless of age. Corrupt records are cleared and
    /// reported as absent. Unreadable storage also reads as absent, and stays
    /// that way until [`reload`](Self::reload).
    pub fn load(&mut self) -> Option<CalibrationProfile> {
        if let Some(cached) = self.cached {
            return cached;
        }
        let loaded = match self.read_record() {
            Ok(profile) => profile,
            Err(StorageError::Io(err)) => {
                self.logger
                    .warn(&format!("calibration storage unreadable: {}", err));
                self.cached = Some(None);
                return None;
            }
            Err(err) => {
                self.logger
                    .warn(&format!("discarding calibration record: {}", err));
                self.clear();
                return None;
            }
        };
        self.cached = Some(loaded);
        loaded
    }

    /// Drops the in-memory copy so the next read goes to storage.
    pub fn reload(&mut self) -> Option<CalibrationProfile> {
        self.cached = None;
        self.load()
    }

    fn read_record(&self) -> StorageResult<Option<CalibrationProfile>> {
        let Some(encoded) = self.storage.get(CALIBRATION_KEY)? else {
            return Ok(None);
        };
        let profile: CalibrationProfile = serde_json::from_str(&encoded)?;

        let stamp = self
            .storage
            .get(CALIBRATION_TIMESTAMP_KEY)?
            .ok_or_else(|| StorageError::Corrupt {
                key: CALIBRATION_TIMESTAMP_KEY.to_string(),
                detail: "timestamp missing for stored profile".to_string(),
            })?;
        let captured_at = stamp
            .trim()
            .parse::<Millis>()
            .map_err(|err| StorageError::Corrupt {
                key: CALIBRATION_TIMESTAMP_KEY.to_string(),
                detail: err.to_string(),
            })?;
        if captured_at != profile.captured_at {
            return Err(StorageError::Corrupt {
                key: CALIBRATION_TIMESTAMP_KEY.to_string(),
                detail: format!(
                    "timestamp {} does not match profile captured at {}",
                    captured_at, profile.captured_at
                ),
            });
        }
        Ok(Some(profile))
    }

    /// Stored profile if it is still within its TTL.
    pub fn active(&mut self, now: Millis) -> Option<CalibrationProfile> {
        let ttl = self.ttl_ms;
        self.load().filter(|profile| !profile.is_expired(now, ttl))
    }

    pub fn is_needed(&mut self, now: Millis) -> bool {
        self.active(now).is_none()
    }

    pub fn status(&mut self, now: Millis) -> CalibrationStatus {
        let ttl = self.ttl_ms;
        match self.load() {
            None => CalibrationStatus::Uncalibrated,
            Some(profile) if profile.is_expired(now, ttl) => CalibrationStatus::Expired {
                age_ms: profile.age_ms(now),
            },
            Some(profile) => CalibrationStatus::Valid {
                expires_in_ms: ttl - profile.age_ms(now),
            },
        }
    }

    /// `base` with thresholds personalised by the active profile, if any.
    pub fn derive_settings(&mut self, base: &EffectiveSettings, now: Millis) -> EffectiveSettings {
        match self.active(now) {
            Some(profile) => profile.adapt(base),
            None => *base,
        }
    }

    pub fn clear(&mut self) {
        for key in [CALIBRATION_KEY, CALIBRATION_TIMESTAMP_KEY] {
            if let Err(err) = self.storage.remove(key) {
                self.logger
                    .warn(&format!("failed to remove {}: {}", key, err));
            }
        }
        self.cached = Some(None);
        self.logger.record("calibration cleared");
    }
}
