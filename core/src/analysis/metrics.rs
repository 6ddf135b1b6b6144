use serde::{Deserialize, Serialize};

use crate::math::geometry::{angle_deg, Point2};
use crate::pose::UpperBody;

/// Length of the horizontal reference ray drawn from each shoulder.
const REFERENCE_RAY_PX: f32 = 10.0;

/// Raw geometric measurements taken from one upper body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureMetrics {
    pub shoulder_alignment: f32,
    pub left_slouch_angle: f32,
    pub right_slouch_angle: f32,
}

impl PostureMetrics {
    pub fn measure(body: &UpperBody) -> Self {
        let shoulder_alignment = (body.left_shoulder.y - body.right_shoulder.y).abs();

        let left_shoulder = body.left_shoulder.point();
        let left_raw = angle_deg(
            body.left_ear.point(),
            left_shoulder,
            left_shoulder.offset(REFERENCE_RAY_PX, 0.0),
        );

        // Mirrored so an ear straight above either shoulder measures 90 degrees.
        let right_shoulder = body.right_shoulder.point();
        let right_raw = angle_deg(
            right_shoulder.offset(-REFERENCE_RAY_PX, 0.0),
            right_shoulder,
            body.right_ear.point(),
        );

        Self {
            shoulder_alignment,
            left_slouch_angle: lean_from_vertical(left_raw),
            right_slouch_angle: lean_from_vertical(right_raw),
        }
    }

    pub fn slouch_level(&self) -> f32 {
        (self.left_slouch_angle + self.right_slouch_angle) / 2.0
    }

    pub fn head_tilt(body: &UpperBody) -> f32 {
        (body.left_ear.y - body.right_ear.y).abs()
    }

    pub fn critical_points(body: &UpperBody) -> Vec<Point2> {
        body.joints().iter().map(|kp| kp.point()).collect()
    }
}

fn lean_from_vertical(raw: f32) -> f32 {
    (raw - 90.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JointId, Keypoint};

    fn body(left_ear: (f32, f32), right_ear: (f32, f32)) -> UpperBody {
        UpperBody {
            left_shoulder: Keypoint::new(JointId::LeftShoulder, 100.0, 200.0, 0.9),
            right_shoulder: Keypoint::new(JointId::RightShoulder, 300.0, 200.0, 0.9),
            left_ear: Keypoint::new(JointId::LeftEar, left_ear.0, left_ear.1, 0.9),
            right_ear: Keypoint::new(JointId::RightEar, right_ear.0, right_ear.1, 0.9),
            nose: Keypoint::new(JointId::Nose, 200.0, 100.0, 0.9),
        }
    }

    #[test]
    fn ears_above_shoulders_measure_no_lean() {
        let metrics = PostureMetrics::measure(&body((100.0, 100.0), (300.0, 100.0)));
        assert!(metrics.left_slouch_angle.abs() < 1e-3);
        assert!(metrics.right_slouch_angle.abs() < 1e-3);
        assert_eq!(metrics.shoulder_alignment, 0.0);
    }

    #[test]
    fn lean_is_symmetric_between_sides() {
        let metrics = PostureMetrics::measure(&body((150.0, 100.0), (250.0, 100.0)));
        assert!((metrics.left_slouch_angle - metrics.right_slouch_angle).abs() < 1e-3);
        assert!((metrics.slouch_level() - 26.565).abs() < 1e-2);
    }
}
