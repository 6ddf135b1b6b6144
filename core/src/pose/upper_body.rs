use serde::{Deserialize, Serialize};

use crate::pose::{JointId, Keypoint, Pose};

/// The five joints posture analysis depends on, in visualization order.
pub const REQUIRED_JOINTS: [JointId; 5] = [
    JointId::LeftShoulder,
    JointId::RightShoulder,
    JointId::LeftEar,
    JointId::RightEar,
    JointId::Nose,
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("incomplete pose, missing {missing:?}")]
pub struct IncompletePose {
    pub missing: Vec<JointId>,
}

/// A pose known to carry every joint in [`REQUIRED_JOINTS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpperBody {
    pub left_shoulder: Keypoint,
    pub right_shoulder: Keypoint,
    pub left_ear: Keypoint,
    pub right_ear: Keypoint,
    pub nose: Keypoint,
}

impl UpperBody {
    /// Extracts the required joints, ignoring any whose confidence is below
    /// `min_confidence`. Fails with every joint that could not be resolved.
    pub fn from_pose(pose: &Pose, min_confidence: f32) -> Result<Self, IncompletePose> {
        let lookup = |id| {
            pose.keypoint(id)
                .filter(|kp| kp.confidence >= min_confidence)
                .copied()
        };
        let resolved = REQUIRED_JOINTS.map(lookup);
        let missing: Vec<JointId> = REQUIRED_JOINTS
            .iter()
            .zip(resolved.iter())
            .filter(|(_, kp)| kp.is_none())
            .map(|(id, _)| *id)
            .collect();

        let [Some(left_shoulder), Some(right_shoulder), Some(left_ear), Some(right_ear), Some(nose)] =
            resolved
        else {
            return Err(IncompletePose { missing });
        };
        Ok(Self {
            left_shoulder,
            right_shoulder,
            left_ear,
            right_ear,
            nose,
        })
    }

    pub fn joints(&self) -> [Keypoint; 5] {
        [
            self.left_shoulder,
            self.right_shoulder,
            self.left_ear,
            self.right_ear,
            self.nose,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_pose(confidence: f32) -> Pose {
        Pose::new(
            vec![
                Keypoint::new(JointId::LeftShoulder, 100.0, 200.0, confidence),
                Keypoint::new(JointId::RightShoulder, 300.0, 200.0, confidence),
                Keypoint::new(JointId::LeftEar, 100.0, 100.0, confidence),
                Keypoint::new(JointId::RightEar, 300.0, 100.0, confidence),
                Keypoint::new(JointId::Nose, 200.0, 100.0, confidence),
                Keypoint::new(JointId::LeftHip, 120.0, 400.0, confidence),
            ],
            confidence,
        )
    }

    #[test]
    fn resolves_all_required_joints_in_order() {
        let body = UpperBody::from_pose(&full_pose(0.9), 0.3).unwrap();
        let ids: Vec<JointId> = body.joints().iter().map(|kp| kp.id).collect();
        assert_eq!(ids, REQUIRED_JOINTS.to_vec());
    }

    #[test]
    fn reports_every_missing_joint() {
        let mut pose = full_pose(0.9);
        pose.keypoints
            .retain(|kp| kp.id != JointId::Nose && kp.id != JointId::LeftEar);
        let err = UpperBody::from_pose(&pose, 0.3).unwrap_err();
        assert_eq!(err.missing, vec![JointId::LeftEar, JointId::Nose]);
    }

    #[test]
    fn low_confidence_joints_count_as_missing() {
        let err = UpperBody::from_pose(&full_pose(0.2), 0.3).unwrap_err();
        assert_eq!(err.missing.len(), 5);
    }
}
