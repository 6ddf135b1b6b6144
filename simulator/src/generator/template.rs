use posturecore::pose::JointId;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Canned upper-body layouts the generator can replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosturePreset {
    Upright,
    Slouched,
    RaisedLeftShoulder,
    RaisedRightShoulder,
    /// Nobody in front of the camera.
    Away,
}

impl PosturePreset {
    /// Joint positions in a 640x480 frame, or `None` for an empty frame.
    pub fn joints(&self) -> Option<[(JointId, f32, f32); 5]> {
        let layout: [(f32, f32); 5] = match self {
            Self::Upright => [
                (220.0, 300.0),
                (420.0, 300.0),
                (230.0, 180.0),
                (410.0, 180.0),
                (320.0, 190.0),
            ],
            Self::Slouched => [
                (220.0, 300.0),
                (420.0, 300.0),
                (300.0, 230.0),
                (340.0, 230.0),
                (320.0, 250.0),
            ],
            Self::RaisedLeftShoulder => [
                (220.0, 268.0),
                (420.0, 305.0),
                (225.0, 160.0),
                (415.0, 175.0),
                (320.0, 180.0),
            ],
            Self::RaisedRightShoulder => [
                (220.0, 305.0),
                (420.0, 268.0),
                (225.0, 175.0),
                (415.0, 160.0),
                (320.0, 180.0),
            ],
            Self::Away => return None,
        };
        let ids = [
            JointId::LeftShoulder,
            JointId::RightShoulder,
            JointId::LeftEar,
            JointId::RightEar,
            JointId::Nose,
        ];
        Some(std::array::from_fn(|i| (ids[i], layout[i].0, layout[i].1)))
    }
}

/// Horizontal body sway for a frame, a slow sine of the given amplitude.
pub fn sway(frame: usize, amplitude: f32, period_frames: usize) -> f32 {
    let period = period_frames.max(1) as f32;
    ((frame as f32 / period) * 2.0 * PI).sin() * amplitude
}
