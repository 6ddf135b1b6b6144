pub mod keypoint;
pub mod upper_body;

pub use keypoint::{JointId, Keypoint, Pose};
pub use upper_body::{IncompletePose, UpperBody, REQUIRED_JOINTS};
