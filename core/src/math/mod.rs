pub mod geometry;
pub mod stats;

pub use geometry::{angle_deg, Point2};
pub use stats::ExponentialAverage;
