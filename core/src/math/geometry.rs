use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Angle at vertex `b` swept from ray b→a to ray b→c, in degrees within `[0, 360)`.
///
/// Degenerate rays (a or c equal to b) yield a finite value because `atan2(0, 0)`
/// is defined as zero.
pub fn angle_deg(a: Point2, b: Point2, c: Point2) -> f32 {
    let to_c = (c.y - b.y).atan2(c.x - b.x);
    let to_a = (a.y - b.y).atan2(a.x - b.x);
    let mut degrees = (to_c - to_a).to_degrees();
    if degrees < 0.0 {
        degrees += 360.0;
    }
    if degrees >= 360.0 {
        degrees -= 360.0;
    }
    degrees
}
