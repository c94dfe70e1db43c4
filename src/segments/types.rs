use crate::angle::normalize_half_turn_deg;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Straight edge detected in pixel space.
///
/// Orientation is undirected: `angle_deg` lies in `[0, 180)` and swapping the
/// endpoints does not change it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    /// Average gradient magnitude along the supporting region.
    pub avg_mag: f32,
    /// Saliency weight (`length * avg_mag`).
    pub strength: f32,
}

impl LineSegment {
    /// Segment with unit magnitude; strength equals the length.
    pub fn new(p0: [f32; 2], p1: [f32; 2]) -> Self {
        let mut seg = Self {
            p0,
            p1,
            avg_mag: 1.0,
            strength: 0.0,
        };
        seg.strength = seg.length();
        seg
    }

    pub fn length(&self) -> f32 {
        let dx = self.p1[0] - self.p0[0];
        let dy = self.p1[1] - self.p0[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// Undirected orientation in degrees, `[0, 180)`.
    pub fn angle_deg(&self) -> f32 {
        let dx = self.p1[0] - self.p0[0];
        let dy = self.p1[1] - self.p0[1];
        normalize_half_turn_deg(dy.atan2(dx).to_degrees())
    }

    pub fn midpoint(&self) -> [f32; 2] {
        [
            (self.p0[0] + self.p1[0]) * 0.5,
            (self.p0[1] + self.p1[1]) * 0.5,
        ]
    }

    /// Unit direction from `p0` to `p1`, zero for a degenerate segment.
    pub fn direction(&self) -> [f32; 2] {
        let len = self.length();
        if len > 0.0 {
            [
                (self.p1[0] - self.p0[0]) / len,
                (self.p1[1] - self.p0[1]) / len,
            ]
        } else {
            [0.0, 0.0]
        }
    }

    /// Line representation: ax + by + c = 0, with sqrt(a^2+b^2)=1
    pub fn line(&self) -> Vector3<f32> {
        let a = self.p1[1] - self.p0[1];
        let b = self.p0[0] - self.p1[0];
        let c = self.p1[0] * self.p0[1] - self.p0[0] * self.p1[1];
        let norm = (a * a + b * b).sqrt().max(1e-9);
        Vector3::new(a / norm, b / norm, c / norm)
    }

    /// Homogeneous line through both endpoints (unnormalized cross product).
    pub fn homogeneous_line(&self) -> Vector3<f32> {
        let a = Vector3::new(self.p0[0], self.p0[1], 1.0);
        let b = Vector3::new(self.p1[0], self.p1[1], 1.0);
        a.cross(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn angle_is_undirected() {
        let a = LineSegment::new([0.0, 0.0], [10.0, 10.0]);
        let b = LineSegment::new([10.0, 10.0], [0.0, 0.0]);
        assert!((a.angle_deg() - 45.0).abs() < 1e-3);
        assert!((b.angle_deg() - 45.0).abs() < 1e-3);
        assert!((a.length() - 200f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn normalized_line_passes_through_endpoints() {
        let s = LineSegment::new([3.0, 4.0], [13.0, 9.0]);
        let l = s.line();
        for p in [s.p0, s.p1] {
            assert!((l[0] * p[0] + l[1] * p[1] + l[2]).abs() < 1e-4);
        }
        assert!(((l[0] * l[0] + l[1] * l[1]).sqrt() - 1.0).abs() < 1e-5);
    }
}
