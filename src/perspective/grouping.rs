//! Orientation grouping of line segments.
//!
//! Segments are visited in order and joined to the first group whose running
//! mean angle lies within the tolerance; otherwise they start a new group.
//! Angles are undirected, so the mean is updated with the signed difference
//! folded into (-90°, 90°] and the 0°/180° seam is handled transparently.

use crate::angle::{normalize_half_turn_deg, signed_difference_deg};
use crate::segments::LineSegment;
use serde::Serialize;

/// Set of near-parallel segments in image space.
#[derive(Clone, Debug, Serialize)]
pub struct LineGroup {
    /// Running mean orientation in degrees, [0, 180).
    pub mean_angle_deg: f32,
    /// Indices into the segment slice the group was built from.
    pub members: Vec<usize>,
}

impl LineGroup {
    fn new(angle_deg: f32, idx: usize) -> Self {
        Self {
            mean_angle_deg: angle_deg,
            members: vec![idx],
        }
    }

    fn push(&mut self, angle_deg: f32, idx: usize) {
        self.members.push(idx);
        let n = self.members.len() as f32;
        let delta = signed_difference_deg(angle_deg, self.mean_angle_deg);
        self.mean_angle_deg = normalize_half_turn_deg(self.mean_angle_deg + delta / n);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Groups segments whose orientation is within `tol_deg` of a group's running
/// mean. Groups with fewer than `min_size` members are discarded.
pub fn group_by_angle(segs: &[LineSegment], tol_deg: f32, min_size: usize) -> Vec<LineGroup> {
    let mut groups: Vec<LineGroup> = Vec::new();
    for (idx, seg) in segs.iter().enumerate() {
        if seg.length() <= f32::EPSILON {
            continue;
        }
        let angle = seg.angle_deg();
        match groups
            .iter_mut()
            .find(|g| signed_difference_deg(angle, g.mean_angle_deg).abs() < tol_deg)
        {
            Some(group) => group.push(angle, idx),
            None => groups.push(LineGroup::new(angle, idx)),
        }
    }
    groups.retain(|g| g.len() >= min_size);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg_at(angle_deg: f32, offset: f32) -> LineSegment {
        let r = angle_deg.to_radians();
        LineSegment::new(
            [offset, offset],
            [offset + 50.0 * r.cos(), offset + 50.0 * r.sin()],
        )
    }

    #[test]
    fn groups_require_three_members() {
        let segs = vec![
            seg_at(10.0, 0.0),
            seg_at(11.0, 5.0),
            seg_at(12.0, 10.0),
            seg_at(60.0, 0.0),
            seg_at(61.0, 5.0),
        ];
        let groups = group_by_angle(&segs, 3.0, 3);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
        assert!((groups[0].mean_angle_deg - 11.0).abs() < 1e-3);
    }

    #[test]
    fn grouping_wraps_around_half_turn() {
        let segs = vec![
            seg_at(179.0, 0.0),
            seg_at(1.0, 5.0),
            seg_at(0.5, 10.0),
        ];
        let groups = group_by_angle(&segs, 3.0, 3);
        assert_eq!(groups.len(), 1);
        let mean = groups[0].mean_angle_deg;
        assert!(mean < 1.0 || mean > 179.0, "mean={mean}");
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_by_angle(&[], 3.0, 3).is_empty());
    }
}
