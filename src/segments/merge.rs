//! Joins collinear fragments of one drawn stroke.
//!
//! Hand-drawn lines break into several short regions wherever the pen
//! pressure drops. Two segments are joined when their orientations agree,
//! the endpoints of each lie close to the other's supporting line and the
//! gap between them along that line is small.

use super::types::LineSegment;
use crate::angle::difference_deg;

#[derive(Clone, Copy, Debug)]
pub(super) struct MergeTolerance {
    pub angle_deg: f32,
    /// Largest perpendicular endpoint offset.
    pub offset_px: f32,
    /// Largest gap along the shared direction.
    pub gap_px: f32,
}

/// Interval of `s` projected on the unit direction `t` through `origin`.
fn span_on(s: &LineSegment, origin: [f32; 2], t: [f32; 2]) -> (f32, f32) {
    let a = (s.p0[0] - origin[0]) * t[0] + (s.p0[1] - origin[1]) * t[1];
    let b = (s.p1[0] - origin[0]) * t[0] + (s.p1[1] - origin[1]) * t[1];
    (a.min(b), a.max(b))
}

fn offset_from(s: &LineSegment, origin: [f32; 2], t: [f32; 2]) -> f32 {
    let n = [-t[1], t[0]];
    [s.p0, s.p1]
        .iter()
        .map(|p| ((p[0] - origin[0]) * n[0] + (p[1] - origin[1]) * n[1]).abs())
        .fold(0.0, f32::max)
}

/// Merged segment when `a` (the longer) and `b` belong to one stroke.
fn try_merge(a: &LineSegment, b: &LineSegment, tol: &MergeTolerance) -> Option<LineSegment> {
    if difference_deg(a.angle_deg(), b.angle_deg()) > tol.angle_deg {
        return None;
    }
    let t = a.direction();
    if t == [0.0, 0.0] {
        return None;
    }
    let origin = a.midpoint();
    if offset_from(b, origin, t) > tol.offset_px {
        return None;
    }
    let (a0, a1) = span_on(a, origin, t);
    let (b0, b1) = span_on(b, origin, t);
    let gap = (b0 - a1).max(a0 - b1);
    if gap > tol.gap_px {
        return None;
    }
    let (lo, hi) = (a0.min(b0), a1.max(b1));
    let (la, lb) = (a.length(), b.length());
    let avg_mag = (a.avg_mag * la + b.avg_mag * lb) / (la + lb).max(1e-6);
    Some(LineSegment {
        p0: [origin[0] + lo * t[0], origin[1] + lo * t[1]],
        p1: [origin[0] + hi * t[0], origin[1] + hi * t[1]],
        avg_mag,
        strength: (hi - lo) * avg_mag.max(1e-3),
    })
}

/// Greedy merging, strongest segments first, repeated until stable. Output
/// is sorted by decreasing strength.
pub(super) fn merge_collinear(mut segments: Vec<LineSegment>, tol: &MergeTolerance) -> Vec<LineSegment> {
    loop {
        segments.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        let before = segments.len();
        let mut merged: Vec<LineSegment> = Vec::with_capacity(before);
        for seg in segments {
            let hit = merged.iter().enumerate().find_map(|(i, m)| {
                let (long, short) = if m.length() >= seg.length() { (m, &seg) } else { (&seg, m) };
                try_merge(long, short, tol).map(|joined| (i, joined))
            });
            match hit {
                Some((i, joined)) => merged[i] = joined,
                None => merged.push(seg),
            }
        }
        segments = merged;
        if segments.len() == before {
            segments.sort_by(|a, b| b.strength.total_cmp(&a.strength));
            return segments;
        }
    }
}
