//! Planar polygon helpers for ground footprints (x right, y away from the
//! viewer, counter-clockwise positive).

use serde::{Deserialize, Serialize};

const EPS: f32 = 1e-6;

/// Shoelace area, positive for counter-clockwise rings.
pub fn signed_area(pts: &[[f32; 2]]) -> f32 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f32;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    0.5 * acc
}

pub fn area(pts: &[[f32; 2]]) -> f32 {
    signed_area(pts).abs()
}

/// Area centroid; falls back to the vertex mean for degenerate rings.
pub fn centroid(pts: &[[f32; 2]]) -> [f32; 2] {
    if pts.is_empty() {
        return [0.0, 0.0];
    }
    let a = signed_area(pts);
    if a.abs() <= EPS {
        let n = pts.len() as f32;
        let (sx, sy) = pts
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        return [sx / n, sy / n];
    }
    let mut cx = 0.0f32;
    let mut cy = 0.0f32;
    for i in 0..pts.len() {
        let p = pts[i];
        let q = pts[(i + 1) % pts.len()];
        let cross = p[0] * q[1] - q[0] * p[1];
        cx += (p[0] + q[0]) * cross;
        cy += (p[1] + q[1]) * cross;
    }
    [cx / (6.0 * a), cy / (6.0 * a)]
}

/// Even-odd point-in-polygon test. Points on the boundary may go either way.
pub fn contains_point(pts: &[[f32; 2]], p: [f32; 2]) -> bool {
    let mut inside = false;
    let n = pts.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (pts[i], pts[j]);
        if (a[1] > p[1]) != (b[1] > p[1]) {
            let x = (b[0] - a[0]) * (p[1] - a[1]) / (b[1] - a[1]) + a[0];
            if p[0] < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn orient(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(a: [f32; 2], b: [f32; 2], p: [f32; 2]) -> bool {
    p[0] >= a[0].min(b[0]) - EPS
        && p[0] <= a[0].max(b[0]) + EPS
        && p[1] >= a[1].min(b[1]) - EPS
        && p[1] <= a[1].max(b[1]) + EPS
}

/// Closed-segment intersection test, collinear overlaps included.
pub fn segments_intersect(p1: [f32; 2], p2: [f32; 2], q1: [f32; 2], q2: [f32; 2]) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return true;
    }
    (d1.abs() <= EPS && on_segment(q1, q2, p1))
        || (d2.abs() <= EPS && on_segment(q1, q2, p2))
        || (d3.abs() <= EPS && on_segment(p1, p2, q1))
        || (d4.abs() <= EPS && on_segment(p1, p2, q2))
}

/// True when no two non-adjacent edges of the closed ring touch.
pub fn is_simple(pts: &[[f32; 2]]) -> bool {
    let n = pts.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        let (a1, a2) = (pts[i], pts[(i + 1) % n]);
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let (b1, b2) = (pts[j], pts[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }
    true
}

/// Drops consecutive duplicates (and a closing point equal to the first).
pub fn dedup_points(pts: &[[f32; 2]], tol: f32) -> Vec<[f32; 2]> {
    let mut out: Vec<[f32; 2]> = Vec::with_capacity(pts.len());
    for &p in pts {
        if let Some(last) = out.last() {
            if (last[0] - p[0]).abs() <= tol && (last[1] - p[1]).abs() <= tol {
                continue;
            }
        }
        out.push(p);
    }
    while out.len() > 1 {
        let (first, last) = (out[0], out[out.len() - 1]);
        if (first[0] - last[0]).abs() <= tol && (first[1] - last[1]).abs() <= tol {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Axis-aligned rectangle, counter-clockwise from the near-left corner.
pub fn rectangle(center: [f32; 2], width: f32, depth: f32) -> Vec<[f32; 2]> {
    let (hw, hd) = (0.5 * width.abs(), 0.5 * depth.abs());
    vec![
        [center[0] - hw, center[1] - hd],
        [center[0] + hw, center[1] - hd],
        [center[0] + hw, center[1] + hd],
        [center[0] - hw, center[1] + hd],
    ]
}

/// `rectangle` turned counter-clockwise by `rotation_deg` about its centre.
pub fn rotated_box(center: [f32; 2], width: f32, depth: f32, rotation_deg: f32) -> Vec<[f32; 2]> {
    let (s, c) = rotation_deg.to_radians().sin_cos();
    rectangle([0.0, 0.0], width, depth)
        .into_iter()
        .map(|p| {
            [
                center[0] + c * p[0] - s * p[1],
                center[1] + s * p[0] + c * p[1],
            ]
        })
        .collect()
}

/// Axis-aligned bounds in the ground plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds2 {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Bounds2 {
    pub fn of(pts: &[[f32; 2]]) -> Option<Self> {
        let first = *pts.first()?;
        let mut b = Bounds2 {
            min: first,
            max: first,
        };
        for p in &pts[1..] {
            b.include(*p);
        }
        Some(b)
    }

    pub fn include(&mut self, p: [f32; 2]) {
        self.min = [self.min[0].min(p[0]), self.min[1].min(p[1])];
        self.max = [self.max[0].max(p[0]), self.max[1].max(p[1])];
    }

    pub fn union(&self, other: &Bounds2) -> Bounds2 {
        let mut b = *self;
        b.include(other.min);
        b.include(other.max);
        b
    }

    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    pub fn depth(&self) -> f32 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> [f32; 2] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_sign_follows_winding() {
        let ccw = rectangle([0.0, 0.0], 4.0, 2.0);
        assert!((signed_area(&ccw) - 8.0).abs() < 1e-5);
        let cw: Vec<[f32; 2]> = ccw.iter().rev().copied().collect();
        assert!((signed_area(&cw) + 8.0).abs() < 1e-5);
        assert_eq!(centroid(&ccw), [0.0, 0.0]);
    }

    #[test]
    fn bowtie_is_not_simple() {
        let bowtie = [[0.0, 0.0], [2.0, 2.0], [2.0, 0.0], [0.0, 2.0]];
        assert!(!is_simple(&bowtie));
        assert!(is_simple(&rectangle([1.0, 1.0], 2.0, 2.0)));
    }

    #[test]
    fn point_in_polygon() {
        let r = rectangle([5.0, 5.0], 4.0, 4.0);
        assert!(contains_point(&r, [5.0, 5.0]));
        assert!(!contains_point(&r, [8.0, 5.0]));
    }

    #[test]
    fn dedup_removes_repeats_and_closing_point() {
        let pts = [[0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        assert_eq!(dedup_points(&pts, 1e-4).len(), 3);
    }
}
