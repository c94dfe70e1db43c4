//! Vanishing geometry of a single image.
//!
//! Segments are grouped by orientation (3° running-mean tolerance, groups of
//! at least three). Horizontal-ish groups are pooled and fitted with
//! sequential RANSAC; up to two finite vanishing points give a two-point frame
//! whose horizon is the mean of their rows. Vertical-ish groups yield an
//! optional vertical vanishing point.
//!
//! Degradation order: two-point, one-point (single finite VP), parallel (all
//! horizontal VPs at infinity), then a centred one-point fallback. The
//! estimator never fails.

mod grouping;
mod quality;
mod ransac;
mod vp;

pub use grouping::{group_by_angle, LineGroup};
pub use quality::{assess, PerspectiveQuality, QualityLabel};
pub use ransac::RansacParams;

use crate::angle::{is_horizontal_deg, is_vertical_deg};
use crate::segments::LineSegment;
use log::{debug, warn};
use nalgebra::Vector3;
use ransac::{fit_sequential, fit_vanishing_point, VpFit};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VpKind {
    Left,
    Right,
    Center,
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveType {
    OnePoint,
    TwoPoint,
    Parallel,
}

impl PerspectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerspectiveType::OnePoint => "one_point",
            PerspectiveType::TwoPoint => "two_point",
            PerspectiveType::Parallel => "parallel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VanishingPoint {
    /// Pixel position.
    pub position: [f32; 2],
    pub kind: VpKind,
    pub confidence: f32,
    pub inliers: usize,
}

/// Immutable vanishing geometry shared by every downstream stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveFrame {
    pub perspective_type: PerspectiveType,
    pub vanishing_points: Vec<VanishingPoint>,
    /// Horizon as a pixel row.
    pub horizon_y: f32,
    pub image_size: [usize; 2],
    pub confidence: f32,
    pub quality: Option<PerspectiveQuality>,
    /// Set when no usable geometry was found.
    #[serde(default)]
    pub fallback: bool,
}

impl PerspectiveFrame {
    /// Centred one-point frame used when no usable geometry was found.
    pub fn fallback(width: usize, height: usize) -> Self {
        let (cx, cy) = (width as f32 * 0.5, height as f32 * 0.5);
        Self {
            perspective_type: PerspectiveType::OnePoint,
            vanishing_points: vec![VanishingPoint {
                position: [cx, cy],
                kind: VpKind::Center,
                confidence: 0.5,
                inliers: 0,
            }],
            horizon_y: cy,
            image_size: [width, height],
            confidence: 0.3,
            quality: None,
            fallback: true,
        }
    }

    pub fn vp(&self, kind: VpKind) -> Option<&VanishingPoint> {
        self.vanishing_points.iter().find(|v| v.kind == kind)
    }

    pub fn left(&self) -> Option<&VanishingPoint> {
        self.vp(VpKind::Left)
    }

    pub fn right(&self) -> Option<&VanishingPoint> {
        self.vp(VpKind::Right)
    }

    pub fn vertical(&self) -> Option<&VanishingPoint> {
        self.vp(VpKind::Vertical)
    }

    /// Horizon as a homogeneous line `y - horizon_y = 0`.
    pub fn horizon_line(&self) -> Vector3<f32> {
        Vector3::new(0.0, 1.0, -self.horizon_y)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VanishingParams {
    pub group_tolerance_deg: f32,
    pub min_group_size: usize,
    /// Groups closer than this to 0°/180° are horizontal-ish.
    pub horizontal_max_deg: f32,
    /// Groups within this of 90° are vertical-ish.
    pub vertical_tolerance_deg: f32,
    pub max_horizontal_vps: usize,
    /// VPs farther than this many image diagonals from the centre are
    /// treated as points at infinity.
    pub finite_limit_diagonals: f32,
    pub ransac: RansacParams,
}

impl Default for VanishingParams {
    fn default() -> Self {
        Self {
            group_tolerance_deg: 3.0,
            min_group_size: 3,
            horizontal_max_deg: 45.0,
            vertical_tolerance_deg: 20.0,
            max_horizontal_vps: 2,
            finite_limit_diagonals: 50.0,
            ransac: RansacParams::default(),
        }
    }
}

/// Estimator output with the intermediate groups kept for tracing.
#[derive(Clone, Debug)]
pub struct VanishingResult {
    pub frame: PerspectiveFrame,
    pub groups: Vec<LineGroup>,
    pub elapsed_ms: f64,
}

#[derive(Clone, Debug, Default)]
pub struct VanishingPointEstimator {
    pub params: VanishingParams,
}

fn vp_confidence(inliers: usize) -> f32 {
    (1.0 - (-(inliers as f32) / 6.0).exp()).clamp(0.0, 1.0)
}

impl VanishingPointEstimator {
    pub fn new(params: VanishingParams) -> Self {
        Self { params }
    }

    pub fn estimate(&self, segs: &[LineSegment], width: usize, height: usize) -> VanishingResult {
        let t0 = Instant::now();
        let p = &self.params;
        let groups = group_by_angle(segs, p.group_tolerance_deg, p.min_group_size);

        let mut horizontal: Vec<usize> = Vec::new();
        let mut vertical: Vec<usize> = Vec::new();
        let mut horizontal_groups = 0usize;
        for g in &groups {
            if is_horizontal_deg(g.mean_angle_deg, p.horizontal_max_deg) {
                horizontal.extend_from_slice(&g.members);
                horizontal_groups += 1;
            } else if is_vertical_deg(g.mean_angle_deg, p.vertical_tolerance_deg) {
                vertical.extend_from_slice(&g.members);
            }
        }

        let fits = fit_sequential(segs, &horizontal, p.max_horizontal_vps, &p.ransac);
        let limit = p.finite_limit_diagonals * ((width * width + height * height) as f32).sqrt();
        let centre = [width as f32 * 0.5, height as f32 * 0.5];
        let is_finite = |fit: &VpFit| {
            fit.point[2] != 0.0
                && (fit.point[0] - centre[0]).hypot(fit.point[1] - centre[1]) <= limit
        };
        let mut finite: Vec<&VpFit> = fits.iter().filter(|f| is_finite(f)).collect();
        finite.sort_by(|a, b| a.point[0].total_cmp(&b.point[0]));

        let mut frame = if finite.len() >= 2 {
            let (l, r) = (finite[0], finite[finite.len() - 1]);
            let left = VanishingPoint {
                position: [l.point[0], l.point[1]],
                kind: VpKind::Left,
                confidence: vp_confidence(l.inliers.len()),
                inliers: l.inliers.len(),
            };
            let right = VanishingPoint {
                position: [r.point[0], r.point[1]],
                kind: VpKind::Right,
                confidence: vp_confidence(r.inliers.len()),
                inliers: r.inliers.len(),
            };
            PerspectiveFrame {
                perspective_type: PerspectiveType::TwoPoint,
                horizon_y: 0.5 * (left.position[1] + right.position[1]),
                confidence: 0.5 * (left.confidence + right.confidence),
                vanishing_points: vec![left, right],
                image_size: [width, height],
                quality: None,
                fallback: false,
            }
        } else if let Some(c) = finite.first() {
            let center = VanishingPoint {
                position: [c.point[0], c.point[1]],
                kind: VpKind::Center,
                confidence: vp_confidence(c.inliers.len()),
                inliers: c.inliers.len(),
            };
            PerspectiveFrame {
                perspective_type: PerspectiveType::OnePoint,
                horizon_y: center.position[1],
                confidence: center.confidence * 0.75,
                vanishing_points: vec![center],
                image_size: [width, height],
                quality: None,
                fallback: false,
            }
        } else if !fits.is_empty() {
            debug!("VP: horizontal families converge at infinity, parallel frame");
            PerspectiveFrame {
                perspective_type: PerspectiveType::Parallel,
                vanishing_points: Vec::new(),
                horizon_y: centre[1],
                image_size: [width, height],
                confidence: 0.5,
                quality: None,
                fallback: false,
            }
        } else {
            warn!(
                "VP: no usable vanishing geometry (segments={} groups={}), centred one-point fallback",
                segs.len(),
                groups.len()
            );
            PerspectiveFrame::fallback(width, height)
        };

        if let Some(fit) = fit_vanishing_point(segs, &vertical, &p.ransac) {
            if fit.point[2] != 0.0 {
                frame.vanishing_points.push(VanishingPoint {
                    position: [fit.point[0], fit.point[1]],
                    kind: VpKind::Vertical,
                    confidence: vp_confidence(fit.inliers.len()),
                    inliers: fit.inliers.len(),
                });
            }
        }
        frame.quality = Some(assess(&frame));

        let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "VP: segs={} groups={} horizontal_groups={} fits={} type={} horizon_y={:.1} confidence={:.3} elapsed_ms={:.3}",
            segs.len(),
            groups.len(),
            horizontal_groups,
            fits.len(),
            frame.perspective_type.as_str(),
            frame.horizon_y,
            frame.confidence,
            elapsed_ms
        );
        VanishingResult {
            frame,
            groups,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rays(vp: [f32; 2], angles_deg: &[f32], start: f32) -> Vec<LineSegment> {
        angles_deg
            .iter()
            .map(|a| {
                let r = a.to_radians();
                let (c, s) = (r.cos(), r.sin());
                LineSegment::new(
                    [vp[0] + start * c, vp[1] + start * s],
                    [vp[0] + (start + 60.0) * c, vp[1] + (start + 60.0) * s],
                )
            })
            .collect()
    }

    #[test]
    fn horizon_is_mean_of_left_and_right_vps() {
        // Two groups per family, each group spanning less than 3 degrees.
        let mut segs = rays([-300.0, 100.0], &[10.0, 11.0, 12.0, 20.0, 21.0, 22.0], 350.0);
        segs.extend(rays(
            [900.0, 140.0],
            &[158.0, 159.0, 160.0, 168.0, 169.0, 170.0],
            350.0,
        ));
        let est = VanishingPointEstimator::default();
        let result = est.estimate(&segs, 640, 480);
        let frame = result.frame;
        assert_eq!(frame.perspective_type, PerspectiveType::TwoPoint);
        let left = frame.left().expect("left vp");
        let right = frame.right().expect("right vp");
        assert!(left.position[0] < right.position[0]);
        assert!((left.position[1] - 100.0).abs() < 0.5);
        assert!((right.position[1] - 140.0).abs() < 0.5);
        assert!((frame.horizon_y - 120.0).abs() < 0.5, "{}", frame.horizon_y);
        assert!(frame.confidence > 0.5);
    }

    #[test]
    fn no_segments_degrades_to_centred_one_point() {
        let est = VanishingPointEstimator::default();
        let frame = est.estimate(&[], 200, 100).frame;
        assert_eq!(frame.perspective_type, PerspectiveType::OnePoint);
        let c = frame.vp(VpKind::Center).expect("center vp");
        assert_eq!(c.position, [100.0, 50.0]);
        assert_eq!(c.confidence, 0.5);
        assert_eq!(frame.horizon_y, 50.0);
    }

    #[test]
    fn parallel_family_gives_parallel_frame() {
        let segs: Vec<LineSegment> = (0..5)
            .map(|i| {
                let y = 20.0 + 12.0 * i as f32;
                LineSegment::new([10.0, y], [90.0, y])
            })
            .collect();
        let frame = VanishingPointEstimator::default()
            .estimate(&segs, 100, 100)
            .frame;
        assert_eq!(frame.perspective_type, PerspectiveType::Parallel);
        assert_eq!(frame.horizon_y, 50.0);
        assert_eq!(frame.confidence, 0.5);
    }

    #[test]
    fn converging_verticals_report_vertical_vp() {
        let mut segs = rays([-300.0, 100.0], &[10.0, 11.0, 12.0], 350.0);
        segs.extend(rays([320.0, 2000.0], &[-95.0, -94.0, -93.0], 1600.0));
        let frame = VanishingPointEstimator::default()
            .estimate(&segs, 640, 480)
            .frame;
        assert_eq!(frame.perspective_type, PerspectiveType::OnePoint);
        let v = frame.vertical().expect("vertical vp");
        assert!((v.position[1] - 2000.0).abs() < 5.0, "{:?}", v.position);
    }
}
