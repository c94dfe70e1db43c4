//! Ground footprints of verified buildings.
//!
//! Boxes whose bottom edge lies below the horizon are mapped through a
//! ground homography built from the frame's horizon: the bottom edge is the
//! front of the footprint and the back edge sits `depth_compression` of the
//! box height above it, never more than `max_depth_ratio` times farther from
//! the camera. Boxes at or above the horizon, or frames without a usable
//! horizon, use the affine map `x = (u - 0.5)S`, `y = (0.5 - v)Sk` and are
//! flagged.
//!
//! Rings are made counter-clockwise. Degenerate or self-intersecting rings
//! are replaced by an axis-aligned rectangle with the bounding box aspect
//! ratio, centred on the box centre under the affine map, and flagged.

mod homography;
pub mod polygon;

pub use homography::{
    apply_homography_points, perspective_ground_homography, simplified_ground_homography,
};
pub use polygon::Bounds2;

use crate::perspective::PerspectiveFrame;
use crate::verify::VerifiedBuilding;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

const DEDUP_TOL: f32 = 1e-4;
const MIN_AREA: f32 = 1e-4;

/// Counter-clockwise, simple ground polygon with at least three vertices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroundFootprint {
    points: Vec<[f32; 2]>,
}

impl GroundFootprint {
    /// Validates a ring: duplicates removed, at least three vertices, non-zero
    /// area, no self-intersection. Clockwise input is reversed.
    pub fn from_points(pts: &[[f32; 2]]) -> Option<Self> {
        if pts.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return None;
        }
        let mut points = polygon::dedup_points(pts, DEDUP_TOL);
        if points.len() < 3 || polygon::area(&points) <= MIN_AREA || !polygon::is_simple(&points) {
            return None;
        }
        if polygon::signed_area(&points) < 0.0 {
            points.reverse();
        }
        Some(Self { points })
    }

    /// Axis-aligned rectangle footprint; `None` for non-positive extents.
    pub fn rectangle(center: [f32; 2], width: f32, depth: f32) -> Option<Self> {
        if !(width > 0.0 && depth > 0.0) {
            return None;
        }
        Self::from_points(&polygon::rectangle(center, width, depth))
    }

    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    pub fn area(&self) -> f32 {
        polygon::area(&self.points)
    }

    pub fn centroid(&self) -> [f32; 2] {
        polygon::centroid(&self.points)
    }

    pub fn bounds(&self) -> Bounds2 {
        // Never empty by construction.
        Bounds2::of(&self.points).unwrap_or(Bounds2 {
            min: [0.0, 0.0],
            max: [0.0, 0.0],
        })
    }

    pub fn contains(&self, p: [f32; 2]) -> bool {
        polygon::contains_point(&self.points, p)
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self.points.iter().map(|p| [p[0] + dx, p[1] + dy]).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionParams {
    /// Scene width (world units) spanned by the image width.
    pub scene_width: f32,
    /// Depth foreshortening applied to the vertical image axis.
    pub depth_compression: f32,
    /// Smallest edge of a fallback rectangle.
    pub min_extent: f32,
    /// Normalized rows a box bottom must clear below the horizon.
    pub min_horizon_gap: f32,
    /// Largest back-to-front camera distance ratio of a footprint.
    pub max_depth_ratio: f32,
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self {
            scene_width: 100.0,
            depth_compression: 0.6,
            min_extent: 1.0,
            min_horizon_gap: 0.02,
            max_depth_ratio: 2.0,
        }
    }
}

/// Verified building with its ground footprint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectedBuilding {
    pub building: VerifiedBuilding,
    pub footprint: GroundFootprint,
    /// Bottom-left and bottom-right bbox corners on the ground.
    pub ground_contact: [[f32; 2]; 2],
    pub footprint_fallback: bool,
}

#[derive(Clone, Debug, Default)]
pub struct GroundFootprintProjector {
    pub params: ProjectionParams,
}

impl GroundFootprintProjector {
    pub fn new(params: ProjectionParams) -> Self {
        Self { params }
    }

    pub fn project(
        &self,
        buildings: &[VerifiedBuilding],
        frame: &PerspectiveFrame,
    ) -> Vec<ProjectedBuilding> {
        let p = &self.params;
        let affine = simplified_ground_homography(p.scene_width, p.depth_compression);
        let horizon_v = horizon_row(frame);
        let perspective = horizon_v.and_then(|hv| {
            perspective_ground_homography(p.scene_width, p.depth_compression, hv).map(|h| (hv, h))
        });
        if perspective.is_none() {
            warn!(
                "Footprint: horizon {:?} unusable, using the affine ground map",
                horizon_v
            );
        }
        let depth_ratio = p.max_depth_ratio.max(1.0 + 1e-3);
        let mut fallbacks = 0usize;
        let projected: Vec<ProjectedBuilding> = buildings
            .iter()
            .map(|b| {
                let bbox = b.bbox();
                let (ground, below_horizon) = match perspective {
                    Some((hv, h)) if bbox.y1 > hv + p.min_horizon_gap => {
                        let back = (bbox.y1 - p.depth_compression * bbox.height())
                            .max(hv + (bbox.y1 - hv) / depth_ratio);
                        let corners = [
                            [bbox.x0, bbox.y1],
                            [bbox.x1, bbox.y1],
                            [bbox.x1, back],
                            [bbox.x0, back],
                        ];
                        (apply_homography_points(&h, &corners), true)
                    }
                    _ => {
                        let corners = [
                            [bbox.x0, bbox.y1],
                            [bbox.x1, bbox.y1],
                            [bbox.x1, bbox.y0],
                            [bbox.x0, bbox.y0],
                        ];
                        (apply_homography_points(&affine, &corners), false)
                    }
                };
                if perspective.is_some() && !below_horizon {
                    warn!(
                        "Footprint: {} bottom {:.3} not below horizon, using the affine ground map",
                        b.id(),
                        bbox.y1
                    );
                }
                let footprint = ground.as_deref().and_then(GroundFootprint::from_points);
                let ground_contact = match &ground {
                    Some(g) => [g[0], g[1]],
                    None => [[0.0, 0.0], [0.0, 0.0]],
                };
                let (footprint, footprint_fallback) = match footprint {
                    Some(fp) => (fp, !below_horizon),
                    None => {
                        warn!(
                            "Footprint: {} degenerate or self-intersecting, using rectangle",
                            b.id()
                        );
                        (self.fallback_rectangle(&affine, b), true)
                    }
                };
                fallbacks += usize::from(footprint_fallback);
                ProjectedBuilding {
                    building: b.clone(),
                    footprint,
                    ground_contact,
                    footprint_fallback,
                }
            })
            .collect();
        debug!(
            "Footprint: projected={} fallbacks={} horizon_v={:?} scene_width={} depth_compression={}",
            projected.len(),
            fallbacks,
            horizon_v,
            p.scene_width,
            p.depth_compression
        );
        projected
    }

    fn fallback_rectangle(
        &self,
        h: &nalgebra::Matrix3<f32>,
        building: &VerifiedBuilding,
    ) -> GroundFootprint {
        let p = &self.params;
        let bbox = building.bbox();
        let center = apply_homography_points(h, &[bbox.center()])
            .map(|c| c[0])
            .unwrap_or([0.0, 0.0]);
        let width = (bbox.width() * p.scene_width).max(p.min_extent);
        let depth = if bbox.width() > 0.0 {
            (width * bbox.height() / bbox.width()).max(p.min_extent)
        } else {
            p.min_extent
        };
        let square = polygon::rectangle(center, p.min_extent.max(1e-2), p.min_extent.max(1e-2));
        GroundFootprint::rectangle(center, width, depth).unwrap_or(GroundFootprint {
            points: square,
        })
    }
}

/// Horizon as a normalized image row.
fn horizon_row(frame: &PerspectiveFrame) -> Option<f32> {
    let img_h = frame.image_size[1] as f32;
    let hv = frame.horizon_y / img_h;
    (img_h > 0.0 && hv.is_finite()).then_some(hv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::verified;

    fn frame_with_horizon(horizon_y: f32) -> PerspectiveFrame {
        let mut f = PerspectiveFrame::fallback(100, 100);
        f.horizon_y = horizon_y;
        f
    }

    fn project_one(bbox: [f32; 4], horizon_y: f32) -> ProjectedBuilding {
        let out = GroundFootprintProjector::default()
            .project(&[verified("C1", bbox, Some(3))], &frame_with_horizon(horizon_y));
        out.into_iter().next().unwrap()
    }

    #[test]
    fn bbox_below_horizon_projects_to_trapezoid() {
        let out = project_one([0.3, 0.3, 0.6, 0.6], 20.0);
        let fp = &out.footprint;
        assert!(!out.footprint_fallback);
        assert_eq!(fp.points().len(), 4);
        assert!(polygon::signed_area(fp.points()) > 0.0);
        assert!(polygon::is_simple(fp.points()));
        let [bl, br] = out.ground_contact;
        assert!((bl[0] + 40.0).abs() < 1e-3 && (bl[1] - 18.0).abs() < 1e-3, "{bl:?}");
        assert!((br[0] - 20.0).abs() < 1e-3 && (br[1] - 18.0).abs() < 1e-3, "{br:?}");
        // Back edge at row 0.42: wider and deeper than the front.
        let b = fp.bounds();
        assert!((b.max[1] - 96.545).abs() < 1e-2, "{b:?}");
        assert!((b.width() - 109.09).abs() < 1e-2, "{b:?}");
    }

    #[test]
    fn equal_boxes_at_different_rows_get_different_extents() {
        let near = project_one([0.3, 0.5, 0.5, 0.9], 20.0);
        let far = project_one([0.3, 0.3, 0.5, 0.6], 20.0);
        let width = |p: &ProjectedBuilding| p.ground_contact[1][0] - p.ground_contact[0][0];
        assert!((width(&near) - 22.857).abs() < 1e-2, "{}", width(&near));
        assert!((width(&far) - 40.0).abs() < 1e-2, "{}", width(&far));
        assert!(far.ground_contact[0][1] > near.ground_contact[0][1]);

        // Same box, different horizon.
        let low_horizon = project_one([0.3, 0.3, 0.5, 0.6], 50.0);
        assert_ne!(low_horizon.footprint, far.footprint);
        assert!(width(&low_horizon) > width(&far));
    }

    #[test]
    fn bbox_above_horizon_uses_flagged_affine_map() {
        let out = project_one([0.3, 0.1, 0.6, 0.2], 20.0);
        assert!(out.footprint_fallback);
        // 30 x 6 world units.
        assert!((out.footprint.area() - 180.0).abs() < 1e-2, "{}", out.footprint.area());
    }

    #[test]
    fn degenerate_bbox_falls_back_to_rectangle() {
        let out = project_one([0.4, 0.2, 0.4, 0.7], 20.0);
        assert!(out.footprint_fallback);
        let fp = &out.footprint;
        assert!(fp.points().len() >= 3);
        assert!(fp.area() > 0.0);
        let c = fp.centroid();
        assert!((c[0] + 10.0).abs() < 1e-3 && (c[1] - 3.0).abs() < 1e-3, "{c:?}");
    }

    #[test]
    fn clockwise_ring_is_reversed() {
        let cw = [[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0]];
        let fp = GroundFootprint::from_points(&cw).unwrap();
        assert!(polygon::signed_area(fp.points()) > 0.0);
        assert!(GroundFootprint::from_points(&[[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).is_none());
    }
}
