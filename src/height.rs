//! Relative-to-absolute height transfer.
//!
//! The first verified building is the reference. Its height comes from the
//! caller, else from the verifier's floor estimate (one floor when unknown).
//! Every other building scales the reference by a per-building ratio measured
//! against the horizon and is snapped to whole floors, so every recovered
//! height is an integer multiple of the floor height.
//!
//! Two ratio models are available:
//!
//! - `horizon_ratio` (default): `|top - horizon| / (|bottom - horizon| + ε)`
//!   in pixel rows. This is an approximation, not a projective invariant.
//! - `projective`: single-view metrology with the horizon line `l` and the
//!   vertical vanishing point `v`, `Z ∝ ‖b×t‖ / ((l·b) ‖v×t‖)`. Without a
//!   finite vertical vanishing point `v` is the vertical direction at
//!   infinity and the measure reduces to `(bottom - top) / (bottom - horizon)`.

use crate::footprint::ProjectedBuilding;
use crate::perspective::PerspectiveFrame;
use log::{debug, warn};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FLOOR_HEIGHT_M: f32 = 3.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightModel {
    HorizonRatio,
    Projective,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightSource {
    /// Reference building (caller height or its own floor estimate).
    Reference,
    /// Transferred from the reference through the ratio model.
    Transferred,
    /// Reference unusable; the verifier's floor estimate was used.
    RoughFloors,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightParams {
    pub model: HeightModel,
    /// Added to the bottom distance to avoid division by zero.
    pub epsilon: f32,
    /// Reference ratios at or below this are degenerate.
    pub degenerate_ratio: f32,
}

impl Default for HeightParams {
    fn default() -> Self {
        Self {
            model: HeightModel::HorizonRatio,
            epsilon: 1e-3,
            degenerate_ratio: 1e-3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightEstimate {
    pub floors: u32,
    pub height_m: f32,
    pub ratio: f32,
    pub source: HeightSource,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeightedBuilding {
    pub projected: ProjectedBuilding,
    pub height: HeightEstimate,
}

#[derive(Clone, Debug, Default)]
pub struct HeightRecoveryEngine {
    pub params: HeightParams,
}

/// Nearest whole number of floors, at least one.
pub(crate) fn snap_floors(height_m: f32, floor_height_m: f32) -> u32 {
    let floors = (height_m / floor_height_m).round();
    if floors.is_finite() && floors >= 1.0 {
        floors as u32
    } else {
        1
    }
}

impl HeightRecoveryEngine {
    pub fn new(params: HeightParams) -> Self {
        Self { params }
    }

    /// Ratio of one building under the configured model.
    pub fn ratio(&self, b: &ProjectedBuilding, frame: &PerspectiveFrame) -> f32 {
        let img_h = frame.image_size[1] as f32;
        let img_w = frame.image_size[0] as f32;
        let bbox = b.building.bbox();
        let top = bbox.y0 * img_h;
        let bottom = bbox.y1 * img_h;
        match self.params.model {
            HeightModel::HorizonRatio => {
                (top - frame.horizon_y).abs()
                    / ((bottom - frame.horizon_y).abs() + self.params.epsilon)
            }
            HeightModel::Projective => {
                let x = bbox.center()[0] * img_w;
                let bp = Vector3::new(x, bottom, 1.0);
                let tp = Vector3::new(x, top, 1.0);
                let v = frame
                    .vertical()
                    .map(|vp| Vector3::new(vp.position[0], vp.position[1], 1.0))
                    .unwrap_or_else(|| Vector3::new(0.0, 1.0, 0.0));
                let l = frame.horizon_line();
                let num = bp.cross(&tp).norm();
                let den = l.dot(&bp).abs() * v.cross(&tp).norm() + self.params.epsilon;
                num / den
            }
        }
    }

    /// Assigns quantized heights. The first building is the reference.
    pub fn recover(
        &self,
        buildings: Vec<ProjectedBuilding>,
        frame: &PerspectiveFrame,
        reference_height_m: Option<f32>,
        floor_height_m: f32,
    ) -> Vec<HeightedBuilding> {
        let fh = if floor_height_m.is_finite() && floor_height_m > 0.0 {
            floor_height_m
        } else {
            warn!(
                "Height: invalid floor height {floor_height_m}, using {DEFAULT_FLOOR_HEIGHT_M}"
            );
            DEFAULT_FLOOR_HEIGHT_M
        };
        let Some(reference) = buildings.first() else {
            return Vec::new();
        };

        let ratios: Vec<f32> = buildings.iter().map(|b| self.ratio(b, frame)).collect();
        let ratio_ref = ratios[0];
        let ref_floors_estimate = reference.building.rough_floors().unwrap_or(1).max(1);
        let height_ref = reference_height_m
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(ref_floors_estimate as f32 * fh);
        let ref_floors = snap_floors(height_ref, fh);
        let height_ref = ref_floors as f32 * fh;
        let degenerate = !(ratio_ref.is_finite() && ratio_ref > self.params.degenerate_ratio);
        if degenerate {
            warn!(
                "Height: reference ratio {ratio_ref:.5} degenerate, using per-building floor estimates"
            );
        }

        let out: Vec<HeightedBuilding> = buildings
            .into_iter()
            .zip(ratios)
            .enumerate()
            .map(|(idx, (b, ratio))| {
                let (floors, source) = if idx == 0 {
                    (ref_floors, HeightSource::Reference)
                } else if degenerate || !ratio.is_finite() {
                    let floors = b.building.rough_floors().unwrap_or(ref_floors).max(1);
                    (floors, HeightSource::RoughFloors)
                } else {
                    let raw = height_ref * ratio / ratio_ref;
                    let mut floors = snap_floors(raw, fh);
                    let tol = 1e-6 * ratio_ref.max(1.0);
                    if ratio > ratio_ref + tol && floors <= ref_floors {
                        floors = ref_floors + 1;
                    } else if ratio < ratio_ref - tol && floors >= ref_floors && ref_floors > 1 {
                        floors = ref_floors - 1;
                    }
                    (floors, HeightSource::Transferred)
                };
                HeightedBuilding {
                    projected: b,
                    height: HeightEstimate {
                        floors,
                        height_m: floors as f32 * fh,
                        ratio,
                        source,
                    },
                }
            })
            .collect();
        debug!(
            "Height: buildings={} model={:?} ratio_ref={:.4} ref_floors={} floor_height={}",
            out.len(),
            self.params.model,
            ratio_ref,
            ref_floors,
            fh
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::GroundFootprintProjector;
    use crate::perspective::PerspectiveFrame;
    use crate::test_support::verified;

    fn frame_with_horizon(horizon_y: f32) -> PerspectiveFrame {
        let mut f = PerspectiveFrame::fallback(100, 100);
        f.horizon_y = horizon_y;
        f
    }

    fn project(boxes: &[([f32; 4], Option<u32>)]) -> Vec<ProjectedBuilding> {
        let verified: Vec<_> = boxes
            .iter()
            .enumerate()
            .map(|(i, (b, f))| verified(&format!("C{}", i + 1), *b, *f))
            .collect();
        GroundFootprintProjector::default().project(&verified, &frame_with_horizon(50.0))
    }

    #[test]
    fn reference_uses_rough_floors() {
        let engine = HeightRecoveryEngine::default();
        let out = engine.recover(
            project(&[([0.3, 0.3, 0.6, 0.6], Some(5))]),
            &frame_with_horizon(50.0),
            None,
            3.2,
        );
        assert_eq!(out[0].height.floors, 5);
        assert!((out[0].height.height_m - 16.0).abs() < 1e-4);
        assert_eq!(out[0].height.source, HeightSource::Reference);
    }

    #[test]
    fn taller_ratio_gets_more_floors_even_when_rounding_ties() {
        // ratio_ref = 30/20 = 1.5, ratio_b = 31/20 = 1.55: 3 floors * 1.033 rounds to 3.
        let engine = HeightRecoveryEngine::default();
        let out = engine.recover(
            project(&[
                ([0.1, 0.2, 0.3, 0.7], Some(3)),
                ([0.5, 0.19, 0.7, 0.7], Some(3)),
                ([0.75, 0.21, 0.9, 0.7], Some(3)),
            ]),
            &frame_with_horizon(50.0),
            None,
            3.0,
        );
        assert_eq!(out[0].height.floors, 3);
        assert!(out[1].height.ratio > out[0].height.ratio);
        assert!(out[1].height.height_m > out[0].height.height_m);
        assert!(out[2].height.ratio < out[0].height.ratio);
        assert!(out[2].height.height_m < out[0].height.height_m);
    }

    #[test]
    fn heights_are_floor_multiples() {
        let engine = HeightRecoveryEngine::default();
        for fh in [2.5f32, 3.0, 3.2, 4.1] {
            let out = engine.recover(
                project(&[
                    ([0.1, 0.1, 0.3, 0.8], Some(4)),
                    ([0.4, 0.35, 0.6, 0.75], None),
                    ([0.7, 0.05, 0.9, 0.9], Some(12)),
                ]),
                &frame_with_horizon(45.0),
                Some(13.0),
                fh,
            );
            for b in &out {
                let q = b.height.height_m / fh;
                assert!((q - q.round()).abs() < 1e-4, "fh={fh} h={}", b.height.height_m);
                assert!(b.height.floors >= 1);
            }
        }
    }

    #[test]
    fn transfer_scales_the_snapped_reference_height() {
        // 13.0 m snaps to 4 floors (12.8 m). The second ratio is ~1.37 times the
        // reference: 12.8 m gives 5.48 floors, 13.0 m would give 5.57.
        let engine = HeightRecoveryEngine::default();
        let out = engine.recover(
            project(&[([0.1, 0.2, 0.3, 0.7], None), ([0.5, 0.089, 0.7, 0.7], None)]),
            &frame_with_horizon(50.0),
            Some(13.0),
            3.2,
        );
        assert_eq!(out[0].height.floors, 4);
        assert!((out[0].height.height_m - 12.8).abs() < 1e-4);
        assert_eq!(out[1].height.floors, 5);
        assert!((out[1].height.height_m - 16.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_reference_uses_rough_floors() {
        // Reference top sits on the horizon.
        let engine = HeightRecoveryEngine::default();
        let out = engine.recover(
            project(&[
                ([0.1, 0.5, 0.3, 0.8], Some(2)),
                ([0.5, 0.2, 0.7, 0.8], Some(7)),
                ([0.75, 0.2, 0.9, 0.8], None),
            ]),
            &frame_with_horizon(50.0),
            None,
            3.2,
        );
        assert_eq!(out[1].height.floors, 7);
        assert_eq!(out[1].height.source, HeightSource::RoughFloors);
        assert_eq!(out[2].height.floors, 2);
    }

    #[test]
    fn projective_model_orders_like_horizon_ratio() {
        let engine = HeightRecoveryEngine::new(HeightParams {
            model: HeightModel::Projective,
            ..HeightParams::default()
        });
        let buildings = project(&[
            ([0.1, 0.3, 0.3, 0.7], Some(4)),
            ([0.5, 0.1, 0.7, 0.7], None),
        ]);
        let frame = frame_with_horizon(50.0);
        // (70 - 30) / (70 - 50) = 2 and (70 - 10) / (70 - 50) = 3.
        let r0 = engine.ratio(&buildings[0], &frame);
        let r1 = engine.ratio(&buildings[1], &frame);
        assert!((r0 - 2.0).abs() < 1e-2, "{r0}");
        assert!((r1 - 3.0).abs() < 1e-2, "{r1}");
        let out = engine.recover(buildings, &frame, None, 3.0);
        assert_eq!(out[1].height.floors, 6);
    }
}
