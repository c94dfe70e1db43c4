//! Candidate building regions.
//!
//! Proposals come from two sources: an edge-density analysis of the gradient
//! magnitude (buildings are edge-rich against sky and ground) and boxes
//! supplied by an external detector. Both are merged, deduplicated with greedy
//! non-max suppression and truncated to `max_candidates`.

mod edge_density;
mod nms;

pub use edge_density::edge_density_regions;
pub use nms::non_max_suppression;

use crate::edges::Grad;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Axis-aligned box in normalized image coordinates, `[x0, y0, x1, y1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct NormalizedBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl From<[f32; 4]> for NormalizedBox {
    fn from(v: [f32; 4]) -> Self {
        NormalizedBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<NormalizedBox> for [f32; 4] {
    fn from(b: NormalizedBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

impl NormalizedBox {
    /// Orders the corners and clamps them into `[0, 1]`.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let (x0, x1) = (c(x0.min(x1)), c(x0.max(x1)));
        let (y0, y1) = (c(y0.min(y1)), c(y0.max(y1)));
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> [f32; 2] {
        [(self.x0 + self.x1) * 0.5, (self.y0 + self.y1) * 0.5]
    }

    pub fn intersection_area(&self, other: &NormalizedBox) -> f32 {
        let w = (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0);
        let h = (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0);
        w * h
    }

    /// Intersection over union. Disjoint or empty boxes give 0.
    pub fn iou(&self, other: &NormalizedBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSource {
    EdgeDensity,
    External,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRegion {
    /// Stable id `C{n}` in rank order.
    pub id: String,
    pub bbox: NormalizedBox,
    pub confidence: f32,
    pub source: RegionSource,
}

/// Detector box supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExternalBox {
    pub bbox: NormalizedBox,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalParams {
    pub max_candidates: usize,
    pub nms_iou: f32,
    /// Gradient magnitude at or above which a pixel is an edge.
    pub edge_threshold: f32,
    /// Cells along each image axis.
    pub grid_cells: usize,
    /// Edge fraction at which a cell becomes active.
    pub cell_density: f32,
    /// Components with fewer active cells are dropped.
    pub min_component_cells: usize,
    /// Components whose normalized area is below this are dropped.
    pub min_box_area: f32,
    /// Confidence for external boxes that carry none.
    pub external_confidence: f32,
}

impl Default for ProposalParams {
    fn default() -> Self {
        Self {
            max_candidates: 12,
            nms_iou: 0.5,
            edge_threshold: 0.3,
            grid_cells: 16,
            cell_density: 0.06,
            min_component_cells: 3,
            min_box_area: 0.01,
            external_confidence: 0.9,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateRegionProposer {
    pub params: ProposalParams,
}

impl CandidateRegionProposer {
    pub fn new(params: ProposalParams) -> Self {
        Self { params }
    }

    /// Merges edge-density proposals with external boxes, applies NMS and
    /// assigns ids in rank order.
    pub fn propose(&self, grad: &Grad, external: &[ExternalBox]) -> Vec<CandidateRegion> {
        let t0 = Instant::now();
        let p = &self.params;
        let mut regions = edge_density_regions(grad, p);
        let from_edges = regions.len();
        regions.extend(
            external
                .iter()
                .filter(|b| b.bbox.area() > 0.0)
                .map(|b| CandidateRegion {
                    id: String::new(),
                    bbox: b.bbox,
                    confidence: b.confidence.unwrap_or(p.external_confidence).clamp(0.0, 1.0),
                    source: RegionSource::External,
                }),
        );
        let merged = regions.len();
        let mut kept = non_max_suppression(regions, p.nms_iou);
        kept.truncate(p.max_candidates);
        for (i, region) in kept.iter_mut().enumerate() {
            region.id = format!("C{}", i + 1);
        }
        debug!(
            "Proposals: edge_density={} external={} after_nms={} elapsed_ms={:.3}",
            from_edges,
            merged - from_edges,
            kept.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = NormalizedBox::new(0.0, 0.0, 1.0, 1.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = NormalizedBox::new(0.0, 0.0, 0.3, 0.3);
        let b = NormalizedBox::new(0.5, 0.5, 0.9, 0.9);
        assert_eq!(a.iou(&b), 0.0);
        let touching = NormalizedBox::new(0.3, 0.0, 0.6, 0.3);
        assert_eq!(a.iou(&touching), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        // Intersection 0.25, union 0.75.
        let a = NormalizedBox::new(0.0, 0.0, 0.5, 0.5);
        let b = NormalizedBox::new(0.25, 0.0, 0.75, 0.5);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn box_constructor_orders_and_clamps() {
        let b = NormalizedBox::new(0.8, 1.2, -0.1, 0.4);
        assert_eq!(b, NormalizedBox::new(0.0, 0.4, 0.8, 1.0));
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[0.0,0.4,0.8,1.0]");
    }

    #[test]
    fn external_boxes_are_merged_and_ranked() {
        let grad = Grad::default();
        let proposer = CandidateRegionProposer::default();
        let external = vec![
            ExternalBox {
                bbox: NormalizedBox::new(0.1, 0.1, 0.4, 0.4),
                confidence: Some(0.6),
            },
            ExternalBox {
                bbox: NormalizedBox::new(0.12, 0.1, 0.42, 0.4),
                confidence: None,
            },
            ExternalBox {
                bbox: NormalizedBox::new(0.6, 0.2, 0.9, 0.8),
                confidence: Some(0.7),
            },
        ];
        let regions = proposer.propose(&grad, &external);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, "C1");
        assert_eq!(regions[0].confidence, 0.9);
        assert_eq!(regions[0].source, RegionSource::External);
        assert_eq!(regions[1].id, "C2");
        assert_eq!(regions[1].bbox, NormalizedBox::new(0.6, 0.2, 0.9, 0.8));
    }
}
