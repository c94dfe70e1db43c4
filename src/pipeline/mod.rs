//! End-to-end reconstruction of one image.
//!
//! Stages run strictly forward: segments, vanishing geometry, candidate
//! regions, verification, footprints, heights, grouping, scene assembly.
//! Only verification is asynchronous. The reconstructor never fails once it
//! has a decoded image; every degradation lands in the scene flags.

mod batch;

pub use batch::{reconstruct_batch, reconstruct_with_retry, BatchItem, RetryParams};

use crate::config::ReconstructionParams;
use crate::diagnostics::{
    DetectionStage, InputDescriptor, PipelineTrace, ProposalStage, TimingBreakdown,
    VanishingStage, VerificationStage,
};
use crate::footprint::GroundFootprintProjector;
use crate::grouping::{BuildingGroupAnalyzer, LayoutHints};
use crate::height::{HeightRecoveryEngine, DEFAULT_FLOOR_HEIGHT_M};
use crate::image::SourceImage;
use crate::model::Building;
use crate::perspective::VanishingPointEstimator;
use crate::proposals::{CandidateRegionProposer, ExternalBox, ProposalParams, RegionSource};
use crate::scene::{Calibration, Scene, SceneAssembler, SceneInput, VerificationEvidence};
use crate::segments::lsd_extract_segments;
use crate::verify::{verify_candidates, RegionVerifier};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Caller inputs accompanying the image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconstructionRequest {
    /// Absolute height of the first verified building.
    #[serde(rename = "referenceHeightMeters")]
    pub reference_height_m: Option<f32>,
    #[serde(rename = "floorHeightMeters")]
    pub floor_height_m: f32,
    pub building_type_hint: Option<String>,
    pub max_candidates: usize,
    /// Detector boxes merged into the proposals.
    pub external_boxes: Vec<ExternalBox>,
    pub hints: LayoutHints,
}

impl Default for ReconstructionRequest {
    fn default() -> Self {
        Self {
            reference_height_m: None,
            floor_height_m: DEFAULT_FLOOR_HEIGHT_M,
            building_type_hint: None,
            max_candidates: 12,
            external_boxes: Vec::new(),
            hints: LayoutHints::default(),
        }
    }
}

impl ReconstructionRequest {
    /// Floor height, replaced by the default when not a positive number.
    pub fn effective_floor_height(&self) -> f32 {
        if self.floor_height_m.is_finite() && self.floor_height_m > 0.0 {
            self.floor_height_m
        } else {
            warn!(
                "Request: invalid floor height {}, using {DEFAULT_FLOOR_HEIGHT_M}",
                self.floor_height_m
            );
            DEFAULT_FLOOR_HEIGHT_M
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SketchReconstructor {
    pub params: ReconstructionParams,
}

impl SketchReconstructor {
    pub fn new(params: ReconstructionParams) -> Self {
        Self { params }
    }

    /// Runs every stage once. See [`reconstruct_with_retry`] for the variant
    /// that retries verifier outages.
    pub async fn reconstruct<V>(
        &self,
        image: &SourceImage,
        request: &ReconstructionRequest,
        verifier: Arc<V>,
    ) -> Scene
    where
        V: RegionVerifier + 'static,
    {
        let t_total = Instant::now();
        let p = &self.params;
        let fh = request.effective_floor_height();
        let (w, h) = (image.width() as usize, image.height() as usize);
        let mut timings = TimingBreakdown::default();
        let mut warnings = Vec::new();

        let t = Instant::now();
        let gray = image.to_gray_f32();
        let lsd = lsd_extract_segments(&gray, p.segments);
        timings.lap("segments", t);

        let vanishing = VanishingPointEstimator::new(p.vanishing.clone()).estimate(&lsd.segments, w, h);
        timings.push("vanishing", vanishing.elapsed_ms);
        let frame = vanishing.frame;
        if frame.fallback {
            warnings.push("no usable vanishing geometry, centred one-point frame".to_string());
        }

        let t = Instant::now();
        let proposer = CandidateRegionProposer::new(ProposalParams {
            max_candidates: request.max_candidates,
            ..p.proposals.clone()
        });
        let candidates = proposer.propose(&lsd.grad, &request.external_boxes);
        let proposal_ms = timings.lap("proposals", t);

        let outcome = verify_candidates(
            image,
            &candidates,
            verifier,
            &p.verification,
            request.building_type_hint.as_deref(),
        )
        .await;
        timings.push("verification", outcome.elapsed_ms);
        if outcome.all_failed() {
            warnings.push(format!(
                "all {} verifier calls failed",
                outcome.attempted
            ));
        }

        let t = Instant::now();
        let projected =
            GroundFootprintProjector::new(p.projection.clone()).project(&outcome.verified, &frame);
        timings.lap("footprints", t);

        let t = Instant::now();
        let heighted = HeightRecoveryEngine::new(p.height.clone()).recover(
            projected,
            &frame,
            request.reference_height_m,
            fh,
        );
        timings.lap("heights", t);

        let t = Instant::now();
        let buildings: Vec<Building> = heighted.iter().map(|hb| Building::from_heighted(hb, fh)).collect();
        let analysis = BuildingGroupAnalyzer::new(p.grouping.clone()).analyze(buildings, &request.hints, fh);
        timings.lap("grouping", t);

        let mean_confidence = if outcome.verified.is_empty() {
            0.0
        } else {
            outcome.verified.iter().map(|v| v.confidence()).sum::<f32>() / outcome.verified.len() as f32
        };
        let count_source = |s: RegionSource| candidates.iter().filter(|c| c.source == s).count();
        let trace = PipelineTrace {
            input: InputDescriptor {
                width: w,
                height: h,
            },
            detection: Some(DetectionStage {
                segments: lsd.segments.len(),
                groups: vanishing.groups.len(),
                elapsed_ms: lsd.elapsed_ms,
            }),
            vanishing: Some(VanishingStage {
                perspective_type: frame.perspective_type.as_str().to_string(),
                vanishing_points: frame.vanishing_points.len(),
                horizon_y: frame.horizon_y,
                confidence: frame.confidence,
                quality_score: frame.quality.as_ref().map(|q| q.score),
                fallback: frame.fallback,
                elapsed_ms: vanishing.elapsed_ms,
            }),
            proposals: Some(ProposalStage {
                edge_density: count_source(RegionSource::EdgeDensity),
                external: count_source(RegionSource::External),
                kept: candidates.len(),
                elapsed_ms: proposal_ms,
            }),
            verification: Some(VerificationStage {
                attempted: outcome.attempted,
                verified: outcome.verified.len(),
                rejected: outcome.rejected,
                unverifiable: outcome.unverifiable,
                attempts: 1,
                elapsed_ms: outcome.elapsed_ms,
            }),
            timings: TimingBreakdown::default(),
        };

        let mut scene = SceneAssembler.assemble(SceneInput {
            analysis,
            frame,
            calibration: Calibration::new(request.reference_height_m, fh),
            verification: Some(VerificationEvidence {
                mean_confidence,
                attempted: outcome.attempted,
                unverifiable: outcome.unverifiable,
            }),
            warnings,
            trace: Some(trace),
        });
        timings.total_ms = t_total.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "Pipeline: {}x{} segments={} candidates={} verified={} buildings={} confidence={:.3} elapsed_ms={:.3}",
            w,
            h,
            lsd.segments.len(),
            candidates.len(),
            outcome.verified.len(),
            scene.group.buildings.len(),
            scene.confidence,
            timings.total_ms
        );
        if let Some(trace) = scene.trace.as_mut() {
            trace.timings = timings;
        }
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_and_camel_case() {
        let req: ReconstructionRequest = serde_json::from_str(
            r#"{"referenceHeightMeters": 20.0, "buildingTypeHint": "office",
                "hints": {"positions": {"C1": [0.0, 0.0]}}}"#,
        )
        .unwrap();
        assert_eq!(req.reference_height_m, Some(20.0));
        assert_eq!(req.floor_height_m, 3.2);
        assert_eq!(req.max_candidates, 12);
        assert_eq!(req.building_type_hint.as_deref(), Some("office"));
        assert_eq!(req.hints.positions.len(), 1);
    }

    #[test]
    fn invalid_floor_height_falls_back() {
        let req = ReconstructionRequest {
            floor_height_m: -1.0,
            ..ReconstructionRequest::default()
        };
        assert_eq!(req.effective_floor_height(), DEFAULT_FLOOR_HEIGHT_M);
    }
}
