//! Terminal scene artifact.
//!
//! The assembler never fails: every degradation of the earlier stages ends up
//! in [`SceneFlags`] and lowers the scene confidence instead.

mod descriptor;
mod script;

pub use descriptor::{
    BuildingDescriptor, CameraDescriptor, PartDescriptor, ScaleDescriptor, SceneDescriptor,
};
pub use script::{plan_operations, RubyScriptWriter, ScriptWriter, VolumeKind, VolumeOp};

use crate::diagnostics::PipelineTrace;
use crate::grouping::GroupAnalysis;
use crate::height::{HeightSource, DEFAULT_FLOOR_HEIGHT_M};
use crate::model::BuildingGroup;
use crate::perspective::PerspectiveFrame;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Below this the scene is flagged as low confidence.
pub const LOW_CONFIDENCE: f32 = 0.3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub reference_height_m: Option<f32>,
    pub floor_height_m: f32,
    pub unit: String,
}

impl Calibration {
    pub fn new(reference_height_m: Option<f32>, floor_height_m: f32) -> Self {
        Self {
            reference_height_m,
            floor_height_m,
            unit: "m".to_string(),
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(None, DEFAULT_FLOOR_HEIGHT_M)
    }
}

/// Degradations collected along the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneFlags {
    pub perspective_fallback: bool,
    /// Every verification attempt failed.
    pub verification_outage: bool,
    pub unverifiable_regions: usize,
    /// Building ids whose footprint was replaced by a rectangle.
    pub footprint_fallback: Vec<String>,
    /// Building ids that fell back to the verifier's floor estimate.
    pub height_fallback: Vec<String>,
    /// Volume ids emitted as boxes instead of extrusions.
    pub box_fallback: Vec<String>,
    pub warnings: Vec<String>,
}

/// Axis-aligned bounds of the whole ensemble, z up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl SceneBounds {
    fn include(&mut self, p: [f32; 3]) {
        for k in 0..3 {
            self.min[k] = self.min[k].min(p[k]);
            self.max[k] = self.max[k].max(p[k]);
        }
    }

    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Verification outcome summarized for the confidence score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerificationEvidence {
    /// Mean verifier confidence of the accepted buildings.
    pub mean_confidence: f32,
    pub attempted: usize,
    pub unverifiable: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub group: BuildingGroup,
    pub frame: PerspectiveFrame,
    pub calibration: Calibration,
    pub confidence: f32,
    pub low_confidence: bool,
    pub flags: SceneFlags,
    pub bounds: Option<SceneBounds>,
    pub operations: Vec<VolumeOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<PipelineTrace>,
}

impl Scene {
    pub fn is_empty(&self) -> bool {
        self.group.buildings.is_empty()
    }

    pub fn descriptor(&self) -> SceneDescriptor {
        SceneDescriptor::from_scene(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.descriptor())
    }

    pub fn render_script(&self, writer: &dyn ScriptWriter) -> String {
        writer.render(self)
    }
}

/// Everything the assembler combines into a scene.
#[derive(Clone, Debug)]
pub struct SceneInput {
    pub analysis: GroupAnalysis,
    pub frame: PerspectiveFrame,
    pub calibration: Calibration,
    /// `None` when buildings did not pass through verification.
    pub verification: Option<VerificationEvidence>,
    pub warnings: Vec<String>,
    pub trace: Option<PipelineTrace>,
}

fn grow(bounds: &mut Option<SceneBounds>, p: [f32; 3]) {
    if let Some(b) = bounds {
        b.include(p);
    } else {
        *bounds = Some(SceneBounds { min: p, max: p });
    }
}

pub fn scene_bounds(group: &BuildingGroup) -> Option<SceneBounds> {
    let mut out: Option<SceneBounds> = None;
    for b in &group.buildings {
        let r = b.bounds();
        let top = b
            .parts
            .iter()
            .map(|p| p.base_m + p.height_m)
            .fold(b.height_m, f32::max);
        grow(&mut out, [r.min[0], r.min[1], 0.0]);
        grow(&mut out, [r.max[0], r.max[1], top]);
    }
    for c in &group.connectors {
        let top = c.elevation_m + c.height_m;
        grow(&mut out, [c.start[0], c.start[1], c.elevation_m]);
        grow(&mut out, [c.end[0], c.end[1], top]);
    }
    out
}

/// `mean × (1 − 0.5 × unverifiable / attempted) × (0.5 + 0.5 × frame)`.
pub fn scene_confidence(
    group: &BuildingGroup,
    frame: &PerspectiveFrame,
    evidence: Option<&VerificationEvidence>,
) -> f32 {
    if group.buildings.is_empty() {
        return 0.0;
    }
    let (mean, penalty) = match evidence {
        Some(e) => {
            let penalty = if e.attempted > 0 {
                1.0 - 0.5 * e.unverifiable as f32 / e.attempted as f32
            } else {
                1.0
            };
            (e.mean_confidence, penalty)
        }
        None => (1.0, 1.0),
    };
    let frame_factor = 0.5 + 0.5 * frame.confidence.clamp(0.0, 1.0);
    (mean * penalty * frame_factor).clamp(0.0, 1.0)
}

#[derive(Clone, Debug, Default)]
pub struct SceneAssembler;

impl SceneAssembler {
    pub fn assemble(&self, input: SceneInput) -> Scene {
        let SceneInput {
            analysis,
            frame,
            calibration,
            verification,
            mut warnings,
            trace,
        } = input;
        let group = analysis.group;
        warnings.extend(analysis.warnings);

        let confidence = scene_confidence(&group, &frame, verification.as_ref());
        let low_confidence = group.buildings.is_empty() || confidence < LOW_CONFIDENCE;
        if group.buildings.is_empty() {
            warn!("Scene: no buildings reconstructed, emitting empty scene");
            warnings.push("no buildings reconstructed".to_string());
        } else if low_confidence {
            warn!("Scene: low confidence {confidence:.3}");
        }

        let (operations, box_fallback) = plan_operations(&group);
        let mut flags = SceneFlags {
            perspective_fallback: frame.fallback,
            verification_outage: verification
                .as_ref()
                .is_some_and(|v| v.attempted > 0 && v.unverifiable == v.attempted),
            unverifiable_regions: verification.as_ref().map_or(0, |v| v.unverifiable),
            box_fallback,
            warnings,
            ..SceneFlags::default()
        };
        for b in &group.buildings {
            if b.flags.footprint_fallback {
                flags.footprint_fallback.push(b.id.clone());
            }
            if b.flags.height_source == Some(HeightSource::RoughFloors) {
                flags.height_fallback.push(b.id.clone());
            }
        }

        let bounds = scene_bounds(&group);
        debug!(
            "Scene: kind={:?} buildings={} connectors={} operations={} confidence={:.3} low={}",
            group.kind,
            group.buildings.len(),
            group.connectors.len(),
            operations.len(),
            confidence,
            low_confidence
        );
        Scene {
            group,
            frame,
            calibration,
            confidence,
            low_confidence,
            flags,
            bounds,
            operations,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::GroundFootprint;
    use crate::grouping::{BuildingGroupAnalyzer, LayoutHints};
    use crate::model::Building;

    fn input(buildings: Vec<Building>, verification: Option<VerificationEvidence>) -> SceneInput {
        SceneInput {
            analysis: BuildingGroupAnalyzer::default().analyze(buildings, &LayoutHints::default(), 3.2),
            frame: PerspectiveFrame::fallback(640, 480),
            calibration: Calibration::default(),
            verification,
            warnings: Vec::new(),
            trace: None,
        }
    }

    #[test]
    fn empty_scene_is_low_confidence() {
        let scene = SceneAssembler.assemble(input(Vec::new(), None));
        assert!(scene.is_empty());
        assert!(scene.low_confidence);
        assert_eq!(scene.confidence, 0.0);
        assert!(scene.bounds.is_none());
        assert!(scene.flags.perspective_fallback);
        assert!(scene.operations.is_empty());
    }

    #[test]
    fn unverifiable_regions_reduce_confidence() {
        let b = Building::from_footprint(
            "C1",
            GroundFootprint::rectangle([0.0, 0.0], 10.0, 8.0).unwrap(),
            16.0,
            3.2,
        );
        let clean = SceneAssembler.assemble(input(
            vec![b.clone()],
            Some(VerificationEvidence {
                mean_confidence: 0.9,
                attempted: 4,
                unverifiable: 0,
            }),
        ));
        let degraded = SceneAssembler.assemble(input(
            vec![b],
            Some(VerificationEvidence {
                mean_confidence: 0.9,
                attempted: 4,
                unverifiable: 2,
            }),
        ));
        // 0.9 * (0.5 + 0.5 * 0.3)
        assert!((clean.confidence - 0.585).abs() < 1e-5);
        assert!((degraded.confidence - 0.585 * 0.75).abs() < 1e-5);
        assert_eq!(degraded.flags.unverifiable_regions, 2);
        assert!(!degraded.flags.verification_outage);
        let bounds = degraded.bounds.unwrap();
        assert_eq!(bounds.size(), [10.0, 8.0, 16.0]);
    }
}
