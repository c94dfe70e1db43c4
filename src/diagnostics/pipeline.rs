use crate::diagnostics::TimingBreakdown;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
}

/// Line segment detection and orientation grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStage {
    pub segments: usize,
    pub groups: usize,
    pub elapsed_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VanishingStage {
    pub perspective_type: String,
    pub vanishing_points: usize,
    pub horizon_y: f32,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f32>,
    pub fallback: bool,
    pub elapsed_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStage {
    pub edge_density: usize,
    pub external: usize,
    pub kept: usize,
    pub elapsed_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStage {
    pub attempted: usize,
    pub verified: usize,
    pub rejected: usize,
    pub unverifiable: usize,
    /// Whole-image attempts (more than one after a verifier outage).
    pub attempts: usize,
    pub elapsed_ms: f64,
}

/// End-to-end trace of one reconstruction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTrace {
    pub input: InputDescriptor,
    pub timings: TimingBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vanishing: Option<VanishingStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposals: Option<ProposalStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationStage>,
}
