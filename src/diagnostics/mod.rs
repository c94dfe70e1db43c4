//! Diagnostics attached to a reconstructed scene.
//!
//! `PipelineTrace` records what each stage saw and produced (counts, chosen
//! perspective, verification outcome) together with a per-stage
//! `TimingBreakdown`.

pub mod pipeline;
pub mod timing;

pub use pipeline::{
    DetectionStage, InputDescriptor, PipelineTrace, ProposalStage, VanishingStage,
    VerificationStage,
};
pub use timing::{StageTiming, TimingBreakdown};
