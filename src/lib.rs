#![doc = include_str!("../README.md")]

// Pipeline entry points and scene output.
pub mod adapters;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod scene;

// Stage modules. Public so tools can run a stage on its own.
pub mod angle;
pub mod edges;
pub mod footprint;
pub mod grouping;
pub mod height;
pub mod perspective;
pub mod proposals;
pub mod segments;
pub mod verify;

#[cfg(test)]
mod test_support;

// --- High-level re-exports -------------------------------------------------

pub use crate::config::ReconstructionParams;
pub use crate::error::{Error, Result};
pub use crate::pipeline::{reconstruct_with_retry, ReconstructionRequest, SketchReconstructor};
pub use crate::scene::{RubyScriptWriter, Scene, SceneDescriptor, ScriptWriter};
pub use crate::verify::{RegionVerifier, VerificationRequest, VerifierError, VerifierResponse};

// Diagnostics attached to every scene produced by the pipeline.
pub use crate::diagnostics::{PipelineTrace, TimingBreakdown};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use sketch_massing::prelude::*;
/// use std::sync::Arc;
///
/// # async fn run() -> sketch_massing::Result<()> {
/// let image = SourceImage::decode(&std::fs::read("sketch.png").unwrap_or_default())?;
/// let verifier = Arc::new(ScriptedVerifier::new().with_default(
///     r#"{"is_building": true, "confidence": 0.8, "rough_floors": 4,
///         "roof_type": "flat", "has_entrance": false, "entrance_position": null,
///         "has_protrusions": false}"#,
/// ));
/// let reconstructor = SketchReconstructor::new(ReconstructionParams::default());
/// let scene = reconstructor
///     .reconstruct(&image, &ReconstructionRequest::default(), verifier)
///     .await;
/// println!("{}", scene.render_script(&RubyScriptWriter::default()));
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::SourceImage;
    pub use crate::verify::ScriptedVerifier;
    pub use crate::{
        ReconstructionParams, ReconstructionRequest, RubyScriptWriter, Scene, ScriptWriter,
        SketchReconstructor,
    };
}
