//! Parameter sets for the reconstruction pipeline and its tools.
//!
//! Every stage has its own `serde(default)` parameter struct; this module
//! gathers them into [`ReconstructionParams`] so a single JSON document can
//! override any subset.

pub mod sketch_to_scene;

use crate::error::Result;
use crate::footprint::ProjectionParams;
use crate::grouping::GroupingParams;
use crate::height::HeightParams;
use crate::image::io::read_json_file;
use crate::perspective::VanishingParams;
use crate::pipeline::RetryParams;
use crate::proposals::ProposalParams;
use crate::scene::RubyScriptWriter;
use crate::segments::LsdOptions;
use crate::verify::VerificationParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionParams {
    pub segments: LsdOptions,
    pub vanishing: VanishingParams,
    pub proposals: ProposalParams,
    pub verification: VerificationParams,
    pub projection: ProjectionParams,
    pub height: HeightParams,
    pub grouping: GroupingParams,
    pub retry: RetryParams,
    /// Construction script settings.
    pub output: RubyScriptWriter,
}

/// Reads parameters from a JSON file; missing sections keep their defaults.
pub fn load_params(path: &Path) -> Result<ReconstructionParams> {
    read_json_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height::HeightModel;

    #[test]
    fn partial_document_keeps_defaults() {
        let params: ReconstructionParams = serde_json::from_str(
            r#"{"height": {"model": "projective"}, "proposals": {"max_candidates": 4}}"#,
        )
        .unwrap();
        assert_eq!(params.height.model, HeightModel::Projective);
        assert_eq!(params.height.epsilon, 1e-3);
        assert_eq!(params.proposals.max_candidates, 4);
        assert_eq!(params.verification.concurrency, 4);
        assert_eq!(params.grouping.spacing, 5.0);
        assert_eq!(params.retry.attempts, 3);
        assert_eq!(params.output.group_prefix, "MASS_");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_params(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Read { .. }));
    }
}
