use crate::error::Result;
use crate::image::io::read_json_file;
use crate::pipeline::ReconstructionRequest;
use crate::config::ReconstructionParams;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration of the `sketch_to_scene` tool.
#[derive(Debug, Deserialize)]
pub struct SketchToSceneConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub request: ReconstructionRequest,
    #[serde(default)]
    pub params: ReconstructionParams,
    #[serde(default)]
    pub verifier: ScriptedVerifierConfig,
    pub output: SketchToSceneOutput,
}

/// Canned verifier answers. Values are the raw JSON text the oracle would
/// reply with; `null` scripts a transport failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScriptedVerifierConfig {
    pub responses: BTreeMap<String, Option<serde_json::Value>>,
    pub default: Option<serde_json::Value>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SketchToSceneOutput {
    pub scene_json: PathBuf,
    #[serde(default)]
    pub script: Option<PathBuf>,
    /// Full scene including the trace.
    #[serde(default)]
    pub report_json: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<SketchToSceneConfig> {
    read_json_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses() {
        let cfg: SketchToSceneConfig = serde_json::from_str(
            r#"{
                "input": "sketch.png",
                "request": {"floorHeightMeters": 3.0, "externalBoxes": [{"bbox": [0.3, 0.3, 0.6, 0.6]}]},
                "verifier": {"responses": {"C1": {"is_building": true}, "C2": null}},
                "output": {"scene_json": "out/scene.json"}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.input, PathBuf::from("sketch.png"));
        assert_eq!(cfg.request.floor_height_m, 3.0);
        assert_eq!(cfg.request.external_boxes.len(), 1);
        assert!(cfg.verifier.responses["C2"].is_none());
        assert!(cfg.output.script.is_none());
    }
}
