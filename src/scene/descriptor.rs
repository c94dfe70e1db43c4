//! JSON scene descriptor consumed by the modelling host.

use super::{Scene, SceneBounds, SceneFlags};
use crate::model::{AreaSummary, Building, Connector, Courtyard, GroupKind};
use crate::perspective::VpKind;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub value_m: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Left (or single centre) vanishing point.
    pub vp_x: Option<[f32; 2]>,
    /// Right vanishing point.
    pub vp_z: Option<[f32; 2]>,
    pub horizon_y: f32,
    pub scale: ScaleDescriptor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartDescriptor {
    pub id: String,
    pub footprint: Vec<[f32; 2]>,
    pub height_m: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingDescriptor {
    pub id: String,
    pub footprint_ground: Vec<[f32; 2]>,
    pub height_m: f32,
    pub floors: u32,
    pub parts: Vec<PartDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub mode: String,
    pub camera: CameraDescriptor,
    pub buildings: Vec<BuildingDescriptor>,
    pub group_kind: GroupKind,
    pub connectors: Vec<Connector>,
    pub courtyard: Option<Courtyard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<AreaSummary>,
    pub bounds: Option<SceneBounds>,
    pub confidence: f32,
    pub low_confidence: bool,
    pub flags: SceneFlags,
}

impl SceneDescriptor {
    pub fn from_scene(scene: &Scene) -> Self {
        let frame = &scene.frame;
        let vp_x = frame
            .left()
            .or_else(|| frame.vp(VpKind::Center))
            .map(|v| v.position);
        let vp_z = frame.right().map(|v| v.position);
        let buildings = scene
            .group
            .buildings
            .iter()
            .map(|b| {
                let outline = b.outline();
                BuildingDescriptor {
                    id: b.id.clone(),
                    parts: b
                        .parts
                        .iter()
                        .map(|p| PartDescriptor {
                            id: p.id.clone(),
                            footprint: p
                                .footprint
                                .as_ref()
                                .map_or_else(|| outline.clone(), |fp| fp.points().to_vec()),
                            height_m: p.height_m,
                        })
                        .collect(),
                    footprint_ground: outline,
                    height_m: b.height_m,
                    floors: b.floors,
                }
            })
            .collect();
        Self {
            mode: "perspective".to_string(),
            camera: CameraDescriptor {
                vp_x,
                vp_z,
                horizon_y: frame.horizon_y,
                scale: ScaleDescriptor {
                    kind: "floor_height".to_string(),
                    value_m: scene.calibration.floor_height_m,
                },
            },
            buildings,
            group_kind: scene.group.kind,
            connectors: scene.group.connectors.clone(),
            courtyard: scene.group.courtyard.clone(),
            area: scene.group.area,
            bounds: scene.bounds,
            confidence: scene.confidence,
            low_confidence: scene.low_confidence,
            flags: scene.flags.clone(),
        }
    }
}
