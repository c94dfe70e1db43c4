//! Boundary adapters for externally produced analyses.
//!
//! Upstream analysers describe buildings in three ad hoc shapes:
//!
//! - `buildings`: absolute dimensions and positions, in millimetres or metres
//!   (values below 200 are metres),
//! - `instances`: normalized image boxes or centres with floor estimates,
//! - `volumes`: relative size hints scaled by a 15 m base width, levels and
//!   yaw.
//!
//! The first non-empty list wins. All three become [`Building`] values plus
//! [`LayoutHints`], after which [`scene_from_analysis`] runs grouping and
//! scene assembly without an image.

use crate::config::ReconstructionParams;
use crate::error::{Error, Result};
use crate::footprint::{apply_homography_points, simplified_ground_homography, GroundFootprint};
use crate::grouping::{BuildingGroupAnalyzer, ConnectorHint, LayoutHints, SpatialRelation};
use crate::height::DEFAULT_FLOOR_HEIGHT_M;
use crate::model::Building;
use crate::perspective::PerspectiveFrame;
use crate::proposals::NormalizedBox;
use crate::scene::{Calibration, Scene, SceneAssembler, SceneInput};
use log::{debug, warn};
use serde::Deserialize;

/// Base width multiplying relative volume size hints.
pub const VOLUME_BASE_WIDTH_M: f32 = 15.0;
/// Dimensions below this are metres, anything larger millimetres.
pub const MILLIMETRE_THRESHOLD: f32 = 200.0;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub depth: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorldPosition {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BuildingRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub position: Option<WorldPosition>,
    #[serde(default, alias = "rotation_deg")]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub floors: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InstanceRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub center: Option<[f32; 2]>,
    #[serde(default)]
    pub rough_floors: Option<u32>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SizeHint {
    #[serde(default)]
    pub w: Option<f32>,
    #[serde(default)]
    pub d: Option<f32>,
    #[serde(default)]
    pub h: Option<f32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VolumeRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub size_hint: SizeHint,
    #[serde(default)]
    pub levels: Option<u32>,
    #[serde(default)]
    pub yaw_deg: Option<f32>,
}

/// Analysis payload as produced upstream.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisInput {
    pub buildings: Vec<BuildingRecord>,
    pub instances: Vec<InstanceRecord>,
    pub volumes: Vec<VolumeRecord>,
    #[serde(alias = "relationships", alias = "spatial_relationships")]
    pub relations: Vec<SpatialRelation>,
    pub connectors: Vec<ConnectorHint>,
}

/// Buildings and layout hints in the crate's own model.
#[derive(Clone, Debug)]
pub struct UnifiedAnalysis {
    pub buildings: Vec<Building>,
    pub hints: LayoutHints,
}

fn positive(v: Option<f32>) -> Option<f32> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}

fn to_metres(v: f32, millimetres: bool) -> f32 {
    if millimetres {
        v / 1000.0
    } else {
        v
    }
}

fn building_id(id: &Option<String>, idx: usize) -> String {
    id.clone().unwrap_or_else(|| format!("B{}", idx + 1))
}

fn from_building_records(
    records: &[BuildingRecord],
    floor_height_m: f32,
    hints: &mut LayoutHints,
) -> Result<Vec<Building>> {
    records
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let id = building_id(&r.id, idx);
            let (Some(w), Some(d)) = (positive(r.dimensions.width), positive(r.dimensions.depth)) else {
                return Err(Error::InvalidAnalysis(format!(
                    "building {id} lacks width or depth"
                )));
            };
            let mm = w >= MILLIMETRE_THRESHOLD || d >= MILLIMETRE_THRESHOLD;
            let height = match positive(r.dimensions.height) {
                Some(h) => to_metres(h, mm),
                None => r.floors.unwrap_or(3).max(1) as f32 * floor_height_m,
            };
            let mut b = Building::from_dimensions(
                id.clone(),
                to_metres(w, mm),
                to_metres(d, mm),
                height,
                floor_height_m,
            );
            b.rotation_deg = r.rotation.unwrap_or(0.0);
            if let Some(p) = &r.position {
                hints
                    .positions
                    .insert(id, [to_metres(p.x, mm), to_metres(p.y, mm)]);
            }
            Ok(b)
        })
        .collect()
}

fn from_instances(
    records: &[InstanceRecord],
    floor_height_m: f32,
    hints: &mut LayoutHints,
) -> Vec<Building> {
    let h = simplified_ground_homography(100.0, 0.6);
    records
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let id = building_id(&r.id, idx);
            let dims = r.dimensions.clone().unwrap_or_default();
            let height = positive(dims.height)
                .unwrap_or(r.rough_floors.unwrap_or(1).max(1) as f32 * floor_height_m);
            let footprint = r.bbox.and_then(|b| {
                let bbox = NormalizedBox::from(b);
                let corners = [
                    [bbox.x0, bbox.y1],
                    [bbox.x1, bbox.y1],
                    [bbox.x1, bbox.y0],
                    [bbox.x0, bbox.y0],
                ];
                apply_homography_points(&h, &corners)
                    .as_deref()
                    .and_then(GroundFootprint::from_points)
            });
            match footprint {
                Some(fp) => Building::from_footprint(id, fp, height, floor_height_m),
                None => {
                    if let Some(c) = r.center {
                        let g = apply_homography_points(&h, &[c]).map_or([0.0, 0.0], |g| g[0]);
                        hints.positions.insert(id.clone(), g);
                    }
                    Building::from_dimensions(
                        id,
                        positive(dims.width).unwrap_or(20.0),
                        positive(dims.depth).unwrap_or(15.0),
                        height,
                        floor_height_m,
                    )
                }
            }
        })
        .collect()
}

fn from_volumes(records: &[VolumeRecord], floor_height_m: f32) -> Vec<Building> {
    records
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let s = &r.size_hint;
            let w = positive(s.w).map_or(VOLUME_BASE_WIDTH_M, |w| w * VOLUME_BASE_WIDTH_M);
            let d = positive(s.d).map_or(VOLUME_BASE_WIDTH_M * 0.6, |d| d * VOLUME_BASE_WIDTH_M);
            let h = match (positive(s.h), r.levels.filter(|l| *l > 0)) {
                (Some(h), _) => h * VOLUME_BASE_WIDTH_M,
                (None, Some(levels)) => levels as f32 * floor_height_m,
                (None, None) => 3.0 * floor_height_m,
            };
            let mut b = Building::from_dimensions(building_id(&r.id, idx), w, d, h, floor_height_m);
            b.rotation_deg = r.yaw_deg.unwrap_or(0.0);
            b
        })
        .collect()
}

fn valid_floor_height(floor_height_m: f32) -> f32 {
    if floor_height_m.is_finite() && floor_height_m > 0.0 {
        floor_height_m
    } else {
        DEFAULT_FLOOR_HEIGHT_M
    }
}

/// Converts the first non-empty building list of `input`.
pub fn unify(input: &AnalysisInput, floor_height_m: f32) -> Result<UnifiedAnalysis> {
    let fh = valid_floor_height(floor_height_m);
    let mut hints = LayoutHints {
        relations: input.relations.clone(),
        connectors: input.connectors.clone(),
        ..LayoutHints::default()
    };
    let (source, buildings) = if !input.buildings.is_empty() {
        ("buildings", from_building_records(&input.buildings, fh, &mut hints)?)
    } else if !input.instances.is_empty() {
        ("instances", from_instances(&input.instances, fh, &mut hints))
    } else if !input.volumes.is_empty() {
        ("volumes", from_volumes(&input.volumes, fh))
    } else {
        warn!("Adapters: analysis has no buildings, instances or volumes");
        ("none", Vec::new())
    };
    debug!(
        "Adapters: source={} buildings={} positions={} relations={}",
        source,
        buildings.len(),
        hints.positions.len(),
        hints.relations.len()
    );
    Ok(UnifiedAnalysis { buildings, hints })
}

/// Grouping and scene assembly for an analysis without an image. The frame
/// is the centred fallback of an image of `image_size` pixels.
pub fn scene_from_analysis(
    input: &AnalysisInput,
    params: &ReconstructionParams,
    floor_height_m: f32,
    image_size: [usize; 2],
) -> Result<Scene> {
    let fh = valid_floor_height(floor_height_m);
    let unified = unify(input, fh)?;
    let analysis =
        BuildingGroupAnalyzer::new(params.grouping.clone()).analyze(unified.buildings, &unified.hints, fh);
    Ok(SceneAssembler.assemble(SceneInput {
        analysis,
        frame: PerspectiveFrame::fallback(image_size[0], image_size[1]),
        calibration: Calibration::new(None, fh),
        verification: None,
        warnings: Vec::new(),
        trace: None,
    }))
}
