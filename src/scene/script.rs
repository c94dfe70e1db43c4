//! Construction script for a 3D modelling host.
//!
//! A scene becomes an ordered list of volume operations: each building
//! followed by its parts, then the connectors. Every operation is one group in
//! the host. Footprints with at least four vertices are extruded as polygons,
//! anything else becomes a width × depth box around the building position.

use super::Scene;
use crate::footprint::polygon;
use crate::model::{Building, BuildingGroup, BuildingRole, Connector};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const MIN_AREA: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    Building,
    Part,
    Connector,
}

/// One extruded ground outline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeOp {
    pub id: String,
    pub kind: VolumeKind,
    /// Counter-clockwise world outline.
    pub outline: Vec<[f32; 2]>,
    /// Openings cut through the outline (courtyards).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<[f32; 2]>>,
    pub base_m: f32,
    pub height_m: f32,
    /// `false` when the outline is the box fallback.
    pub extruded: bool,
}

fn extrudable(points: &[[f32; 2]]) -> bool {
    points.len() >= 4 && polygon::area(points) > MIN_AREA && polygon::is_simple(points)
}

/// Footprint outline when it can be extruded, else the box around the
/// building position.
fn outline_of(b: &Building) -> (Vec<[f32; 2]>, bool) {
    match &b.footprint {
        Some(fp) if extrudable(fp.points()) => (fp.points().to_vec(), true),
        _ => (b.box_outline(), false),
    }
}

fn connector_outline(c: &Connector) -> Option<Vec<[f32; 2]>> {
    let len = c.length();
    if !(len > 0.0) || !(c.width_m > 0.0) {
        return None;
    }
    let d = [(c.end[0] - c.start[0]) / len, (c.end[1] - c.start[1]) / len];
    let n = [-d[1] * 0.5 * c.width_m, d[0] * 0.5 * c.width_m];
    Some(vec![
        [c.start[0] - n[0], c.start[1] - n[1]],
        [c.end[0] - n[0], c.end[1] - n[1]],
        [c.end[0] + n[0], c.end[1] + n[1]],
        [c.start[0] + n[0], c.start[1] + n[1]],
    ])
}

/// Orders the volumes of a group and returns them with the ids that fell
/// back to boxes.
pub fn plan_operations(group: &BuildingGroup) -> (Vec<VolumeOp>, Vec<String>) {
    let mut ops = Vec::new();
    let mut boxes = Vec::new();
    let courtyard_hole = group
        .courtyard
        .as_ref()
        .map(|c| c.footprint.points().to_vec());
    for b in &group.buildings {
        let (outline, extruded) = outline_of(b);
        if !extruded {
            warn!("Script: {} has no extrudable footprint, emitting box", b.id);
            boxes.push(b.id.clone());
        }
        let holes = match (&courtyard_hole, b.role) {
            (Some(hole), BuildingRole::Perimeter) if extruded => vec![hole.clone()],
            _ => Vec::new(),
        };
        ops.push(VolumeOp {
            id: b.id.clone(),
            kind: VolumeKind::Building,
            outline,
            holes,
            base_m: 0.0,
            height_m: b.height_m,
            extruded,
        });
        for part in &b.parts {
            let (outline, extruded) = match &part.footprint {
                Some(fp) if extrudable(fp.points()) => (fp.points().to_vec(), true),
                _ => (
                    polygon::rotated_box(b.center(), part.width_m, part.depth_m, b.rotation_deg),
                    false,
                ),
            };
            if !extruded {
                warn!("Script: part {} has no extrudable footprint, emitting box", part.id);
                boxes.push(part.id.clone());
            }
            ops.push(VolumeOp {
                id: part.id.clone(),
                kind: VolumeKind::Part,
                outline,
                holes: Vec::new(),
                base_m: part.base_m,
                height_m: part.height_m,
                extruded,
            });
        }
    }
    for (k, c) in group.connectors.iter().enumerate() {
        let Some(outline) = connector_outline(c) else {
            warn!("Script: connector {} -> {} has zero length, skipped", c.from, c.to);
            continue;
        };
        ops.push(VolumeOp {
            id: format!("K{}_{}_{}", k + 1, c.from, c.to),
            kind: VolumeKind::Connector,
            outline,
            holes: Vec::new(),
            base_m: c.elevation_m,
            height_m: c.height_m,
            extruded: true,
        });
    }
    (ops, boxes)
}

/// Renders a scene's volume operations for one host application.
pub trait ScriptWriter {
    fn render(&self, scene: &Scene) -> String;

    /// File extension of the rendered script.
    fn extension(&self) -> &'static str;
}

/// SketchUp Ruby console script; coordinates are metres.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RubyScriptWriter {
    pub operation_name: String,
    /// Prefix of the group names.
    pub group_prefix: String,
}

impl Default for RubyScriptWriter {
    fn default() -> Self {
        Self {
            operation_name: "Massing".to_string(),
            group_prefix: "MASS_".to_string(),
        }
    }
}

fn ruby_points(points: &[[f32; 2]]) -> String {
    let body: Vec<String> = points
        .iter()
        .map(|p| format!("[{:.3}, {:.3}]", p[0], p[1]))
        .collect();
    format!("[{}]", body.join(", "))
}

fn ruby_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

const RUBY_HELPER: &str = r#"def massing_volume(ents, name, outline, holes, base, height)
  grp = ents.add_group
  grp.name = name
  to_pts = ->(ring) { ring.map { |x, y| Geom::Point3d.new(x.m, y.m, base.m) } }
  face = grp.entities.add_face(to_pts.call(outline))
  holes.each do |ring|
    inner = grp.entities.add_face(to_pts.call(ring))
    inner.erase! if inner && inner.valid?
  end
  face.reverse! if face.normal.z < 0
  face.pushpull(height.m)
  grp
end
"#;

impl ScriptWriter for RubyScriptWriter {
    fn render(&self, scene: &Scene) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Massing scene: {:?}, {} volumes, confidence {:.3}",
            scene.group.kind,
            scene.operations.len(),
            scene.confidence
        );
        let _ = writeln!(out, "model = Sketchup.active_model");
        let _ = writeln!(
            out,
            "model.start_operation({}, true)",
            ruby_string(&self.operation_name)
        );
        let _ = writeln!(out, "ents = model.active_entities");
        out.push('\n');
        out.push_str(RUBY_HELPER);
        out.push('\n');
        for op in &scene.operations {
            let holes: Vec<String> = op.holes.iter().map(|h| ruby_points(h)).collect();
            let _ = writeln!(
                out,
                "massing_volume(ents, {}, {}, [{}], {:.3}, {:.3})",
                ruby_string(&format!("{}{}", self.group_prefix, op.id)),
                ruby_points(&op.outline),
                holes.join(", "),
                op.base_m,
                op.height_m
            );
        }
        out.push('\n');
        let _ = writeln!(out, "model.commit_operation");
        out
    }

    fn extension(&self) -> &'static str {
        "rb"
    }
}
