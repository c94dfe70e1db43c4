//! Building, connector and group types shared by the grouping and scene
//! stages.

use crate::footprint::{polygon, Bounds2, GroundFootprint};
use crate::height::{snap_floors, HeightSource, HeightedBuilding};
use serde::{Deserialize, Serialize};

/// Height of the parapet part added to buildings with protrusions.
pub const PARAPET_HEIGHT_M: f32 = 1.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn ground(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn xy(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingRole {
    #[default]
    Standalone,
    /// Synthesized perimeter of an enclosed complex.
    Perimeter,
    /// Block inside an enclosed complex.
    Inner,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Parapet,
}

/// Secondary volume stacked on a building.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingPart {
    pub id: String,
    pub kind: PartKind,
    /// World footprint; absent when the parent has none.
    pub footprint: Option<GroundFootprint>,
    pub width_m: f32,
    pub depth_m: f32,
    pub height_m: f32,
    /// Elevation of the part's base.
    pub base_m: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingFlags {
    pub footprint_fallback: bool,
    pub height_source: Option<HeightSource>,
}

/// Massing volume: footprint, height and placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    /// Ground polygon in world coordinates.
    pub footprint: Option<GroundFootprint>,
    pub width_m: f32,
    pub depth_m: f32,
    pub height_m: f32,
    pub floors: u32,
    pub parts: Vec<BuildingPart>,
    pub position: Position,
    /// Degrees about the vertical axis.
    pub rotation_deg: f32,
    pub role: BuildingRole,
    pub flags: BuildingFlags,
}

/// Whole floors and the matching height; heights are left alone when the
/// floor height is unusable.
fn quantize(height_m: f32, floor_height_m: f32) -> (u32, f32) {
    if floor_height_m.is_finite() && floor_height_m > 0.0 {
        let floors = snap_floors(height_m, floor_height_m);
        (floors, floors as f32 * floor_height_m)
    } else {
        (1, height_m)
    }
}

impl Building {
    /// Building without footprint, to be placed by the group analyzer. The
    /// height is snapped to whole floors.
    pub fn from_dimensions(
        id: impl Into<String>,
        width_m: f32,
        depth_m: f32,
        height_m: f32,
        floor_height_m: f32,
    ) -> Self {
        let (floors, height_m) = quantize(height_m, floor_height_m);
        Self {
            id: id.into(),
            footprint: None,
            width_m,
            depth_m,
            height_m,
            floors,
            parts: Vec::new(),
            position: Position::default(),
            rotation_deg: 0.0,
            role: BuildingRole::Standalone,
            flags: BuildingFlags::default(),
        }
    }

    /// Building placed on its footprint; the position is the footprint
    /// centroid. The height is snapped to whole floors.
    pub fn from_footprint(
        id: impl Into<String>,
        footprint: GroundFootprint,
        height_m: f32,
        floor_height_m: f32,
    ) -> Self {
        let (floors, height_m) = quantize(height_m, floor_height_m);
        let b = footprint.bounds();
        let c = footprint.centroid();
        Self {
            id: id.into(),
            width_m: b.width(),
            depth_m: b.depth(),
            height_m,
            floors,
            footprint: Some(footprint),
            parts: Vec::new(),
            position: Position::ground(c[0], c[1]),
            rotation_deg: 0.0,
            role: BuildingRole::Standalone,
            flags: BuildingFlags::default(),
        }
    }

    /// Converts a pipeline building; protrusions add a parapet part.
    pub fn from_heighted(h: &HeightedBuilding, floor_height_m: f32) -> Self {
        let mut b = Self::from_footprint(
            h.projected.building.id(),
            h.projected.footprint.clone(),
            h.height.height_m,
            floor_height_m,
        );
        b.floors = h.height.floors;
        b.flags = BuildingFlags {
            footprint_fallback: h.projected.footprint_fallback,
            height_source: Some(h.height.source),
        };
        if h.projected.building.response.has_protrusions {
            b.add_parapet();
        }
        b
    }

    pub fn add_parapet(&mut self) {
        let id = format!("{}-P{}", self.id, self.parts.len() + 1);
        self.parts.push(BuildingPart {
            id,
            kind: PartKind::Parapet,
            footprint: self.footprint.clone(),
            width_m: self.width_m,
            depth_m: self.depth_m,
            height_m: PARAPET_HEIGHT_M,
            base_m: self.height_m,
        });
    }

    pub fn has_footprint(&self) -> bool {
        self.footprint.is_some()
    }

    /// `width × depth` box turned by `rotation_deg` about the centre.
    pub fn box_outline(&self) -> Vec<[f32; 2]> {
        polygon::rotated_box(self.center(), self.width_m, self.depth_m, self.rotation_deg)
    }

    /// Ground outline: the footprint ring, else the rotated box.
    pub fn outline(&self) -> Vec<[f32; 2]> {
        match &self.footprint {
            Some(fp) => fp.points().to_vec(),
            None => self.box_outline(),
        }
    }

    /// Ground bounds of the outline.
    pub fn bounds(&self) -> Bounds2 {
        match &self.footprint {
            Some(fp) => fp.bounds(),
            None => Bounds2::of(&self.box_outline()).unwrap_or(Bounds2 {
                min: self.position.xy(),
                max: self.position.xy(),
            }),
        }
    }

    pub fn contains(&self, p: [f32; 2]) -> bool {
        match &self.footprint {
            Some(fp) => fp.contains(p),
            None => polygon::contains_point(&self.box_outline(), p),
        }
    }

    /// Footprint centroid, else the position.
    pub fn center(&self) -> [f32; 2] {
        match &self.footprint {
            Some(fp) => fp.centroid(),
            None => self.position.xy(),
        }
    }

    pub fn footprint_area(&self) -> f32 {
        match &self.footprint {
            Some(fp) => fp.area(),
            None => self.width_m * self.depth_m,
        }
    }

    pub fn max_dimension(&self) -> f32 {
        self.width_m.max(self.depth_m)
    }

    pub fn min_dimension(&self) -> f32 {
        self.width_m.min(self.depth_m)
    }

    pub fn diagonal(&self) -> f32 {
        self.width_m.hypot(self.depth_m)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Corridor,
    Bridge,
    Walkway,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub from: String,
    pub to: String,
    pub kind: ConnectorKind,
    pub start: [f32; 3],
    pub end: [f32; 3],
    pub width_m: f32,
    pub height_m: f32,
    pub elevation_m: f32,
    /// 1-based floor the connector leaves from.
    pub floor_level: u32,
}

impl Connector {
    pub fn length(&self) -> f32 {
        let dx = self.end[0] - self.start[0];
        let dy = self.end[1] - self.start[1];
        dx.hypot(dy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupKind {
    Single,
    Separate,
    EnclosedComplex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtyardKind {
    /// Surrounded on all sides.
    Central,
    /// Open on one side.
    Open,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Courtyard {
    pub footprint: GroundFootprint,
    pub kind: CourtyardKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AreaSummary {
    pub building_area_m2: f32,
    pub courtyard_area_m2: f32,
    pub total_area_m2: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingGroup {
    pub kind: GroupKind,
    /// Perimeter building first for enclosed complexes.
    pub buildings: Vec<Building>,
    pub connectors: Vec<Connector>,
    pub courtyard: Option<Courtyard>,
    pub area: Option<AreaSummary>,
}

impl BuildingGroup {
    pub fn empty() -> Self {
        Self {
            kind: GroupKind::Single,
            buildings: Vec::new(),
            connectors: Vec::new(),
            courtyard: None,
            area: None,
        }
    }

    pub fn perimeter(&self) -> Option<&Building> {
        self.buildings
            .iter()
            .find(|b| b.role == BuildingRole::Perimeter)
    }

    pub fn building(&self, id: &str) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_building_takes_centroid_and_dimensions() {
        let fp = GroundFootprint::rectangle([10.0, 4.0], 8.0, 6.0).unwrap();
        let mut b = Building::from_footprint("B1", fp, 9.6, 3.2);
        assert_eq!(b.floors, 3);
        assert_eq!(b.position.xy(), [10.0, 4.0]);
        assert!((b.width_m - 8.0).abs() < 1e-5 && (b.depth_m - 6.0).abs() < 1e-5);
        b.add_parapet();
        assert_eq!(b.parts[0].id, "B1-P1");
        assert!((b.parts[0].base_m - 9.6).abs() < 1e-5);
        assert_eq!(b.parts[0].height_m, PARAPET_HEIGHT_M);
    }

    #[test]
    fn dimension_building_bounds_follow_position() {
        let mut b = Building::from_dimensions("B2", 10.0, 4.0, 6.4, 3.2);
        b.position = Position::ground(20.0, 0.0);
        let bounds = b.bounds();
        assert_eq!(bounds.min, [15.0, -2.0]);
        assert_eq!(bounds.max, [25.0, 2.0]);
        assert_eq!(b.floors, 2);
    }

    #[test]
    fn heights_snap_to_whole_floors() {
        let b = Building::from_dimensions("B3", 10.0, 8.0, 10.0, 3.2);
        assert_eq!(b.floors, 3);
        assert!((b.height_m - 9.6).abs() < 1e-5);
        let low = Building::from_dimensions("B4", 10.0, 8.0, 0.5, 3.2);
        assert_eq!(low.floors, 1);
        assert!((low.height_m - 3.2).abs() < 1e-5);
    }

    #[test]
    fn rotated_dimension_building_outline_and_bounds_agree() {
        let mut b = Building::from_dimensions("V", 30.0, 6.0, 9.6, 3.2);
        b.rotation_deg = 90.0;
        let bounds = b.bounds();
        assert!((bounds.min[0] + 3.0).abs() < 1e-4 && (bounds.max[0] - 3.0).abs() < 1e-4);
        assert!((bounds.min[1] + 15.0).abs() < 1e-4 && (bounds.max[1] - 15.0).abs() < 1e-4);
        assert_eq!(Bounds2::of(&b.outline()), Some(bounds));
        assert!(b.contains([0.0, 12.0]));
        assert!(!b.contains([12.0, 0.0]));
    }

    #[test]
    fn group_kind_serializes_upper_case() {
        let json = serde_json::to_string(&GroupKind::EnclosedComplex).unwrap();
        assert_eq!(json, "\"ENCLOSED_COMPLEX\"");
    }
}
