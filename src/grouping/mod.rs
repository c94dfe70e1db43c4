//! Multi-building composition.
//!
//! Classifies the reconstructed buildings as a single building, separate
//! buildings or an enclosed courtyard complex, positions buildings that have
//! no footprint, and infers or resolves connectors between them.

mod connectors;
mod enclosure;
mod placement;

use crate::footprint::{Bounds2, GroundFootprint};
use crate::model::{
    AreaSummary, Building, BuildingGroup, BuildingRole, Connector, ConnectorKind, Courtyard,
    GroupKind,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Id of the synthesized perimeter building of an enclosed complex.
pub const PERIMETER_ID: &str = "OUTER";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingParams {
    /// Default spacing between related or row-placed buildings.
    pub spacing: f32,
    /// Edge gap for adjacent or connected buildings.
    pub adjacent_gap: f32,
    /// Normalized centre radius for the enclosure density test.
    pub enclosure_radius: f32,
    /// Maximum fraction of samples inside the centre radius.
    pub enclosure_density: f32,
    pub enclosure_min_buildings: usize,
    /// Occupied sectors out of eight.
    pub enclosure_min_sectors: usize,
    /// Cells along the longer side of the ensemble sample grid.
    pub sample_grid: usize,
    /// Margin between the inner buildings and the perimeter.
    pub perimeter_margin: f32,
    pub connector_max_span: f32,
    pub connector_depth_tolerance: f32,
    pub connector_min_width: f32,
    pub connector_max_height: f32,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            spacing: 5.0,
            adjacent_gap: 1.0,
            enclosure_radius: 0.2,
            enclosure_density: 0.1,
            enclosure_min_buildings: 3,
            enclosure_min_sectors: 6,
            sample_grid: 48,
            perimeter_margin: 2.0,
            connector_max_span: 20.0,
            connector_depth_tolerance: 10.0,
            connector_min_width: 2.4,
            connector_max_height: 4.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Adjacent,
    Connected,
    #[serde(alias = "left")]
    LeftOf,
    #[serde(alias = "right")]
    RightOf,
    #[serde(alias = "front")]
    InFrontOf,
    #[serde(alias = "behind_of", alias = "back")]
    Behind,
    Separate,
}

/// `from` is placed relative to `to`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialRelation {
    #[serde(alias = "src", alias = "source")]
    pub from: String,
    #[serde(alias = "dst", alias = "target")]
    pub to: String,
    #[serde(alias = "type", alias = "relation")]
    pub kind: RelationKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectorHint {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: Option<ConnectorKind>,
    #[serde(default)]
    pub width_m: Option<f32>,
    #[serde(default)]
    pub height_m: Option<f32>,
    #[serde(default)]
    pub floor_level: Option<u32>,
}

/// Caller-supplied layout information.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutHints {
    /// Ground positions by building id.
    pub positions: BTreeMap<String, [f32; 2]>,
    pub relations: Vec<SpatialRelation>,
    pub connectors: Vec<ConnectorHint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupAnalysis {
    pub group: BuildingGroup,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct BuildingGroupAnalyzer {
    pub params: GroupingParams,
}

impl BuildingGroupAnalyzer {
    pub fn new(params: GroupingParams) -> Self {
        Self { params }
    }

    pub fn analyze(
        &self,
        mut buildings: Vec<Building>,
        hints: &LayoutHints,
        floor_height_m: f32,
    ) -> GroupAnalysis {
        let t0 = Instant::now();
        let mut warnings = Vec::new();
        if buildings.is_empty() {
            return GroupAnalysis {
                group: BuildingGroup::empty(),
                warnings,
            };
        }
        if buildings.len() == 1 {
            let group = BuildingGroup {
                kind: GroupKind::Single,
                connectors: self.explicit_connectors(hints, &buildings, floor_height_m, &mut warnings),
                buildings,
                courtyard: None,
                area: None,
            };
            return GroupAnalysis { group, warnings };
        }

        placement::place_buildings(&mut buildings, hints, &self.params);

        let stats = enclosure::enclosure_stats(&buildings, &self.params);
        let enclosed = stats
            .as_ref()
            .is_some_and(|s| enclosure::is_enclosed(s, buildings.len(), &self.params));
        let group = if enclosed {
            match self.enclose(&buildings, stats.as_ref(), hints, floor_height_m, &mut warnings) {
                Some(group) => group,
                None => {
                    let msg = "enclosure detected but no courtyard fits, grouping as separate";
                    warn!("Grouping: {msg}");
                    warnings.push(msg.to_string());
                    self.separate(buildings, hints, floor_height_m, &mut warnings)
                }
            }
        } else {
            self.separate(buildings, hints, floor_height_m, &mut warnings)
        };
        debug!(
            "Grouping: kind={:?} buildings={} connectors={} density={:.3} sectors={} elapsed_ms={:.3}",
            group.kind,
            group.buildings.len(),
            group.connectors.len(),
            stats.as_ref().map_or(f32::NAN, |s| s.centre_density),
            stats.as_ref().map_or(0, |s| s.sectors),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        GroupAnalysis { group, warnings }
    }

    fn explicit_connectors(
        &self,
        hints: &LayoutHints,
        buildings: &[Building],
        floor_height_m: f32,
        warnings: &mut Vec<String>,
    ) -> Vec<Connector> {
        connectors::resolve_explicit(&hints.connectors, buildings, &self.params, floor_height_m, warnings)
    }

    fn separate(
        &self,
        buildings: Vec<Building>,
        hints: &LayoutHints,
        floor_height_m: f32,
        warnings: &mut Vec<String>,
    ) -> BuildingGroup {
        let connectors = if hints.connectors.is_empty() {
            connectors::infer_connectors(&buildings, &self.params, floor_height_m)
        } else {
            self.explicit_connectors(hints, &buildings, floor_height_m, warnings)
        };
        BuildingGroup {
            kind: GroupKind::Separate,
            buildings,
            connectors,
            courtyard: None,
            area: None,
        }
    }

    fn enclose(
        &self,
        inner: &[Building],
        stats: Option<&enclosure::EnclosureStats>,
        hints: &LayoutHints,
        floor_height_m: f32,
        warnings: &mut Vec<String>,
    ) -> Option<BuildingGroup> {
        let stats = stats?;
        let ens = enclosure::ensemble_bounds(inner)?;
        let m = self.params.perimeter_margin.max(0.0);
        let outer_bounds = Bounds2 {
            min: [ens.min[0] - m, ens.min[1] - m],
            max: [ens.max[0] + m, ens.max[1] + m],
        };
        let outer_fp = GroundFootprint::rectangle(
            outer_bounds.center(),
            outer_bounds.width(),
            outer_bounds.depth(),
        )?;
        let yard_fp = enclosure::courtyard_rectangle(&outer_bounds, inner)?;

        let outer_area = outer_fp.area();
        let yard_area = yard_fp.area();
        if !(outer_area > yard_area && yard_area > 0.0) {
            return None;
        }

        let lowest = inner
            .iter()
            .map(|b| b.height_m)
            .fold(f32::INFINITY, f32::min);
        let mut outer = Building::from_footprint(PERIMETER_ID, outer_fp, lowest, floor_height_m);
        outer.role = BuildingRole::Perimeter;

        let mut buildings = Vec::with_capacity(inner.len() + 1);
        buildings.push(outer);
        buildings.extend(inner.iter().cloned().map(|mut b| {
            b.role = BuildingRole::Inner;
            b
        }));

        let connectors = if hints.connectors.is_empty() {
            self.ring_connectors(inner, outer_bounds.center(), floor_height_m)
        } else {
            self.explicit_connectors(hints, &buildings, floor_height_m, warnings)
        };

        Some(BuildingGroup {
            kind: GroupKind::EnclosedComplex,
            buildings,
            connectors,
            courtyard: Some(Courtyard {
                footprint: yard_fp,
                kind: enclosure::courtyard_kind(stats),
            }),
            area: Some(AreaSummary {
                building_area_m2: outer_area - yard_area,
                courtyard_area_m2: yard_area,
                total_area_m2: outer_area,
            }),
        })
    }

    /// Connects neighbours in angular order around the courtyard, closing the
    /// ring. Touching neighbours get no connector.
    fn ring_connectors(&self, inner: &[Building], centre: [f32; 2], floor_height_m: f32) -> Vec<Connector> {
        let order = enclosure::ring_order(inner, centre);
        let n = order.len();
        let pairs = if n > 2 { n } else { n.saturating_sub(1) };
        (0..pairs)
            .filter_map(|k| {
                let (a, b) = (&inner[order[k]], &inner[order[(k + 1) % n]]);
                connectors::connector_between(a, b, &self.params, floor_height_m)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, center: [f32; 2], w: f32, d: f32, h: f32) -> Building {
        Building::from_footprint(id, GroundFootprint::rectangle(center, w, d).unwrap(), h, 3.2)
    }

    /// Four separated wings around a 30 x 30 yard.
    fn courtyard_ring() -> Vec<Building> {
        vec![
            block("N", [0.0, 20.0], 40.0, 10.0, 16.0),
            block("S", [0.0, -20.0], 40.0, 10.0, 12.8),
            block("W", [-22.0, 0.0], 6.0, 28.0, 9.6),
            block("E", [22.0, 0.0], 6.0, 28.0, 9.6),
        ]
    }

    fn within(outer: &Bounds2, inner: &Bounds2) -> bool {
        inner.min[0] >= outer.min[0]
            && inner.min[1] >= outer.min[1]
            && inner.max[0] <= outer.max[0]
            && inner.max[1] <= outer.max[1]
    }

    #[test]
    fn empty_and_single() {
        let analyzer = BuildingGroupAnalyzer::default();
        let empty = analyzer.analyze(Vec::new(), &LayoutHints::default(), 3.2);
        assert!(empty.group.buildings.is_empty());
        let one = analyzer.analyze(
            vec![block("A", [0.0, 0.0], 10.0, 10.0, 6.4)],
            &LayoutHints::default(),
            3.2,
        );
        assert_eq!(one.group.kind, GroupKind::Single);
        assert!(one.group.connectors.is_empty());
    }

    #[test]
    fn enclosed_complex_invariants_hold() {
        let out = BuildingGroupAnalyzer::default().analyze(courtyard_ring(), &LayoutHints::default(), 3.2);
        let g = &out.group;
        assert_eq!(g.kind, GroupKind::EnclosedComplex);
        assert_eq!(g.buildings.len(), 5);
        let outer = g.perimeter().unwrap();
        assert_eq!(outer.id, PERIMETER_ID);
        assert_eq!(g.buildings[0].id, PERIMETER_ID);
        assert!((outer.height_m - 9.6).abs() < 1e-5);

        let yard = g.courtyard.as_ref().unwrap();
        let outer_area = outer.footprint_area();
        assert!(outer_area > yard.footprint.area() && yard.footprint.area() > 0.0);
        let ob = outer.bounds();
        for b in g.buildings.iter().filter(|b| b.role == BuildingRole::Inner) {
            assert!(within(&ob, &b.bounds()), "{} escapes the perimeter", b.id);
        }
        let area = g.area.unwrap();
        assert!((area.total_area_m2 - outer_area).abs() < 1e-2);
        assert!((area.building_area_m2 + area.courtyard_area_m2 - area.total_area_m2).abs() < 1e-2);
    }

    #[test]
    fn courtyard_ring_connects_wings_in_order() {
        let out = BuildingGroupAnalyzer::default().analyze(courtyard_ring(), &LayoutHints::default(), 3.2);
        // Each wing end leaves a 1 unit gap to the next wing.
        assert_eq!(out.group.connectors.len(), 4);
        for c in &out.group.connectors {
            assert!((c.length() - 1.0).abs() < 1e-4, "{c:?}");
        }
    }

    #[test]
    fn two_close_buildings_are_separate_with_connector() {
        let out = BuildingGroupAnalyzer::default().analyze(
            vec![
                block("A", [0.0, 0.0], 20.0, 15.0, 16.0),
                block("B", [25.0, 0.0], 20.0, 15.0, 9.6),
            ],
            &LayoutHints::default(),
            3.2,
        );
        assert_eq!(out.group.kind, GroupKind::Separate);
        assert_eq!(out.group.connectors.len(), 1);
        let w = out.group.connectors[0].width_m;
        assert!((2.4..=3.0 + 1e-5).contains(&w), "{w}");
    }

    #[test]
    fn explicit_connectors_replace_inference() {
        let hints = LayoutHints {
            connectors: vec![ConnectorHint {
                from: "A".into(),
                to: "Q".into(),
                kind: None,
                width_m: None,
                height_m: None,
                floor_level: None,
            }],
            ..LayoutHints::default()
        };
        let out = BuildingGroupAnalyzer::default().analyze(
            vec![
                block("A", [0.0, 0.0], 20.0, 15.0, 16.0),
                block("B", [25.0, 0.0], 20.0, 15.0, 9.6),
            ],
            &hints,
            3.2,
        );
        assert!(out.group.connectors.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn relation_json_accepts_aliases() {
        let hints: LayoutHints = serde_json::from_str(
            r#"{"positions":{"A":[1.0,2.0]},"relations":[{"src":"B","dst":"A","type":"left_of"}]}"#,
        )
        .unwrap();
        assert_eq!(hints.positions["A"], [1.0, 2.0]);
        assert_eq!(hints.relations[0].kind, RelationKind::LeftOf);
        assert!(hints.connectors.is_empty());
    }
}
