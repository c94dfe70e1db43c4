use super::{ConnectorHint, GroupingParams};
use crate::footprint::Bounds2;
use crate::model::{Building, Connector, ConnectorKind};
use log::warn;

/// Facing edges of two ground bounds.
struct Gap {
    /// Edge-to-edge distance along the separating axis (negative on overlap).
    distance: f32,
    start: [f32; 2],
    end: [f32; 2],
}

fn interval_mid(a0: f32, a1: f32, b0: f32, b1: f32, fallback: f32) -> f32 {
    let lo = a0.max(b0);
    let hi = a1.min(b1);
    if hi >= lo {
        0.5 * (lo + hi)
    } else {
        fallback
    }
}

fn gap_between(a: &Bounds2, b: &Bounds2) -> Gap {
    let gap_x = (b.min[0] - a.max[0]).max(a.min[0] - b.max[0]);
    let gap_y = (b.min[1] - a.max[1]).max(a.min[1] - b.max[1]);
    let (ca, cb) = (a.center(), b.center());
    if gap_x >= gap_y {
        let y = interval_mid(a.min[1], a.max[1], b.min[1], b.max[1], 0.5 * (ca[1] + cb[1]));
        let (sx, ex) = if cb[0] >= ca[0] {
            (a.max[0], b.min[0])
        } else {
            (a.min[0], b.max[0])
        };
        Gap {
            distance: gap_x,
            start: [sx, y],
            end: [ex, y],
        }
    } else {
        let x = interval_mid(a.min[0], a.max[0], b.min[0], b.max[0], 0.5 * (ca[0] + cb[0]));
        let (sy, ey) = if cb[1] >= ca[1] {
            (a.max[1], b.min[1])
        } else {
            (a.min[1], b.max[1])
        };
        Gap {
            distance: gap_y,
            start: [x, sy],
            end: [x, ey],
        }
    }
}

fn depth_overlap(a: &Bounds2, b: &Bounds2) -> bool {
    a.min[1] < b.max[1] && b.min[1] < a.max[1]
}

/// Connector geometry between two buildings: width from the smaller
/// building's shorter edge, height and elevation from the shorter building.
fn build_connector(
    a: &Building,
    b: &Building,
    gap: &Gap,
    params: &GroupingParams,
    floor_height_m: f32,
) -> Connector {
    let smaller = if a.footprint_area() <= b.footprint_area() {
        a
    } else {
        b
    };
    let shorter = a.height_m.min(b.height_m);
    let width_m = (0.2 * smaller.min_dimension()).max(params.connector_min_width);
    let height_m = (0.25 * shorter).min(params.connector_max_height);
    let elevation_m = 0.6 * shorter;
    let kind = if elevation_m >= floor_height_m {
        ConnectorKind::Bridge
    } else {
        ConnectorKind::Corridor
    };
    Connector {
        from: a.id.clone(),
        to: b.id.clone(),
        kind,
        start: [gap.start[0], gap.start[1], elevation_m],
        end: [gap.end[0], gap.end[1], elevation_m],
        width_m,
        height_m,
        elevation_m,
        floor_level: floor_level(elevation_m, floor_height_m),
    }
}

fn floor_level(elevation_m: f32, floor_height_m: f32) -> u32 {
    if floor_height_m > 0.0 {
        (elevation_m / floor_height_m).floor().max(0.0) as u32 + 1
    } else {
        1
    }
}

/// Connector for two buildings with a positive edge gap, `None` when they
/// touch or overlap.
pub(super) fn connector_between(
    a: &Building,
    b: &Building,
    params: &GroupingParams,
    floor_height_m: f32,
) -> Option<Connector> {
    let gap = gap_between(&a.bounds(), &b.bounds());
    if gap.distance <= 0.0 {
        return None;
    }
    Some(build_connector(a, b, &gap, params, floor_height_m))
}

/// Pairwise adjacency rule: close centres, overlapping (or near) depth
/// intervals and a positive gap below the maximum span.
pub(super) fn infer_connectors(
    buildings: &[Building],
    params: &GroupingParams,
    floor_height_m: f32,
) -> Vec<Connector> {
    let mut out = Vec::new();
    for i in 0..buildings.len() {
        for j in (i + 1)..buildings.len() {
            let (a, b) = (&buildings[i], &buildings[j]);
            let (ba, bb) = (a.bounds(), b.bounds());
            let (ca, cb) = (a.center(), b.center());
            let centre_dist = (ca[0] - cb[0]).hypot(ca[1] - cb[1]);
            let limit = 2.0 * a.max_dimension().max(b.max_dimension());
            if centre_dist >= limit {
                continue;
            }
            let depth_ok = depth_overlap(&ba, &bb)
                || (ca[1] - cb[1]).abs() < params.connector_depth_tolerance;
            if !depth_ok {
                continue;
            }
            let gap = gap_between(&ba, &bb);
            if gap.distance <= 0.0 || gap.distance >= params.connector_max_span {
                continue;
            }
            out.push(build_connector(a, b, &gap, params, floor_height_m));
        }
    }
    out
}

/// Resolves caller-supplied connectors by building id. Unknown ids are
/// skipped and reported.
pub(super) fn resolve_explicit(
    hints: &[ConnectorHint],
    buildings: &[Building],
    params: &GroupingParams,
    floor_height_m: f32,
    warnings: &mut Vec<String>,
) -> Vec<Connector> {
    let mut out = Vec::new();
    for hint in hints {
        let from = buildings.iter().find(|b| b.id == hint.from);
        let to = buildings.iter().find(|b| b.id == hint.to);
        let (Some(a), Some(b)) = (from, to) else {
            let msg = format!(
                "connector {} -> {} references an unknown building",
                hint.from, hint.to
            );
            warn!("Grouping: {msg}");
            warnings.push(msg);
            continue;
        };
        let gap = gap_between(&a.bounds(), &b.bounds());
        let mut c = build_connector(a, b, &gap, params, floor_height_m);
        if let Some(level) = hint.floor_level.filter(|l| *l >= 1) {
            c.elevation_m = (level - 1) as f32 * floor_height_m;
            c.start[2] = c.elevation_m;
            c.end[2] = c.elevation_m;
            c.floor_level = level;
            c.kind = if c.elevation_m >= floor_height_m {
                ConnectorKind::Bridge
            } else {
                ConnectorKind::Corridor
            };
        }
        if let Some(kind) = hint.kind {
            c.kind = kind;
        }
        if let Some(w) = hint.width_m.filter(|w| *w > 0.0) {
            c.width_m = w;
        }
        if let Some(h) = hint.height_m.filter(|h| *h > 0.0) {
            c.height_m = h;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::GroundFootprint;

    fn block(id: &str, center: [f32; 2], w: f32, d: f32, h: f32) -> Building {
        let fp = GroundFootprint::rectangle(center, w, d).unwrap();
        Building::from_footprint(id, fp, h, 3.2)
    }

    #[test]
    fn two_buildings_five_apart_get_one_connector() {
        // 20 x 15 and 20 x 15 footprints with a 5 unit gap along x.
        let a = block("A", [0.0, 0.0], 20.0, 15.0, 16.0);
        let b = block("B", [25.0, 0.0], 20.0, 15.0, 9.6);
        let params = GroupingParams::default();
        let cs = infer_connectors(&[a, b], &params, 3.2);
        assert_eq!(cs.len(), 1);
        let c = &cs[0];
        assert!(c.width_m >= 2.4 && c.width_m <= 3.0 + 1e-5, "{}", c.width_m);
        assert!((c.length() - 5.0).abs() < 1e-4);
        assert!((c.height_m - 2.4).abs() < 1e-5);
        assert!((c.elevation_m - 5.76).abs() < 1e-4);
        assert_eq!(c.kind, ConnectorKind::Bridge);
        assert_eq!(c.floor_level, 2);
    }

    #[test]
    fn distant_or_touching_buildings_are_not_connected() {
        let params = GroupingParams::default();
        let a = block("A", [0.0, 0.0], 10.0, 10.0, 6.0);
        let far = block("B", [40.0, 0.0], 10.0, 10.0, 6.0);
        assert!(infer_connectors(&[a.clone(), far], &params, 3.2).is_empty());
        let touching = block("C", [10.0, 0.0], 10.0, 10.0, 6.0);
        assert!(infer_connectors(&[a.clone(), touching], &params, 3.2).is_empty());
        let offset = block("D", [12.0, 30.0], 10.0, 10.0, 6.0);
        assert!(infer_connectors(&[a, offset], &params, 3.2).is_empty());
    }

    #[test]
    fn low_connector_is_a_corridor() {
        let a = block("A", [0.0, 0.0], 12.0, 12.0, 4.0);
        let b = block("B", [16.0, 2.0], 12.0, 12.0, 4.0);
        let cs = infer_connectors(&[a, b], &GroupingParams::default(), 3.2);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].kind, ConnectorKind::Corridor);
        assert_eq!(cs[0].floor_level, 1);
        assert!((cs[0].width_m - 2.4).abs() < 1e-5);
    }

    #[test]
    fn explicit_hints_skip_unknown_ids() {
        let a = block("A", [0.0, 0.0], 10.0, 10.0, 9.6);
        let b = block("B", [30.0, 0.0], 10.0, 10.0, 9.6);
        let hints = vec![
            ConnectorHint {
                from: "A".into(),
                to: "B".into(),
                kind: Some(ConnectorKind::Walkway),
                width_m: Some(4.0),
                height_m: None,
                floor_level: Some(1),
            },
            ConnectorHint {
                from: "A".into(),
                to: "Z".into(),
                kind: None,
                width_m: None,
                height_m: None,
                floor_level: None,
            },
        ];
        let mut warnings = Vec::new();
        let cs = resolve_explicit(&hints, &[a, b], &GroupingParams::default(), 3.2, &mut warnings);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].kind, ConnectorKind::Walkway);
        assert_eq!(cs[0].width_m, 4.0);
        assert_eq!(cs[0].elevation_m, 0.0);
        assert_eq!(warnings.len(), 1);
    }
}
