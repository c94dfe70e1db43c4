//! Courtyard-complex detection.
//!
//! Sample points are laid on a square grid over the ensemble bounding box,
//! kept where they fall inside a building and normalized to that box. An
//! enclosed complex leaves the centre of that box nearly empty while its mass
//! wraps around it.

use super::GroupingParams;
use crate::footprint::{Bounds2, GroundFootprint};
use crate::model::{Building, CourtyardKind};
use std::f32::consts::TAU;

pub(super) const SECTORS: usize = 8;

/// Centre occupancy and angular coverage of the ensemble.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct EnclosureStats {
    pub samples: usize,
    /// Fraction of samples within the centre radius.
    pub centre_density: f32,
    /// Number of occupied angular sectors around the centre.
    pub sectors: usize,
}

pub(super) fn ensemble_bounds(buildings: &[Building]) -> Option<Bounds2> {
    let mut it = buildings.iter().map(Building::bounds);
    let first = it.next()?;
    Some(it.fold(first, |acc, b| acc.union(&b)))
}

fn occupied(buildings: &[Building], p: [f32; 2]) -> bool {
    buildings.iter().any(|b| b.contains(p))
}

/// Cell centres of a square grid over `ens` that fall inside a building.
fn sample_points(buildings: &[Building], ens: &Bounds2, grid: usize) -> Vec<[f32; 2]> {
    let extent = ens.width().max(ens.depth());
    if !(extent > 0.0) {
        return Vec::new();
    }
    let step = extent / grid.max(1) as f32;
    let nx = ((ens.width() / step).ceil() as usize).max(1);
    let ny = ((ens.depth() / step).ceil() as usize).max(1);
    let mut out = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let p = [
                ens.min[0] + (i as f32 + 0.5) * step,
                ens.min[1] + (j as f32 + 0.5) * step,
            ];
            if occupied(buildings, p) {
                out.push(p);
            }
        }
    }
    out
}

pub(super) fn sector_of(dx: f32, dy: f32) -> usize {
    let a = dy.atan2(dx).rem_euclid(TAU);
    ((a / TAU * SECTORS as f32) as usize).min(SECTORS - 1)
}

pub(super) fn enclosure_stats(buildings: &[Building], params: &GroupingParams) -> Option<EnclosureStats> {
    let ens = ensemble_bounds(buildings)?;
    let sx = if ens.width() > 0.0 { ens.width() } else { 1.0 };
    let sy = if ens.depth() > 0.0 { ens.depth() } else { 1.0 };
    let mut samples = 0usize;
    let mut near = 0usize;
    let mut sectors = [false; SECTORS];
    for p in sample_points(buildings, &ens, params.sample_grid) {
        let dx = (p[0] - ens.min[0]) / sx - 0.5;
        let dy = (p[1] - ens.min[1]) / sy - 0.5;
        samples += 1;
        if dx.hypot(dy) < params.enclosure_radius {
            near += 1;
        }
        if dx != 0.0 || dy != 0.0 {
            sectors[sector_of(dx, dy)] = true;
        }
    }
    if samples == 0 {
        return None;
    }
    Some(EnclosureStats {
        samples,
        centre_density: near as f32 / samples as f32,
        sectors: sectors.iter().filter(|o| **o).count(),
    })
}

pub(super) fn is_enclosed(stats: &EnclosureStats, count: usize, params: &GroupingParams) -> bool {
    count >= params.enclosure_min_buildings
        && stats.centre_density < params.enclosure_density
        && stats.sectors >= params.enclosure_min_sectors
}

fn overlaps_interior(a: &Bounds2, b: &Bounds2) -> bool {
    a.min[0] < b.max[0] && b.min[0] < a.max[0] && a.min[1] < b.max[1] && b.min[1] < a.max[1]
}

fn scaled(outer: &Bounds2, s: f32) -> Bounds2 {
    let c = outer.center();
    let (hw, hd) = (0.5 * s * outer.width(), 0.5 * s * outer.depth());
    Bounds2 {
        min: [c[0] - hw, c[1] - hd],
        max: [c[0] + hw, c[1] + hd],
    }
}

/// Largest rectangle centred in `outer`, with its aspect ratio, that overlaps
/// none of the building bounds. `None` when even a sliver is blocked.
pub(super) fn courtyard_rectangle(outer: &Bounds2, buildings: &[Building]) -> Option<GroundFootprint> {
    const MIN_SCALE: f32 = 0.02;
    let blocks: Vec<Bounds2> = buildings.iter().map(Building::bounds).collect();
    let clear = |s: f32| {
        let r = scaled(outer, s);
        blocks.iter().all(|b| !overlaps_interior(&r, b))
    };
    if !clear(MIN_SCALE) {
        return None;
    }
    let (mut lo, mut hi) = (MIN_SCALE, 1.0f32);
    for _ in 0..40 {
        let mid = 0.5 * (lo + hi);
        if clear(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let r = scaled(outer, lo);
    GroundFootprint::rectangle(r.center(), r.width(), r.depth())
}

pub(super) fn courtyard_kind(stats: &EnclosureStats) -> CourtyardKind {
    if stats.sectors >= SECTORS {
        CourtyardKind::Central
    } else {
        CourtyardKind::Open
    }
}

/// Inner building indices sorted by angle around `centre`.
pub(super) fn ring_order(buildings: &[Building], centre: [f32; 2]) -> Vec<usize> {
    let mut idx: Vec<(usize, f32)> = buildings
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let c = b.center();
            (i, (c[1] - centre[1]).atan2(c[0] - centre[0]).rem_euclid(TAU))
        })
        .collect();
    idx.sort_by(|a, b| a.1.total_cmp(&b.1));
    idx.into_iter().map(|(i, _)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::GroundFootprint;

    fn block(id: &str, center: [f32; 2], w: f32, d: f32) -> Building {
        Building::from_footprint(id, GroundFootprint::rectangle(center, w, d).unwrap(), 9.6, 3.2)
    }

    fn ring() -> Vec<Building> {
        vec![
            block("N", [0.0, 20.0], 50.0, 10.0),
            block("S", [0.0, -20.0], 50.0, 10.0),
            block("W", [-20.0, 0.0], 10.0, 30.0),
            block("E", [20.0, 0.0], 10.0, 30.0),
        ]
    }

    #[test]
    fn ring_of_bars_is_enclosed() {
        let params = GroupingParams::default();
        let stats = enclosure_stats(&ring(), &params).unwrap();
        assert_eq!(stats.centre_density, 0.0);
        assert_eq!(stats.sectors, SECTORS);
        assert!(is_enclosed(&stats, 4, &params));
        assert_eq!(courtyard_kind(&stats), CourtyardKind::Central);
    }

    #[test]
    fn row_of_blocks_is_not_enclosed() {
        let params = GroupingParams::default();
        let row = vec![
            block("A", [0.0, 0.0], 10.0, 10.0),
            block("B", [10.0, 0.0], 10.0, 10.0),
            block("C", [20.0, 0.0], 10.0, 10.0),
        ];
        let stats = enclosure_stats(&row, &params).unwrap();
        assert!(stats.centre_density > params.enclosure_density);
        assert!(!is_enclosed(&stats, 3, &params));
    }

    #[test]
    fn courtyard_fills_the_gap_between_bars() {
        let buildings = ring();
        let outer = ensemble_bounds(&buildings).unwrap();
        let yard = courtyard_rectangle(&outer, &buildings).unwrap();
        // Bars leave a 30 x 30 opening.
        assert!((yard.area() - 900.0).abs() < 1.0, "{}", yard.area());
        let c = yard.centroid();
        assert!(c[0].abs() < 1e-3 && c[1].abs() < 1e-3);
    }

    #[test]
    fn blocked_centre_has_no_courtyard() {
        let mut buildings = ring();
        buildings.push(block("M", [0.0, 0.0], 4.0, 4.0));
        let outer = ensemble_bounds(&buildings).unwrap();
        assert!(courtyard_rectangle(&outer, &buildings).is_none());
    }

    #[test]
    fn ring_order_goes_counter_clockwise_from_east() {
        let order = ring_order(&ring(), [0.0, 0.0]);
        // E (0), N (pi/2), W (pi), S (3pi/2).
        assert_eq!(order, vec![3, 0, 2, 1]);
    }
}
