use super::{GroupingParams, LayoutHints, RelationKind, SpatialRelation};
use crate::model::{Building, Position};
use log::debug;

/// Half sizes of the outline's axis-aligned bounds.
fn half_extents(b: &Building) -> [f32; 2] {
    let r = b.bounds();
    [0.5 * r.width(), 0.5 * r.depth()]
}

/// Position of `b` relative to the already placed `anchor`.
fn relative_position(
    b: &Building,
    anchor: &Building,
    kind: RelationKind,
    params: &GroupingParams,
) -> [f32; 2] {
    let ab = anchor.bounds();
    let c = anchor.center();
    let [hw, hd] = half_extents(b);
    match kind {
        RelationKind::Adjacent | RelationKind::Connected => {
            [ab.max[0] + params.adjacent_gap + hw, c[1]]
        }
        RelationKind::RightOf => [ab.max[0] + params.spacing + hw, c[1]],
        RelationKind::LeftOf => [ab.min[0] - params.spacing - hw, c[1]],
        RelationKind::InFrontOf => [c[0], ab.min[1] - params.spacing - hd],
        RelationKind::Behind => [c[0], ab.max[1] + params.spacing + hd],
        RelationKind::Separate => {
            let gap = 2.0 * b.diagonal().min(anchor.diagonal());
            [ab.max[0] + gap + hw, c[1]]
        }
    }
}

fn relation_for<'a>(
    id: &str,
    relations: &'a [SpatialRelation],
    placed: &[bool],
    buildings: &[Building],
) -> Option<(&'a SpatialRelation, usize)> {
    relations.iter().find_map(|r| {
        if r.from != id {
            return None;
        }
        let anchor = buildings.iter().position(|b| b.id == r.to)?;
        placed[anchor].then_some((r, anchor))
    })
}

/// Positions every building without a footprint. Priority: footprint,
/// explicit position hint, spatial relation to a placed building, then a
/// left-to-right row.
pub(super) fn place_buildings(
    buildings: &mut [Building],
    hints: &LayoutHints,
    params: &GroupingParams,
) {
    let mut placed: Vec<bool> = buildings.iter().map(Building::has_footprint).collect();
    let mut by_hint = 0usize;
    for (b, done) in buildings.iter_mut().zip(placed.iter_mut()) {
        if *done {
            continue;
        }
        if let Some(p) = hints.positions.get(&b.id) {
            b.position = Position::ground(p[0], p[1]);
            *done = true;
            by_hint += 1;
        }
    }

    let mut by_relation = 0usize;
    loop {
        let mut progress = false;
        for i in 0..buildings.len() {
            if placed[i] {
                continue;
            }
            let Some((rel, anchor)) =
                relation_for(&buildings[i].id, &hints.relations, &placed, buildings)
            else {
                continue;
            };
            let p = relative_position(&buildings[i], &buildings[anchor], rel.kind, params);
            buildings[i].position = Position::ground(p[0], p[1]);
            placed[i] = true;
            by_relation += 1;
            progress = true;
        }
        if !progress {
            break;
        }
    }

    let mut by_row = 0usize;
    for i in 0..buildings.len() {
        if placed[i] {
            continue;
        }
        let right_edge = buildings
            .iter()
            .zip(&placed)
            .filter(|(_, p)| **p)
            .map(|(b, _)| b.bounds().max[0])
            .fold(None, |acc: Option<f32>, x| Some(acc.map_or(x, |a| a.max(x))));
        let x = match right_edge {
            Some(edge) => edge + params.spacing + half_extents(&buildings[i])[0],
            None => 0.0,
        };
        buildings[i].position = Position::ground(x, 0.0);
        placed[i] = true;
        by_row += 1;
    }
    debug!(
        "Grouping: placed hint={} relation={} row={}",
        by_hint, by_relation, by_row
    );
}
