//! RANSAC vanishing-point fitting.
//!
//! Each hypothesis is the intersection of the supporting lines of two
//! segments. A segment supports a hypothesis when its endpoints lie within
//! `inlier_threshold_px` of the line joining its midpoint to the candidate
//! vanishing point. The best consensus set is refined with a strength-weighted
//! least-squares fit.

use super::vp::refine_vp;
use crate::segments::LineSegment;
use log::debug;
use nalgebra::Vector3;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Number of sampled hypotheses. Smaller pools are enumerated exhaustively.
    pub iterations: usize,
    /// Endpoint residual (px) under which a segment counts as an inlier.
    pub inlier_threshold_px: f32,
    /// Minimum consensus size for an accepted vanishing point.
    pub min_inliers: usize,
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            iterations: 1000,
            inlier_threshold_px: 3.0,
            min_inliers: 3,
            seed: 0x5eed_0001,
        }
    }
}

/// One accepted vanishing point with its consensus set.
#[derive(Clone, Debug)]
pub(crate) struct VpFit {
    /// Homogeneous position; `w == 0` encodes a direction at infinity.
    pub point: Vector3<f32>,
    pub inliers: Vec<usize>,
}

/// Scales a homogeneous point to `w = 1`, or to a unit direction when it lies
/// at infinity.
pub(crate) fn normalize_point(p: Vector3<f32>) -> Option<Vector3<f32>> {
    if !p.iter().all(|v| v.is_finite()) {
        return None;
    }
    let xy = (p[0] * p[0] + p[1] * p[1]).sqrt();
    if p[2].abs() > 1e-6 * xy.max(1.0) {
        Some(Vector3::new(p[0] / p[2], p[1] / p[2], 1.0))
    } else if xy > 1e-12 {
        Some(Vector3::new(p[0] / xy, p[1] / xy, 0.0))
    } else {
        None
    }
}

/// Larger endpoint distance from the line through the segment midpoint and
/// `vp`. Works for finite points and directions at infinity alike.
pub(crate) fn endpoint_residual(seg: &LineSegment, vp: &Vector3<f32>) -> f32 {
    let m = seg.midpoint();
    let mid = Vector3::new(m[0], m[1], 1.0);
    let line = mid.cross(vp);
    let norm = (line[0] * line[0] + line[1] * line[1]).sqrt();
    if norm <= 1e-9 {
        return f32::INFINITY;
    }
    let d0 = (line[0] * seg.p0[0] + line[1] * seg.p0[1] + line[2]).abs() / norm;
    let d1 = (line[0] * seg.p1[0] + line[1] * seg.p1[1] + line[2]).abs() / norm;
    d0.max(d1)
}

fn consensus(
    segs: &[LineSegment],
    pool: &[usize],
    vp: &Vector3<f32>,
    threshold: f32,
) -> (usize, f32) {
    pool.iter().fold((0usize, 0.0f32), |(count, weight), &idx| {
        if endpoint_residual(&segs[idx], vp) <= threshold {
            (count + 1, weight + segs[idx].strength.max(1.0))
        } else {
            (count, weight)
        }
    })
}

fn hypothesis_pairs(n: usize, params: &RansacParams) -> Vec<(usize, usize)> {
    let total = n * n.saturating_sub(1) / 2;
    if total <= params.iterations {
        let mut pairs = Vec::with_capacity(total);
        for i in 0..n {
            for j in (i + 1)..n {
                pairs.push((i, j));
            }
        }
        return pairs;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut pairs = Vec::with_capacity(params.iterations);
    while pairs.len() < params.iterations {
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        if i != j {
            pairs.push((i.min(j), i.max(j)));
        }
    }
    pairs
}

fn score_hypotheses(
    segs: &[LineSegment],
    pool: &[usize],
    hypotheses: &[Vector3<f32>],
    threshold: f32,
) -> Vec<(usize, f32)> {
    #[cfg(feature = "parallel")]
    {
        hypotheses
            .par_iter()
            .map(|vp| consensus(segs, pool, vp, threshold))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        hypotheses
            .iter()
            .map(|vp| consensus(segs, pool, vp, threshold))
            .collect()
    }
}

/// Fits the dominant vanishing point of the segments listed in `pool`.
///
/// Returns `None` when fewer than `min_inliers` segments agree on any
/// hypothesis.
pub(crate) fn fit_vanishing_point(
    segs: &[LineSegment],
    pool: &[usize],
    params: &RansacParams,
) -> Option<VpFit> {
    let min_inliers = params.min_inliers.max(2);
    if pool.len() < min_inliers {
        return None;
    }

    let hypotheses: Vec<Vector3<f32>> = hypothesis_pairs(pool.len(), params)
        .into_iter()
        .filter_map(|(i, j)| {
            let li = segs[pool[i]].homogeneous_line();
            let lj = segs[pool[j]].homogeneous_line();
            normalize_point(li.cross(&lj))
        })
        .collect();
    if hypotheses.is_empty() {
        return None;
    }

    let scores = score_hypotheses(segs, pool, &hypotheses, params.inlier_threshold_px);
    let mut best_idx = 0usize;
    for (idx, score) in scores.iter().enumerate() {
        let best = scores[best_idx];
        if score.0 > best.0 || (score.0 == best.0 && score.1 > best.1) {
            best_idx = idx;
        }
    }
    let (best_count, _) = scores[best_idx];
    if best_count < min_inliers {
        debug!(
            "RANSAC: no consensus pool={} hypotheses={} best={}",
            pool.len(),
            hypotheses.len(),
            best_count
        );
        return None;
    }

    let hypothesis = hypotheses[best_idx];
    let inliers = collect_inliers(segs, pool, &hypothesis, params.inlier_threshold_px);
    let refined = refine_vp(segs, &inliers).and_then(normalize_point);
    let (point, inliers) = match refined {
        Some(refined) => {
            let refit = collect_inliers(segs, pool, &refined, params.inlier_threshold_px);
            if refit.len() >= inliers.len() {
                (refined, refit)
            } else {
                (hypothesis, inliers)
            }
        }
        None => (hypothesis, inliers),
    };
    debug!(
        "RANSAC: pool={} hypotheses={} inliers={} vp=({:.1},{:.1},{:.0})",
        pool.len(),
        hypotheses.len(),
        inliers.len(),
        point[0],
        point[1],
        point[2]
    );
    Some(VpFit { point, inliers })
}

fn collect_inliers(
    segs: &[LineSegment],
    pool: &[usize],
    vp: &Vector3<f32>,
    threshold: f32,
) -> Vec<usize> {
    pool.iter()
        .copied()
        .filter(|&idx| endpoint_residual(&segs[idx], vp) <= threshold)
        .collect()
}

/// Sequential RANSAC: fits up to `max_points` vanishing points, removing each
/// consensus set from the pool before fitting the next.
pub(crate) fn fit_sequential(
    segs: &[LineSegment],
    pool: &[usize],
    max_points: usize,
    params: &RansacParams,
) -> Vec<VpFit> {
    let mut remaining: Vec<usize> = pool.to_vec();
    let mut fits: Vec<VpFit> = Vec::new();
    while fits.len() < max_points {
        let Some(fit) = fit_vanishing_point(segs, &remaining, params) else {
            break;
        };
        remaining.retain(|idx| !fit.inliers.contains(idx));
        fits.push(fit);
    }
    fits
}
