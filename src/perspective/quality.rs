use super::{PerspectiveFrame, VpKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLabel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLabel {
    fn from_score(score: f32) -> Self {
        if score > 0.8 {
            QualityLabel::Excellent
        } else if score > 0.6 {
            QualityLabel::Good
        } else if score > 0.4 {
            QualityLabel::Fair
        } else {
            QualityLabel::Poor
        }
    }
}

/// Plausibility of a two-point frame for architectural imagery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveQuality {
    pub score: f32,
    pub label: QualityLabel,
    pub horizon_consistent: bool,
    pub vp_spread_ok: bool,
    pub horizon_position_ok: bool,
    pub vp_placement_ok: bool,
}

impl PerspectiveQuality {
    fn flat(score: f32) -> Self {
        Self {
            score,
            label: QualityLabel::from_score(score),
            horizon_consistent: false,
            vp_spread_ok: false,
            horizon_position_ok: false,
            vp_placement_ok: false,
        }
    }
}

/// Scores horizon consistency (0.3), VP spread (0.3), horizon position (0.2)
/// and VP placement (0.2). Frames without both a left and a right VP score
/// 0.2, frames without any VP score 0.
pub fn assess(frame: &PerspectiveFrame) -> PerspectiveQuality {
    if frame.vanishing_points.is_empty() {
        return PerspectiveQuality::flat(0.0);
    }
    let (Some(left), Some(right)) = (frame.vp(VpKind::Left), frame.vp(VpKind::Right)) else {
        return PerspectiveQuality::flat(0.2);
    };
    let [w, h] = frame.image_size;
    let (w, h) = (w as f32, h as f32);
    let (l, r) = (left.position, right.position);

    let horizon_consistent = (l[1] - r[1]).abs() < 0.02 * h;
    let vp_spread_ok = (l[0] - r[0]).abs() > 0.5 * w;
    let ratio = 0.5 * (l[1] + r[1]) / h.max(1.0);
    let horizon_position_ok = ratio > 0.3 && ratio < 0.7;
    let vp_placement_ok = l[0] > -w && l[0] < w && r[0] > 0.0 && r[0] < 2.0 * w;

    let mut score = 0.0f32;
    if horizon_consistent {
        score += 0.3;
    }
    if vp_spread_ok {
        score += 0.3;
    }
    if horizon_position_ok {
        score += 0.2;
    }
    if vp_placement_ok {
        score += 0.2;
    }
    PerspectiveQuality {
        score,
        label: QualityLabel::from_score(score),
        horizon_consistent,
        vp_spread_ok,
        horizon_position_ok,
        vp_placement_ok,
    }
}
