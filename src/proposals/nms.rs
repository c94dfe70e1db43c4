use super::CandidateRegion;

/// Greedy non-max suppression.
///
/// Regions are ranked by confidence (stable for ties); each kept region
/// suppresses every lower-ranked region with IoU above `iou_threshold`. The
/// output is sorted by confidence, so applying the function again returns it
/// unchanged.
pub fn non_max_suppression(
    mut regions: Vec<CandidateRegion>,
    iou_threshold: f32,
) -> Vec<CandidateRegion> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<CandidateRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        if kept
            .iter()
            .all(|k| k.bbox.iou(&region.bbox) <= iou_threshold)
        {
            kept.push(region);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposals::{NormalizedBox, RegionSource};

    fn region(id: &str, bbox: [f32; 4], confidence: f32) -> CandidateRegion {
        CandidateRegion {
            id: id.to_string(),
            bbox: NormalizedBox::from(bbox),
            confidence,
            source: RegionSource::EdgeDensity,
        }
    }

    fn sample() -> Vec<CandidateRegion> {
        vec![
            region("a", [0.1, 0.1, 0.5, 0.5], 0.7),
            region("b", [0.12, 0.1, 0.52, 0.5], 0.9),
            region("c", [0.6, 0.6, 0.9, 0.9], 0.4),
            region("d", [0.3, 0.3, 0.7, 0.7], 0.8),
            region("e", [0.61, 0.6, 0.9, 0.92], 0.5),
        ]
    }

    #[test]
    fn keeps_highest_confidence_of_overlapping_pair() {
        let kept = non_max_suppression(sample(), 0.5);
        let ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "e"]);
    }

    #[test]
    fn suppression_is_idempotent() {
        let once = non_max_suppression(sample(), 0.5);
        let twice = non_max_suppression(once.clone(), 0.5);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(non_max_suppression(Vec::new(), 0.5).is_empty());
    }
}
