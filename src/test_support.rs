//! Fixtures shared by unit tests.

use crate::proposals::{CandidateRegion, NormalizedBox, RegionSource};
use crate::verify::{RoofType, VerifiedBuilding, VerifierResponse};

pub(crate) fn verified(id: &str, bbox: [f32; 4], rough_floors: Option<u32>) -> VerifiedBuilding {
    VerifiedBuilding {
        region: CandidateRegion {
            id: id.to_string(),
            bbox: NormalizedBox::from(bbox),
            confidence: 0.8,
            source: RegionSource::External,
        },
        response: VerifierResponse {
            is_building: true,
            confidence: 0.9,
            rough_floors,
            roof_type: RoofType::Flat,
            has_entrance: false,
            entrance_position: None,
            has_protrusions: false,
        },
    }
}
