//! Boundary to the external region verifier.
//!
//! The verifier is an opaque vision oracle: it receives a PNG crop of a
//! candidate region plus instructions and answers with a small JSON record.
//! The pipeline only depends on the [`RegionVerifier`] trait; callers plug in
//! their own client. Transport failures, timeouts and malformed answers make
//! the region unverifiable, which drops it without failing the run.

mod runner;
mod scripted;

pub use runner::{verify_candidates, VerificationOutcome, VerificationParams};
pub use scripted::{FnVerifier, ScriptedVerifier};

use crate::proposals::{CandidateRegion, NormalizedBox};
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifierError {
    #[error("verifier transport error: {0}")]
    Transport(String),
    #[error("verifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed verifier response: {0}")]
    Malformed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoofType {
    Flat,
    Gabled,
    Other,
}

/// Structured answer of the verifier for one crop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifierResponse {
    pub is_building: bool,
    pub confidence: f32,
    #[serde(deserialize_with = "required_nullable")]
    pub rough_floors: Option<u32>,
    pub roof_type: RoofType,
    pub has_entrance: bool,
    /// Relative position of the entrance along the base edge.
    #[serde(deserialize_with = "required_nullable")]
    pub entrance_position: Option<f32>,
    pub has_protrusions: bool,
}

/// Field must be present but may be `null`.
fn required_nullable<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d)
}

/// One verifier round trip.
#[derive(Clone, Debug)]
pub struct VerificationRequest {
    pub candidate_id: String,
    pub bbox: NormalizedBox,
    /// PNG-encoded crop of the candidate region.
    pub image_png: Vec<u8>,
    pub prompt: String,
}

/// Async oracle that labels candidate crops.
pub trait RegionVerifier: Send + Sync {
    fn verify(
        &self,
        request: VerificationRequest,
    ) -> impl Future<Output = Result<VerifierResponse, VerifierError>> + Send;
}

/// Candidate that the verifier accepted as a building.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerifiedBuilding {
    pub region: CandidateRegion,
    pub response: VerifierResponse,
}

impl VerifiedBuilding {
    pub fn id(&self) -> &str {
        &self.region.id
    }

    pub fn bbox(&self) -> &NormalizedBox {
        &self.region.bbox
    }

    pub fn confidence(&self) -> f32 {
        self.response.confidence
    }

    pub fn rough_floors(&self) -> Option<u32> {
        self.response.rough_floors
    }

    pub fn entrance_position(&self) -> f32 {
        self.response.entrance_position.unwrap_or(0.5)
    }
}

/// Instruction text sent along with every crop.
pub fn verification_prompt(building_type_hint: Option<&str>) -> String {
    let mut prompt = String::from(
        "Analyse this image region and answer with JSON only:\n\
         {\n  \"is_building\": true|false,\n  \"confidence\": 0..1,\n  \
         \"rough_floors\": integer or null,\n  \"roof_type\": \"flat\"|\"gabled\"|\"other\",\n  \
         \"has_entrance\": true|false,\n  \
         \"entrance_position\": 0..1 (relative position along the base edge),\n  \
         \"has_protrusions\": true|false\n}",
    );
    if let Some(hint) = building_type_hint.filter(|h| !h.trim().is_empty()) {
        prompt.push_str("\nExpected building type: ");
        prompt.push_str(hint.trim());
    }
    prompt
}

/// Extracts the JSON object from an answer that may be wrapped in a code
/// fence or surrounded by prose.
fn extract_json(text: &str) -> Result<&str, VerifierError> {
    let start = text
        .find('{')
        .ok_or_else(|| VerifierError::Malformed("no JSON object in response".into()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| VerifierError::Malformed("no closing brace in response".into()))?;
    if end < start {
        return Err(VerifierError::Malformed("unbalanced braces".into()));
    }
    Ok(&text[start..=end])
}

/// Parses and validates a verifier answer. Missing fields, wrong types and
/// out-of-range values are all malformed.
pub fn parse_verifier_response(text: &str) -> Result<VerifierResponse, VerifierError> {
    let json = extract_json(text)?;
    let response: VerifierResponse =
        serde_json::from_str(json).map_err(|e| VerifierError::Malformed(e.to_string()))?;
    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(VerifierError::Malformed(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }
    if let Some(pos) = response.entrance_position {
        if !(0.0..=1.0).contains(&pos) {
            return Err(VerifierError::Malformed(format!(
                "entrance_position {pos} outside [0, 1]"
            )));
        }
    }
    Ok(response)
}
