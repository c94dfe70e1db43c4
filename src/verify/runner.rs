use super::{
    verification_prompt, RegionVerifier, VerificationRequest, VerifiedBuilding, VerifierError,
    VerifierResponse,
};
use crate::image::SourceImage;
use crate::proposals::CandidateRegion;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationParams {
    /// Maximum verifier calls in flight.
    pub concurrency: usize,
    pub timeout_ms: u64,
    /// Accepted answers need a confidence strictly above this.
    pub min_confidence: f32,
}

impl Default for VerificationParams {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_ms: 30_000,
            min_confidence: 0.5,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VerificationOutcome {
    /// Accepted buildings in candidate order.
    pub verified: Vec<VerifiedBuilding>,
    /// Answered but not a building (or not confident enough).
    pub rejected: usize,
    /// Dropped after a transport error, timeout or malformed answer.
    pub unverifiable: usize,
    pub attempted: usize,
    pub elapsed_ms: f64,
}

impl VerificationOutcome {
    /// Every attempted call failed: the oracle itself looks unavailable.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.unverifiable == self.attempted
    }
}

/// Verifies candidates concurrently with bounded parallelism and a per-call
/// timeout. Results are collected in candidate order; failed calls are never
/// retried.
pub async fn verify_candidates<V>(
    image: &SourceImage,
    candidates: &[CandidateRegion],
    verifier: Arc<V>,
    params: &VerificationParams,
    building_type_hint: Option<&str>,
) -> VerificationOutcome
where
    V: RegionVerifier + 'static,
{
    let t0 = Instant::now();
    let semaphore = Arc::new(Semaphore::new(params.concurrency.max(1)));
    let timeout = Duration::from_millis(params.timeout_ms.max(1));
    let prompt = verification_prompt(building_type_hint);

    let mut handles = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let image_png = match image.crop_png(&candidate.bbox) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Verify: crop for {} failed: {err}", candidate.id);
                handles.push(None);
                continue;
            }
        };
        let request = VerificationRequest {
            candidate_id: candidate.id.clone(),
            bbox: candidate.bbox,
            image_png,
            prompt: prompt.clone(),
        };
        let verifier = Arc::clone(&verifier);
        let semaphore = Arc::clone(&semaphore);
        handles.push(Some(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| VerifierError::Transport(e.to_string()))?;
            match tokio::time::timeout(timeout, verifier.verify(request)).await {
                Ok(result) => result,
                Err(_) => Err(VerifierError::Timeout(timeout)),
            }
        })));
    }

    let mut outcome = VerificationOutcome {
        attempted: candidates.len(),
        ..VerificationOutcome::default()
    };
    for (candidate, handle) in candidates.iter().zip(handles) {
        let result: Result<VerifierResponse, VerifierError> = match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(VerifierError::Transport(join_err.to_string())),
            },
            None => Err(VerifierError::Transport("crop encoding failed".into())),
        };
        match result {
            Ok(response) if response.is_building && response.confidence > params.min_confidence => {
                outcome.verified.push(VerifiedBuilding {
                    region: candidate.clone(),
                    response,
                });
            }
            Ok(response) => {
                debug!(
                    "Verify: {} rejected (is_building={} confidence={:.2})",
                    candidate.id, response.is_building, response.confidence
                );
                outcome.rejected += 1;
            }
            Err(err) => {
                warn!("Verify: {} unverifiable: {err}", candidate.id);
                outcome.unverifiable += 1;
            }
        }
    }
    outcome.elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
    debug!(
        "Verify: candidates={} verified={} rejected={} unverifiable={} elapsed_ms={:.3}",
        outcome.attempted,
        outcome.verified.len(),
        outcome.rejected,
        outcome.unverifiable,
        outcome.elapsed_ms
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposals::{NormalizedBox, RegionSource};
    use crate::verify::{FnVerifier, RoofType, ScriptedVerifier};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const YES: &str = r#"{"is_building": true, "confidence": 0.9, "rough_floors": 4,
        "roof_type": "flat", "has_entrance": false, "entrance_position": null,
        "has_protrusions": false}"#;
    const NO: &str = r#"{"is_building": false, "confidence": 0.8, "rough_floors": null,
        "roof_type": "other", "has_entrance": false, "entrance_position": null,
        "has_protrusions": false}"#;

    fn image() -> SourceImage {
        SourceImage::from_luma8(40, 40, vec![128u8; 1600]).unwrap()
    }

    fn candidates(n: usize) -> Vec<CandidateRegion> {
        (0..n)
            .map(|i| {
                let x = 0.1 * i as f32;
                CandidateRegion {
                    id: format!("C{}", i + 1),
                    bbox: NormalizedBox::new(x, 0.2, x + 0.1, 0.6),
                    confidence: 0.8,
                    source: RegionSource::EdgeDensity,
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn failures_are_counted_not_fatal() {
        let verifier = ScriptedVerifier::new()
            .with_response("C1", YES)
            .with_response("C2", NO)
            .with_failure("C3")
            .with_response("C4", "sorry, I cannot help")
            .with_default(YES);
        let outcome = verify_candidates(
            &image(),
            &candidates(5),
            Arc::new(verifier),
            &VerificationParams::default(),
            None,
        )
        .await;
        let ids: Vec<&str> = outcome.verified.iter().map(|v| v.id()).collect();
        assert_eq!(ids, vec!["C1", "C5"]);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.unverifiable, 2);
        assert!(!outcome.all_failed());
        assert_eq!(outcome.verified[0].response.roof_type, RoofType::Flat);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let verifier = ScriptedVerifier::new()
            .with_default(YES)
            .with_delay(Duration::from_millis(300));
        let params = VerificationParams {
            timeout_ms: 20,
            ..VerificationParams::default()
        };
        let outcome =
            verify_candidates(&image(), &candidates(2), Arc::new(verifier), &params, None).await;
        assert!(outcome.verified.is_empty());
        assert_eq!(outcome.unverifiable, 2);
        assert!(outcome.all_failed());
    }

    #[tokio::test]
    async fn requests_carry_crop_and_hint() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let verifier = FnVerifier::new(move |req: &VerificationRequest| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert!(req.image_png.starts_with(&[0x89, b'P', b'N', b'G']));
            assert!(req.prompt.contains("school"));
            crate::verify::parse_verifier_response(YES)
        });
        let params = VerificationParams {
            concurrency: 2,
            ..VerificationParams::default()
        };
        let outcome = verify_candidates(
            &image(),
            &candidates(6),
            Arc::new(verifier),
            &params,
            Some("school"),
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(outcome.verified.len(), 6);
        assert_eq!(outcome.verified[5].id(), "C6");
    }

    #[tokio::test]
    async fn low_confidence_buildings_are_rejected() {
        let text = YES.replace("0.9", "0.5");
        let verifier = ScriptedVerifier::new().with_default(text);
        let outcome = verify_candidates(
            &image(),
            &candidates(1),
            Arc::new(verifier),
            &VerificationParams::default(),
            None,
        )
        .await;
        assert!(outcome.verified.is_empty());
        assert_eq!(outcome.rejected, 1);
    }
}
