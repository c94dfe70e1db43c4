use super::{ReconstructionRequest, SketchReconstructor};
use crate::image::SourceImage;
use crate::scene::Scene;
use crate::verify::RegionVerifier;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Whole-image retry after a verifier outage.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryParams {
    /// Total attempts, including the first.
    pub attempts: usize,
    /// Delay before the second attempt; doubled for each further one.
    pub base_backoff_ms: u64,
}

impl Default for RetryParams {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff_ms: 500,
        }
    }
}

impl RetryParams {
    /// Backoff before attempt `attempt` (1-based, the first has none).
    pub fn backoff(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 2).min(16);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }
}

/// Reconstructs one image and retries it as a whole while every verifier call
/// fails. The last attempt's scene is returned either way.
pub async fn reconstruct_with_retry<V>(
    reconstructor: &SketchReconstructor,
    image: &SourceImage,
    request: &ReconstructionRequest,
    verifier: Arc<V>,
) -> Scene
where
    V: RegionVerifier + 'static,
{
    let retry = &reconstructor.params.retry;
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        let mut scene = reconstructor
            .reconstruct(image, request, Arc::clone(&verifier))
            .await;
        if let Some(v) = scene.trace.as_mut().and_then(|t| t.verification.as_mut()) {
            v.attempts = attempt;
        }
        if !scene.flags.verification_outage || attempt >= attempts {
            if scene.flags.verification_outage {
                warn!("Batch: verifier unavailable after {attempt} attempts");
            }
            return scene;
        }
        attempt += 1;
        let delay = retry.backoff(attempt);
        warn!(
            "Batch: every verification failed, retrying image (attempt {attempt}/{attempts}) in {} ms",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}

#[derive(Clone, Debug)]
pub struct BatchItem {
    pub name: String,
    pub scene: Scene,
}

/// Processes images one after another.
pub async fn reconstruct_batch<V>(
    reconstructor: &SketchReconstructor,
    images: &[(String, SourceImage)],
    request: &ReconstructionRequest,
    verifier: Arc<V>,
) -> Vec<BatchItem>
where
    V: RegionVerifier + 'static,
{
    let mut out = Vec::with_capacity(images.len());
    for (name, image) in images {
        let scene = reconstruct_with_retry(reconstructor, image, request, Arc::clone(&verifier)).await;
        info!(
            "Batch: {name} buildings={} confidence={:.3}",
            scene.group.buildings.len(),
            scene.confidence
        );
        out.push(BatchItem {
            name: name.clone(),
            scene,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconstructionParams;
    use crate::proposals::ExternalBox;
    use crate::verify::{FnVerifier, VerificationRequest, VerifierError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn backoff_doubles() {
        let r = RetryParams::default();
        assert_eq!(r.backoff(1), Duration::ZERO);
        assert_eq!(r.backoff(2), Duration::from_millis(500));
        assert_eq!(r.backoff(3), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn outage_retries_whole_image() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let verifier = Arc::new(FnVerifier::new(move |_req: &VerificationRequest| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(VerifierError::Transport("offline".into()))
        }));
        let reconstructor = SketchReconstructor::new(ReconstructionParams {
            retry: RetryParams {
                attempts: 3,
                base_backoff_ms: 1,
            },
            ..ReconstructionParams::default()
        });
        let image = SourceImage::from_luma8(64, 64, vec![200u8; 64 * 64]).unwrap();
        let request = ReconstructionRequest {
            external_boxes: vec![ExternalBox {
                bbox: [0.2, 0.2, 0.5, 0.5].into(),
                confidence: None,
            }],
            ..ReconstructionRequest::default()
        };
        let scene = reconstruct_with_retry(&reconstructor, &image, &request, verifier).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(scene.flags.verification_outage);
        assert!(scene.low_confidence);
        let trace = scene.trace.unwrap();
        assert_eq!(trace.verification.unwrap().attempts, 3);
    }
}
