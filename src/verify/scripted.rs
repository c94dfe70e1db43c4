use super::{
    parse_verifier_response, RegionVerifier, VerificationRequest, VerifierError, VerifierResponse,
};
use std::collections::HashMap;
use std::time::Duration;

/// Offline verifier answering from canned JSON text keyed by candidate id.
///
/// Answers go through [`parse_verifier_response`], so malformed canned text
/// behaves exactly like a malformed oracle reply. Ids scripted as failures
/// and ids without an answer (and no default) report a transport error.
#[derive(Clone, Debug, Default)]
pub struct ScriptedVerifier {
    responses: HashMap<String, Option<String>>,
    default: Option<String>,
    delay: Option<Duration>,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, candidate_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.responses.insert(candidate_id.into(), Some(text.into()));
        self
    }

    pub fn with_failure(mut self, candidate_id: impl Into<String>) -> Self {
        self.responses.insert(candidate_id.into(), None);
        self
    }

    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default = Some(text.into());
        self
    }

    /// Simulated round-trip latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn answer(&self, candidate_id: &str) -> Result<VerifierResponse, VerifierError> {
        match self.responses.get(candidate_id) {
            Some(Some(text)) => parse_verifier_response(text),
            Some(None) => Err(VerifierError::Transport(format!(
                "scripted failure for {candidate_id}"
            ))),
            None => match &self.default {
                Some(text) => parse_verifier_response(text),
                None => Err(VerifierError::Transport(format!(
                    "no scripted response for {candidate_id}"
                ))),
            },
        }
    }
}

impl RegionVerifier for ScriptedVerifier {
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerifierResponse, VerifierError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(&request.candidate_id)
    }
}

/// Adapts a synchronous closure into a verifier.
pub struct FnVerifier<F> {
    f: F,
}

impl<F> FnVerifier<F>
where
    F: Fn(&VerificationRequest) -> Result<VerifierResponse, VerifierError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> RegionVerifier for FnVerifier<F>
where
    F: Fn(&VerificationRequest) -> Result<VerifierResponse, VerifierError> + Send + Sync,
{
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerifierResponse, VerifierError> {
        (self.f)(&request)
    }
}
