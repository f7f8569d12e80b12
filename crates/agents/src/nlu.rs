use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};
use villa_connectors::IntentDetector;
use villa_core::{build_nlu_response, NluRequest, NluResponse, VillaPolicies};
use villa_observability::AppMetrics;

/// Answers one utterance through the external detector. Never fails: any
/// detector error becomes the apology with the villa's phone number.
pub struct NluAgent<D>
where
    D: IntentDetector,
{
    detector: Arc<D>,
    policies: Arc<VillaPolicies>,
    metrics: Arc<AppMetrics>,
}

impl<D> Clone for NluAgent<D>
where
    D: IntentDetector,
{
    fn clone(&self) -> Self {
        Self {
            detector: self.detector.clone(),
            policies: self.policies.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<D> NluAgent<D>
where
    D: IntentDetector,
{
    pub fn new(detector: Arc<D>, policies: Arc<VillaPolicies>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            detector,
            policies,
            metrics,
        }
    }

    /// Entry point of the public NLU endpoint.
    pub async fn handle(&self, request: &NluRequest) -> NluResponse {
        let started = Instant::now();
        self.metrics.inc_request();
        let response = self.respond(request).await;
        self.metrics.observe_latency(started.elapsed());
        response
    }

    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    pub async fn respond(&self, request: &NluRequest) -> NluResponse {
        self.metrics.inc_nlu_request();

        let response = match self
            .detector
            .detect(&request.session_id, &request.message)
            .await
        {
            Ok(detected) => build_nlu_response(&detected, request.flags()),
            Err(err) => {
                warn!(error = %err, "intent detection failed");
                self.metrics.inc_nlu_fallback();
                self.fallback()
            }
        };

        info!(
            intent = %response.intent,
            confidence = response.confidence,
            buttons = response.buttons.as_ref().map(Vec::len).unwrap_or(0),
            "nlu answered"
        );
        response
    }

    pub fn fallback(&self) -> NluResponse {
        NluResponse {
            fulfillment_text: self.policies.technical_difficulties_message(),
            buttons: None,
            intent: "Error".to_string(),
            confidence: 0.0,
        }
    }
}
