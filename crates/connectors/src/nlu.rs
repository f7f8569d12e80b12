use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use villa_core::DetectedIntent;

use crate::error::ConnectorError;

const SERVICE: &str = "nlu";

pub const DEFAULT_BASE_URL: &str = "https://dialogflow.googleapis.com/v2";
pub const DEFAULT_LANGUAGE: &str = "en-US";

pub trait IntentDetector: Send + Sync {
    async fn detect(&self, session_id: &str, text: &str) -> Result<DetectedIntent, ConnectorError>;
}

#[derive(Debug, Clone)]
pub struct DialogflowConfig {
    pub base_url: String,
    pub project_id: String,
    pub access_token: String,
    pub language_code: String,
}

impl DialogflowConfig {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            access_token: access_token.into(),
            language_code: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Dialogflow ES `detectIntent` over REST.
#[derive(Debug, Clone)]
pub struct DialogflowClient {
    http: Client,
    config: DialogflowConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    query_result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    action: String,
    intent: Option<QueryIntent>,
    #[serde(default)]
    parameters: Value,
    #[serde(default)]
    fulfillment_text: String,
    #[serde(default)]
    intent_detection_confidence: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryIntent {
    #[serde(default)]
    display_name: String,
}

impl DialogflowClient {
    pub fn new(http: Client, config: DialogflowConfig) -> Self {
        Self { http, config }
    }

    fn session_url(&self, session_id: &str) -> Result<Url, ConnectorError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|source| {
            ConnectorError::InvalidUrl {
                service: SERVICE,
                source,
            }
        })?;
        url.path_segments_mut()
            .map_err(|_| ConnectorError::InvalidUrl {
                service: SERVICE,
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend([
                "projects",
                self.config.project_id.as_str(),
                "agent",
                "sessions",
                format!("{session_id}:detectIntent").as_str(),
            ]);
        Ok(url)
    }
}

impl IntentDetector for DialogflowClient {
    async fn detect(&self, session_id: &str, text: &str) -> Result<DetectedIntent, ConnectorError> {
        let url = self.session_url(session_id)?;
        let body = json!({
            "queryInput": {
                "text": {
                    "text": text,
                    "languageCode": self.config.language_code,
                }
            }
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|source| ConnectorError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let payload = response
            .json::<DetectIntentResponse>()
            .await
            .map_err(|err| ConnectorError::Malformed {
                service: SERVICE,
                detail: err.to_string(),
            })?;
        let result = payload
            .query_result
            .ok_or(ConnectorError::Unexpected { service: SERVICE })?;

        debug!(
            action = %result.action,
            confidence = result.intent_detection_confidence,
            "intent detected"
        );

        Ok(DetectedIntent {
            action: result.action,
            intent_name: result
                .intent
                .map(|intent| intent.display_name)
                .unwrap_or_default(),
            parameters: result.parameters,
            fulfillment_text: result.fulfillment_text,
            confidence: result.intent_detection_confidence,
        })
    }
}

/// Detector selected at start-up. `Unconfigured` fails every call so the
/// caller falls back to its apology.
#[derive(Debug, Clone)]
pub enum Detector {
    Dialogflow(DialogflowClient),
    Unconfigured,
}

impl Detector {
    pub fn dialogflow(http: Client, config: DialogflowConfig) -> Self {
        Self::Dialogflow(DialogflowClient::new(http, config))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Dialogflow(_))
    }
}

impl IntentDetector for Detector {
    async fn detect(&self, session_id: &str, text: &str) -> Result<DetectedIntent, ConnectorError> {
        match self {
            Detector::Dialogflow(client) => client.detect(session_id, text).await,
            Detector::Unconfigured => Err(ConnectorError::NotConfigured { service: SERVICE }),
        }
    }
}
