//! External classification client
//!
//! The speech-to-structured-record service is an external collaborator; this
//! module only carries its wire contract and an async trait seam so the sync
//! driver can be tested against a scripted stand-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::error::QueueError;

/// Why a classification attempt did not produce a result
///
/// Never escapes the sync driver: every variant is converted into the
/// recording's failure transition.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The service answered `success: false`
    #[error("classification rejected: {0}")]
    Rejected(String),
    /// Network failure, timeout, or a non-success HTTP status
    #[error("classification service unreachable: {0}")]
    Transport(String),
    /// The service answered with a body we cannot interpret
    #[error("unexpected response from classification service: {0}")]
    Decode(String),
}

/// Successful classification outcome
#[derive(Debug, Clone)]
pub struct Classification {
    /// The structured record extracted from the audio
    pub result: serde_json::Value,
    /// Service-reported confidence in [0, 1]
    pub confidence: f64,
}

/// One async call against the classification service
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        audio_payload: &str,
        language: &str,
        user_id: &str,
    ) -> std::result::Result<Classification, ClassifyError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest<'a> {
    audio_payload: &'a str,
    language: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    success: bool,
    result: Option<serde_json::Value>,
    confidence: Option<f64>,
    error: Option<String>,
}

/// HTTP implementation of the classifier contract
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    /// Build a client posting to `endpoint` with the given request timeout
    pub fn new(endpoint: &str, timeout: Duration) -> crate::error::Result<HttpClassifier> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                QueueError::InvalidConfig(format!("cannot build classification client: {}", e))
            })?;
        Ok(HttpClassifier {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        audio_payload: &str,
        language: &str,
        user_id: &str,
    ) -> std::result::Result<Classification, ClassifyError> {
        let request = ClassifyRequest {
            audio_payload,
            language,
            user_id,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClassifyError::Transport(format!(
                "service returned HTTP {}",
                response.status()
            )));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Decode(e.to_string()))?;

        if body.success {
            let result = body
                .result
                .ok_or_else(|| ClassifyError::Decode("success response without result".into()))?;
            Ok(Classification {
                result,
                confidence: body.confidence.unwrap_or(0.0),
            })
        } else {
            Err(ClassifyError::Rejected(
                body.error
                    .unwrap_or_else(|| "no error detail provided".to_string()),
            ))
        }
    }
}
