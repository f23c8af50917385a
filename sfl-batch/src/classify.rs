//! Sentiment classifier adapter
//!
//! The classifier is an opaque batch function: one label per input text, in
//! input order. Label validation happens in
//! [`sfl_common::ClassifiedRecord::zip_labels`].

use crate::error::ClassifyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sfl_common::config::ClassifierConfig;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Labels for `texts`, same length and order
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ClassifyError>;
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    labels: Vec<String>,
}

/// Classifier behind an HTTP endpoint
///
/// `POST {endpoint}` with `{"texts": [...]}`, answered by `{"labels": [...]}`.
pub struct HttpClassifier {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClassifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifyError> {
        Self::new(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ClassifyError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(endpoint = %self.endpoint, count = texts.len(), "Sending classification batch");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&ClassifyRequest { texts })
            .send()
            .await
            .map_err(|e| ClassifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Api(status.as_u16(), error_text));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Parse(e.to_string()))?;

        Ok(body.labels)
    }
}
