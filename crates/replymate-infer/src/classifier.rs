//! Sentiment classification service.
//!
//! The baseline classifier is a fixed text model reached over HTTP
//! (HuggingFace inference-style endpoint). Failures surface to the caller;
//! there is no fallback label.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use replymate_core::{Error, Result, Sentiment};

/// Classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: Sentiment,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SentimentScore>;
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// Classifier backed by an HTTP inference endpoint.
///
/// Accepts both the nested `[[{label, score}, ...]]` and flat
/// `[{label, score}, ...]` response shapes and picks the top-scoring label.
pub struct HttpSentimentClassifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSentimentClassifier {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    /// Extract the best label from an inference response body.
    pub fn parse_response(body: &serde_json::Value) -> Result<SentimentScore> {
        let candidates: Vec<LabelScore> = match body {
            serde_json::Value::Array(outer) if outer.first().map_or(false, |v| v.is_array()) => {
                serde_json::from_value(outer[0].clone())?
            }
            serde_json::Value::Array(_) => serde_json::from_value(body.clone())?,
            serde_json::Value::Object(_) => vec![serde_json::from_value(body.clone())?],
            other => {
                return Err(Error::Classification(format!(
                    "Unexpected classifier response: {}",
                    other
                )))
            }
        };

        let best = candidates
            .into_iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| Error::Classification("Classifier returned no labels".into()))?;

        let label = Sentiment::from_label(&best.label).ok_or_else(|| {
            Error::Classification(format!("Unknown sentiment label '{}'", best.label))
        })?;

        Ok(SentimentScore {
            label,
            score: best.score.clamp(0.0, 1.0),
        })
    }
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentScore> {
        let mut request = self.client.post(&self.url).json(&json!({ "inputs": text }));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Classification(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Classification(format!("API error {}: {}", status, body)));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Classification(format!("Invalid response: {}", e)))?;

        let verdict = Self::parse_response(&body)?;
        debug!("Classified sentiment: {} ({:.3})", verdict.label, verdict.score);
        Ok(verdict)
    }
}
