//! Remote embedding clients (OpenAI and Gemini).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array1;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use replymate_core::{Error, Result};
use replymate_infer::{Embedder, EmbeddingResult};

use crate::types::LLMProvider;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Most texts one embedding request may carry (Gemini's batch limit).
pub const MAX_EMBED_BATCH: usize = 100;

/// Embedder backed by a provider's embedding endpoint.
///
/// Requests the configured dimension and rejects vectors of any other length.
pub struct HttpEmbedder {
    client: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(
        provider: LLMProvider,
        model: String,
        api_key: String,
        dim: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if !provider.supports_embeddings() {
            return Err(Error::Config(format!("{} has no embedding API", provider)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            provider,
            model,
            api_key,
            dim,
        })
    }

    fn gemini_model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    fn gemini_batch_url(&self) -> String {
        format!("{}/{}:batchEmbedContents", GEMINI_API, self.gemini_model_path())
    }

    async fn post(&self, url: String, body: serde_json::Value) -> Result<serde_json::Value> {
        let request = match self.provider {
            LLMProvider::Gemini => self.client.post(url).header("x-goog-api-key", &self.api_key),
            _ => self.client.post(url).bearer_auth(&self.api_key),
        };
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Embedding API error {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Invalid embedding response: {}", e)))
    }

    async fn request_vectors(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self.provider {
            LLMProvider::Gemini => {
                let model = self.gemini_model_path();
                let requests: Vec<_> = texts
                    .iter()
                    .map(|t| {
                        json!({
                            "model": model,
                            "content": {"parts": [{"text": t}]},
                            "outputDimensionality": self.dim,
                        })
                    })
                    .collect();
                let body = self.post(self.gemini_batch_url(), json!({ "requests": requests })).await?;
                parse_gemini_batch(&body)
            }
            _ => {
                let body = json!({
                    "model": self.model,
                    "input": texts,
                    "dimensions": self.dim,
                });
                let body = self.post(OPENAI_EMBEDDINGS_URL.to_string(), body).await?;
                parse_openai(&body)
            }
        }
    }

    fn to_result(&self, vector: Vec<f32>) -> Result<EmbeddingResult> {
        if vector.len() != self.dim {
            return Err(Error::Inference(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dim,
                vector.len()
            )));
        }
        Ok(EmbeddingResult {
            embedding: Array1::from_vec(vector),
            cached: false,
        })
    }
}

fn floats(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Send `texts` in order through `request`, at most `max` per call, and
/// check that every call returns one vector per text.
pub async fn request_in_chunks<'a, F, Fut>(
    texts: &'a [String],
    max: usize,
    mut request: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&'a [String]) -> Fut,
    Fut: Future<Output = Result<Vec<Vec<f32>>>>,
{
    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(max.max(1)) {
        let batch = request(chunk).await?;
        if batch.len() != chunk.len() {
            return Err(Error::Inference(format!(
                "Embedding count mismatch: sent {}, got {}",
                chunk.len(),
                batch.len()
            )));
        }
        vectors.extend(batch);
    }
    Ok(vectors)
}

/// Vectors from an OpenAI `/v1/embeddings` response, in input order.
pub fn parse_openai(body: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = body["data"]
        .as_array()
        .ok_or_else(|| Error::Inference("Embedding response has no data".into()))?;

    let mut indexed: Vec<(u64, Vec<f32>)> = data
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let index = item["index"].as_u64().unwrap_or(i as u64);
            floats(&item["embedding"])
                .map(|v| (index, v))
                .ok_or_else(|| Error::Inference("Malformed embedding vector".into()))
        })
        .collect::<Result<_>>()?;
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Vectors from a Gemini `batchEmbedContents` response.
pub fn parse_gemini_batch(body: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    body["embeddings"]
        .as_array()
        .ok_or_else(|| Error::Inference("Embedding response has no embeddings".into()))?
        .iter()
        .map(|e| {
            floats(&e["values"]).ok_or_else(|| Error::Inference("Malformed embedding vector".into()))
        })
        .collect()
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<EmbeddingResult>> {
        let mut vectors = self.request_vectors(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Inference("Embedding response was empty".into()))?;
        self.to_result(vector).map(Some)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<EmbeddingResult>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors =
            request_in_chunks(texts, MAX_EMBED_BATCH, |chunk| self.request_vectors(chunk)).await?;
        debug!("Embedded {} texts with {}", texts.len(), self.model);
        vectors
            .into_iter()
            .map(|v| self.to_result(v).map(Some))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        true
    }
}
