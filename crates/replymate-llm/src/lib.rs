//! Language model and embedding clients for external LLM APIs.
//!
//! `LanguageModel::complete(system, user)` is the only operation the reply
//! pipeline needs from a model; every provider is reduced to it.

pub mod config;
pub mod embeddings;
pub mod providers;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use replymate_core::{Error, Result};
use replymate_infer::{Embedder, NoopEmbedder};

pub use config::LLMConfig;
pub use embeddings::HttpEmbedder;
pub use providers::HttpLanguageModel;
pub use types::*;

/// Text completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One completion: an optional system turn plus one user turn.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// Build the completion client for the resolved provider.
pub fn create_language_model(config: &LLMConfig) -> Result<Arc<dyn LanguageModel>> {
    let (provider, model, api_key) = config
        .resolve_provider()
        .ok_or_else(|| Error::Config("No LLM provider configured".into()))?;
    info!("Using {} completion model {}", provider, model);
    Ok(Arc::new(HttpLanguageModel::new(
        provider,
        model,
        api_key,
        config.temperature,
        config.max_tokens,
        config.timeout(),
    )?))
}

/// Build the best available embedder; falls back to `NoopEmbedder`.
pub fn create_embedder(config: &LLMConfig, dim: usize) -> Arc<dyn Embedder> {
    if let Some((provider, model, api_key)) = config.resolve_embedding_provider() {
        match HttpEmbedder::new(provider, model.clone(), api_key, dim, config.timeout()) {
            Ok(embedder) => {
                info!("Using {} embedding model {} (dim={})", provider, model, dim);
                return Arc::new(embedder);
            }
            Err(e) => warn!("Embedding client unavailable: {}", e),
        }
    }
    info!("No embedding provider configured. Searches fall back to metadata order.");
    Arc::new(NoopEmbedder::new(dim))
}
