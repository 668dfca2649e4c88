//! Embedding service trait.

use async_trait::async_trait;
use ndarray::Array1;
use replymate_core::Result;

/// Result of an embedding operation.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Array1<f32>,
    /// Whether this was served from cache.
    pub cached: bool,
}

/// Text → vector service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. `Ok(None)` means no embedding model is available.
    async fn embed(&self, text: &str) -> Result<Option<EmbeddingResult>>;

    /// Embed several texts, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<EmbeddingResult>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize;

    fn is_available(&self) -> bool;
}

/// Embedder used when no embedding API is configured.
pub struct NoopEmbedder {
    dim: usize,
}

impl NoopEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl Embedder for NoopEmbedder {
    async fn embed(&self, _text: &str) -> Result<Option<EmbeddingResult>> {
        Ok(None)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_embedder() {
        let e = NoopEmbedder::new(768);
        assert!(!e.is_available());
        assert_eq!(e.dimension(), 768);
        assert!(e.embed("리뷰 답변 템플릿").await.unwrap().is_none());

        let batch = e.embed_batch(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(Option::is_none));
    }
}
