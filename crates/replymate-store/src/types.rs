//! Data types for stored documents and search results.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata key/value pairs attached to a document.
pub type Metadata = BTreeMap<String, String>;

/// A stored text with its metadata. Immutable once stored; replace by
/// deleting and reinserting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    /// Build a document whose id is derived from its content and metadata.
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        let content = content.into();
        let id = Self::content_id(&content, &metadata);
        Self {
            id,
            content,
            metadata,
        }
    }

    /// Hex SHA-256 over content and the sorted metadata pairs.
    pub fn content_id(content: &str, metadata: &Metadata) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        for (k, v) in metadata {
            hasher.update([0u8]);
            hasher.update(k.as_bytes());
            hasher.update([b'=']);
            hasher.update(v.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A document paired with its embedding, ready for insertion.
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub document: Document,
    pub embedding: Option<Array1<f32>>,
}

/// Similarity search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine distance (`1 - cosine similarity`, lower is closer).
    /// `None` when the hit was not ranked because no embeddings were available.
    pub distance: Option<f32>,
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_documents: i64,
    pub embeddings_stored: i64,
    pub embedding_dimension: usize,
    pub db_path: String,
    pub db_size_mb: f64,
    pub matrix_rows: usize,
}
