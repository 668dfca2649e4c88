//! ReplyMate Infer: embedding and sentiment classification services.
//!
//! Both are black-box models behind traits so the pipeline receives them as
//! injected service objects. `NoopEmbedder` keeps the store usable without an
//! embedding API: searches then fall back to unranked metadata matches.

pub mod cache;
pub mod classifier;
pub mod embedder;

pub use cache::EmbeddingCache;
pub use classifier::{HttpSentimentClassifier, SentimentClassifier, SentimentScore};
pub use embedder::{Embedder, EmbeddingResult, NoopEmbedder};
