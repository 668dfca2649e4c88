//! ReplyMate Pipeline: Analyze -> Retrieve -> Generate for review replies.
//!
//! A request enters as [`ReplyRequest`] and leaves as a [`PipelineState`]
//! carrying the labels, the retrieved exemplars and menu facts, and the
//! final reply. The knowledge base is derived from the data files and can
//! be rebuilt at any time; the owner's own replies feed back into it
//! through [`ToneTrainer`].

pub mod analyze;
pub mod batch;
pub mod classify;
pub mod generate;
pub mod knowledge;
pub mod pipeline;
pub mod prompts;
pub mod retrieve;
pub mod services;
pub mod state;
pub mod training;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use analyze::{parse_analysis, MetadataExtractor};
pub use batch::{BatchOutcome, BatchRunner};
pub use classify::LlmSentimentClassifier;
pub use generate::{sanitize_reply, ReplyGenerator};
pub use knowledge::KnowledgeBase;
pub use pipeline::{ReplyPipeline, DEFAULT_REWRITE_FEEDBACK};
pub use prompts::PromptSet;
pub use retrieve::{build_template_filter, Retriever};
pub use services::Services;
pub use state::{Analysis, PipelineStage, PipelineState, Retrieval, ReplyRequest};
pub use training::ToneTrainer;
