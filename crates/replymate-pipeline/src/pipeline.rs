//! The reply state machine: start -> analyzed -> retrieved -> generated.

use std::sync::Arc;

use tracing::{debug, info};

use replymate_core::Result;
use replymate_infer::SentimentClassifier;

use crate::analyze::MetadataExtractor;
use crate::generate::ReplyGenerator;
use crate::retrieve::Retriever;
use crate::state::{PipelineStage, PipelineState, ReplyRequest};

/// Feedback used when a rewrite is requested without instructions.
pub const DEFAULT_REWRITE_FEEDBACK: &str = "다른 표현으로 다시 써줘";

/// Linear three-stage pipeline. No retries and no branching; a rewrite
/// runs all three stages again.
pub struct ReplyPipeline {
    classifier: Arc<dyn SentimentClassifier>,
    extractor: MetadataExtractor,
    retriever: Retriever,
    generator: ReplyGenerator,
    default_store_name: String,
}

impl ReplyPipeline {
    pub fn new(
        classifier: Arc<dyn SentimentClassifier>,
        extractor: MetadataExtractor,
        retriever: Retriever,
        generator: ReplyGenerator,
        default_store_name: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            extractor,
            retriever,
            generator,
            default_store_name: default_store_name.into(),
        }
    }

    /// Classify, then let the extractor refine category, menu and sentiment.
    /// Classifier errors propagate; extractor errors do not.
    pub async fn analyze(&self, state: &mut PipelineState) -> Result<()> {
        let baseline = self.classifier.classify(&state.review_text).await?;
        debug!("Baseline sentiment: {} ({:.2})", baseline.label, baseline.score);
        let analysis = self
            .extractor
            .extract(&state.review_text, &state.customer_name, baseline.label)
            .await;
        state.record_analysis(analysis);
        Ok(())
    }

    pub async fn retrieve(&self, state: &mut PipelineState) {
        let retrieval = self.retriever.retrieve(state).await;
        state.record_retrieval(retrieval);
    }

    pub async fn generate(&self, state: &mut PipelineState) -> Result<()> {
        let reply = self.generator.generate(state).await?;
        state.record_reply(reply);
        Ok(())
    }

    /// Run all three stages for one request.
    pub async fn run(&self, request: ReplyRequest) -> Result<PipelineState> {
        let mut state = PipelineState::new(request, &self.default_store_name);
        debug!("Pipeline stage: {:?}", state.stage);

        self.analyze(&mut state).await?;
        debug!("Pipeline stage: {:?}", state.stage);

        self.retrieve(&mut state).await;
        debug!("Pipeline stage: {:?}", state.stage);

        self.generate(&mut state).await?;
        debug_assert_eq!(state.stage, PipelineStage::Generated);
        info!(
            "Reply generated ({}, tone={})",
            state.sentiment.map_or("unknown", |s| s.as_str()),
            state.tone
        );
        Ok(state)
    }

    /// Regenerate from scratch with feedback for the model.
    pub async fn rewrite(&self, mut request: ReplyRequest, feedback: Option<&str>) -> Result<PipelineState> {
        let feedback = feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_REWRITE_FEEDBACK);
        info!("Rewriting reply with feedback: {}", feedback);
        request.user_feedback = Some(feedback.to_string());
        self.run(request).await
    }
}
