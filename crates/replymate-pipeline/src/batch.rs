//! Sequential batch generation. One failed item never stops the batch.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use replymate_core::{Result, Tone};
use replymate_data::{DataStore, DraftStatus};

use crate::pipeline::ReplyPipeline;
use crate::state::{PipelineState, ReplyRequest};

#[derive(Debug)]
pub struct BatchOutcome {
    pub id: String,
    pub result: std::result::Result<PipelineState, String>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct BatchRunner {
    pipeline: Arc<ReplyPipeline>,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<ReplyPipeline>) -> Self {
        Self { pipeline }
    }

    /// Run each request to completion before starting the next.
    pub async fn run(&self, requests: Vec<ReplyRequest>) -> Vec<BatchOutcome> {
        let total = requests.len();
        let mut outcomes = Vec::with_capacity(total);

        for request in requests {
            let id = request
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let result = match self.pipeline.run(request).await {
                Ok(state) => Ok(state),
                Err(e) => {
                    warn!("Batch item {} failed: {}", id, e);
                    Err(e.to_string())
                }
            };
            outcomes.push(BatchOutcome { id, result });
        }

        let ok = outcomes.iter().filter(|o| o.is_ok()).count();
        info!("Batch complete: {}/{} succeeded", ok, total);
        outcomes
    }

    /// Generate replies for every waiting draft and store them back with
    /// status `generated`. Failed drafts are left untouched.
    pub async fn generate_drafts(
        &self,
        data: &DataStore,
        tone: Tone,
        store_name: Option<&str>,
    ) -> Result<Vec<BatchOutcome>> {
        let mut drafts = data.read_drafts()?;
        let requests: Vec<ReplyRequest> = drafts
            .iter()
            .filter(|d| d.status == DraftStatus::Draft && !d.text.trim().is_empty())
            .map(|d| ReplyRequest {
                id: Some(d.id.clone()),
                review_text: d.text.clone(),
                customer_name: d.customer_name.clone(),
                manual_menu: None,
                store_name: store_name.map(str::to_string),
                tone,
                user_feedback: None,
            })
            .collect();

        if requests.is_empty() {
            info!("No waiting drafts");
            return Ok(Vec::new());
        }

        let outcomes = self.run(requests).await;
        for outcome in &outcomes {
            let Ok(state) = &outcome.result else { continue };
            if let Some(draft) = drafts.iter_mut().find(|d| d.id == outcome.id) {
                draft.reply = state.final_reply.clone();
                draft.sentiment = state.sentiment.map(|s| s.as_str().to_string());
                draft.status = DraftStatus::Generated;
            }
        }
        data.save_drafts(&drafts)?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptSet;
    use crate::services::Services;
    use crate::testing::{FixedClassifier, ScriptedModel, VocabEmbedder};
    use crate::knowledge::KnowledgeBase;
    use replymate_core::{DataPaths, Error, PipelineSettings, Sentiment};
    use replymate_data::Draft;
    use replymate_store::SqliteStore;
    use tempfile::TempDir;

    const ANALYSIS: &str = r#"{"category": "taste_good", "menu": null, "final_sentiment": "positive"}"#;

    /// Fails generation for any review mentioning "실패".
    fn flaky_model() -> ScriptedModel {
        ScriptedModel::new(|system, user| {
            if system.is_empty() {
                Ok(ANALYSIS.to_string())
            } else if user.contains("실패") {
                Err(Error::Llm("rate limited".into()))
            } else {
                Ok("감사합니다! 또 들러주세요.".to_string())
            }
        })
    }

    fn services(dir: &TempDir) -> Services {
        let paths = DataPaths::new(dir.path()).unwrap();
        let store = SqliteStore::open(&paths.vectordb, 16).unwrap();
        Services::new(
            Arc::new(FixedClassifier::new(Sentiment::Positive)),
            Arc::new(flaky_model()),
            Arc::new(KnowledgeBase::new(Arc::new(store), Arc::new(VocabEmbedder::new(16)))),
            Arc::new(DataStore::new(&paths, "테스트 식당")),
            Arc::new(PromptSet::default()),
            PipelineSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        let runner = services(&dir).batch();

        let mut first = ReplyRequest::new("맛있어요", "김철수", Tone::Friendly);
        first.id = Some("a".into());
        let outcomes = runner
            .run(vec![
                first,
                ReplyRequest::new("실패하는 리뷰", "이영희", Tone::Friendly),
                ReplyRequest::new("또 시킬게요", "박민수", Tone::Polite),
            ])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].id, "a");
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].result.as_ref().unwrap_err().contains("rate limited"));
        assert!(!outcomes[1].id.is_empty());
        assert!(outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn test_generate_drafts_updates_waiting_cards() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);

        let waiting = Draft::new("김철수", "정말 맛있었어요");
        let failing = Draft::new("이영희", "실패하는 리뷰");
        let blank = Draft::new("박민수", "  ");
        let mut done = Draft::new("최지우", "좋아요");
        done.status = DraftStatus::Saved;
        services
            .data
            .save_drafts(&[waiting.clone(), failing.clone(), blank, done])
            .unwrap();

        let outcomes = services
            .batch()
            .generate_drafts(&services.data, Tone::Friendly, None)
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);

        let drafts = services.data.load_drafts();
        let updated = drafts.iter().find(|d| d.id == waiting.id).unwrap();
        assert_eq!(updated.status, DraftStatus::Generated);
        assert_eq!(updated.reply.as_deref(), Some("감사합니다! 또 들러주세요."));
        assert_eq!(updated.sentiment.as_deref(), Some("positive"));

        let untouched = drafts.iter().find(|d| d.id == failing.id).unwrap();
        assert_eq!(untouched.status, DraftStatus::Draft);
        assert!(untouched.reply.is_none());
    }

    #[tokio::test]
    async fn test_generate_drafts_leaves_malformed_file_alone() {
        let dir = TempDir::new().unwrap();
        let services = services(&dir);
        let drafts_file = dir.path().join("drafts.json");
        let broken = r#"[{"id": "d1", "text": "맛있어요",}]"#;
        std::fs::write(&drafts_file, broken).unwrap();

        let result = services
            .batch()
            .generate_drafts(&services.data, Tone::Friendly, None)
            .await;
        assert!(matches!(result, Err(Error::Json(_))));
        assert_eq!(std::fs::read_to_string(&drafts_file).unwrap(), broken);
    }
}
