//! Owner-tone training: learn from replies the owner wrote by hand.

use std::sync::Arc;

use tracing::{info, warn};

use replymate_core::{Category, Error, Result, Sentiment, Tone};
use replymate_data::{DataStore, Template};
use replymate_llm::LanguageModel;

use crate::analyze::parse_json_object;
use crate::knowledge::KnowledgeBase;
use crate::prompts::{render, PromptSet};

/// Labels assigned when the model cannot classify a reply.
const FALLBACK_LABELS: (Sentiment, Category) = (Sentiment::Positive, Category::Service);

/// Parse `{"sentiment", "category"}`. Unknown values fall back individually.
pub fn parse_reply_labels(raw: &str) -> Result<(Sentiment, Category)> {
    let value = parse_json_object(raw)?;
    let sentiment = value
        .get("sentiment")
        .and_then(|v| v.as_str())
        .and_then(Sentiment::from_label)
        .unwrap_or(FALLBACK_LABELS.0);
    let category = value
        .get("category")
        .and_then(|v| v.as_str())
        .and_then(Category::from_label)
        .unwrap_or(FALLBACK_LABELS.1);
    Ok((sentiment, category))
}

pub struct ToneTrainer {
    llm: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
    data: Arc<DataStore>,
    knowledge: Arc<KnowledgeBase>,
}

impl ToneTrainer {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        prompts: Arc<PromptSet>,
        data: Arc<DataStore>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        Self {
            llm,
            prompts,
            data,
            knowledge,
        }
    }

    async fn classify(&self, reply_text: &str) -> (Sentiment, Category) {
        let prompt = render(&self.prompts.classify_reply, &[("reply_text", reply_text)]);
        let answer = match self.llm.complete("", &prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Reply classification failed, using defaults: {}", e);
                return FALLBACK_LABELS;
            }
        };
        parse_reply_labels(&answer).unwrap_or_else(|e| {
            warn!("Unreadable reply classification, using defaults: {}", e);
            FALLBACK_LABELS
        })
    }

    /// Store an owner-written reply as an `owner_custom` template and
    /// rebuild the index so it is retrievable right away.
    pub async fn learn(&self, reply_text: &str) -> Result<Template> {
        let reply_text = reply_text.trim();
        if reply_text.is_empty() {
            return Err(Error::InvalidInput("reply text is empty".into()));
        }

        let (sentiment, category) = self.classify(reply_text).await;
        let template = Template::new(reply_text, sentiment, category.as_str(), Tone::OwnerCustom);
        let total = self.data.add_template(template.clone())?;
        info!(
            "Learned owner reply ({}, {}), {} templates total",
            sentiment, category, total
        );

        self.knowledge.rebuild_from(&self.data).await?;
        Ok(template)
    }

    /// Drop learned templates and saved reviews, then rebuild.
    pub async fn reset(&self) -> Result<usize> {
        let removed = self.data.reset()?;
        self.knowledge.rebuild_from(&self.data).await?;
        info!("Reset complete, {} learned templates removed", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedModel, VocabEmbedder};
    use replymate_core::DataPaths;
    use replymate_store::{MetadataFilter, SqliteStore};
    use tempfile::TempDir;

    fn trainer(dir: &TempDir, llm: ScriptedModel) -> (ToneTrainer, Arc<DataStore>, Arc<KnowledgeBase>) {
        let paths = DataPaths::new(dir.path()).unwrap();
        let data = Arc::new(DataStore::new(&paths, "테스트 식당"));
        data.save_templates(&[Template::new(
            "맛있게 드셔주셔서 감사합니다.",
            Sentiment::Positive,
            "taste_good",
            Tone::Polite,
        )])
        .unwrap();
        let store = SqliteStore::open(&paths.vectordb, 32).unwrap();
        let kb = Arc::new(KnowledgeBase::new(Arc::new(store), Arc::new(VocabEmbedder::new(32))));
        let t = ToneTrainer::new(Arc::new(llm), Arc::new(PromptSet::default()), data.clone(), kb.clone());
        (t, data, kb)
    }

    #[test]
    fn test_parse_reply_labels() {
        let labels = parse_reply_labels(r#"```json
{"sentiment": "negative", "category": "delivery_delay"}
```"#)
        .unwrap();
        assert_eq!(labels, (Sentiment::Negative, Category::DeliveryDelay));

        let partial = parse_reply_labels(r#"{"sentiment": "negative", "category": "weather"}"#).unwrap();
        assert_eq!(partial, (Sentiment::Negative, Category::Service));

        assert!(parse_reply_labels("잘 모르겠어요").is_err());
    }

    #[tokio::test]
    async fn test_learn_appends_owner_template_and_indexes_it() {
        let dir = TempDir::new().unwrap();
        let llm = ScriptedModel::replying(r#"{"sentiment": "negative", "category": "delivery_delay"}"#);
        let (t, data, kb) = trainer(&dir, llm);

        let learned = t.learn("  늦어서 죄송해요 다음엔 더 빨리 보내드릴게요  ").await.unwrap();
        assert_eq!(learned.content, "늦어서 죄송해요 다음엔 더 빨리 보내드릴게요");
        assert_eq!(learned.metadata.tone, "owner_custom");
        assert_eq!(learned.metadata.category, "delivery_delay");
        assert_eq!(data.load_templates().len(), 2);

        let hits = kb
            .exact_lookup(&MetadataFilter::eq("tone", "owner_custom"), 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meta("sentiment"), Some("negative"));
    }

    #[tokio::test]
    async fn test_learn_falls_back_when_model_fails() {
        let dir = TempDir::new().unwrap();
        let (t, _, _) = trainer(&dir, ScriptedModel::failing());
        let learned = t.learn("항상 감사합니다").await.unwrap();
        assert_eq!(learned.metadata.sentiment, "positive");
        assert_eq!(learned.metadata.category, "service");
    }

    #[tokio::test]
    async fn test_learn_rejects_empty_text() {
        let dir = TempDir::new().unwrap();
        let (t, data, _) = trainer(&dir, ScriptedModel::replying("{}"));
        assert!(matches!(t.learn("   ").await, Err(Error::InvalidInput(_))));
        assert_eq!(data.load_templates().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_keeps_seed_templates() {
        let dir = TempDir::new().unwrap();
        let (t, data, kb) = trainer(&dir, ScriptedModel::replying(r#"{"sentiment": "positive"}"#));
        t.learn("또 와주세요!").await.unwrap();
        t.learn("늘 고맙습니다!").await.unwrap();

        assert_eq!(t.reset().await.unwrap(), 2);
        let templates = data.load_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].content, "맛있게 드셔주셔서 감사합니다.");
        assert_eq!(kb.document_count().unwrap(), 1);
    }
}
