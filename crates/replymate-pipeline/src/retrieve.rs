//! Retrieval of style exemplars and menu facts.

use std::sync::Arc;

use tracing::{debug, info, warn};

use replymate_core::{PipelineSettings, Result};
use replymate_store::MetadataFilter;

use crate::knowledge::{KnowledgeBase, TYPE_MENU};
use crate::state::{PipelineState, Retrieval};

/// Generic probe for template search. Metadata does the real narrowing.
pub const TEMPLATE_QUERY: &str = "리뷰 답변 템플릿";

fn is_set(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && !v.eq_ignore_ascii_case("null")
}

/// Conjunction over whichever labels are present. Blank and `"null"`
/// labels add no clause.
pub fn build_template_filter(sentiment: &str, category: &str, tone: &str) -> Option<MetadataFilter> {
    let conditions = [("sentiment", sentiment), ("category", category), ("tone", tone)]
        .into_iter()
        .filter(|(_, value)| is_set(value))
        .map(|(key, value)| MetadataFilter::eq(key, value.trim()))
        .collect();
    MetadataFilter::all(conditions)
}

/// Manual pick wins, then the extracted menu, else no target.
pub fn resolve_target_menu(manual: Option<&str>, extracted: Option<&str>) -> Option<String> {
    manual
        .filter(|m| is_set(m))
        .or(extracted.filter(|m| is_set(m)))
        .map(|m| m.trim().to_string())
}

pub struct Retriever {
    knowledge: Arc<KnowledgeBase>,
    template_k: usize,
    menu_distance_threshold: f32,
}

impl Retriever {
    pub fn new(knowledge: Arc<KnowledgeBase>, settings: &PipelineSettings) -> Self {
        Self {
            knowledge,
            template_k: settings.template_k,
            menu_distance_threshold: settings.menu_distance_threshold,
        }
    }

    /// Up to `k` exemplar replies matching the labels. Errors yield none.
    pub async fn style_exemplars(&self, sentiment: &str, category: &str, tone: &str) -> Vec<String> {
        let filter = build_template_filter(sentiment, category, tone);
        match &filter {
            Some(f) => info!("Template search filter: {}", f),
            None => info!("Template search without filter"),
        }

        match self
            .knowledge
            .similarity_search(TEMPLATE_QUERY, self.template_k, filter.as_ref())
            .await
        {
            Ok(hits) => hits.into_iter().map(|h| h.document.content).collect(),
            Err(e) => {
                warn!("Template search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Menu facts for the review. A known target name is looked up exactly;
    /// otherwise the review text is matched by similarity and hits beyond
    /// the distance threshold are dropped. Errors yield none.
    pub async fn menu_facts(&self, target_menu: Option<&str>, review_text: &str) -> Vec<String> {
        let result = match target_menu {
            Some(name) => self.exact_menu(name),
            None => self.similar_menu(review_text).await,
        };
        result.unwrap_or_else(|e| {
            warn!("Menu search failed: {}", e);
            Vec::new()
        })
    }

    fn exact_menu(&self, name: &str) -> Result<Vec<String>> {
        let filter = MetadataFilter::And(vec![
            MetadataFilter::eq("type", TYPE_MENU),
            MetadataFilter::eq("name", name),
        ]);
        let hits = self.knowledge.exact_lookup(&filter, 1)?;
        if hits.is_empty() {
            info!("No menu info for '{}'", name);
        }
        Ok(hits.into_iter().map(|d| d.content).collect())
    }

    async fn similar_menu(&self, review_text: &str) -> Result<Vec<String>> {
        if review_text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let filter = MetadataFilter::eq("type", TYPE_MENU);
        let hits = self
            .knowledge
            .similarity_search(review_text, 1, Some(&filter))
            .await?;

        let mut kept = Vec::new();
        for hit in hits {
            match hit.distance {
                Some(d) if d < self.menu_distance_threshold => kept.push(hit.document.content),
                Some(d) => info!(
                    "Menu dropped due to low similarity: {} (distance {:.3})",
                    hit.document.content, d
                ),
                None => debug!("Menu hit unranked, dropped: {}", hit.document.content),
            }
        }
        Ok(kept)
    }

    /// The Retrieve stage over an analyzed state.
    pub async fn retrieve(&self, state: &PipelineState) -> Retrieval {
        let target = resolve_target_menu(state.manual_menu.as_deref(), state.extracted_menu.as_deref());
        info!("Menu search target: {}", target.as_deref().unwrap_or("(similarity)"));

        let menus = self.menu_facts(target.as_deref(), &state.review_text).await;
        let templates = self
            .style_exemplars(
                state.sentiment.map_or("", |s| s.as_str()),
                state.category.map_or("", |c| c.as_str()),
                state.tone.as_str(),
            )
            .await;

        info!(
            "Retrieved {} menu facts, {} tone examples",
            menus.len(),
            templates.len()
        );
        Retrieval { templates, menus }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VocabEmbedder;
    use replymate_core::{Sentiment, Tone};
    use replymate_data::{MenuItem, Template};
    use replymate_infer::NoopEmbedder;
    use replymate_infer::Embedder;
    use replymate_store::SqliteStore;
    use tempfile::TempDir;

    const DIM: usize = 64;

    async fn retriever(dir: &TempDir, embedder: Arc<dyn Embedder>) -> Retriever {
        let store = SqliteStore::open(dir.path(), DIM).unwrap();
        let kb = Arc::new(KnowledgeBase::new(Arc::new(store), embedder));
        let templates = vec![
            Template::new("맛있게 드셔주셔서 감사합니다.", Sentiment::Positive, "taste_good", Tone::Polite),
            Template::new("또 와주세요~ 감사해요^^", Sentiment::Positive, "taste_good", Tone::Friendly),
            Template::new("늦어서 정말 죄송해요ㅠㅠ", Sentiment::Negative, "delivery_delay", Tone::Friendly),
        ];
        let menu = vec![
            MenuItem {
                menu_name: "돈까스".into(),
                description: "소스는 따로 드려요. 에어프라이어 180도 3분이면 바삭해요".into(),
                category: String::new(),
            },
            MenuItem {
                menu_name: "냉모밀".into(),
                description: "면은 찬물에 한번 헹궈 드세요".into(),
                category: String::new(),
            },
        ];
        kb.rebuild(&templates, &menu).await.unwrap();
        Retriever::new(kb, &PipelineSettings::default())
    }

    #[test]
    fn test_filter_skips_empty_category() {
        let f = build_template_filter("positive", "", "friendly").unwrap();
        assert_eq!(
            f,
            MetadataFilter::And(vec![
                MetadataFilter::eq("sentiment", "positive"),
                MetadataFilter::eq("tone", "friendly"),
            ])
        );
        assert!(f.clauses().iter().all(|(k, _)| *k != "category"));
    }

    #[test]
    fn test_filter_shapes() {
        assert_eq!(
            build_template_filter("negative", "null", ""),
            Some(MetadataFilter::eq("sentiment", "negative"))
        );
        assert_eq!(build_template_filter("", " ", "null"), None);
        assert_eq!(
            build_template_filter("positive", "taste_good", "polite").unwrap().clauses().len(),
            3
        );
    }

    #[test]
    fn test_target_menu_resolution() {
        assert_eq!(resolve_target_menu(Some("돈까스"), Some("족발")).as_deref(), Some("돈까스"));
        assert_eq!(resolve_target_menu(Some("null"), Some("족발")).as_deref(), Some("족발"));
        assert_eq!(resolve_target_menu(Some(""), None), None);
        assert_eq!(resolve_target_menu(None, Some("null")), None);
    }

    #[tokio::test]
    async fn test_exact_menu_lookup() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir, Arc::new(VocabEmbedder::new(DIM))).await;

        let facts = r.menu_facts(Some("돈까스"), "냉모밀 면은 찬물에 헹궈 먹었어요").await;
        assert_eq!(facts.len(), 1);
        assert!(facts[0].starts_with("메뉴명: 돈까스"));

        assert!(r.menu_facts(Some("족발"), "족발이 맛있어요").await.is_empty());
    }

    #[tokio::test]
    async fn test_similarity_menu_threshold() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir, Arc::new(VocabEmbedder::new(DIM))).await;

        let facts = r.menu_facts(None, "냉모밀 면은 찬물에 헹궈 먹었어요").await;
        assert_eq!(facts.len(), 1);
        assert!(facts[0].contains("냉모밀"));

        assert!(r.menu_facts(None, "배송이 너무 늦었어요").await.is_empty());
    }

    #[tokio::test]
    async fn test_unranked_menu_hits_are_dropped() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir, Arc::new(NoopEmbedder::new(DIM))).await;
        assert!(r.menu_facts(None, "냉모밀 면은 찬물에 헹궈 먹었어요").await.is_empty());
        assert_eq!(r.menu_facts(Some("냉모밀"), "").await.len(), 1);
    }

    #[tokio::test]
    async fn test_style_exemplars_respect_labels() {
        let dir = TempDir::new().unwrap();
        let r = retriever(&dir, Arc::new(VocabEmbedder::new(DIM))).await;

        let polite = r.style_exemplars("positive", "taste_good", "polite").await;
        assert_eq!(polite, vec!["맛있게 드셔주셔서 감사합니다.".to_string()]);

        let positive = r.style_exemplars("positive", "", "").await;
        assert_eq!(positive.len(), 2);

        assert!(r.style_exemplars("negative", "wrong_item", "").await.is_empty());
    }
}
