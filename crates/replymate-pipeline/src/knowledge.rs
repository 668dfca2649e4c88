//! Knowledge base: the searchable index derived from templates and menu facts.

use std::sync::Arc;

use ndarray::Array1;
use tracing::{debug, info};

use replymate_core::Result;
use replymate_data::{DataStore, MenuItem, Template};
use replymate_infer::{Embedder, EmbeddingCache};
use replymate_store::{
    Document, EmbeddedDocument, Metadata, MetadataFilter, ScoredDocument, SqliteStore,
};

/// Collection holding both templates and menu facts.
pub const COLLECTION: &str = "reply_data";

pub const TYPE_TEMPLATE: &str = "template";
pub const TYPE_MENU: &str = "menu";

pub struct KnowledgeBase {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    cache: EmbeddingCache,
}

fn put_if_set(metadata: &mut Metadata, key: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        metadata.insert(key.to_string(), value.to_string());
    }
}

pub fn template_document(template: &Template) -> Document {
    let mut metadata = Metadata::new();
    put_if_set(&mut metadata, "sentiment", &template.metadata.sentiment);
    put_if_set(&mut metadata, "category", &template.metadata.category);
    put_if_set(&mut metadata, "tone", &template.metadata.tone);
    metadata.insert("type".into(), TYPE_TEMPLATE.into());
    Document::new(template.content.clone(), metadata)
}

pub fn menu_document(item: &MenuItem) -> Document {
    let name = item.menu_name.trim();
    let mut metadata = Metadata::new();
    metadata.insert("type".into(), TYPE_MENU.into());
    metadata.insert("name".into(), name.to_string());
    put_if_set(&mut metadata, "category", &item.category);
    Document::new(
        format!("메뉴명: {} / 특징: {}", name, item.description.trim()),
        metadata,
    )
}

impl KnowledgeBase {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            cache: EmbeddingCache::default(),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Rebuild the index from source records, swapping the collection in
    /// one transaction. Returns the number of documents indexed.
    pub async fn rebuild(&self, templates: &[Template], menu: &[MenuItem]) -> Result<usize> {
        let documents: Vec<Document> = templates
            .iter()
            .filter(|t| !t.content.trim().is_empty())
            .map(template_document)
            .chain(
                menu.iter()
                    .filter(|m| !m.menu_name.trim().is_empty())
                    .map(menu_document),
            )
            .collect();

        let embeddings: Vec<Option<Array1<f32>>> = if self.embedder.is_available() && !documents.is_empty() {
            let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
            self.embedder
                .embed_batch(&texts)
                .await?
                .into_iter()
                .map(|r| r.map(|r| r.embedding))
                .collect()
        } else {
            vec![None; documents.len()]
        };

        let batch: Vec<EmbeddedDocument> = documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, embedding)| EmbeddedDocument {
                document,
                embedding,
            })
            .collect();

        let inserted = self.store.replace_collection(COLLECTION, &batch)?;
        info!(
            "Knowledge base rebuilt: {} templates, {} menu items, {} documents",
            templates.len(),
            menu.len(),
            inserted
        );
        Ok(inserted)
    }

    /// Rebuild from whatever the data directory currently holds.
    pub async fn rebuild_from(&self, data: &DataStore) -> Result<usize> {
        self.rebuild(&data.load_templates(), &data.load_menu()).await
    }

    /// Build the index when it is empty. Returns whether a build happened.
    pub async fn ensure_ready(&self, data: &DataStore) -> Result<bool> {
        if self.document_count()? > 0 {
            return Ok(false);
        }
        info!("Knowledge base is empty, building from data files");
        self.rebuild_from(data).await?;
        Ok(true)
    }

    async fn query_embedding(&self, text: &str) -> Result<Option<Array1<f32>>> {
        if !self.embedder.is_available() {
            return Ok(None);
        }
        if let Some(hit) = self.cache.get(text) {
            debug!("Query embedding cache hit");
            return Ok(Some(hit));
        }
        let result = self.embedder.embed(text).await?;
        Ok(result.map(|r| {
            self.cache.put(text.to_string(), r.embedding.clone());
            r.embedding
        }))
    }

    /// Rank documents by similarity to `query` within the filter.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        let embedding = self.query_embedding(query).await?;
        self.store
            .similarity_search(COLLECTION, embedding.as_ref(), k, filter)
    }

    pub fn exact_lookup(&self, filter: &MetadataFilter, limit: usize) -> Result<Vec<Document>> {
        self.store.exact_lookup(COLLECTION, Some(filter), limit)
    }

    pub fn delete_all(&self) -> Result<usize> {
        self.store.delete_collection(COLLECTION)
    }

    pub fn delete_by_ids(&self, ids: &[String]) -> Result<usize> {
        self.store.delete_by_ids(COLLECTION, ids)
    }

    pub fn document_count(&self) -> Result<i64> {
        self.store.count_documents(Some(COLLECTION))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VocabEmbedder;
    use replymate_core::{DataPaths, Sentiment, Tone};
    use replymate_infer::NoopEmbedder;
    use tempfile::TempDir;

    const DIM: usize = 64;

    fn kb(dir: &TempDir, embedder: Arc<dyn Embedder>) -> KnowledgeBase {
        let store = SqliteStore::open(dir.path().join("vectordb"), DIM).unwrap();
        KnowledgeBase::new(Arc::new(store), embedder)
    }

    fn menu() -> Vec<MenuItem> {
        vec![
            MenuItem {
                menu_name: "돈까스".into(),
                description: "소스는 따로 드려요. 에어프라이어 180도 3분이면 바삭해요".into(),
                category: "메인".into(),
            },
            MenuItem {
                menu_name: "냉모밀".into(),
                description: "면은 찬물에 한번 헹궈 드세요".into(),
                category: "면".into(),
            },
        ]
    }

    fn templates() -> Vec<Template> {
        vec![
            Template::new("맛있게 드셔주셔서 감사합니다.", Sentiment::Positive, "taste_good", Tone::Polite),
            Template::new("늦어서 정말 죄송해요ㅠㅠ", Sentiment::Negative, "delivery_delay", Tone::Friendly),
        ]
    }

    #[test]
    fn test_menu_document_shape() {
        let doc = menu_document(&menu()[0]);
        assert!(doc.content.starts_with("메뉴명: 돈까스 / 특징: "));
        assert_eq!(doc.meta("type"), Some("menu"));
        assert_eq!(doc.meta("name"), Some("돈까스"));
        assert_eq!(doc.meta("sentiment"), None);
    }

    #[test]
    fn test_template_document_skips_blank_labels() {
        let mut t = templates()[0].clone();
        t.metadata.category = String::new();
        let doc = template_document(&t);
        assert_eq!(doc.meta("category"), None);
        assert_eq!(doc.meta("tone"), Some("polite"));
        assert_eq!(doc.meta("type"), Some("template"));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_collection() {
        let dir = TempDir::new().unwrap();
        let kb = kb(&dir, Arc::new(VocabEmbedder::new(DIM)));

        assert_eq!(kb.rebuild(&templates(), &menu()).await.unwrap(), 4);
        assert_eq!(kb.rebuild(&templates(), &[]).await.unwrap(), 2);
        assert_eq!(kb.document_count().unwrap(), 2);

        let hits = kb
            .exact_lookup(&MetadataFilter::eq("type", "menu"), 5)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_similarity_ranks_matching_menu_first() {
        let dir = TempDir::new().unwrap();
        let kb = kb(&dir, Arc::new(VocabEmbedder::new(DIM)));
        kb.rebuild(&templates(), &menu()).await.unwrap();

        let filter = MetadataFilter::eq("type", "menu");
        let hits = kb
            .similarity_search("냉모밀 면은 찬물에 헹궈 먹었어요", 2, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.meta("name"), Some("냉모밀"));
        assert!(hits[0].distance.unwrap() < 0.5);
        assert!(hits[1].distance.unwrap() > 0.9);
    }

    #[tokio::test]
    async fn test_without_embedder_search_is_unranked() {
        let dir = TempDir::new().unwrap();
        let kb = kb(&dir, Arc::new(NoopEmbedder::new(DIM)));
        kb.rebuild(&templates(), &menu()).await.unwrap();

        let filter = MetadataFilter::eq("sentiment", "negative");
        let hits = kb.similarity_search("리뷰 답변 템플릿", 3, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance.is_none());
    }

    #[tokio::test]
    async fn test_ensure_ready_builds_once() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths::new(dir.path().join("data")).unwrap();
        let data = DataStore::new(&paths, "우리 가게");
        data.save_templates(&templates()).unwrap();
        data.save_menu(&menu()).unwrap();

        let kb = kb(&dir, Arc::new(VocabEmbedder::new(DIM)));
        assert!(kb.ensure_ready(&data).await.unwrap());
        assert!(!kb.ensure_ready(&data).await.unwrap());
        assert_eq!(kb.document_count().unwrap(), 4);
    }
}
