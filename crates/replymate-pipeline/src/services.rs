//! Process-wide collaborators, built once at startup and handed to the
//! pipeline, trainer and batch runner.

use std::sync::Arc;

use tracing::info;

use replymate_core::{PipelineSettings, ReplyMateConfig, Result};
use replymate_data::DataStore;
use replymate_infer::{HttpSentimentClassifier, SentimentClassifier};
use replymate_llm::{create_embedder, create_language_model, LLMConfig, LanguageModel};
use replymate_store::SqliteStore;

use crate::analyze::MetadataExtractor;
use crate::batch::BatchRunner;
use crate::classify::LlmSentimentClassifier;
use crate::generate::ReplyGenerator;
use crate::knowledge::KnowledgeBase;
use crate::pipeline::ReplyPipeline;
use crate::prompts::PromptSet;
use crate::retrieve::Retriever;
use crate::training::ToneTrainer;

pub struct Services {
    pub classifier: Arc<dyn SentimentClassifier>,
    pub llm: Arc<dyn LanguageModel>,
    pub knowledge: Arc<KnowledgeBase>,
    pub data: Arc<DataStore>,
    pub prompts: Arc<PromptSet>,
    pub settings: PipelineSettings,
}

impl Services {
    pub fn new(
        classifier: Arc<dyn SentimentClassifier>,
        llm: Arc<dyn LanguageModel>,
        knowledge: Arc<KnowledgeBase>,
        data: Arc<DataStore>,
        prompts: Arc<PromptSet>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            classifier,
            llm,
            knowledge,
            data,
            prompts,
            settings,
        }
    }

    /// Wire real clients from configuration. The HTTP classifier is used
    /// when an endpoint is configured, otherwise the language model judges
    /// sentiment itself.
    pub fn from_config(config: &ReplyMateConfig) -> Result<Self> {
        let paths = &config.data_paths;
        let llm_config = LLMConfig::load(&paths.llm_config_file);
        let llm = create_language_model(&llm_config)?;
        let embedder = create_embedder(&llm_config, config.embedding_dim);
        let prompts = Arc::new(PromptSet::load(&paths.prompts_file));

        let classifier: Arc<dyn SentimentClassifier> = match &config.pipeline.sentiment_api_url {
            Some(url) => {
                info!("Using sentiment endpoint {}", url);
                Arc::new(HttpSentimentClassifier::new(
                    url.clone(),
                    config.pipeline.sentiment_api_key.clone(),
                    llm_config.timeout(),
                )?)
            }
            None => {
                info!("No sentiment endpoint configured, classifying with {}", llm.model_name());
                Arc::new(LlmSentimentClassifier::new(llm.clone(), prompts.clone()))
            }
        };

        let store = SqliteStore::open(&paths.vectordb, config.embedding_dim)?;
        let knowledge = Arc::new(KnowledgeBase::new(Arc::new(store), embedder));
        let data = Arc::new(DataStore::new(paths, config.pipeline.default_store_name.clone()));

        Ok(Self::new(
            classifier,
            llm,
            knowledge,
            data,
            prompts,
            config.pipeline.clone(),
        ))
    }

    pub fn pipeline(&self) -> ReplyPipeline {
        ReplyPipeline::new(
            self.classifier.clone(),
            MetadataExtractor::new(self.llm.clone(), self.prompts.clone()),
            Retriever::new(self.knowledge.clone(), &self.settings),
            ReplyGenerator::new(self.llm.clone(), self.prompts.clone()),
            self.data.store_profile().store_name,
        )
    }

    pub fn trainer(&self) -> ToneTrainer {
        ToneTrainer::new(
            self.llm.clone(),
            self.prompts.clone(),
            self.data.clone(),
            self.knowledge.clone(),
        )
    }

    pub fn batch(&self) -> BatchRunner {
        BatchRunner::new(Arc::new(self.pipeline()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replymate_core::DataPaths;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ReplyMateConfig {
        ReplyMateConfig {
            data_paths: DataPaths::new(dir.path()).unwrap(),
            embedding_dim: 8,
            pipeline: PipelineSettings::default(),
        }
    }

    #[test]
    fn test_from_config_wires_configured_provider() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        std::fs::write(
            &config.data_paths.llm_config_file,
            r#"{"preferred_provider": "groq", "groq_api_key": "gsk-test"}"#,
        )
        .unwrap();

        let services = Services::from_config(&config).unwrap();
        assert_eq!(services.llm.model_name(), "llama-3.3-70b-versatile");
        assert_eq!(services.knowledge.document_count().unwrap(), 0);
        assert!(config.data_paths.vectordb.join("replymate.db").exists());
    }

    #[test]
    fn test_unknown_provider_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        std::fs::write(
            &config.data_paths.llm_config_file,
            r#"{"preferred_provider": "nonexistent"}"#,
        )
        .unwrap();
        assert!(Services::from_config(&config).is_err());
    }
}
