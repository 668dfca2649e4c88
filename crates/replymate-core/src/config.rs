//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_TEMPLATE_K: usize = 2;
pub const DEFAULT_MENU_DISTANCE_THRESHOLD: f32 = 0.8;
pub const DEFAULT_EMBEDDING_DIM: usize = 768;
pub const DEFAULT_STORE_NAME: &str = "우리 가게";

/// Paths to all ReplyMate data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Document store directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Reply templates (`data/templates.json`).
    pub templates_file: PathBuf,
    /// Menu facts (`data/menu_info.json`).
    pub menu_file: PathBuf,
    /// Completed reviews (`data/saved_reviews.json`).
    pub saved_reviews_file: PathBuf,
    /// In-progress review cards (`data/drafts.json`).
    pub drafts_file: PathBuf,
    /// Store identity (`data/store.json`).
    pub store_file: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
    /// Prompt template overrides (`data/prompts.json`).
    pub prompts_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            templates_file: root.join("templates.json"),
            menu_file: root.join("menu_info.json"),
            saved_reviews_file: root.join("saved_reviews.json"),
            drafts_file: root.join("drafts.json"),
            store_file: root.join("store.json"),
            llm_config_file: root.join("llm-config.json"),
            prompts_file: root.join("prompts.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.vectordb)?;
        Ok(())
    }
}

/// Retrieval and classification knobs for the reply pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Number of style exemplars fetched per reply.
    pub template_k: usize,
    /// Cosine distance above which a similarity-mode menu hit is dropped.
    pub menu_distance_threshold: f32,
    /// Sentiment classifier endpoint (HuggingFace-style inference API).
    pub sentiment_api_url: Option<String>,
    pub sentiment_api_key: Option<String>,
    /// Store name used when `store.json` does not exist.
    pub default_store_name: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            template_k: DEFAULT_TEMPLATE_K,
            menu_distance_threshold: DEFAULT_MENU_DISTANCE_THRESHOLD,
            sentiment_api_url: None,
            sentiment_api_key: None,
            default_store_name: DEFAULT_STORE_NAME.into(),
        }
    }
}

/// Top-level ReplyMate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMateConfig {
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (768 for text-embedding-004).
    pub embedding_dim: usize,
    pub pipeline: PipelineSettings,
}

impl ReplyMateConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let data_paths = DataPaths::new(data_dir)?;

        let pipeline = PipelineSettings {
            template_k: env_or("REPLYMATE_TEMPLATE_K", DEFAULT_TEMPLATE_K),
            menu_distance_threshold: env_or(
                "REPLYMATE_MENU_DISTANCE_THRESHOLD",
                DEFAULT_MENU_DISTANCE_THRESHOLD,
            ),
            sentiment_api_url: std::env::var("SENTIMENT_API_URL").ok(),
            sentiment_api_key: std::env::var("SENTIMENT_API_KEY").ok(),
            default_store_name: std::env::var("REPLYMATE_DEFAULT_STORE_NAME")
                .unwrap_or_else(|_| DEFAULT_STORE_NAME.into()),
        };

        Ok(Self {
            data_paths,
            embedding_dim: env_or("REPLYMATE_EMBEDDING_DIM", DEFAULT_EMBEDDING_DIM),
            pipeline,
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
