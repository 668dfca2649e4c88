//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{LLMConfigSummary, LLMProvider};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub google_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_gemini_embedding_model")]
    pub gemini_embedding_model: String,
    #[serde(default = "default_openai_embedding_model")]
    pub openai_embedding_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Per-request timeout; a stalled model call fails instead of hanging.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_gemini_embedding_model() -> String {
    DEFAULT_GEMINI_EMBEDDING_MODEL.into()
}
fn default_openai_embedding_model() -> String {
    DEFAULT_OPENAI_EMBEDDING_MODEL.into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> usize {
    1024
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            google_api_key: None,
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            gemini_model: default_gemini_model(),
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            gemini_embedding_model: default_gemini_embedding_model(),
            openai_embedding_model: default_openai_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LLMConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                LLMConfig::default()
            }),
            Err(_) => LLMConfig::default(),
        };

        config.config_path = config_path.to_path_buf();

        if config.google_api_key.is_none() {
            config.google_api_key = std::env::var("GOOGLE_API_KEY").ok();
        }
        if config.openai_api_key.is_none() {
            config.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }
        if config.groq_api_key.is_none() {
            config.groq_api_key = std::env::var("GROQ_API_KEY").ok();
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn key_for(&self, provider: LLMProvider) -> Option<&String> {
        match provider {
            LLMProvider::Gemini => self.google_api_key.as_ref(),
            LLMProvider::OpenAI => self.openai_api_key.as_ref(),
            LLMProvider::Anthropic => self.anthropic_api_key.as_ref(),
            LLMProvider::Groq => self.groq_api_key.as_ref(),
        }
    }

    fn model_for(&self, provider: LLMProvider) -> &str {
        match provider {
            LLMProvider::Gemini => &self.gemini_model,
            LLMProvider::OpenAI => &self.openai_model,
            LLMProvider::Anthropic => &self.anthropic_model,
            LLMProvider::Groq => &self.groq_model,
        }
    }

    /// Resolve which provider, model and key to use for completions.
    pub fn resolve_provider(&self) -> Option<(LLMProvider, String, String)> {
        if self.preferred_provider != "auto" {
            let provider = LLMProvider::parse(&self.preferred_provider)?;
            return self
                .key_for(provider)
                .map(|k| (provider, self.model_for(provider).to_string(), k.clone()));
        }

        // Auto mode: Gemini > Anthropic > Groq > OpenAI
        [
            LLMProvider::Gemini,
            LLMProvider::Anthropic,
            LLMProvider::Groq,
            LLMProvider::OpenAI,
        ]
        .into_iter()
        .find_map(|p| {
            self.key_for(p)
                .map(|k| (p, self.model_for(p).to_string(), k.clone()))
        })
    }

    /// Resolve the embedding provider. Prefers the completion provider when
    /// it offers embeddings, then Gemini > OpenAI.
    pub fn resolve_embedding_provider(&self) -> Option<(LLMProvider, String, String)> {
        let preferred = LLMProvider::parse(&self.preferred_provider)
            .filter(LLMProvider::supports_embeddings);
        preferred
            .into_iter()
            .chain([LLMProvider::Gemini, LLMProvider::OpenAI])
            .find_map(|p| {
                let model = match p {
                    LLMProvider::Gemini => &self.gemini_embedding_model,
                    _ => &self.openai_embedding_model,
                };
                self.key_for(p).map(|k| (p, model.clone(), k.clone()))
            })
    }

    /// Public summary (no API keys exposed).
    pub fn summary(&self) -> LLMConfigSummary {
        let completion = self.resolve_provider();
        let embedding = self.resolve_embedding_provider();
        let configured_providers = [
            LLMProvider::Gemini,
            LLMProvider::Anthropic,
            LLMProvider::Groq,
            LLMProvider::OpenAI,
        ]
        .into_iter()
        .filter(|p| self.key_for(*p).is_some())
        .map(|p| p.to_string())
        .collect();

        LLMConfigSummary {
            preferred_provider: self.preferred_provider.clone(),
            active_provider: completion.as_ref().map(|(p, _, _)| p.to_string()),
            active_model: completion.map(|(_, m, _)| m),
            embedding_provider: embedding.as_ref().map(|(p, _, _)| p.to_string()),
            embedding_model: embedding.map(|(_, m, _)| m),
            configured_providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bare() -> LLMConfig {
        LLMConfig::default()
    }

    #[test]
    fn test_auto_prefers_gemini() {
        let mut c = bare();
        c.openai_api_key = Some("sk-o".into());
        c.google_api_key = Some("g-key".into());
        let (p, m, k) = c.resolve_provider().unwrap();
        assert_eq!(p, LLMProvider::Gemini);
        assert_eq!(m, DEFAULT_GEMINI_MODEL);
        assert_eq!(k, "g-key");
    }

    #[test]
    fn test_explicit_provider_without_key() {
        let mut c = bare();
        c.preferred_provider = "anthropic".into();
        c.openai_api_key = Some("sk-o".into());
        assert!(c.resolve_provider().is_none());
        assert!(c.summary().active_provider.is_none());
    }

    #[test]
    fn test_embedding_provider_skips_anthropic() {
        let mut c = bare();
        c.preferred_provider = "anthropic".into();
        c.anthropic_api_key = Some("a".into());
        c.openai_api_key = Some("o".into());
        let (p, m, _) = c.resolve_embedding_provider().unwrap();
        assert_eq!(p, LLMProvider::OpenAI);
        assert_eq!(m, DEFAULT_OPENAI_EMBEDDING_MODEL);

        c.openai_api_key = None;
        assert!(c.resolve_embedding_provider().is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip_keeps_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        let mut c = LLMConfig {
            config_path: path.clone(),
            ..bare()
        };
        c.preferred_provider = "groq".into();
        c.temperature = 0.2;
        c.save().unwrap();

        let loaded = LLMConfig::load(&path);
        assert_eq!(loaded.preferred_provider, "groq");
        assert!((loaded.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(loaded.config_path, path);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        std::fs::write(&path, "{not json").unwrap();
        let loaded = LLMConfig::load(&path);
        assert_eq!(loaded.preferred_provider, "auto");
        assert_eq!(loaded.timeout_secs, 60);
    }
}
