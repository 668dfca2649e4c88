//! Sentiment classification through the language model, used when no
//! dedicated classifier endpoint is configured.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use replymate_core::{Error, Result, Sentiment};
use replymate_infer::{SentimentClassifier, SentimentScore};
use replymate_llm::LanguageModel;

use crate::analyze::parse_json_object;
use crate::prompts::{render, PromptSet};

pub struct LlmSentimentClassifier {
    llm: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
}

impl LlmSentimentClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }
}

fn parse_verdict(raw: &str) -> Result<SentimentScore> {
    let value = parse_json_object(raw).map_err(|e| Error::Classification(e.to_string()))?;
    let label = value
        .get("label")
        .or_else(|| value.get("sentiment"))
        .and_then(Value::as_str)
        .and_then(Sentiment::from_label)
        .ok_or_else(|| Error::Classification(format!("No sentiment label in: {}", raw.trim())))?;
    let score = value.get("score").and_then(Value::as_f64).unwrap_or(1.0) as f32;
    Ok(SentimentScore {
        label,
        score: score.clamp(0.0, 1.0),
    })
}

#[async_trait]
impl SentimentClassifier for LlmSentimentClassifier {
    async fn classify(&self, text: &str) -> Result<SentimentScore> {
        let prompt = render(&self.prompts.sentiment, &[("review_text", text)]);
        let raw = self
            .llm
            .complete("", &prompt)
            .await
            .map_err(|e| Error::Classification(e.to_string()))?;
        let verdict = parse_verdict(&raw)?;
        debug!("LLM sentiment: {} ({:.2})", verdict.label, verdict.score);
        Ok(verdict)
    }
}
