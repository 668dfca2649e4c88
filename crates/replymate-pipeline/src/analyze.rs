//! Metadata extraction: category, menu and context-aware sentiment.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use replymate_core::{Category, Error, Result, Sentiment};
use replymate_llm::LanguageModel;

use crate::prompts::{render, PromptSet};
use crate::state::Analysis;

/// Pull the JSON object out of a model answer, tolerating markdown fences
/// and chatter around it.
pub(crate) fn parse_json_object(raw: &str) -> Result<Value> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    let body = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    };
    let value: Value = serde_json::from_str(body)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(Error::Llm(format!("Expected a JSON object, got: {}", value)))
    }
}

/// `"null"`, `"none"` and blanks mean no menu.
pub(crate) fn menu_value(value: &Value) -> Option<String> {
    let menu = value.as_str()?.trim();
    match menu.to_lowercase().as_str() {
        "" | "null" | "none" => None,
        _ => Some(menu.to_string()),
    }
}

/// Parse an extraction answer. Missing fields fall back individually:
/// category to `service`, sentiment to the baseline.
pub fn parse_analysis(raw: &str, baseline: Sentiment) -> Result<Analysis> {
    let value = parse_json_object(raw)?;

    let category = match value.get("category").and_then(Value::as_str) {
        Some(label) => Category::from_label(label),
        None => Some(Category::Service),
    };
    let sentiment = value
        .get("final_sentiment")
        .or_else(|| value.get("sentiment"))
        .and_then(Value::as_str)
        .and_then(Sentiment::from_label)
        .unwrap_or(baseline);

    Ok(Analysis {
        category,
        menu: value.get("menu").and_then(menu_value),
        sentiment,
    })
}

/// LLM-backed extractor. Never fails: any error becomes the safe default.
pub struct MetadataExtractor {
    llm: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
}

impl MetadataExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    pub async fn extract(&self, review_text: &str, customer_name: &str, baseline: Sentiment) -> Analysis {
        let prompt = render(
            &self.prompts.analyze,
            &[
                ("customer_name", customer_name),
                ("review_text", review_text),
                ("baseline_sentiment", baseline.as_str()),
            ],
        );

        let analysis = match self.llm.complete("", &prompt).await {
            Ok(raw) => parse_analysis(&raw, baseline).unwrap_or_else(|e| {
                warn!("Metadata extraction returned unusable output: {}", e);
                Analysis::fallback(baseline)
            }),
            Err(e) => {
                warn!("Metadata extraction failed: {}", e);
                Analysis::fallback(baseline)
            }
        };

        if analysis.sentiment != baseline {
            info!(
                "Sentiment overridden by context: {} -> {} (customer '{}')",
                baseline, analysis.sentiment, customer_name
            );
        }
        info!(
            "Analyze result: {}, {}, {}",
            analysis.sentiment,
            analysis.category.map_or("null", |c| c.as_str()),
            analysis.menu.as_deref().unwrap_or("null")
        );
        analysis
    }
}
