//! Typed state threaded through Analyze, Retrieve and Generate.

use serde::{Deserialize, Serialize};

use replymate_core::{Category, Sentiment, Tone};
use replymate_data::{now_timestamp, CompletedReview};

use crate::retrieve::resolve_target_menu;

/// One reply request from the dashboard or CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyRequest {
    /// Caller's identifier (draft id); batch outcomes are keyed by it.
    #[serde(default)]
    pub id: Option<String>,
    pub review_text: String,
    #[serde(default)]
    pub customer_name: String,
    /// Menu picked by the owner. Takes precedence over the extracted menu.
    #[serde(default)]
    pub manual_menu: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub tone: Tone,
    /// Present only on regeneration requests.
    #[serde(default)]
    pub user_feedback: Option<String>,
}

impl ReplyRequest {
    pub fn new(review_text: impl Into<String>, customer_name: impl Into<String>, tone: Tone) -> Self {
        Self {
            review_text: review_text.into(),
            customer_name: customer_name.into(),
            tone,
            ..Self::default()
        }
    }

    pub fn with_manual_menu(mut self, menu: impl Into<String>) -> Self {
        self.manual_menu = Some(menu.into());
        self
    }

    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Start,
    Analyzed,
    Retrieved,
    Generated,
}

/// Output of the Analyze stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub category: Option<Category>,
    /// `None` when the model answered `"null"` or nothing.
    pub menu: Option<String>,
    pub sentiment: Sentiment,
}

impl Analysis {
    /// Safe default used whenever extraction fails.
    pub fn fallback(baseline: Sentiment) -> Self {
        Self {
            category: Some(Category::Service),
            menu: None,
            sentiment: baseline,
        }
    }
}

/// Output of the Retrieve stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Retrieval {
    pub templates: Vec<String>,
    pub menus: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub review_text: String,
    pub customer_name: String,
    pub manual_menu: Option<String>,
    pub store_name: String,
    pub tone: Tone,
    pub user_feedback: Option<String>,

    pub sentiment: Option<Sentiment>,
    pub category: Option<Category>,
    pub extracted_menu: Option<String>,
    pub retrieved_templates: Vec<String>,
    pub retrieved_menus: Vec<String>,
    pub final_reply: Option<String>,

    pub stage: PipelineStage,
}

impl PipelineState {
    pub fn new(request: ReplyRequest, default_store_name: &str) -> Self {
        let store_name = request
            .store_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_store_name.to_string());
        Self {
            review_text: request.review_text,
            customer_name: request.customer_name.trim().to_string(),
            manual_menu: request.manual_menu,
            store_name,
            tone: request.tone,
            user_feedback: request.user_feedback.filter(|f| !f.trim().is_empty()),
            sentiment: None,
            category: None,
            extracted_menu: None,
            retrieved_templates: Vec::new(),
            retrieved_menus: Vec::new(),
            final_reply: None,
            stage: PipelineStage::Start,
        }
    }

    /// Analysis results are written once; later stages only read them.
    pub(crate) fn record_analysis(&mut self, analysis: Analysis) {
        debug_assert_eq!(self.stage, PipelineStage::Start);
        self.sentiment = Some(analysis.sentiment);
        self.category = analysis.category;
        self.extracted_menu = analysis.menu;
        self.stage = PipelineStage::Analyzed;
    }

    pub(crate) fn record_retrieval(&mut self, retrieval: Retrieval) {
        debug_assert_eq!(self.stage, PipelineStage::Analyzed);
        self.retrieved_templates = retrieval.templates;
        self.retrieved_menus = retrieval.menus;
        self.stage = PipelineStage::Retrieved;
    }

    pub(crate) fn record_reply(&mut self, reply: String) {
        debug_assert_eq!(self.stage, PipelineStage::Retrieved);
        self.final_reply = Some(reply);
        self.stage = PipelineStage::Generated;
    }

    /// The finished pair as a durable record. `None` before generation.
    pub fn to_completed_review(&self, id: impl Into<String>) -> Option<CompletedReview> {
        let reply = self.final_reply.as_ref()?;
        Some(CompletedReview {
            id: id.into(),
            customer_name: self.customer_name.clone(),
            menu_name: resolve_target_menu(
                self.manual_menu.as_deref(),
                self.extracted_menu.as_deref(),
            )
            .unwrap_or_default(),
            review_text: self.review_text.clone(),
            reply_text: reply.clone(),
            tone: self.tone.as_str().to_string(),
            sentiment: self.sentiment.map(|s| s.as_str().to_string()).unwrap_or_default(),
            timestamp: now_timestamp(),
        })
    }
}
