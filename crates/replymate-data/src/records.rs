//! Source-of-truth records persisted as JSON lists.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use replymate_core::{Sentiment, Tone};

/// Labels attached to a template. Kept as raw strings so imported files
/// with unfamiliar values still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tone: String,
}

/// A sample reply used as a style exemplar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub content: String,
    #[serde(default)]
    pub metadata: TemplateMetadata,
}

impl Template {
    pub fn new(content: impl Into<String>, sentiment: Sentiment, category: &str, tone: Tone) -> Self {
        Self {
            content: content.into(),
            metadata: TemplateMetadata {
                sentiment: sentiment.as_str().into(),
                category: category.into(),
                tone: tone.as_str().into(),
            },
        }
    }

    /// Owner-authored templates are the only ones a reset removes.
    pub fn is_owner_custom(&self) -> bool {
        Tone::from_label(&self.metadata.tone) == Some(Tone::OwnerCustom)
    }
}

/// Facts about one menu item that a reply may quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub menu_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A finished review/reply pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedReview {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub menu_name: String,
    pub review_text: String,
    #[serde(default)]
    pub reply_text: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub timestamp: String,
}

impl CompletedReview {
    pub fn sentiment(&self) -> Option<Sentiment> {
        Sentiment::from_label(&self.sentiment)
    }

    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.timestamp)
    }
}

/// Current local time in the format records are written with.
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Accepts the dashboard's timestamp shapes, with or without fractional
/// seconds or a `T` separator.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    #[default]
    Draft,
    Generated,
    Saved,
}

/// In-progress review card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub status: DraftStatus,
}

impl Draft {
    pub fn new(customer_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            customer_name: customer_name.into(),
            text: text.into(),
            reply: None,
            sentiment: None,
            status: DraftStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub store_name: String,
}
