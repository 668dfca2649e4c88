//! Review labels shared by the store metadata, the records and the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary review sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    /// Parse classifier and model output, including common label aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" | "pos" | "label_1" | "1" | "긍정" => Some(Self::Positive),
            "negative" | "neg" | "label_0" | "0" | "부정" => Some(Self::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a review is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TasteGood,
    TasteBad,
    DeliveryDelay,
    WrongItem,
    Quantity,
    Service,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::TasteGood,
        Self::TasteBad,
        Self::DeliveryDelay,
        Self::WrongItem,
        Self::Quantity,
        Self::Service,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TasteGood => "taste_good",
            Self::TasteBad => "taste_bad",
            Self::DeliveryDelay => "delivery_delay",
            Self::WrongItem => "wrong_item",
            Self::Quantity => "quantity",
            Self::Service => "service",
        }
    }

    /// `None` for empty, `"null"` and unrecognised labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Polite,
    Friendly,
    Witty,
    /// Mimic the owner's own past replies.
    OwnerCustom,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polite => "polite",
            Self::Friendly => "friendly",
            Self::Witty => "witty",
            Self::OwnerCustom => "owner_custom",
        }
    }

    /// Dashboard label.
    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Polite => "정중한",
            Self::Friendly => "친근한",
            Self::Witty => "유머러스한",
            Self::OwnerCustom => "사장님 말투",
        }
    }

    /// Accepts metadata keys and dashboard labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "polite" | "정중한" => Some(Self::Polite),
            "friendly" | "친근한" => Some(Self::Friendly),
            "witty" | "유머러스한" => Some(Self::Witty),
            "owner_custom" | "사장님 말투" => Some(Self::OwnerCustom),
            _ => None,
        }
    }

    /// The formal regime: no emoji, no tildes, fixed formal endings.
    pub fn is_formal(&self) -> bool {
        matches!(self, Self::Polite)
    }
}

impl Default for Tone {
    fn default() -> Self {
        Self::Friendly
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
