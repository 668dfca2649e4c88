//! Dashboard numbers over completed reviews.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use replymate_core::Sentiment;

use crate::records::CompletedReview;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPeriod {
    Day,
    Week,
    Month,
    All,
}

impl ReviewPeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "1d" | "1일" => Some(Self::Day),
            "week" | "7d" | "7일" => Some(Self::Week),
            "month" | "30d" | "1개월" => Some(Self::Month),
            "all" | "전체" => Some(Self::All),
            _ => None,
        }
    }

    fn window(&self) -> Option<Duration> {
        match self {
            Self::Day => Some(Duration::days(1)),
            Self::Week => Some(Duration::days(7)),
            Self::Month => Some(Duration::days(30)),
            Self::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentFilter {
    All,
    Only(Sentiment),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    pub count: usize,
    /// Share of positive reviews in the selection, in percent.
    pub positive_ratio: f64,
    pub latest: Option<NaiveDateTime>,
}

/// Aggregate reviews whose timestamp falls inside `period` ending at `now`.
///
/// Reviews with unparsable timestamps only count toward `ReviewPeriod::All`.
pub fn review_stats(
    reviews: &[CompletedReview],
    period: ReviewPeriod,
    filter: SentimentFilter,
    now: NaiveDateTime,
) -> ReviewStats {
    let start = period.window().map(|w| now - w);

    let selected: Vec<&CompletedReview> = reviews
        .iter()
        .filter(|r| match start {
            Some(start) => r.parsed_timestamp().map_or(false, |t| t >= start),
            None => true,
        })
        .filter(|r| match filter {
            SentimentFilter::All => true,
            SentimentFilter::Only(s) => r.sentiment() == Some(s),
        })
        .collect();

    let count = selected.len();
    let positive = selected
        .iter()
        .filter(|r| r.sentiment() == Some(Sentiment::Positive))
        .count();
    let positive_ratio = if count == 0 {
        0.0
    } else {
        positive as f64 / count as f64 * 100.0
    };

    ReviewStats {
        count,
        positive_ratio,
        latest: selected.iter().filter_map(|r| r.parsed_timestamp()).max(),
    }
}
