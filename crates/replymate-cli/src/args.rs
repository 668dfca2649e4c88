//! Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use replymate_core::{Sentiment, Tone};
use replymate_data::{ReviewPeriod, SentimentFilter};
use replymate_pipeline::ReplyRequest;

#[derive(Parser, Debug)]
#[command(name = "replymate")]
#[command(about = "ReplyMate - review reply assistant for small restaurant owners")]
#[command(version)]
pub struct Cli {
    /// Directory holding templates, menu, saved reviews and the search index
    #[arg(long, global = true, env = "REPLYMATE_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a reply
    Reply(ReplyArgs),
    /// Generate again, guided by --feedback
    Rewrite(ReplyArgs),
    /// Reply to a request file, or to waiting drafts when no file is given
    Batch {
        /// JSON array of reply requests
        file: Option<PathBuf>,
        /// Tone for waiting drafts
        #[arg(long, value_parser = parse_tone)]
        tone: Option<Tone>,
    },
    /// Learn the owner's tone from a written reply
    Learn {
        /// The owner's reply
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Forget learned replies and saved reviews
    Reset,
    /// Rebuild the search index from data files
    Reindex,
    /// Saved review numbers
    Stats {
        /// day, week, month or all
        #[arg(value_parser = parse_period, default_value = "all")]
        period: ReviewPeriod,
        /// Only count positive or negative reviews
        #[arg(value_parser = parse_sentiment)]
        sentiment: Option<Sentiment>,
    },
    /// Show providers and index size
    Status,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ReplyArgs {
    /// Review text; bare words are joined with spaces
    #[arg(required = true)]
    pub review: Vec<String>,
    /// Customer nickname
    #[arg(long, default_value = "")]
    pub name: String,
    /// polite, friendly, witty or owner_custom
    #[arg(long, value_parser = parse_tone)]
    pub tone: Option<Tone>,
    /// Menu to look up instead of the one found in the review
    #[arg(long)]
    pub menu: Option<String>,
    /// Store name used in the reply
    #[arg(long)]
    pub store: Option<String>,
    /// Correction for the rewrite
    #[arg(long)]
    pub feedback: Option<String>,
    /// Save the reply as a completed review
    #[arg(long)]
    pub save: bool,
}

pub fn parse_tone(raw: &str) -> Result<Tone, String> {
    Tone::from_label(raw).ok_or_else(|| {
        format!("unknown tone '{}', use polite, friendly, witty or owner_custom", raw)
    })
}

fn parse_period(raw: &str) -> Result<ReviewPeriod, String> {
    ReviewPeriod::parse(raw).ok_or_else(|| format!("unknown period '{}'", raw))
}

fn parse_sentiment(raw: &str) -> Result<Sentiment, String> {
    Sentiment::from_label(raw).ok_or_else(|| format!("unknown sentiment '{}'", raw))
}

pub fn sentiment_filter(sentiment: Option<Sentiment>) -> SentimentFilter {
    sentiment.map_or(SentimentFilter::All, SentimentFilter::Only)
}

impl ReplyArgs {
    pub fn review_text(&self) -> String {
        self.review.join(" ")
    }

    pub fn to_request(&self) -> Result<ReplyRequest, String> {
        let text = self.review_text();
        if text.trim().is_empty() {
            return Err("Review text is required".into());
        }
        let mut request = ReplyRequest::new(&text, &self.name, self.tone.unwrap_or_default());
        request.manual_menu = self.menu.clone();
        request.store_name = self.store.clone();
        Ok(request)
    }
}
