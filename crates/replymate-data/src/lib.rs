//! Source-of-truth records for ReplyMate.
//!
//! Templates, menu facts, completed reviews, drafts and the store profile
//! each live in one JSON file under the data directory. The document store
//! is rebuilt from templates and menu facts, never the other way round.

pub mod records;
pub mod stats;
pub mod store;

pub use records::{
    now_timestamp, CompletedReview, Draft, DraftStatus, MenuItem, StoreProfile, Template,
    TemplateMetadata,
};
pub use stats::{ReviewPeriod, ReviewStats, SentimentFilter};
pub use store::{load_json, load_json_strict, save_json, DataStore};
