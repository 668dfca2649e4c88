//! ReplyMate Core: error taxonomy, review labels, configuration and data paths.

pub mod config;
pub mod error;
pub mod labels;

pub use config::{DataPaths, PipelineSettings, ReplyMateConfig};
pub use error::{Error, Result};
pub use labels::{Category, Sentiment, Tone};
