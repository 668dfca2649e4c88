//! ReplyMate Store: reply templates and menu facts with metadata filters
//! and int8 vector search over SQLite.

pub mod embedding;
pub mod filter;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use filter::MetadataFilter;
pub use sqlite::SqliteStore;
pub use types::*;
