//! Database schema SQL.

/// Documents, their flattened metadata and quantized embeddings.
///
/// Every row is scoped by `collection`; metadata and embeddings cascade with
/// their document.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE TABLE IF NOT EXISTS document_metadata (
    collection TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (collection, doc_id, key),
    FOREIGN KEY (collection, doc_id) REFERENCES documents(collection, id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_metadata_kv ON document_metadata(collection, key, value);

CREATE TABLE IF NOT EXISTS document_embeddings (
    collection TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    embedding BLOB NOT NULL,
    scale REAL NOT NULL,
    offset_val REAL NOT NULL,
    PRIMARY KEY (collection, doc_id),
    FOREIGN KEY (collection, doc_id) REFERENCES documents(collection, id) ON DELETE CASCADE
);
"#;
