//! SQLite-backed document store with metadata filtering and int8 vector search.
//!
//! Documents live in named collections. Each collection is a secondary index
//! rebuilt from the template/menu records, so writes favour whole-collection
//! replacement inside one transaction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::embedding::{normalize, QuantizedEmbedding};
use crate::filter::MetadataFilter;
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use replymate_core::{Error, Result};

/// SQLite document store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
    /// Normalized embeddings of every stored document: (N, dim) float32.
    embedding_matrix: Mutex<EmbeddingMatrix>,
}

struct EmbeddingMatrix {
    matrix: Array2<f32>,
    /// Row owner and its metadata, so filters apply before ranking.
    entries: Vec<MatrixEntry>,
    dirty: bool,
}

struct MatrixEntry {
    collection: String,
    doc_id: String,
    metadata: Metadata,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create the store at `db_dir/replymate.db`.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("replymate.db");

        let conn = Connection::open(&db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
            embedding_matrix: Mutex::new(EmbeddingMatrix {
                matrix: Array2::zeros((0, embedding_dim)),
                entries: Vec::new(),
                dirty: true,
            }),
        };

        store.load_embedding_matrix()?;

        info!(
            "SqliteStore initialized: {} documents, dim={}, path={}",
            store.count_documents(None)?,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Insert or replace documents by id within one transaction.
    pub fn upsert_documents(&self, collection: &str, docs: &[EmbeddedDocument]) -> Result<usize> {
        self.check_dimensions(docs)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        for doc in docs {
            tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, doc.document.id],
            )
            .map_err(db_err)?;
            Self::insert_document(&tx, collection, doc)?;
        }
        tx.commit().map_err(db_err)?;
        drop(conn);

        self.mark_dirty();
        debug!("Upserted {} documents into '{}'", docs.len(), collection);
        Ok(docs.len())
    }

    /// Swap the whole collection for `docs` atomically.
    ///
    /// Readers observe either the previous collection or the new one.
    pub fn replace_collection(&self, collection: &str, docs: &[EmbeddedDocument]) -> Result<usize> {
        self.check_dimensions(docs)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let removed = tx
            .execute("DELETE FROM documents WHERE collection = ?1", params![collection])
            .map_err(db_err)?;
        let mut inserted = 0;
        for doc in docs {
            // Identical template rows collapse into one document.
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, doc.document.id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            if exists.is_some() {
                continue;
            }
            Self::insert_document(&tx, collection, doc)?;
            inserted += 1;
        }
        tx.commit().map_err(db_err)?;
        drop(conn);

        self.mark_dirty();
        info!(
            "Replaced collection '{}': removed {}, inserted {}",
            collection, removed, inserted
        );
        Ok(inserted)
    }

    fn insert_document(conn: &Connection, collection: &str, doc: &EmbeddedDocument) -> Result<()> {
        let d = &doc.document;
        let meta_json = serde_json::to_string(&d.metadata)?;
        conn.prepare_cached(
            "INSERT INTO documents (collection, id, content, metadata_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(db_err)?
        .execute(params![
            collection,
            d.id,
            d.content,
            meta_json,
            chrono::Utc::now().timestamp_millis()
        ])
        .map_err(db_err)?;

        let mut meta_stmt = conn
            .prepare_cached(
                "INSERT INTO document_metadata (collection, doc_id, key, value) VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(db_err)?;
        for (k, v) in &d.metadata {
            meta_stmt
                .execute(params![collection, d.id, k, v])
                .map_err(db_err)?;
        }

        if let Some(embedding) = &doc.embedding {
            let q = QuantizedEmbedding::quantize(embedding);
            conn.prepare_cached(
                "INSERT INTO document_embeddings (collection, doc_id, embedding, scale, offset_val) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(db_err)?
            .execute(params![collection, d.id, q.bytes, q.scale, q.offset])
            .map_err(db_err)?;
        }
        Ok(())
    }

    fn check_dimensions(&self, docs: &[EmbeddedDocument]) -> Result<()> {
        for doc in docs {
            if let Some(e) = &doc.embedding {
                if e.len() != self.embedding_dim {
                    return Err(Error::Storage(format!(
                        "Embedding dimension mismatch for {}: expected {}, got {}",
                        doc.document.id,
                        self.embedding_dim,
                        e.len()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Delete every document in a collection.
    pub fn delete_collection(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM documents WHERE collection = ?1", params![collection])
            .map_err(db_err)?;
        drop(conn);
        self.mark_dirty();
        Ok(count)
    }

    /// Delete specific documents by id.
    pub fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(db_err)?;
        let mut count = 0;
        for id in ids {
            count += tx
                .execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                )
                .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        drop(conn);
        self.mark_dirty();
        Ok(count)
    }

    fn mark_dirty(&self) {
        self.embedding_matrix.lock().dirty = true;
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached(
                "SELECT id, content, metadata_json FROM documents WHERE collection = ?1 AND id = ?2",
            )
            .map_err(db_err)?
            .query_row(params![collection, id], |row| Ok(Self::row_to_document(row)))
            .optional()
            .map_err(db_err)?;
        Ok(row)
    }

    /// Metadata equality lookup, in insertion order, without ranking.
    pub fn exact_lookup(
        &self,
        collection: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let mut sql =
            String::from("SELECT d.id, d.content, d.metadata_json FROM documents d WHERE d.collection = ?");
        let mut args: Vec<Value> = vec![Value::Text(collection.to_string())];

        if let Some(f) = filter {
            for (key, value) in f.clauses() {
                sql.push_str(
                    " AND EXISTS (SELECT 1 FROM document_metadata m \
                     WHERE m.collection = d.collection AND m.doc_id = d.id \
                     AND m.key = ? AND m.value = ?)",
                );
                args.push(Value::Text(key.to_string()));
                args.push(Value::Text(value.to_string()));
            }
        }
        sql.push_str(" ORDER BY d.rowid LIMIT ?");
        args.push(Value::Integer(limit as i64));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| Ok(Self::row_to_document(row)))
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Rank a collection's documents by cosine distance to `query_embedding`.
    ///
    /// Falls back to unranked [`exact_lookup`](Self::exact_lookup) order when
    /// there is no query vector or the collection holds no embeddings.
    pub fn similarity_search(
        &self,
        collection: &str,
        query_embedding: Option<&Array1<f32>>,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = match query_embedding {
            Some(q) => {
                if q.len() != self.embedding_dim {
                    return Err(Error::Storage(format!(
                        "Query dimension mismatch: expected {}, got {}",
                        self.embedding_dim,
                        q.len()
                    )));
                }
                normalize(q)
            }
            None => None,
        };

        self.ensure_matrix_loaded()?;

        let ranked: Option<Vec<(String, f32)>> = {
            let mat = self.embedding_matrix.lock();
            let in_collection: Vec<usize> = mat
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.collection == collection)
                .map(|(i, _)| i)
                .collect();

            match query {
                Some(q) if !in_collection.is_empty() => {
                    let mut scored: Vec<(usize, f32)> = in_collection
                        .into_iter()
                        .filter(|&i| filter.map_or(true, |f| f.matches(&mat.entries[i].metadata)))
                        .map(|i| (i, 1.0 - mat.matrix.row(i).dot(&q)))
                        .collect();
                    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
                    scored.truncate(k);
                    Some(
                        scored
                            .into_iter()
                            .map(|(i, d)| (mat.entries[i].doc_id.clone(), d))
                            .collect(),
                    )
                }
                _ => None,
            }
        };

        match ranked {
            Some(hits) => {
                let mut results = Vec::with_capacity(hits.len());
                for (id, distance) in hits {
                    if let Some(document) = self.get_document(collection, &id)? {
                        results.push(ScoredDocument {
                            document,
                            distance: Some(distance),
                        });
                    }
                }
                Ok(results)
            }
            None => Ok(self
                .exact_lookup(collection, filter, k)?
                .into_iter()
                .map(|document| ScoredDocument {
                    document,
                    distance: None,
                })
                .collect()),
        }
    }

    /// Count documents, optionally within one collection.
    pub fn count_documents(&self, collection: Option<&str>) -> Result<i64> {
        let conn = self.conn.lock();
        let count: i64 = match collection {
            Some(c) => conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                    params![c],
                    |row| row.get(0),
                )
                .map_err(db_err)?,
            None => conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .map_err(db_err)?,
        };
        Ok(count)
    }

    // ---------------------------------------------------------------
    // Embedding matrix
    // ---------------------------------------------------------------

    fn load_embedding_matrix(&self) -> Result<()> {
        let mut entries = Vec::new();
        let mut embeddings: Vec<Array1<f32>> = Vec::new();

        {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT e.collection, e.doc_id, e.embedding, e.scale, e.offset_val, d.metadata_json \
                     FROM document_embeddings e \
                     JOIN documents d ON d.collection = e.collection AND d.id = e.doc_id \
                     ORDER BY d.rowid",
                )
                .map_err(db_err)?;

            let rows = stmt
                .query_map([], |row| {
                    let collection: String = row.get(0)?;
                    let doc_id: String = row.get(1)?;
                    let bytes: Vec<u8> = row.get(2)?;
                    let scale: f64 = row.get(3)?;
                    let offset: f64 = row.get(4)?;
                    let meta_json: String = row.get(5)?;
                    Ok((collection, doc_id, bytes, scale as f32, offset as f32, meta_json))
                })
                .map_err(db_err)?;

            for row in rows {
                let (collection, doc_id, bytes, scale, offset, meta_json) = row.map_err(db_err)?;
                let q = QuantizedEmbedding {
                    bytes,
                    scale,
                    offset,
                };
                if q.dimension() != self.embedding_dim {
                    debug!("Skipping embedding for {} with dim {}", doc_id, q.dimension());
                    continue;
                }
                let Some(normalized) = normalize(&q.dequantize()) else {
                    continue;
                };
                embeddings.push(normalized);
                entries.push(MatrixEntry {
                    collection,
                    doc_id,
                    metadata: serde_json::from_str(&meta_json).unwrap_or_default(),
                });
            }
        }

        let mut matrix = Array2::zeros((embeddings.len(), self.embedding_dim));
        for (i, emb) in embeddings.iter().enumerate() {
            matrix.row_mut(i).assign(emb);
        }

        let mut mat = self.embedding_matrix.lock();
        mat.matrix = matrix;
        mat.entries = entries;
        mat.dirty = false;
        debug!("Loaded {} embeddings into matrix", mat.entries.len());
        Ok(())
    }

    fn ensure_matrix_loaded(&self) -> Result<()> {
        if self.embedding_matrix.lock().dirty {
            self.load_embedding_matrix()?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Stats
    // ---------------------------------------------------------------

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total_documents = self.count_documents(None)?;
        let embeddings_stored: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM document_embeddings", [], |row| row.get(0))
            .map_err(db_err)?;

        let db_size = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);
        self.ensure_matrix_loaded()?;
        let matrix_rows = self.embedding_matrix.lock().matrix.nrows();

        Ok(StoreStats {
            total_documents,
            embeddings_stored,
            embedding_dimension: self.embedding_dim,
            db_path: self.db_path.to_string_lossy().to_string(),
            db_size_mb: db_size as f64 / (1024.0 * 1024.0),
            matrix_rows,
        })
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> Document {
        let metadata: BTreeMap<String, String> = row
            .get::<_, String>(2)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Document {
            id: row.get(0).unwrap_or_default(),
            content: row.get(1).unwrap_or_default(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), DIM).unwrap();
        (store, dir)
    }

    fn doc(content: &str, pairs: &[(&str, &str)], emb: Option<[f32; DIM]>) -> EmbeddedDocument {
        let metadata = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EmbeddedDocument {
            document: Document::new(content, metadata),
            embedding: emb.map(|e| Array1::from_vec(e.to_vec())),
        }
    }

    fn seed(store: &SqliteStore) {
        store
            .replace_collection(
                "reply_data",
                &[
                    doc("감사합니다 고객님", &[("type", "template"), ("sentiment", "positive"), ("tone", "polite")], Some([1.0, 0.0, 0.0, 0.0])),
                    doc("또 오세요~ ^^", &[("type", "template"), ("sentiment", "positive"), ("tone", "friendly")], Some([0.9, 0.1, 0.0, 0.0])),
                    doc("늦어서 죄송해요 ㅠㅠ", &[("type", "template"), ("sentiment", "negative"), ("tone", "friendly")], Some([0.0, 1.0, 0.0, 0.0])),
                    doc("메뉴명: 돈까스 / 특징: 소스는 따로", &[("type", "menu"), ("name", "돈까스")], Some([0.0, 0.0, 1.0, 0.0])),
                    doc("메뉴명: 족발 / 특징: 전자레인지 30초", &[("type", "menu"), ("name", "족발")], Some([0.0, 0.0, 0.0, 1.0])),
                ],
            )
            .unwrap();
    }

    #[test]
    fn test_replace_and_count() {
        let (store, _dir) = test_store();
        seed(&store);
        assert_eq!(store.count_documents(Some("reply_data")).unwrap(), 5);
        assert_eq!(store.count_documents(Some("other")).unwrap(), 0);

        // Second replace swaps, not appends.
        store
            .replace_collection("reply_data", &[doc("only", &[("type", "template")], None)])
            .unwrap();
        assert_eq!(store.count_documents(None).unwrap(), 1);
    }

    #[test]
    fn test_replace_collapses_duplicates() {
        let (store, _dir) = test_store();
        let d = doc("dup", &[("type", "template")], None);
        let inserted = store.replace_collection("c", &[d.clone(), d]).unwrap();
        assert_eq!(inserted, 1);
    }

    #[test]
    fn test_exact_lookup_by_name() {
        let (store, _dir) = test_store();
        seed(&store);

        let filter = MetadataFilter::And(vec![
            MetadataFilter::eq("type", "menu"),
            MetadataFilter::eq("name", "돈까스"),
        ]);
        let hits = store.exact_lookup("reply_data", Some(&filter), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("돈까스"));

        let none = store
            .exact_lookup("reply_data", Some(&MetadataFilter::eq("name", "냉면")), 1)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_similarity_search_with_filter() {
        let (store, _dir) = test_store();
        seed(&store);

        let query = Array1::from_vec(vec![1.0, 0.05, 0.0, 0.0]);
        let filter = MetadataFilter::all(vec![
            MetadataFilter::eq("sentiment", "positive"),
            MetadataFilter::eq("tone", "friendly"),
        ]);
        let hits = store
            .similarity_search("reply_data", Some(&query), 3, filter.as_ref())
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.content, "또 오세요~ ^^");
        assert!(hits[0].distance.unwrap() < 0.1);
    }

    #[test]
    fn test_similarity_search_ranks_by_distance() {
        let (store, _dir) = test_store();
        seed(&store);

        let query = Array1::from_vec(vec![0.0, 0.0, 0.1, 1.0]);
        let hits = store
            .similarity_search("reply_data", Some(&query), 2, Some(&MetadataFilter::eq("type", "menu")))
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].document.content.contains("족발"));
        assert!(hits[0].distance.unwrap() <= hits[1].distance.unwrap());
    }

    #[test]
    fn test_similarity_search_without_embeddings_is_unranked() {
        let (store, _dir) = test_store();
        store
            .replace_collection(
                "plain",
                &[
                    doc("a", &[("sentiment", "positive")], None),
                    doc("b", &[("sentiment", "negative")], None),
                ],
            )
            .unwrap();

        let hits = store
            .similarity_search("plain", None, 5, Some(&MetadataFilter::eq("sentiment", "negative")))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.content, "b");
        assert!(hits[0].distance.is_none());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let (store, _dir) = test_store();
        let bad = EmbeddedDocument {
            document: Document::new("x", Metadata::new()),
            embedding: Some(Array1::zeros(DIM + 1)),
        };
        assert!(matches!(store.upsert_documents("c", &[bad]), Err(Error::Storage(_))));
    }

    #[test]
    fn test_delete_by_ids_cascades() {
        let (store, _dir) = test_store();
        seed(&store);
        let victim = store
            .exact_lookup("reply_data", Some(&MetadataFilter::eq("name", "족발")), 1)
            .unwrap()
            .remove(0);

        assert_eq!(store.delete_by_ids("reply_data", &[victim.id.clone()]).unwrap(), 1);
        assert!(store.get_document("reply_data", &victim.id).unwrap().is_none());

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_documents, 4);
        assert_eq!(stats.embeddings_stored, 4);
        assert_eq!(stats.matrix_rows, 4);

        assert_eq!(store.delete_collection("reply_data").unwrap(), 4);
        assert_eq!(store.get_stats().unwrap().embeddings_stored, 0);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (store, _dir) = test_store();
        let d = doc("same", &[("type", "template")], Some([0.5, 0.5, 0.0, 0.0]));
        store.upsert_documents("c", &[d.clone()]).unwrap();
        store.upsert_documents("c", &[d]).unwrap();
        assert_eq!(store.count_documents(Some("c")).unwrap(), 1);
    }

    #[test]
    fn test_reopen_reloads_matrix() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path(), DIM).unwrap();
            seed(&store);
        }
        let store = SqliteStore::open(dir.path(), DIM).unwrap();
        assert_eq!(store.get_stats().unwrap().matrix_rows, 5);
    }
}
