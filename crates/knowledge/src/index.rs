//! SQLite-backed vector index for knowledge documents.

use crate::embeddings::cosine_similarity;
use crate::types::{Document, SourceType};
use crate::vector_index::VectorIndex;
use asha_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite vector index, one database file per source type.
///
/// Embeddings are stored as little-endian f32 BLOBs and scored with cosine
/// similarity at query time. The corpus is small (hundreds of listings and
/// events), so a full scan per query is fine.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    source_type: SourceType,
}

impl SqliteIndex {
    /// Open (or create) the index database at the given path.
    pub fn open(db_path: &Path, source_type: SourceType) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Index(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Index(format!("Failed to open SQLite index: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                source_type TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                fields TEXT NOT NULL,
                embedding BLOB NOT NULL,
                indexed_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Index(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Initialized SQLite index at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
            source_type,
        })
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Index("Index connection lock poisoned".to_string()))
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let embedding_bytes: Vec<u8> = row.get(4)?;
        let embedding = bytes_to_embedding(&embedding_bytes)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let fields_json: String = row.get(3)?;
        let fields = serde_json::from_str(&fields_json)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let source_type: String = row.get(1)?;
        let source_type = match source_type.as_str() {
            "session" => SourceType::Session,
            _ => SourceType::Job,
        };

        Ok(Document {
            id: row.get(0)?,
            source_type,
            raw_text: row.get(2)?,
            fields,
            embedding: Some(embedding),
        })
    }
}

impl VectorIndex for SqliteIndex {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn upsert_document(&self, document: &Document) -> AppResult<()> {
        let embedding = document
            .embedding
            .as_ref()
            .ok_or_else(|| AppError::Index("Document missing embedding".to_string()))?;
        let embedding_bytes = embedding_to_bytes(embedding);

        let fields_json = serde_json::to_string(&document.fields)
            .map_err(|e| AppError::Index(format!("Failed to serialize fields: {}", e)))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (id, source_type, raw_text, fields, embedding, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                document.id,
                document.source_type.as_str(),
                document.raw_text,
                fields_json,
                embedding_bytes,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to insert document: {}", e)))?;

        Ok(())
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(Document, f32)>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT id, source_type, raw_text, fields, embedding, indexed_at FROM documents")
            .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

        let documents_iter = stmt
            .query_map([], Self::row_to_document)
            .map_err(|e| AppError::Index(format!("Failed to query documents: {}", e)))?;

        let mut results: Vec<(Document, f32)> = documents_iter
            .filter_map(|r| r.ok())
            .map(|doc| {
                let score = doc
                    .embedding
                    .as_ref()
                    .map(|e| cosine_similarity(query_embedding, e))
                    .unwrap_or(0.0);
                (doc, score)
            })
            .collect();

        // Sort by score descending
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        tracing::debug!(
            "Retrieved {} documents (requested top-{})",
            results.len(),
            top_k
        );

        Ok(results)
    }

    fn list(&self) -> AppResult<Vec<Document>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT id, source_type, raw_text, fields, embedding, indexed_at FROM documents")
            .map_err(|e| AppError::Index(format!("Failed to prepare query: {}", e)))?;

        let documents = stmt
            .query_map([], Self::row_to_document)
            .map_err(|e| AppError::Index(format!("Failed to list documents: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(documents)
    }

    fn count(&self) -> AppResult<u32> {
        let conn = self.lock()?;

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| {
                row.get::<_, i64>(0).map(|v| v as u32)
            })
            .map_err(|e| AppError::Index(format!("Failed to count documents: {}", e)))?;

        Ok(count)
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM documents", [])
            .map_err(|e| AppError::Index(format!("Failed to delete documents: {}", e)))?;

        tracing::info!("Reset {} index", self.source_type.as_str());
        Ok(())
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Index("Invalid embedding bytes length".to_string()));
    }

    let mut embedding = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        embedding.push(value);
    }

    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    /// Helper to create a test document with embedding.
    fn create_test_document(id: &str, text: &str, embedding: Vec<f32>) -> Document {
        Document {
            id: id.to_string(),
            source_type: SourceType::Job,
            raw_text: text.to_string(),
            fields: BTreeMap::new(),
            embedding: Some(embedding),
        }
    }

    /// Helper to create a normalized embedding.
    fn normalize(v: &[f32]) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter().map(|x| x / norm).collect()
        } else {
            v.to_vec()
        }
    }

    #[test]
    fn test_open_creates_tables() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_search() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();

        let doc = create_test_document("job-1", "test text", vec![1.0, 0.0, 0.0]);
        index.upsert_document(&doc).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "job-1");
        assert!((results[0].1 - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();

        let doc = create_test_document("job-1", "first", vec![1.0, 0.0, 0.0]);
        index.upsert_document(&doc).unwrap();

        let doc2 = create_test_document("job-1", "second", vec![0.0, 1.0, 0.0]);
        index.upsert_document(&doc2).unwrap();

        assert_eq!(index.count().unwrap(), 1);
        let docs = index.list().unwrap();
        assert_eq!(docs[0].raw_text, "second");
    }

    #[test]
    fn test_scores_are_ordered_descending() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();

        let docs = vec![
            create_test_document("d1", "Text A", normalize(&[1.0, 0.0, 0.0])),
            create_test_document("d2", "Text B", normalize(&[0.7, 0.7, 0.0])),
            create_test_document("d3", "Text C", normalize(&[0.0, 1.0, 0.0])),
            create_test_document("d4", "Text D", normalize(&[-1.0, 0.0, 0.0])),
        ];

        for doc in docs {
            index.upsert_document(&doc).unwrap();
        }

        let query_embedding = normalize(&[1.0, 0.0, 0.0]);
        let results = index.search(&query_embedding, 10).unwrap();

        for i in 1..results.len() {
            assert!(
                results[i - 1].1 >= results[i].1,
                "Scores should be ordered: {} >= {}",
                results[i - 1].1,
                results[i].1
            );
        }

        assert_eq!(results[0].0.id, "d1");
        assert!(results[0].1 > 0.99, "Perfect match should score near 1.0");
    }

    #[test]
    fn test_top_k_limit_respected() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Session).unwrap();

        for i in 0..10 {
            let doc = create_test_document(
                &format!("d{}", i),
                &format!("Text {}", i),
                normalize(&[i as f32 / 10.0, 1.0, 0.0]),
            );
            index.upsert_document(&doc).unwrap();
        }

        let query_embedding = normalize(&[1.0, 0.0, 0.0]);
        let results = index.search(&query_embedding, 3).unwrap();

        assert_eq!(results.len(), 3, "Should return exactly top_k results");
    }

    #[test]
    fn test_empty_index_returns_no_results() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();

        let results = index.search(&normalize(&[1.0, 0.0, 0.0]), 5).unwrap();
        assert_eq!(results.len(), 0, "Empty index should return no results");
    }

    #[test]
    fn test_reset_clears_documents() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();

        let doc = create_test_document("job-1", "text", vec![1.0, 0.0]);
        index.upsert_document(&doc).unwrap();
        assert_eq!(index.count().unwrap(), 1);

        index.reset().unwrap();
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn test_fields_round_trip() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();

        let mut fields = BTreeMap::new();
        fields.insert("company_name".to_string(), "TechCorp".to_string());
        fields.insert("location".to_string(), "Bangalore".to_string());

        let doc = Document {
            id: "job-1".to_string(),
            source_type: SourceType::Job,
            raw_text: "text".to_string(),
            fields,
            embedding: Some(vec![1.0, 0.0]),
        };
        index.upsert_document(&doc).unwrap();

        let docs = index.list().unwrap();
        assert_eq!(docs[0].field("company_name"), Some("TechCorp"));
        assert_eq!(docs[0].field("location"), Some("Bangalore"));
    }
}
