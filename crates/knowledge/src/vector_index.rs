//! Vector index abstraction for knowledge documents.
//!
//! Defines a trait for provider-agnostic vector storage and retrieval.
//! The pipeline treats indexes as read-mostly external services; the
//! ingestion path is the only writer.

use crate::types::{Document, SourceType};
use asha_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting documents with embeddings (ingestion path)
/// - Searching for similar vectors (top-k, descending score)
/// - Listing and counting documents
/// - Resetting/clearing the index
pub trait VectorIndex: Send + Sync {
    /// Which source this index holds.
    fn source_type(&self) -> SourceType;

    /// Insert or update a document with its embedding in the index.
    fn upsert_document(&self, document: &Document) -> AppResult<()>;

    /// Search for the top-k most similar documents to the query embedding.
    ///
    /// Returns documents ordered by descending similarity score.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(Document, f32)>>;

    /// List all documents in the index.
    fn list(&self) -> AppResult<Vec<Document>>;

    /// Number of indexed documents.
    fn count(&self) -> AppResult<u32>;

    /// Reset the index, removing all documents.
    fn reset(&self) -> AppResult<()>;
}
