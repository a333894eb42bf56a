//! Knowledge source management for the Asha assistant.
//!
//! Two structured sources back the assistant: job listings and community
//! sessions/events. This crate turns their records into searchable
//! documents, embeds them, and stores them in per-source vector indexes.

pub mod embeddings;
pub mod index;
pub mod indexer;
pub mod types;
pub mod vector_index;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::SqliteIndex;
pub use indexer::{index_jobs, index_sessions, upcoming_sessions};
pub use types::{Document, IndexStats, JobRecord, SessionRecord, SourceType};
pub use vector_index::VectorIndex;
