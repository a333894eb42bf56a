//! Knowledge source type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which structured source a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Job listings
    Job,
    /// Community sessions and events
    Session,
}

impl SourceType {
    /// Canonical name used in logs, database rows, and source references.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Session => "session",
        }
    }

    /// Database file name for this source's index.
    pub fn index_file(&self) -> &'static str {
        match self {
            Self::Job => "jobs.db",
            Self::Session => "sessions.db",
        }
    }

    /// Structured field used by the retrieval diversity rule.
    ///
    /// At most a handful of results may share the same value of this field,
    /// so answers don't collapse onto one employer or one event date.
    pub fn key_field(&self) -> &'static str {
        match self {
            Self::Job => "company_name",
            Self::Session => "session_date",
        }
    }
}

/// A searchable document built from one source record.
///
/// Documents are immutable once indexed; re-indexing a source replaces its
/// documents wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: String,

    /// Originating source
    pub source_type: SourceType,

    /// Combined text used for embedding and snippets
    pub raw_text: String,

    /// Source-specific structured fields (field name to value)
    pub fields: BTreeMap<String, String>,

    /// Embedding vector (normalized)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Look up a structured field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A job listing record as produced by the ingestion path.
///
/// Optional fields may be absent in the source data; the indexer fills
/// them with the same placeholders the listings feed uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: u32,
    pub job_title: String,
    pub company_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub experience_required: Option<String>,
    #[serde(default)]
    pub skills_required: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub remote_option: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub posted_date: Option<String>,
}

/// A community session/event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: u32,
    pub session_name: String,
    /// ISO date (YYYY-MM-DD)
    pub session_date: String,
    #[serde(default)]
    pub session_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Statistics for one source index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Which source the index holds
    pub source_type: SourceType,

    /// Number of indexed documents
    pub documents: u32,
}
