//! Knowledge indexers for the job and session sources.
//!
//! Turns structured records into searchable documents with metadata and
//! maintains a vector index per source. Conversion of raw CSV/JSON feeds
//! into records happens upstream; the indexers receive parsed records.

use crate::embeddings::EmbeddingProvider;
use crate::types::{Document, IndexStats, JobRecord, SessionRecord, SourceType};
use crate::vector_index::VectorIndex;
use asha_core::{AppError, AppResult};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Build the searchable document for one job listing.
///
/// Missing optional fields get the same placeholder text the listings feed
/// uses, so rendered context never shows empty slots.
pub fn job_document(record: &JobRecord) -> Document {
    let location = record.location.clone().unwrap_or_else(|| "Not specified".to_string());
    let description = record
        .job_description
        .clone()
        .unwrap_or_else(|| "No description provided".to_string());
    let experience = record
        .experience_required
        .clone()
        .unwrap_or_else(|| "Not specified".to_string());
    let skills = record
        .skills_required
        .clone()
        .unwrap_or_else(|| "Not specified".to_string());
    let job_type = record.job_type.clone().unwrap_or_else(|| "Not specified".to_string());
    let remote = record
        .remote_option
        .clone()
        .unwrap_or_else(|| "Not specified".to_string());
    let salary = record
        .salary_range
        .clone()
        .unwrap_or_else(|| "Not disclosed".to_string());

    let raw_text = format!(
        "Job Title: {}\nCompany: {}\nLocation: {}\nExperience Required: {}\n\
         Skills Required: {}\nJob Type: {}\nRemote Option: {}\nSalary Range: {}\nDescription: {}",
        record.job_title,
        record.company_name,
        location,
        experience,
        skills,
        job_type,
        remote,
        salary,
        description,
    );

    let mut fields = BTreeMap::new();
    fields.insert("job_title".to_string(), record.job_title.clone());
    fields.insert("company_name".to_string(), record.company_name.clone());
    fields.insert("location".to_string(), location);
    fields.insert("job_type".to_string(), job_type);
    fields.insert("remote_option".to_string(), remote);
    fields.insert("skills_required".to_string(), skills);
    if let Some(ref posted) = record.posted_date {
        fields.insert("posted_date".to_string(), posted.clone());
    }

    Document {
        id: format!("job-{}", record.job_id),
        source_type: SourceType::Job,
        raw_text,
        fields,
        embedding: None,
    }
}

/// Build the searchable document for one session/event.
pub fn session_document(record: &SessionRecord) -> Document {
    let session_type = record
        .session_type
        .clone()
        .unwrap_or_else(|| "Not specified".to_string());
    let location = record.location.clone().unwrap_or_else(|| "Online".to_string());
    let speaker = record.speaker.clone().unwrap_or_else(|| "To be announced".to_string());
    let description = record.description.clone().unwrap_or_default();

    let raw_text = format!(
        "Event: {}\nDate: {}\nType: {}\nLocation: {}\nSpeaker: {}\n{}",
        record.session_name, record.session_date, session_type, location, speaker, description,
    );

    let mut fields = BTreeMap::new();
    fields.insert("session_name".to_string(), record.session_name.clone());
    fields.insert("session_date".to_string(), record.session_date.clone());
    fields.insert("session_type".to_string(), session_type);
    fields.insert("location".to_string(), location);
    fields.insert("speaker".to_string(), speaker);

    Document {
        id: format!("session-{}", record.session_id),
        source_type: SourceType::Session,
        raw_text: raw_text.trim_end().to_string(),
        fields,
        embedding: None,
    }
}

/// Index job listing records into the jobs index.
pub async fn index_jobs(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    records: &[JobRecord],
) -> AppResult<IndexStats> {
    let documents: Vec<Document> = records.iter().map(job_document).collect();
    index_documents(index, provider, documents).await
}

/// Index session/event records into the sessions index.
pub async fn index_sessions(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    records: &[SessionRecord],
) -> AppResult<IndexStats> {
    let documents: Vec<Document> = records.iter().map(session_document).collect();
    index_documents(index, provider, documents).await
}

/// Embed and upsert a batch of documents.
async fn index_documents(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    mut documents: Vec<Document>,
) -> AppResult<IndexStats> {
    let source_type = index.source_type();

    tracing::info!(
        "Indexing {} {} documents using '{}' embeddings",
        documents.len(),
        source_type.as_str(),
        provider.provider_name()
    );

    let texts: Vec<String> = documents.iter().map(|d| d.raw_text.clone()).collect();
    let embeddings = provider.embed_batch(&texts).await?;

    if embeddings.len() != documents.len() {
        return Err(AppError::Embedding(format!(
            "Embedding count mismatch: {} texts, {} vectors",
            documents.len(),
            embeddings.len()
        )));
    }

    for (document, embedding) in documents.iter_mut().zip(embeddings) {
        document.embedding = Some(embedding);
        index.upsert_document(document)?;
    }

    let stats = IndexStats {
        source_type,
        documents: index.count()?,
    };

    tracing::info!(
        "Indexed {} documents into the {} index",
        stats.documents,
        source_type.as_str()
    );

    Ok(stats)
}

/// List upcoming sessions, soonest first.
///
/// Sessions whose date fails to parse are skipped rather than failing the
/// listing.
pub fn upcoming_sessions(
    index: &dyn VectorIndex,
    after: NaiveDate,
    limit: usize,
) -> AppResult<Vec<Document>> {
    let mut dated: Vec<(NaiveDate, Document)> = index
        .list()?
        .into_iter()
        .filter_map(|doc| {
            let date = doc
                .field("session_date")
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
            (date >= after).then_some((date, doc))
        })
        .collect();

    dated.sort_by_key(|(date, _)| *date);

    Ok(dated.into_iter().take(limit).map(|(_, doc)| doc).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::trigram::TrigramProvider;
    use crate::index::SqliteIndex;
    use tempfile::NamedTempFile;

    fn sample_job(id: u32, title: &str, company: &str) -> JobRecord {
        JobRecord {
            job_id: id,
            job_title: title.to_string(),
            company_name: company.to_string(),
            location: Some("Bangalore".to_string()),
            job_description: Some(format!("{} role", title)),
            experience_required: Some("3-5 years".to_string()),
            skills_required: None,
            job_type: Some("Full-time".to_string()),
            remote_option: Some("Yes".to_string()),
            salary_range: None,
            posted_date: Some("2025-07-01".to_string()),
        }
    }

    fn sample_session(id: u32, name: &str, date: &str) -> SessionRecord {
        SessionRecord {
            session_id: id,
            session_name: name.to_string(),
            session_date: date.to_string(),
            session_type: Some("Workshop".to_string()),
            location: None,
            speaker: Some("Priya Sharma".to_string()),
            description: None,
        }
    }

    #[test]
    fn test_job_document_placeholders() {
        let record = JobRecord {
            job_id: 1,
            job_title: "Content Writer".to_string(),
            company_name: "ContentKing".to_string(),
            location: None,
            job_description: None,
            experience_required: None,
            skills_required: None,
            job_type: None,
            remote_option: None,
            salary_range: None,
            posted_date: None,
        };

        let doc = job_document(&record);
        assert_eq!(doc.id, "job-1");
        assert!(doc.raw_text.contains("Salary Range: Not disclosed"));
        assert!(doc.raw_text.contains("Description: No description provided"));
        assert_eq!(doc.field("location"), Some("Not specified"));
    }

    #[test]
    fn test_session_document_fields() {
        let record = sample_session(3, "Leadership Circle", "2025-09-12");
        let doc = session_document(&record);

        assert_eq!(doc.id, "session-3");
        assert_eq!(doc.source_type, SourceType::Session);
        assert_eq!(doc.field("session_date"), Some("2025-09-12"));
        assert!(doc.raw_text.contains("Speaker: Priya Sharma"));
    }

    #[tokio::test]
    async fn test_index_jobs_end_to_end() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();
        let provider = TrigramProvider::new(384);

        let records = vec![
            sample_job(1, "Marketing Manager", "MarketingPro"),
            sample_job(2, "Data Scientist", "DataWorks"),
        ];

        let stats = index_jobs(&index, &provider, &records).await.unwrap();
        assert_eq!(stats.documents, 2);

        // The marketing query should rank the marketing job first
        let query = provider.embed("marketing campaigns manager").await.unwrap();
        let results = index.search(&query, 2).unwrap();
        assert_eq!(results[0].0.id, "job-1");
    }

    #[tokio::test]
    async fn test_reindex_replaces_documents() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Job).unwrap();
        let provider = TrigramProvider::new(384);

        let records = vec![sample_job(1, "Marketing Manager", "MarketingPro")];
        index_jobs(&index, &provider, &records).await.unwrap();
        index_jobs(&index, &provider, &records).await.unwrap();

        assert_eq!(index.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upcoming_sessions_ordered_and_bounded() {
        let temp_file = NamedTempFile::new().unwrap();
        let index = SqliteIndex::open(temp_file.path(), SourceType::Session).unwrap();
        let provider = TrigramProvider::new(384);

        let records = vec![
            sample_session(1, "Resume Clinic", "2025-10-01"),
            sample_session(2, "Mentorship Kickoff", "2025-08-20"),
            sample_session(3, "Past Event", "2025-01-15"),
            sample_session(4, "Tech Talks", "2025-09-05"),
        ];
        index_sessions(&index, &provider, &records).await.unwrap();

        let after = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let upcoming = upcoming_sessions(&index, after, 2).unwrap();

        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].id, "session-2");
        assert_eq!(upcoming[1].id, "session-4");
    }
}
