//! Intent-directed semantic retrieval.
//!
//! Embeds the (possibly reframed) query, searches the index matching the
//! routed intent, and filters the candidates: a minimum-relevance cutoff
//! keeps noise out of the prompt, and a diversity rule stops one employer
//! or one event date from monopolizing the results.
//!
//! Retrieval never fails a turn. Index or embedding trouble produces an
//! empty, degraded-flagged result and the answer proceeds ungrounded.

use crate::types::{QueryIntent, RetrievalResult, ScoredDocument};
use asha_core::config::PipelineSettings;
use asha_knowledge::{Document, EmbeddingProvider, SourceType, VectorIndex};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How many extra candidates to pull so the diversity pass has options.
const CANDIDATE_FACTOR: usize = 4;

/// Tuning for one retriever instance.
#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    /// Maximum documents returned
    pub top_k: usize,

    /// Minimum cosine similarity for a document to count as relevant
    pub min_relevance: f32,

    /// Maximum results sharing the same key field value
    pub max_per_key_field: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance: 0.20,
            max_per_key_field: 2,
        }
    }
}

impl RetrieverOptions {
    /// Derive options from the application pipeline settings.
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            top_k: settings.top_k,
            min_relevance: settings.min_relevance,
            max_per_key_field: settings.max_per_key_field,
        }
    }
}

/// Searches the per-source vector indexes on behalf of the pipeline.
///
/// Stateless across turns; all inputs arrive by value per call.
pub struct Retriever {
    jobs: Arc<dyn VectorIndex>,
    sessions: Arc<dyn VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    options: RetrieverOptions,
}

impl Retriever {
    /// Create a retriever over the two source indexes.
    pub fn new(
        jobs: Arc<dyn VectorIndex>,
        sessions: Arc<dyn VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        options: RetrieverOptions,
    ) -> Self {
        Self {
            jobs,
            sessions,
            provider,
            options,
        }
    }

    /// Retrieve supporting documents for a turn.
    ///
    /// General and out-of-scope intents retrieve nothing. Infrastructure
    /// failures are absorbed into an empty result with the degraded flag
    /// set.
    pub async fn retrieve(&self, intent: QueryIntent, query: &str) -> RetrievalResult {
        let source = match intent.source() {
            Some(source) => source,
            None => return RetrievalResult::empty(),
        };

        let query_embedding = match self.provider.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Embedding unavailable, retrieval degraded: {}", e);
                return RetrievalResult::degraded();
            }
        };

        let index = match source {
            SourceType::Job => &self.jobs,
            SourceType::Session => &self.sessions,
        };

        let candidates = match index.search(&query_embedding, self.options.top_k * CANDIDATE_FACTOR)
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    "{} index unavailable, retrieval degraded: {}",
                    source.as_str(),
                    e
                );
                return RetrievalResult::degraded();
            }
        };

        let hits = self.filter_candidates(source, candidates);

        tracing::info!(
            "Retrieved {} {} documents for intent {}",
            hits.len(),
            source.as_str(),
            intent.as_str()
        );

        RetrievalResult {
            hits,
            degraded: false,
        }
    }

    /// Apply the relevance cutoff, the diversity rule, and the top-k cap.
    fn filter_candidates(
        &self,
        source: SourceType,
        candidates: Vec<(Document, f32)>,
    ) -> Vec<ScoredDocument> {
        let key_field = source.key_field();

        let mut seen_ids = HashSet::new();
        let mut per_key: HashMap<String, usize> = HashMap::new();
        let mut accepted: Vec<ScoredDocument> = Vec::new();
        let mut overflow: Vec<ScoredDocument> = Vec::new();

        for (document, score) in candidates {
            if score < self.options.min_relevance {
                continue;
            }

            if !seen_ids.insert(document.id.clone()) {
                continue;
            }

            let key = document.field(key_field).unwrap_or_default().to_string();
            let count = per_key.entry(key).or_insert(0);

            if *count < self.options.max_per_key_field {
                *count += 1;
                accepted.push(ScoredDocument { document, score });
                if accepted.len() == self.options.top_k {
                    break;
                }
            } else {
                overflow.push(ScoredDocument { document, score });
            }
        }

        // If the diversity rule left open slots and only same-key candidates
        // remain, fill from the overflow rather than returning fewer results
        for extra in overflow {
            if accepted.len() == self.options.top_k {
                break;
            }
            accepted.push(extra);
        }

        // Filling can interleave scores; restore descending order
        accepted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asha_core::config::EmbeddingSettings;
    use asha_core::{AppError, AppResult};
    use asha_knowledge::{create_provider, SqliteIndex};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Index stub whose every operation fails, for degraded-mode tests.
    struct FailingIndex(SourceType);

    impl VectorIndex for FailingIndex {
        fn source_type(&self) -> SourceType {
            self.0
        }

        fn upsert_document(&self, _document: &Document) -> AppResult<()> {
            Err(AppError::Index("index offline".to_string()))
        }

        fn search(&self, _query: &[f32], _top_k: usize) -> AppResult<Vec<(Document, f32)>> {
            Err(AppError::Index("index offline".to_string()))
        }

        fn list(&self) -> AppResult<Vec<Document>> {
            Err(AppError::Index("index offline".to_string()))
        }

        fn count(&self) -> AppResult<u32> {
            Err(AppError::Index("index offline".to_string()))
        }

        fn reset(&self) -> AppResult<()> {
            Err(AppError::Index("index offline".to_string()))
        }
    }

    fn job_doc(id: &str, company: &str, embedding: Vec<f32>) -> Document {
        let mut fields = BTreeMap::new();
        fields.insert("company_name".to_string(), company.to_string());
        fields.insert("job_title".to_string(), format!("Role {}", id));

        Document {
            id: id.to_string(),
            source_type: SourceType::Job,
            raw_text: format!("Role {} at {}", id, company),
            fields,
            embedding: Some(normalize(&embedding)),
        }
    }

    fn normalize(v: &[f32]) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter().map(|x| x / norm).collect()
        } else {
            v.to_vec()
        }
    }

    /// A provider whose embed output is a fixed unit vector, so index
    /// scores are controlled entirely by the stored document vectors.
    #[derive(Debug)]
    struct FixedProvider(usize);

    #[async_trait::async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn provider_name(&self) -> &str {
            "fixed"
        }

        fn model_name(&self) -> &str {
            "fixed-v1"
        }

        fn dimensions(&self) -> usize {
            self.0
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            let mut vector = vec![0.0; self.0];
            vector[0] = 1.0;
            Ok(texts.iter().map(|_| vector.clone()).collect())
        }
    }

    fn indexes(dir: &TempDir) -> (Arc<dyn VectorIndex>, Arc<dyn VectorIndex>) {
        let jobs = SqliteIndex::open(&dir.path().join("jobs.db"), SourceType::Job).unwrap();
        let sessions =
            SqliteIndex::open(&dir.path().join("sessions.db"), SourceType::Session).unwrap();
        (Arc::new(jobs), Arc::new(sessions))
    }

    #[tokio::test]
    async fn test_general_intent_retrieves_nothing() {
        let dir = TempDir::new().unwrap();
        let (jobs, sessions) = indexes(&dir);
        let provider = create_provider(&EmbeddingSettings::default()).unwrap();

        let retriever = Retriever::new(jobs, sessions, provider, RetrieverOptions::default());

        let result = retriever.retrieve(QueryIntent::General, "career advice").await;
        assert!(result.is_empty());
        assert!(!result.degraded);

        let result = retriever.retrieve(QueryIntent::OutOfScope, "weather").await;
        assert!(result.is_empty());
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_threshold_drops_weak_candidates() {
        let dir = TempDir::new().unwrap();
        let (jobs, sessions) = indexes(&dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixedProvider(4));

        // One strong match, one orthogonal document
        jobs.upsert_document(&job_doc("j1", "TechCorp", vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap();
        jobs.upsert_document(&job_doc("j2", "OtherCo", vec![0.0, 1.0, 0.0, 0.0]))
            .unwrap();

        let retriever = Retriever::new(jobs, sessions, provider, RetrieverOptions::default());
        let result = retriever.retrieve(QueryIntent::JobSearch, "anything").await;

        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].document.id, "j1");
    }

    #[tokio::test]
    async fn test_scores_descending_and_ids_unique() {
        let dir = TempDir::new().unwrap();
        let (jobs, sessions) = indexes(&dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixedProvider(4));

        jobs.upsert_document(&job_doc("j1", "A", vec![1.0, 0.0, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j2", "B", vec![0.9, 0.3, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j3", "C", vec![0.8, 0.5, 0.0, 0.0])).unwrap();

        let retriever = Retriever::new(jobs, sessions, provider, RetrieverOptions::default());
        let result = retriever.retrieve(QueryIntent::JobSearch, "anything").await;

        assert!(!result.hits.is_empty());
        for pair in result.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        let mut ids = HashSet::new();
        for hit in &result.hits {
            assert!(ids.insert(hit.document.id.clone()), "duplicate document id");
        }
    }

    #[tokio::test]
    async fn test_diversity_rule_caps_same_employer() {
        let dir = TempDir::new().unwrap();
        let (jobs, sessions) = indexes(&dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixedProvider(4));

        // Three strong matches from one employer, one weaker from another
        jobs.upsert_document(&job_doc("j1", "MegaCorp", vec![1.0, 0.0, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j2", "MegaCorp", vec![0.95, 0.1, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j3", "MegaCorp", vec![0.9, 0.2, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j4", "SmallCo", vec![0.7, 0.7, 0.0, 0.0])).unwrap();

        let options = RetrieverOptions {
            top_k: 3,
            ..RetrieverOptions::default()
        };
        let retriever = Retriever::new(jobs, sessions, provider, options);
        let result = retriever.retrieve(QueryIntent::JobSearch, "anything").await;

        assert_eq!(result.hits.len(), 3);
        let megacorp_count = result
            .hits
            .iter()
            .filter(|h| h.document.field("company_name") == Some("MegaCorp"))
            .count();
        assert_eq!(megacorp_count, 2, "at most two results per employer");
        assert!(result
            .hits
            .iter()
            .any(|h| h.document.field("company_name") == Some("SmallCo")));
    }

    #[tokio::test]
    async fn test_diversity_rule_relaxes_when_candidates_scarce() {
        let dir = TempDir::new().unwrap();
        let (jobs, sessions) = indexes(&dir);
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(FixedProvider(4));

        // Only one employer above threshold
        jobs.upsert_document(&job_doc("j1", "MegaCorp", vec![1.0, 0.0, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j2", "MegaCorp", vec![0.95, 0.1, 0.0, 0.0])).unwrap();
        jobs.upsert_document(&job_doc("j3", "MegaCorp", vec![0.9, 0.2, 0.0, 0.0])).unwrap();

        let options = RetrieverOptions {
            top_k: 3,
            ..RetrieverOptions::default()
        };
        let retriever = Retriever::new(jobs, sessions, provider, options);
        let result = retriever.retrieve(QueryIntent::JobSearch, "anything").await;

        assert_eq!(result.hits.len(), 3, "scarce candidates fill all slots");
        for pair in result.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_index_failure_degrades_instead_of_erroring() {
        let dir = TempDir::new().unwrap();
        let (_, sessions) = indexes(&dir);
        let provider = create_provider(&EmbeddingSettings::default()).unwrap();

        let jobs: Arc<dyn VectorIndex> = Arc::new(FailingIndex(SourceType::Job));
        let retriever = Retriever::new(jobs, sessions, provider, RetrieverOptions::default());

        let result = retriever
            .retrieve(QueryIntent::JobSearch, "marketing jobs")
            .await;

        assert!(result.is_empty());
        assert!(result.degraded);
    }
}
