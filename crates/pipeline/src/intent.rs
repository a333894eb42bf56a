//! Intent routing for user queries.
//!
//! Decides which knowledge source (if any) a turn should retrieve from.
//! Keyword cues are checked first; an anaphoric follow-up inherits the
//! prior turn's intent; otherwise a semantic comparison against labeled
//! exemplar queries decides, with a floor below which the query is out of
//! scope.

use crate::types::{ConversationTurn, QueryIntent};
use asha_core::AppResult;
use asha_knowledge::embeddings::cosine_similarity;
use asha_knowledge::EmbeddingProvider;
use std::sync::Arc;

/// Cues for job-search queries.
const JOB_KEYWORDS: &[&str] = &[
    "job",
    "jobs",
    "opening",
    "openings",
    "vacancy",
    "vacancies",
    "hiring",
    "position",
    "positions",
    "salary",
    "employer",
    "employers",
    "recruitment",
    "internship",
    "internships",
];

/// Cues for event-search queries.
const EVENT_KEYWORDS: &[&str] = &[
    "event",
    "events",
    "session",
    "sessions",
    "workshop",
    "workshops",
    "webinar",
    "webinars",
    "meetup",
    "meetups",
    "mentorship",
    "conference",
    "conferences",
    "speaker",
    "speakers",
    "hackathon",
];

/// Phrasings that refer back to the previous results.
const ANAPHORA_CUES: &[&str] = &[
    "more like that",
    "another one",
    "any others",
    "anything else",
    "show me more",
    "more of those",
    "similar ones",
    "what else",
];

/// Labeled exemplar queries for the semantic fallback.
const EXEMPLARS: &[(&str, QueryIntent)] = &[
    ("show me open jobs in marketing", QueryIntent::JobSearch),
    ("software engineer openings in bangalore", QueryIntent::JobSearch),
    ("is anyone recruiting data analysts right now", QueryIntent::JobSearch),
    ("what workshops are coming up", QueryIntent::EventSearch),
    ("upcoming community events this month", QueryIntent::EventSearch),
    ("when is the next mentorship session", QueryIntent::EventSearch),
    ("how do i negotiate a promotion", QueryIntent::General),
    ("tips for switching careers after a break", QueryIntent::General),
    ("how should i prepare for an interview", QueryIntent::General),
];

/// Classifies a user utterance into a retrieval intent.
pub struct IntentRouter {
    provider: Arc<dyn EmbeddingProvider>,
    exemplars: Vec<(QueryIntent, Vec<f32>)>,
    semantic_floor: f32,
}

impl IntentRouter {
    /// Build the router and embed the exemplar bank.
    pub async fn new(
        provider: Arc<dyn EmbeddingProvider>,
        semantic_floor: f32,
    ) -> AppResult<Self> {
        let texts: Vec<String> = EXEMPLARS.iter().map(|(text, _)| text.to_string()).collect();
        let embeddings = provider.embed_batch(&texts).await?;

        let exemplars = EXEMPLARS
            .iter()
            .zip(embeddings)
            .map(|((_, intent), embedding)| (*intent, embedding))
            .collect();

        Ok(Self {
            provider,
            exemplars,
            semantic_floor,
        })
    }

    /// Route a query given the session's recent history.
    ///
    /// Deterministic: the same query with identical history always yields
    /// the same intent.
    pub async fn route(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> AppResult<QueryIntent> {
        let lower = query.to_lowercase();

        // Anaphoric follow-ups inherit the prior retrieval intent
        if is_anaphoric(&lower) {
            if let Some(prior) = prior_retrieval_intent(history) {
                tracing::debug!("Anaphoric follow-up inherits intent {}", prior.as_str());
                return Ok(prior);
            }
        }

        // Keyword layer
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let job_hits = words.iter().filter(|w| JOB_KEYWORDS.contains(w)).count();
        let event_hits = words.iter().filter(|w| EVENT_KEYWORDS.contains(w)).count();

        if job_hits > 0 || event_hits > 0 {
            if job_hits > event_hits {
                return Ok(QueryIntent::JobSearch);
            }
            if event_hits > job_hits {
                return Ok(QueryIntent::EventSearch);
            }

            // Equal cue counts with no anaphoric resolution: treat as
            // ambiguous and answer without a specific dataset.
            tracing::debug!("Ambiguous job/event cues ({} each), routing as general", job_hits);
            return Ok(QueryIntent::General);
        }

        // Semantic layer
        let query_embedding = self.provider.embed(query).await?;

        let best = self
            .exemplars
            .iter()
            .map(|(intent, embedding)| (*intent, cosine_similarity(&query_embedding, embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((intent, score)) if score >= self.semantic_floor => {
                tracing::debug!(
                    "Semantic routing chose {} (score {:.3})",
                    intent.as_str(),
                    score
                );
                Ok(intent)
            }
            _ => Ok(QueryIntent::OutOfScope),
        }
    }
}

/// Whether the query refers back to previous results.
fn is_anaphoric(lower_query: &str) -> bool {
    ANAPHORA_CUES.iter().any(|cue| lower_query.contains(cue))
}

/// Most recent turn intent that targeted a dataset, if any.
fn prior_retrieval_intent(history: &[ConversationTurn]) -> Option<QueryIntent> {
    history.iter().rev().find_map(|turn| match turn.intent {
        Some(intent @ (QueryIntent::JobSearch | QueryIntent::EventSearch)) => Some(intent),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BiasAssessment;
    use asha_core::config::EmbeddingSettings;
    use asha_knowledge::create_provider;

    async fn router() -> IntentRouter {
        let provider = create_provider(&EmbeddingSettings::default()).unwrap();
        IntentRouter::new(provider, 0.25).await.unwrap()
    }

    fn user_turn(text: &str, intent: QueryIntent) -> ConversationTurn {
        ConversationTurn::user(text, intent, BiasAssessment::unbiased(text))
    }

    #[tokio::test]
    async fn test_job_keywords_route_to_job_search() {
        let router = router().await;
        let intent = router
            .route("List job openings in marketing", &[])
            .await
            .unwrap();
        assert_eq!(intent, QueryIntent::JobSearch);
    }

    #[tokio::test]
    async fn test_event_keywords_route_to_event_search() {
        let router = router().await;
        let intent = router
            .route("Are there any mentorship workshops next week?", &[])
            .await
            .unwrap();
        assert_eq!(intent, QueryIntent::EventSearch);
    }

    #[tokio::test]
    async fn test_anaphoric_follow_up_inherits_prior_intent() {
        let router = router().await;
        let history = vec![user_turn("List job openings in marketing", QueryIntent::JobSearch)];

        let intent = router.route("show me more like that", &history).await.unwrap();
        assert_eq!(intent, QueryIntent::JobSearch);

        let history = vec![user_turn("any workshops this week?", QueryIntent::EventSearch)];
        let intent = router.route("any others?", &history).await.unwrap();
        assert_eq!(intent, QueryIntent::EventSearch);
    }

    #[tokio::test]
    async fn test_anaphora_without_prior_retrieval_falls_through() {
        let router = router().await;
        // No history: "any others" has no keywords and little semantic
        // overlap with the exemplars
        let intent = router.route("any others?", &[]).await.unwrap();
        assert_eq!(intent, QueryIntent::OutOfScope);
    }

    #[tokio::test]
    async fn test_ambiguous_cues_route_to_general() {
        let router = router().await;
        // One job cue and one event cue
        let intent = router
            .route("Is the hiring event open to everyone?", &[])
            .await
            .unwrap();
        assert_eq!(intent, QueryIntent::General);
    }

    #[tokio::test]
    async fn test_career_advice_routes_to_general() {
        let router = router().await;
        let intent = router
            .route("How should I prepare for an interview?", &[])
            .await
            .unwrap();
        assert_eq!(intent, QueryIntent::General);
    }

    #[tokio::test]
    async fn test_unrelated_query_is_out_of_scope() {
        let router = router().await;
        let intent = router
            .route("Tell me about the weather tomorrow", &[])
            .await
            .unwrap();
        assert_eq!(intent, QueryIntent::OutOfScope);
    }

    #[tokio::test]
    async fn test_routing_is_idempotent() {
        let router = router().await;
        let history = vec![user_turn("List job openings", QueryIntent::JobSearch)];

        let first = router.route("what about salaries?", &history).await.unwrap();
        let second = router.route("what about salaries?", &history).await.unwrap();
        assert_eq!(first, second);
    }
}
