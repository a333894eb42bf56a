//! Gender-bias screening for incoming queries.
//!
//! Detection is a layered decision procedure:
//! 1. An ordered list of lexical rules (compiled regex patterns), first
//!    match wins. Each rule carries a category and a reframe template.
//! 2. A single semantic fallback: cosine similarity against a bank of
//!    pre-embedded biased-question exemplars, for paraphrases the rules
//!    miss.
//!
//! Reframing substitutes the biased premise with a neutral, fact-seeking
//! question while preserving the topic the user asked about. When no topic
//! can be extracted (semantic layer), the assessment keeps the original
//! query and a generic redirect rationale so downstream framing still
//! applies without inventing a possibly wrong question.

use crate::types::{BiasAssessment, BiasCategory};
use asha_core::{AppError, AppResult};
use asha_knowledge::embeddings::cosine_similarity;
use asha_knowledge::EmbeddingProvider;
use regex::Regex;
use std::sync::Arc;

/// One lexical detection rule.
struct BiasRule {
    pattern: Regex,
    category: BiasCategory,
}

/// Biased-question exemplars for the semantic layer, with their categories.
const EXEMPLARS: &[(&str, BiasCategory)] = &[
    (
        "Why would a company want to hire women for engineering jobs",
        BiasCategory::HiringJustification,
    ),
    (
        "Are women capable of handling technical work",
        BiasCategory::CapabilityDoubt,
    ),
    (
        "Is it risky to promote women into management",
        BiasCategory::LeadershipDoubt,
    ),
    (
        "Women belong at home instead of the office",
        BiasCategory::RoleRestriction,
    ),
    (
        "Female employees are too emotional for serious work",
        BiasCategory::Stereotype,
    ),
];

/// Ordered lexical rules. Specific framings come before broad ones.
const RULE_PATTERNS: &[(&str, BiasCategory)] = &[
    (
        r"(?i)why\s+(should|would)\s+(we|anyone|you|they|companies)\s+(even\s+)?(hire|recruit|employ)\s+wom[ae]n(\s+(for|in)\s+(?P<topic>[\w\s-]+?))?\s*[?.!]*$",
        BiasCategory::HiringJustification,
    ),
    (
        r"(?i)wom[ae]n\s+(can't|cannot|can\s+not|aren't\s+able\s+to|are\s+not\s+able\s+to|are\s+not\s+good\s+at|are\s+bad\s+at)\s+(be\s+|do\s+|work\s+in\s+|handle\s+)?(?P<topic>[\w\s-]+?)\s*[?.!]*$",
        BiasCategory::CapabilityDoubt,
    ),
    (
        r"(?i)wom[ae]n\s+should\s+(stay|be\s+in|stick\s+to|focus\s+on)\b",
        BiasCategory::RoleRestriction,
    ),
    (
        r"(?i)(suitable|appropriate|best)\s+(jobs|roles|careers|positions)\s+for\s+wom[ae]n",
        BiasCategory::RoleRestriction,
    ),
    (
        r"(?i)(can|are|do)\s+wom[ae]n\s+(really\s+)?(make\s+good\s+|be\s+(good\s+)?|become\s+)?(leaders|managers|bosses|executives|ceos)\b",
        BiasCategory::LeadershipDoubt,
    ),
    (
        r"(?i)wom[ae]n\s+are\s+(too\s+)?(emotional|irrational|sensitive|weak)\b",
        BiasCategory::Stereotype,
    ),
    (
        r"(?i)\bm[ae]n\s+are\s+(better|stronger|smarter|more\s+\w+)\s+than\s+wom[ae]n\b",
        BiasCategory::Stereotype,
    ),
];

/// Screens queries for gender-biased framing.
///
/// Stateless with respect to conversations: a pure function of the query
/// and the static rule/exemplar resources.
pub struct BiasClassifier {
    rules: Vec<BiasRule>,
    exemplars: Vec<(BiasCategory, Vec<f32>)>,
    provider: Arc<dyn EmbeddingProvider>,
    semantic_threshold: f32,
}

impl BiasClassifier {
    /// Build the classifier: compile rules and embed the exemplar bank.
    pub async fn new(
        provider: Arc<dyn EmbeddingProvider>,
        semantic_threshold: f32,
    ) -> AppResult<Self> {
        let rules = RULE_PATTERNS
            .iter()
            .map(|(pattern, category)| {
                Regex::new(pattern)
                    .map(|pattern| BiasRule {
                        pattern,
                        category: *category,
                    })
                    .map_err(|e| AppError::Pipeline(format!("Invalid bias rule pattern: {}", e)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let texts: Vec<String> = EXEMPLARS.iter().map(|(text, _)| text.to_string()).collect();
        let embeddings = provider.embed_batch(&texts).await?;

        let exemplars = EXEMPLARS
            .iter()
            .zip(embeddings)
            .map(|((_, category), embedding)| (*category, embedding))
            .collect();

        Ok(Self {
            rules,
            exemplars,
            provider,
            semantic_threshold,
        })
    }

    /// Screen a query for gender-biased framing.
    pub async fn assess(&self, query: &str) -> AppResult<BiasAssessment> {
        // Layer 1: lexical rules, in order
        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(query) {
                let topic = caps
                    .name("topic")
                    .map(|m| m.as_str())
                    .and_then(clean_topic);

                tracing::info!(
                    "Bias rule fired: category={}, topic={:?}",
                    rule.category.as_str(),
                    topic
                );

                return Ok(BiasAssessment {
                    is_biased: true,
                    bias_category: Some(rule.category),
                    original_query: query.to_string(),
                    reframed_query: Some(reframe(rule.category, topic.as_deref())),
                    rationale: Some(rationale(rule.category)),
                });
            }
        }

        // Layer 2: semantic similarity against the exemplar bank
        let query_embedding = self.provider.embed(query).await?;

        let best = self
            .exemplars
            .iter()
            .map(|(category, embedding)| (*category, cosine_similarity(&query_embedding, embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((category, score)) = best {
            if score >= self.semantic_threshold {
                tracing::info!(
                    "Bias exemplar matched: category={}, score={:.3}",
                    category.as_str(),
                    score
                );

                // No reliable topic extraction here; keep the user's wording
                // and let the prompt directive do the redirecting.
                return Ok(BiasAssessment {
                    is_biased: true,
                    bias_category: Some(category),
                    original_query: query.to_string(),
                    reframed_query: Some(query.to_string()),
                    rationale: Some(
                        "The question resembles known gender-biased framings; \
                         the answer should redirect to factual, empowering information."
                            .to_string(),
                    ),
                });
            }
        }

        Ok(BiasAssessment::unbiased(query))
    }
}

/// Strip generic trailing words ("roles", "jobs") and normalize whitespace.
///
/// Returns None when nothing meaningful is left, so callers fall back to the
/// category's generic reframe.
fn clean_topic(raw: &str) -> Option<String> {
    const GENERIC_TAILS: &[&str] = &[
        "roles", "role", "jobs", "job", "positions", "position", "teams", "team", "work",
    ];

    let mut words: Vec<&str> = raw.split_whitespace().collect();
    while let Some(last) = words.last() {
        if GENERIC_TAILS.contains(&last.to_lowercase().as_str()) {
            words.pop();
        } else {
            break;
        }
    }

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Neutral, fact-seeking reframe for a detected category.
fn reframe(category: BiasCategory, topic: Option<&str>) -> String {
    match (category, topic) {
        (BiasCategory::HiringJustification, Some(t)) => {
            format!("What are the performance benefits of gender-diverse {} teams?", t)
        }
        (BiasCategory::HiringJustification, None) => {
            "What are the performance benefits of gender-diverse teams?".to_string()
        }
        (BiasCategory::CapabilityDoubt, Some(t)) => {
            format!("What does research show about women's performance in {}?", t)
        }
        (BiasCategory::CapabilityDoubt, None) => {
            "What does research show about women's performance across professional fields?"
                .to_string()
        }
        (BiasCategory::RoleRestriction, Some(t)) => {
            format!("Which career opportunities are growing for women in {}?", t)
        }
        (BiasCategory::RoleRestriction, None) => {
            "Which career paths offer strong opportunities for women across industries?".to_string()
        }
        (BiasCategory::LeadershipDoubt, _) => {
            "What does research show about women's effectiveness in leadership roles?".to_string()
        }
        (BiasCategory::Stereotype, _) => {
            "What does research say about the performance of diverse teams?".to_string()
        }
    }
}

/// Short explanation attached to lexical detections.
fn rationale(category: BiasCategory) -> String {
    let reason = match category {
        BiasCategory::CapabilityDoubt => "presupposes that women lack ability in this area",
        BiasCategory::RoleRestriction => "presupposes that some roles are off-limits to women",
        BiasCategory::HiringJustification => {
            "presupposes that hiring women needs special justification"
        }
        BiasCategory::LeadershipDoubt => "presupposes that women are unsuited to leadership",
        BiasCategory::Stereotype => "relies on a gendered character stereotype",
    };

    format!(
        "The question {}; reframed to ask for the underlying facts instead.",
        reason
    )
}
