//! Trigram embedding provider using character trigram-based content-aware
//! embeddings.

use crate::embeddings::provider::EmbeddingProvider;
use asha_core::AppResult;
use std::collections::{HashMap, HashSet};

/// Words too common to carry signal for retrieval.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "who", "how", "when", "where", "why", "should",
    "would", "could", "can", "will", "do", "does", "did", "about", "any", "some", "all", "we",
    "you", "your", "our", "even", "me", "my",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings from character trigrams and word
/// frequencies. Not semantically accurate like neural embedding models, but
/// the vectors are consistent and content-dependent, which is what the
/// retrieval and classification layers need in development and tests.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Lowercase, split, and drop stop words and very short tokens.
    fn content_words(text: &str) -> Vec<String> {
        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2 && !stop_words.contains(w))
            .map(str::to_string)
            .collect()
    }

    /// Stable hash used to pick a dimension for a token.
    fn fold_hash(token: &str, multiplier: u64) -> u64 {
        token
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64))
    }

    /// Generate a trigram-based embedding for text.
    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];

        // Build word frequency map over content words
        let mut word_freq: HashMap<String, u32> = HashMap::new();
        for word in Self::content_words(text) {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            // Spread each word across dimensions via its character trigrams
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let dim_idx = (Self::fold_hash(&trigram, 37) as usize) % self.dimensions;
                // sqrt scale keeps frequent words from dominating
                embedding[dim_idx] += (*freq as f32).sqrt();
            }

            // Also encode the whole word
            let dim_idx = (Self::fold_hash(word, 31) as usize) % self.dimensions;
            embedding[dim_idx] += *freq as f32;
        }

        // Normalize to unit vector
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.generate(text)).collect())
    }
}
