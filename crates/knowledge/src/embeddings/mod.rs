//! Embedding service abstraction.
//!
//! Maps text to fixed-length vectors. Indexers and the retriever share one
//! provider so query and document vectors live in the same space.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
