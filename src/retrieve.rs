//! Maximal-marginal-relevance retrieval over the vector store.
//!
//! MMR balances relevance against redundancy: after the most similar chunk
//! is taken, each further pick maximizes
//! `lambda * sim(chunk, query) - (1 - lambda) * max_sim(chunk, selected)`.
//! `lambda = 1` degenerates to plain top-k by similarity; `lambda = 0`
//! maximizes diversity. Exact score ties resolve to the earliest-inserted
//! chunk.

use std::sync::Arc;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{BrdError, Result};
use crate::models::{EmbeddedChunk, ScoredChunk};
use crate::store::VectorStore;

/// Diversity-aware search over one [`VectorStore`].
///
/// Construction checks that the provider's model identity matches the
/// store's metadata, so a query can never be embedded with a different
/// model than the index.
pub struct Retriever {
    store: VectorStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: VectorStore, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if store.model_name() != embedder.model_name() {
            return Err(BrdError::EmbeddingModelMismatch {
                stored: store.model_name().to_string(),
                configured: embedder.model_name().to_string(),
            });
        }
        Ok(Self { store, embedder })
    }

    /// Retrieve up to `k` chunks for `query`, MMR-ordered.
    ///
    /// The attached score is the chunk's raw similarity to the query; the
    /// *order* is the MMR ranking.
    pub async fn search(&self, query: &str, k: usize, lambda: f32) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                BrdError::EmbeddingServiceFailure("empty embedding response".to_string())
            })?;

        let candidates = self.store.all_chunks().await?;
        let query_sims: Vec<f32> = candidates
            .iter()
            .map(|ec| cosine_similarity(&query_vec, &ec.vector))
            .collect();

        let order = mmr_select(&query_sims, &candidates, k, lambda);
        Ok(order
            .into_iter()
            .map(|i| ScoredChunk {
                chunk: candidates[i].chunk.clone(),
                score: query_sims[i],
            })
            .collect())
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}

/// Greedy MMR selection; returns candidate indices in pick order.
///
/// The first pick is the highest query similarity (ties to the earliest
/// candidate); subsequent picks maximize the MMR objective. Selection stops
/// at `k` picks or when candidates are exhausted.
pub fn mmr_select(
    query_sims: &[f32],
    candidates: &[EmbeddedChunk],
    k: usize,
    lambda: f32,
) -> Vec<usize> {
    let n = candidates.len();
    let mut selected: Vec<usize> = Vec::with_capacity(k.min(n));
    let mut remaining: Vec<usize> = (0..n).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best_pos = 0usize;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                query_sims[idx]
            } else {
                let max_selected_sim = selected
                    .iter()
                    .map(|&s| cosine_similarity(&candidates[idx].vector, &candidates[s].vector))
                    .fold(f32::NEG_INFINITY, f32::max);
                lambda * query_sims[idx] - (1.0 - lambda) * max_selected_sim
            };
            // Strict comparison: equal scores keep the earliest candidate.
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        selected.push(remaining.remove(best_pos));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn candidate(index: usize, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                document_id: "d1".to_string(),
                sequence_index: index,
                text: format!("chunk {}", index),
                char_span: (index, index + 1),
            },
            vector,
        }
    }

    #[test]
    fn test_lambda_one_is_similarity_descending() {
        let candidates = vec![
            candidate(0, vec![0.2, 1.0]),
            candidate(1, vec![1.0, 0.0]),
            candidate(2, vec![0.9, 0.1]),
        ];
        let query = vec![1.0, 0.0];
        let sims: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(&query, &c.vector))
            .collect();

        let order = mmr_select(&sims, &candidates, 3, 1.0);
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_lambda_zero_second_pick_least_similar_to_first() {
        // Candidate 1 is most relevant; candidate 0 is nearly identical to
        // it, candidate 2 points the other way.
        let candidates = vec![
            candidate(0, vec![0.99, 0.14]),
            candidate(1, vec![1.0, 0.0]),
            candidate(2, vec![-1.0, 0.2]),
        ];
        let query = vec![1.0, 0.0];
        let sims: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(&query, &c.vector))
            .collect();

        let order = mmr_select(&sims, &candidates, 2, 0.0);
        assert_eq!(order[0], 1);
        assert_eq!(order[1], 2, "diversity-only pick must be least similar to the first");
    }

    #[test]
    fn test_exact_ties_keep_insertion_order() {
        let candidates = vec![
            candidate(0, vec![1.0, 0.0]),
            candidate(1, vec![1.0, 0.0]),
            candidate(2, vec![1.0, 0.0]),
        ];
        let query = vec![1.0, 0.0];
        let sims: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(&query, &c.vector))
            .collect();

        let order = mmr_select(&sims, &candidates, 3, 0.5);
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_k_larger_than_index_exhausts_candidates() {
        let candidates = vec![candidate(0, vec![1.0, 0.0]), candidate(1, vec![0.0, 1.0])];
        let query = vec![1.0, 0.0];
        let sims: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(&query, &c.vector))
            .collect();

        let order = mmr_select(&sims, &candidates, 10, 0.5);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_k_zero_selects_nothing() {
        let candidates = vec![candidate(0, vec![1.0, 0.0])];
        assert!(mmr_select(&[1.0], &candidates, 0, 0.5).is_empty());
    }

    #[test]
    fn test_balanced_lambda_prefers_relevant_but_distinct() {
        // Two near-duplicates of the best chunk and one moderately relevant
        // but distinct chunk: MMR at lambda 0.5 should pick the distinct one
        // second instead of a duplicate.
        let candidates = vec![
            candidate(0, vec![1.0, 0.0, 0.0]),
            candidate(1, vec![0.95, -0.05, 0.0]),
            candidate(2, vec![0.2, 1.0, 0.0]),
        ];
        let query = vec![1.0, 0.3, 0.0];
        let sims: Vec<f32> = candidates
            .iter()
            .map(|c| cosine_similarity(&query, &c.vector))
            .collect();

        let order = mmr_select(&sims, &candidates, 2, 0.5);
        assert_eq!(order[0], 0);
        assert_eq!(order[1], 2);
    }
}
