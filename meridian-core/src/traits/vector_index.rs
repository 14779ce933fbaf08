use crate::errors::RetrievalError;

/// A scenario id with a search score. `score` is a similarity for
/// [`IVectorIndex::nearest_neighbors`] and a distance for
/// [`IVectorIndex::hybrid_search`].
#[derive(Debug, Clone, Copy)]
pub struct ScoredId {
    pub id: u64,
    pub score: f64,
}

/// External vector index over the scenario corpus.
pub trait IVectorIndex: Send + Sync {
    /// Approximate nearest neighbors with similarity scores, best first.
    fn nearest_neighbors(&self, vector: &[f32], k: usize)
        -> Result<Vec<ScoredId>, RetrievalError>;

    /// Max-marginal-relevance selection: fetch `fetch_k`, return up to `k`
    /// diverse ids. No scores: the selection is relevance-optimized by
    /// construction.
    fn max_marginal_relevance(
        &self,
        vector: &[f32],
        fetch_k: usize,
        k: usize,
    ) -> Result<Vec<u64>, RetrievalError>;

    /// Dense + sparse hybrid search fused by reciprocal rank. Returns ids
    /// with distances (lower is better).
    fn hybrid_search(
        &self,
        vector: &[f32],
        sparse_query: &str,
        k: usize,
    ) -> Result<Vec<ScoredId>, RetrievalError>;
}
