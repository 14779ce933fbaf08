use crate::errors::RetrievalError;

/// External embedding provider. Fixed dimensionality per deployment.
pub trait IEmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    fn dimensions(&self) -> usize;
}
