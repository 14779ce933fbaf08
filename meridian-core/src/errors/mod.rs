//! Error types for the Meridian engine.
//!
//! Provider-facing failures are recoverable by design: they are caught at the
//! component boundary and degrade to an empty or fallback result. The only
//! error class a caller should ever see is [`MeridianError::InvalidInput`].

mod retrieval_error;
mod rerank_error;

pub use retrieval_error::RetrievalError;
pub use rerank_error::RerankError;

/// Result alias used across all Meridian crates.
pub type MeridianResult<T> = Result<T, MeridianError>;

/// Top-level error for the Meridian engine.
#[derive(Debug, thiserror::Error)]
pub enum MeridianError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Rerank(#[from] RerankError),

    /// Caller-supplied parameter out of range. The only class that surfaces
    /// to the caller: it indicates a programming error in the collaborator,
    /// not a runtime condition.
    #[error("invalid input: {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

impl MeridianError {
    /// Whether the engine may degrade to a fallback result instead of
    /// propagating this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MeridianError::InvalidInput { .. })
    }
}
