/// Retrieval subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("provider unavailable: {provider}: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("embedding failed: {reason}")]
    EmbeddingFailed { reason: String },

    #[error("vector index query failed: {reason}")]
    IndexQueryFailed { reason: String },

    #[error("corpus scan failed: {reason}")]
    CorpusScanFailed { reason: String },

    #[error("retrieval task timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}
