/// Rerank subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum RerankError {
    #[error("completion call failed: {reason}")]
    CompletionFailed { reason: String },

    #[error("completion call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The response failed every parsing tier. Recoverable via the
    /// rule-based grading fallback.
    #[error("malformed completion response: {reason}")]
    MalformedResponse { reason: String },

    #[error("sub-item lookup failed for scenario {scenario_id}: {reason}")]
    SubItemLookupFailed { scenario_id: u64, reason: String },
}
