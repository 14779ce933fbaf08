use crate::errors::RerankError;

/// External completion provider. May fail or time out; the rerank engine
/// treats both identically (fallback, no in-request retry).
pub trait ICompletionProvider: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, RerankError>;
}
