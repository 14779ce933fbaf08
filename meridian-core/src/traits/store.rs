use std::sync::Arc;

use crate::errors::{RerankError, RetrievalError};
use crate::models::{Scenario, SubItem};

/// Read-only scenario/sub-item persistence.
pub trait IScenarioStore: Send + Sync {
    /// Scenarios whose description contains any of the keywords, up to
    /// `limit` rows. The fuzzy-match corpus scan behind the keyword
    /// retriever.
    fn find_matching(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<Arc<Scenario>>, RetrievalError>;

    fn load_by_id(&self, id: u64) -> Result<Option<Arc<Scenario>>, RetrievalError>;

    /// Sub-items for a scenario, rated at least `min_rating`, best-rated
    /// first, up to `top_k`.
    fn sub_items_for(
        &self,
        scenario_id: u64,
        top_k: usize,
        min_rating: u8,
    ) -> Result<Vec<SubItem>, RerankError>;
}
