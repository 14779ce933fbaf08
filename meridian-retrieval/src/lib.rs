//! # meridian-retrieval
//!
//! Candidate gathering: three independent retrieval strategies fused by a
//! tiered merge-and-score pass.
//!
//! ## Architecture
//!
//! ```text
//! RetrievalService
//! ├── KeywordRetriever   (tokenize → corpus scan → Jaccard → remap)
//! ├── SemanticRetriever  (embed → ANN → domain filter/backfill)
//! ├── DiversityRetriever (MMR ∥ hybrid dense+sparse → id merge)
//! └── merge_and_score    (tier classification → weighted scores → fill)
//! ```
//!
//! The three retrievers run concurrently with per-retriever failure
//! isolation: a failed retriever contributes an empty list, never an error.

pub mod diversity;
pub mod keyword;
pub mod merge;
pub mod normalize;
pub mod semantic;
pub mod service;

pub use diversity::DiversityRetriever;
pub use keyword::KeywordRetriever;
pub use merge::merge_and_score;
pub use semantic::SemanticRetriever;
pub use service::RetrievalService;
