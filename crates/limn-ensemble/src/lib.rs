//! Limn Ensemble - Cross-processor reconciliation
//!
//! Turns the union of raw entity lists from several processors into scored,
//! deduplicated [`limn_core::Description`] values:
//! - [`voter::EnsembleVoter`]: overlap clustering + weighted type voting
//!   with a trust-weight quorum
//! - [`scorer::QualityScorer`]: composite relevance score from named,
//!   independently testable factors
//! - [`dedup::Deduplicator`]: idempotent near-duplicate merging, also
//!   exposed standalone for cross-chapter merges

pub mod dedup;
pub mod scorer;
pub mod voter;

pub use dedup::Deduplicator;
pub use scorer::QualityScorer;
pub use voter::{EnsembleVoter, MappedEntity};
