//! Limn Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the limn system:
//! - Extraction spans and raw entity records produced by processor adapters
//! - The canonical description type vocabulary
//! - Final `Description` output units and extraction outcomes
//! - Common error types
//! - The advisory result-cache trait
//! - Configuration management

pub mod config;

pub use config::{
    AdaptiveThresholds, ConfigError, DedupConfig, ProcessorDescriptor, ScorerConfig,
    ScorerWeights, StrategyConfig, StrategyMode,
};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for limn operations
///
/// Only `Configuration` errors cross the manager boundary; processor-level
/// failures are absorbed into the outcome's degraded flag.
#[derive(Error, Debug)]
pub enum LimnError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Processor {processor_id} unavailable: {reason}")]
    ProcessorUnavailable {
        processor_id: String,
        reason: String,
    },

    #[error("Processor {processor_id} timed out after {timeout_ms}ms")]
    ProcessorTimeout {
        processor_id: String,
        timeout_ms: u64,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LimnError>;

// ============================================================================
// Spans
// ============================================================================

/// A half-open character-offset range `[start, end)` within the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span; `start` must not exceed `end`
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must not exceed end");
        Self { start, end }
    }

    /// Length of the span in characters
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Overlap ratio with another span: intersection length / union length
    ///
    /// Returns 0.0 for disjoint spans and 1.0 for identical non-empty spans.
    pub fn overlap_ratio(&self, other: &Span) -> f32 {
        let inter_start = self.start.max(other.start);
        let inter_end = self.end.min(other.end);
        if inter_start >= inter_end {
            return 0.0;
        }
        let intersection = inter_end - inter_start;
        let union = self.end.max(other.end) - self.start.min(other.start);
        if union == 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }

    /// Smallest span covering both `self` and `other`
    pub fn union(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ============================================================================
// Description Types
// ============================================================================

/// Canonical description categories
///
/// Closed vocabulary: every processor's native label maps to exactly one of
/// these. Labels without a mapping fall back to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionType {
    Character,
    Location,
    Object,
    Atmosphere,
    Other,
}

impl DescriptionType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Location => "location",
            Self::Object => "object",
            Self::Atmosphere => "atmosphere",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DescriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Raw Entities
// ============================================================================

/// One processor's raw tagged span, before cross-processor reconciliation
///
/// Ephemeral: created per extraction call and consumed by the aggregation
/// pass that produces [`Description`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    /// Character-offset span in the input text
    pub span: Span,

    /// The tagged text itself
    pub text: String,

    /// The processor's native label (pre-mapping vocabulary)
    pub native_label: String,

    /// Processor-reported confidence (0.0 - 1.0)
    pub confidence: f32,

    /// Identifier of the processor that produced this entity
    pub processor_id: String,
}

impl RawEntity {
    /// Create a new raw entity; confidence is clamped to [0, 1]
    pub fn new(
        span: Span,
        text: impl Into<String>,
        native_label: impl Into<String>,
        confidence: f32,
        processor_id: impl Into<String>,
    ) -> Self {
        Self {
            span,
            text: text.into(),
            native_label: native_label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            processor_id: processor_id.into(),
        }
    }
}

// ============================================================================
// Descriptions
// ============================================================================

/// Final, scored, deduplicated output unit representing an illustratable
/// passage
///
/// `confidence` and `quality_score` are independent axes: confidence
/// reflects cross-processor agreement, quality_score reflects linguistic
/// relevance heuristics. Both are always within [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Description {
    /// Unique identifier
    pub id: Uuid,

    /// The passage text
    pub text: String,

    /// Canonical category
    pub description_type: DescriptionType,

    /// Character-offset span in the source text
    pub span: Span,

    /// Agreement confidence from ensemble voting (0.0 - 1.0)
    pub confidence: f32,

    /// Processors that contributed to this description
    pub contributing_processors: BTreeSet<String>,

    /// Heuristic relevance score (0.0 - 1.0)
    pub quality_score: f32,

    /// How many merged duplicates this description represents
    pub occurrence_count: u32,
}

impl Description {
    /// Create a new description with a fresh id and a single occurrence
    pub fn new(
        text: impl Into<String>,
        description_type: DescriptionType,
        span: Span,
        confidence: f32,
        contributing_processors: BTreeSet<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            description_type,
            span,
            confidence: confidence.clamp(0.0, 1.0),
            contributing_processors,
            quality_score: 0.0,
            occurrence_count: 1,
        }
    }

    /// Set the quality score (clamped to [0, 1])
    pub fn with_quality_score(mut self, score: f32) -> Self {
        self.quality_score = score.clamp(0.0, 1.0);
        self
    }
}

// ============================================================================
// Requests and Outcomes
// ============================================================================

/// Input to the extraction manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Chapter-scoped plain text (segmentation happens upstream)
    pub text: String,

    /// Optional BCP-47 language hint passed through to processors
    pub language_hint: Option<String>,

    /// Optional caller-supplied cache key; when absent the engine derives
    /// one from the text and config
    pub cache_key: Option<String>,
}

impl ExtractionRequest {
    /// Create a new request
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_hint: None,
            cache_key: None,
        }
    }

    /// Set the language hint
    pub fn with_language_hint(mut self, hint: impl Into<String>) -> Self {
        self.language_hint = Some(hint.into());
        self
    }

    /// Set an explicit cache key
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }
}

/// Result of one extraction call
///
/// Callers must inspect `degraded` rather than rely on errors to detect
/// partial processor failure: the description list is always present,
/// possibly empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Accepted descriptions, sorted by ascending span start
    pub descriptions: Vec<Description>,

    /// Candidates rejected by the acceptance threshold, retained for
    /// calibration when `scorer.keep_rejected` is enabled
    pub rejected: Vec<Description>,

    /// True when responding processors carried less than half of the
    /// invoked trust weight
    pub degraded: bool,

    /// Strategy that actually executed (post adaptive selection)
    pub strategy_used: StrategyMode,

    /// Wall-clock processing time in milliseconds
    pub elapsed_ms: u64,

    /// Raw entity counts per processor for this call
    pub processor_contributions: std::collections::BTreeMap<String, usize>,

    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

impl ExtractionOutcome {
    /// Create an empty outcome for the given strategy
    pub fn empty(strategy_used: StrategyMode) -> Self {
        Self {
            descriptions: Vec::new(),
            rejected: Vec::new(),
            degraded: false,
            strategy_used,
            elapsed_ms: 0,
            processor_contributions: std::collections::BTreeMap::new(),
            completed_at: Utc::now(),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Advisory cache for extraction outcomes
///
/// Keyed by a 64-bit hash of input text and config. The cache is strictly
/// advisory: implementations must swallow backend failures (returning `None`
/// or dropping the write) so that a cache outage degrades to recomputation,
/// never to an error.
#[async_trait::async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up a cached outcome
    async fn get(&self, key: u64) -> Option<ExtractionOutcome>;

    /// Store an outcome
    async fn put(&self, key: u64, outcome: ExtractionOutcome);

    /// Cache name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_overlap_identical() {
        let a = Span::new(10, 23);
        assert!((a.overlap_ratio(&a) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_span_overlap_disjoint() {
        let a = Span::new(0, 5);
        let b = Span::new(10, 20);
        assert_eq!(a.overlap_ratio(&b), 0.0);
    }

    #[test]
    fn test_span_overlap_nested() {
        // "a dark forest" (10-23) vs "dark forest" (12-23)
        let a = Span::new(10, 23);
        let b = Span::new(12, 23);
        assert!(a.overlap_ratio(&b) > 0.5);
        assert_eq!(a.union(&b), Span::new(10, 23));
    }

    #[test]
    fn test_span_len() {
        assert_eq!(Span::new(3, 10).len(), 7);
        assert!(Span::new(4, 4).is_empty());
    }

    #[test]
    fn test_description_type_display() {
        assert_eq!(DescriptionType::Location.to_string(), "location");
        assert_eq!(DescriptionType::Atmosphere.as_str(), "atmosphere");
    }

    #[test]
    fn test_raw_entity_confidence_clamped() {
        let e = RawEntity::new(Span::new(0, 4), "mist", "ATMO", 1.7, "pattern");
        assert_eq!(e.confidence, 1.0);
    }

    #[test]
    fn test_description_quality_clamped() {
        let d = Description::new(
            "a dark forest",
            DescriptionType::Location,
            Span::new(10, 23),
            0.9,
            BTreeSet::new(),
        )
        .with_quality_score(2.0);
        assert_eq!(d.quality_score, 1.0);
        assert_eq!(d.occurrence_count, 1);
    }
}
