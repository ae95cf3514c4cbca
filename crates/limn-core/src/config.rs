//! Limn Configuration Management
//!
//! Handles strategy configuration from TOML files and environment variables
//! with sensible defaults. Every configuration is validated synchronously at
//! construction: an invalid config (quorum exceeding available trust weight,
//! scorer weights not summing to 1.0) is rejected before any extraction
//! call can observe it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tolerance for the scorer weight normalization check
const WEIGHT_SUM_EPSILON: f32 = 1e-4;

// ============================================================================
// Strategy Mode
// ============================================================================

/// Orchestration policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// One processor, no voting: lowest latency, lowest recall
    Single,
    /// All processors concurrently, full voting: highest recall
    Parallel,
    /// Processors in priority order with early exit on good results
    Sequential,
    /// Parallel with a majority quorum: maximum precision
    Ensemble,
    /// Per-call selection based on text signals and history
    Adaptive,
}

impl StrategyMode {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
            Self::Ensemble => "ensemble",
            Self::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StrategyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            "ensemble" => Ok(Self::Ensemble),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(ConfigError::InvalidValue {
                key: "mode".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Processor Descriptors
// ============================================================================

/// Static configuration for one processor adapter
///
/// Immutable after manager construction except through an explicit
/// reconfiguration, which re-validates the whole config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorDescriptor {
    /// Stable identifier, also used in `contributing_processors`
    pub processor_id: String,

    /// Vote weight of this processor; must be positive
    pub trust_weight: f32,

    /// Ordering for sequential execution and vote tie-breaks
    /// (lower rank wins)
    pub priority_rank: u32,

    /// Per-call extraction timeout in milliseconds
    pub timeout_ms: u64,

    /// Whether the processor participates at all
    pub enabled: bool,

    /// Whether the underlying engine tolerates concurrent calls; when
    /// false the adapter serializes calls internally
    pub reentrant: bool,
}

impl ProcessorDescriptor {
    /// Create a descriptor with default timeout (2s), enabled, reentrant
    pub fn new(processor_id: impl Into<String>, trust_weight: f32, priority_rank: u32) -> Self {
        Self {
            processor_id: processor_id.into(),
            trust_weight,
            priority_rank,
            timeout_ms: 2_000,
            enabled: true,
            reentrant: true,
        }
    }

    /// Set the timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Mark the underlying engine as not reentrant-safe
    pub fn non_reentrant(mut self) -> Self {
        self.reentrant = false;
        self
    }

    /// Timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Scorer Configuration
// ============================================================================

/// Weights of the quality scorer's named factors
///
/// Must sum to 1.0; rejected at validation otherwise.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScorerWeights {
    /// Span-length suitability factor
    pub span_length: f32,

    /// Descriptive-modifier density factor
    pub lexical_richness: f32,

    /// Per-type heuristic factor
    pub type_heuristics: f32,

    /// Ensemble-agreement bonus factor
    pub agreement: f32,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            span_length: 0.25,
            lexical_richness: 0.30,
            type_heuristics: 0.25,
            agreement: 0.20,
        }
    }
}

impl ScorerWeights {
    /// Sum of all factor weights
    pub fn sum(&self) -> f32 {
        self.span_length + self.lexical_richness + self.type_heuristics + self.agreement
    }
}

/// Quality scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Factor weights (must sum to 1.0)
    pub weights: ScorerWeights,

    /// Spans shorter than this many tokens are penalized
    pub min_tokens: usize,

    /// Spans longer than this many tokens are penalized
    pub max_tokens: usize,

    /// Candidates scoring below this are excluded from the final output
    pub acceptance_threshold: f32,

    /// Retain rejected candidates on the outcome for calibration
    pub keep_rejected: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weights: ScorerWeights::default(),
            min_tokens: 3,
            max_tokens: 40,
            acceptance_threshold: 0.3,
            keep_rejected: false,
        }
    }
}

// ============================================================================
// Deduplicator Configuration
// ============================================================================

/// Deduplicator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Edit-distance similarity ratio above which same-typed candidates
    /// merge (normalized Levenshtein)
    pub similarity_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

// ============================================================================
// Adaptive Selector Configuration
// ============================================================================

/// Thresholds driving per-call strategy selection
///
/// The default banding is a designed starting point, not a canonical
/// constant; deployments retune it against labeled validation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveThresholds {
    /// Texts up to this many characters use `Single`
    pub short_max_chars: usize,

    /// Texts up to this many characters use `Sequential`; longer texts
    /// use `Parallel` or `Ensemble`
    pub medium_max_chars: usize,

    /// Ambiguity signal (per-token pronoun density minus proper-noun
    /// density) above which medium texts escalate past `Sequential` and
    /// long texts prefer `Ensemble` over `Parallel`
    pub ambiguity_threshold: f32,
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self {
            short_max_chars: 500,
            medium_max_chars: 3_000,
            ambiguity_threshold: 0.12,
        }
    }
}

// ============================================================================
// Strategy Configuration
// ============================================================================

/// Top-level extraction configuration
///
/// Treated as copy-on-write by the manager: reconfiguration produces a new
/// immutable snapshot and in-flight calls keep the one they started with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Orchestration mode
    pub mode: StrategyMode,

    /// Span overlap ratio above which two raw entities cluster together
    pub overlap_tolerance: f32,

    /// Minimum total trust weight of distinct processors in a cluster for
    /// it to become a description candidate
    pub vote_quorum_weight: f32,

    /// Sequential strategy: best quality score that stops further
    /// processors from running
    pub early_exit_threshold: f32,

    /// Drop entities whose native label maps to `Other`
    pub exclude_other: bool,

    /// Processor roster, in configuration order
    pub processors: Vec<ProcessorDescriptor>,

    /// Quality scorer settings
    pub scorer: ScorerConfig,

    /// Deduplicator settings
    pub dedup: DedupConfig,

    /// Adaptive selector settings
    pub adaptive: AdaptiveThresholds,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            mode: StrategyMode::Adaptive,
            overlap_tolerance: 0.5,
            vote_quorum_weight: 1.0,
            early_exit_threshold: 0.75,
            exclude_other: false,
            processors: vec![
                ProcessorDescriptor::new("pattern", 1.0, 0),
                ProcessorDescriptor::new("lexicon", 0.8, 1),
                ProcessorDescriptor::new("proper_noun", 0.6, 2),
            ],
            scorer: ScorerConfig::default(),
            dedup: DedupConfig::default(),
            adaptive: AdaptiveThresholds::default(),
        }
    }
}

impl StrategyConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment-variable overrides (LIMN_MODE, LIMN_QUORUM_WEIGHT,
    /// LIMN_OVERLAP_TOLERANCE, LIMN_ACCEPTANCE_THRESHOLD), then re-validate
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        if let Ok(mode) = std::env::var("LIMN_MODE") {
            self.mode = mode.parse()?;
        }
        if let Ok(quorum) = std::env::var("LIMN_QUORUM_WEIGHT") {
            self.vote_quorum_weight = parse_env_f32("LIMN_QUORUM_WEIGHT", &quorum)?;
        }
        if let Ok(tol) = std::env::var("LIMN_OVERLAP_TOLERANCE") {
            self.overlap_tolerance = parse_env_f32("LIMN_OVERLAP_TOLERANCE", &tol)?;
        }
        if let Ok(threshold) = std::env::var("LIMN_ACCEPTANCE_THRESHOLD") {
            self.scorer.acceptance_threshold =
                parse_env_f32("LIMN_ACCEPTANCE_THRESHOLD", &threshold)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Enabled processors in configuration order
    pub fn enabled_processors(&self) -> impl Iterator<Item = &ProcessorDescriptor> {
        self.processors.iter().filter(|p| p.enabled)
    }

    /// Sum of trust weights across enabled processors
    pub fn total_enabled_weight(&self) -> f32 {
        self.enabled_processors().map(|p| p.trust_weight).sum()
    }

    /// The longest per-processor timeout among enabled processors; used as
    /// the overall deadline for parallel strategies
    pub fn max_timeout(&self) -> Duration {
        self.enabled_processors()
            .map(ProcessorDescriptor::timeout)
            .max()
            .unwrap_or(Duration::from_millis(2_000))
    }

    /// Validate the configuration, failing fast on any inconsistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_processors().next().is_none() {
            return Err(ConfigError::NoProcessors);
        }

        for p in &self.processors {
            if p.trust_weight <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("processors.{}.trust_weight", p.processor_id),
                    value: p.trust_weight.to_string(),
                });
            }
            if p.timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("processors.{}.timeout_ms", p.processor_id),
                    value: "0".to_string(),
                });
            }
        }

        let available = self.total_enabled_weight();
        if self.vote_quorum_weight > available {
            return Err(ConfigError::QuorumExceedsWeight {
                quorum: self.vote_quorum_weight,
                available,
            });
        }

        if !(0.0..=1.0).contains(&self.overlap_tolerance) {
            return Err(ConfigError::InvalidValue {
                key: "overlap_tolerance".to_string(),
                value: self.overlap_tolerance.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.scorer.acceptance_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "scorer.acceptance_threshold".to_string(),
                value: self.scorer.acceptance_threshold.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "dedup.similarity_threshold".to_string(),
                value: self.dedup.similarity_threshold.to_string(),
            });
        }

        let sum = self.scorer.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::WeightsNotNormalized { sum });
        }

        if self.scorer.min_tokens >= self.scorer.max_tokens {
            return Err(ConfigError::InvalidValue {
                key: "scorer.min_tokens".to_string(),
                value: self.scorer.min_tokens.to_string(),
            });
        }

        if self.adaptive.short_max_chars >= self.adaptive.medium_max_chars {
            return Err(ConfigError::InvalidValue {
                key: "adaptive.short_max_chars".to_string(),
                value: self.adaptive.short_max_chars.to_string(),
            });
        }

        Ok(())
    }
}

fn parse_env_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Vote quorum weight {quorum} exceeds total enabled trust weight {available}")]
    QuorumExceedsWeight { quorum: f32, available: f32 },

    #[error("Scorer factor weights must sum to 1.0, got {sum}")]
    WeightsNotNormalized { sum: f32 },

    #[error("At least one enabled processor is required")]
    NoProcessors,

    #[error("No adapter registered for configured processor {0}")]
    UnknownProcessor(String),
}

// ============================================================================
// Tests
// ============================================================================
