//! Limn Engine - Strategy orchestration and extraction management
//!
//! Executes the concrete extraction strategies over a set of processor
//! handles and exposes the [`manager::ExtractionManager`], the single entry
//! point applications use:
//! - [`strategy`]: the five orchestration policies over one shared
//!   reconciliation pipeline (mapping, voting, scoring, dedup)
//! - [`adaptive`]: per-call strategy selection from text signals and history
//! - [`stats`]: rolling per-strategy success counters
//! - [`cache`]: moka-backed advisory outcome cache
//! - [`manager`]: lifecycle, configuration snapshots, outcome assembly

pub mod adaptive;
pub mod cache;
pub mod manager;
pub mod stats;
pub mod strategy;

pub use adaptive::{AdaptiveSelector, TextSignals};
pub use cache::{CacheStats, CacheStatsReport, OutcomeCache, OutcomeCacheConfig};
pub use manager::ExtractionManager;
pub use stats::{StrategyStats, StrategyStatsEntry, StrategyStatsReport};
pub use strategy::{StrategyEngine, StrategyOutcome};
