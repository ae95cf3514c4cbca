//! Per-manager strategy statistics
//!
//! Rolling attempt/success counters per concrete strategy, feeding the
//! adaptive selector's historical signal. Owned and injected by the
//! manager instance rather than living in process-global state, so
//! multiple managers in one process never cross-contaminate.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use limn_core::StrategyMode;

/// The concrete (non-adaptive) strategies, in counter-index order
const TRACKED: [StrategyMode; 4] = [
    StrategyMode::Single,
    StrategyMode::Parallel,
    StrategyMode::Sequential,
    StrategyMode::Ensemble,
];

/// Attempt/success counters per concrete strategy
#[derive(Debug, Default)]
pub struct StrategyStats {
    attempts: [AtomicU64; 4],
    successes: [AtomicU64; 4],
}

impl StrategyStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(mode: StrategyMode) -> Option<usize> {
        TRACKED.iter().position(|m| *m == mode)
    }

    /// Record one finished call for a concrete strategy
    ///
    /// `Adaptive` itself is never recorded; the manager records the
    /// strategy it resolved to.
    pub fn record(&self, mode: StrategyMode, success: bool) {
        if let Some(i) = Self::index(mode) {
            self.attempts[i].fetch_add(1, Ordering::Relaxed);
            if success {
                self.successes[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Attempts recorded for a strategy
    pub fn attempts(&self, mode: StrategyMode) -> u64 {
        Self::index(mode)
            .map(|i| self.attempts[i].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Rolling success rate; `None` before the first attempt
    pub fn success_rate(&self, mode: StrategyMode) -> Option<f64> {
        let i = Self::index(mode)?;
        let attempts = self.attempts[i].load(Ordering::Relaxed);
        if attempts == 0 {
            return None;
        }
        let successes = self.successes[i].load(Ordering::Relaxed);
        Some(successes as f64 / attempts as f64)
    }

    /// Snapshot all counters
    pub fn report(&self) -> StrategyStatsReport {
        StrategyStatsReport {
            strategies: TRACKED
                .iter()
                .map(|&mode| StrategyStatsEntry {
                    mode,
                    attempts: self.attempts(mode),
                    successes: Self::index(mode)
                        .map(|i| self.successes[i].load(Ordering::Relaxed))
                        .unwrap_or(0),
                    success_rate: self.success_rate(mode).unwrap_or(0.0),
                })
                .collect(),
        }
    }
}

/// Serializable statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStatsReport {
    pub strategies: Vec<StrategyStatsEntry>,
}

/// One strategy's counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStatsEntry {
    pub mode: StrategyMode,
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let stats = StrategyStats::new();
        assert_eq!(stats.success_rate(StrategyMode::Parallel), None);

        stats.record(StrategyMode::Parallel, true);
        stats.record(StrategyMode::Parallel, true);
        stats.record(StrategyMode::Parallel, false);

        assert_eq!(stats.attempts(StrategyMode::Parallel), 3);
        let rate = stats.success_rate(StrategyMode::Parallel).unwrap();
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_adaptive_never_tracked() {
        let stats = StrategyStats::new();
        stats.record(StrategyMode::Adaptive, true);
        assert_eq!(stats.attempts(StrategyMode::Adaptive), 0);
    }

    #[test]
    fn test_report_covers_all_concrete_strategies() {
        let stats = StrategyStats::new();
        stats.record(StrategyMode::Single, true);
        let report = stats.report();
        assert_eq!(report.strategies.len(), 4);
        assert!(report
            .strategies
            .iter()
            .any(|e| e.mode == StrategyMode::Single && e.attempts == 1));
    }
}
