//! Adaptive strategy selection
//!
//! Chooses a concrete strategy per call from measurable text signals
//! (length, pronoun vs proper-noun density) and the manager's rolling
//! per-strategy success rates. The banding thresholds live in
//! configuration, not code, so deployments retune without rebuilds.

use limn_core::{AdaptiveThresholds, StrategyMode};

use crate::stats::StrategyStats;

/// Pronouns counted toward the ambiguity signal
const PRONOUNS: &[&str] = &[
    "he", "she", "it", "they", "him", "her", "them", "his", "hers", "its", "their", "theirs",
    "himself", "herself", "itself", "themselves",
];

/// Measurable per-call input characteristics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextSignals {
    /// Input length in characters
    pub chars: usize,

    /// Pronoun tokens per token
    pub pronoun_density: f32,

    /// Capitalized non-sentence-initial tokens per token
    pub proper_noun_density: f32,
}

impl TextSignals {
    /// Compute signals in one pass over the text
    pub fn analyze(text: &str) -> Self {
        let chars = text.chars().count();

        let mut tokens = 0usize;
        let mut pronouns = 0usize;
        let mut propers = 0usize;
        let mut sentence_start = true;

        for raw in text.split_whitespace() {
            let word: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
            if word.is_empty() {
                continue;
            }
            tokens += 1;

            if PRONOUNS.contains(&word.to_lowercase().as_str()) {
                pronouns += 1;
            } else if !sentence_start
                && word.chars().next().is_some_and(|c| c.is_uppercase())
                && word.chars().skip(1).any(|c| c.is_lowercase())
            {
                propers += 1;
            }

            sentence_start = raw.ends_with(['.', '!', '?']);
        }

        if tokens == 0 {
            return Self {
                chars,
                pronoun_density: 0.0,
                proper_noun_density: 0.0,
            };
        }

        Self {
            chars,
            pronoun_density: pronouns as f32 / tokens as f32,
            proper_noun_density: propers as f32 / tokens as f32,
        }
    }

    /// Ambiguity: pronoun-heavy, name-poor text is hard for any single
    /// extractor, so it earns more expensive strategies
    pub fn ambiguity(&self) -> f32 {
        (self.pronoun_density - self.proper_noun_density).max(0.0)
    }
}

/// Per-call strategy chooser
#[derive(Debug, Clone)]
pub struct AdaptiveSelector {
    thresholds: AdaptiveThresholds,
}

impl AdaptiveSelector {
    pub fn new(thresholds: AdaptiveThresholds) -> Self {
        Self { thresholds }
    }

    /// Pick a concrete strategy for this input
    pub fn select(&self, text: &str, stats: &StrategyStats) -> StrategyMode {
        let signals = TextSignals::analyze(text);
        let ambiguous = signals.ambiguity() > self.thresholds.ambiguity_threshold;

        let mode = if signals.chars < self.thresholds.short_max_chars {
            StrategyMode::Single
        } else if signals.chars <= self.thresholds.medium_max_chars {
            if ambiguous {
                StrategyMode::Parallel
            } else {
                StrategyMode::Sequential
            }
        } else if ambiguous {
            StrategyMode::Ensemble
        } else {
            // Long, unambiguous text: history breaks the Parallel/Ensemble
            // tie when Ensemble has demonstrably done better
            match (
                stats.success_rate(StrategyMode::Parallel),
                stats.success_rate(StrategyMode::Ensemble),
            ) {
                (Some(p), Some(e)) if e > p => StrategyMode::Ensemble,
                _ => StrategyMode::Parallel,
            }
        };

        tracing::debug!(
            chars = signals.chars,
            ambiguity = signals.ambiguity(),
            selected = %mode,
            "adaptive selection"
        );
        mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> AdaptiveSelector {
        AdaptiveSelector::new(AdaptiveThresholds::default())
    }

    #[test]
    fn test_short_text_selects_single() {
        let text = "A short paragraph about the old harbor at dusk."; // ~200 chars max
        assert_eq!(
            selector().select(text, &StrategyStats::new()),
            StrategyMode::Single
        );
    }

    #[test]
    fn test_medium_text_selects_sequential() {
        let sentence = "The carriage rolled past the Ashford estate toward the village. ";
        let text = sentence.repeat(20); // ~1,280 chars
        assert!(text.len() > 500 && text.len() <= 3_000);
        assert_eq!(
            selector().select(&text, &StrategyStats::new()),
            StrategyMode::Sequential
        );
    }

    #[test]
    fn test_long_text_selects_parallel_or_ensemble() {
        let sentence = "Rain swept across the moor while the sentry watched the road below. ";
        let text = sentence.repeat(80); // ~5,400 chars
        assert!(text.len() > 3_000);
        let mode = selector().select(&text, &StrategyStats::new());
        assert!(matches!(
            mode,
            StrategyMode::Parallel | StrategyMode::Ensemble
        ));
    }

    #[test]
    fn test_ambiguous_long_text_selects_ensemble() {
        // Pronoun-heavy, no proper nouns
        let sentence = "he saw it and they followed him while she watched them closely. ";
        let text = sentence.repeat(80);
        assert!(text.len() > 3_000);
        assert_eq!(
            selector().select(&text, &StrategyStats::new()),
            StrategyMode::Ensemble
        );
    }

    #[test]
    fn test_history_prefers_better_strategy() {
        let sentence = "Rain swept across the moor while the sentry watched the road below. ";
        let text = sentence.repeat(80);

        let stats = StrategyStats::new();
        stats.record(StrategyMode::Parallel, false);
        stats.record(StrategyMode::Ensemble, true);

        assert_eq!(selector().select(&text, &stats), StrategyMode::Ensemble);
    }

    #[test]
    fn test_signals_on_empty_text() {
        let signals = TextSignals::analyze("");
        assert_eq!(signals.chars, 0);
        assert_eq!(signals.ambiguity(), 0.0);
    }

    #[test]
    fn test_pronoun_density() {
        let signals = TextSignals::analyze("He gave it to them.");
        assert!(signals.pronoun_density > 0.5);
    }
}
