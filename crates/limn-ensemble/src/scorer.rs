//! Quality scoring
//!
//! Composite relevance score for description candidates, built from named,
//! independently testable factors: span-length suitability, lexical
//! richness, type-specific heuristics, and an ensemble-agreement bonus.
//! Factor weights must sum to 1.0 and are validated when the scorer is
//! constructed, not when it is first used.

use limn_core::{ConfigError, Description, DescriptionType, ScorerConfig};

/// Geographic / scene head nouns favored by the Location heuristic
const GEOGRAPHIC_NOUNS: &[&str] = &[
    "forest", "castle", "village", "mountain", "river", "valley", "tower", "hall", "garden",
    "sea", "city", "road", "meadow", "cave", "harbor", "marsh", "cliff", "courtyard", "chamber",
    "woods", "keep", "fortress", "moor", "port", "hamlet", "inn", "tavern", "graveyard",
];

/// Concrete artifact nouns favored by the Object heuristic
const ARTIFACT_NOUNS: &[&str] = &[
    "sword", "lantern", "cloak", "ring", "mirror", "chest", "crown", "dagger", "amulet", "key",
    "map", "locket", "candle", "banner", "goblet", "lamp", "blade", "carriage", "scroll",
];

/// Mood terms favored by the Atmosphere heuristic
const MOOD_TERMS: &[&str] = &[
    "mist", "fog", "gloom", "twilight", "dusk", "dawn", "shadow", "shadows", "silence", "storm",
    "moonlight", "sunlight", "darkness", "chill", "haze", "stillness", "hush", "dread",
];

/// Suffixes that mark a token as a descriptive modifier
const MODIFIER_SUFFIXES: &[&str] = &["ing", "ed", "ous", "ful", "less", "ive", "en", "y"];

/// Common short adjectives the suffix heuristic misses
const MODIFIER_WORDS: &[&str] = &[
    "dark", "old", "grey", "gray", "pale", "cold", "warm", "deep", "vast", "grim", "thin",
    "broad", "faint", "bright", "black", "white", "red", "green", "blue", "silver", "golden",
    "ancient", "narrow", "quiet",
];

/// Composite relevance scorer
#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: ScorerConfig,
}

impl QualityScorer {
    /// Construct a scorer, rejecting factor weights that do not sum to 1.0
    pub fn new(config: ScorerConfig) -> Result<Self, ConfigError> {
        let sum = config.weights.sum();
        if (sum - 1.0).abs() > 1e-4 {
            return Err(ConfigError::WeightsNotNormalized { sum });
        }
        Ok(Self { config })
    }

    /// Score a candidate; the result is always within [0, 1]
    ///
    /// The agreement factor reuses the candidate's vote confidence, so a
    /// candidate scored before voting (confidence 0) receives no bonus.
    pub fn score(&self, candidate: &Description) -> f32 {
        let w = &self.config.weights;
        let tokens: Vec<&str> = candidate.text.split_whitespace().collect();

        let score = w.span_length * self.span_length_factor(tokens.len())
            + w.lexical_richness * Self::lexical_richness_factor(&tokens)
            + w.type_heuristics * Self::type_factor(&tokens, candidate.description_type)
            + w.agreement * candidate.confidence;

        score.clamp(0.0, 1.0)
    }

    /// Whether a score clears the acceptance threshold
    pub fn accepts(&self, score: f32) -> bool {
        score >= self.config.acceptance_threshold
    }

    /// Whether rejected candidates should be surfaced for calibration
    pub fn keep_rejected(&self) -> bool {
        self.config.keep_rejected
    }

    /// Penalize spans outside the `[min_tokens, max_tokens]` band, scaling
    /// linearly toward the band edges
    fn span_length_factor(&self, token_count: usize) -> f32 {
        if token_count == 0 {
            return 0.0;
        }
        let min = self.config.min_tokens;
        let max = self.config.max_tokens;
        if token_count < min {
            token_count as f32 / min as f32
        } else if token_count > max {
            max as f32 / token_count as f32
        } else {
            1.0
        }
    }

    /// Ratio of descriptive modifiers to total tokens, saturating so that
    /// roughly one modifier in three maxes the factor
    fn lexical_richness_factor(tokens: &[&str]) -> f32 {
        if tokens.is_empty() {
            return 0.0;
        }
        let modifiers = tokens
            .iter()
            .filter(|t| Self::is_modifier(&t.to_lowercase()))
            .count();
        let ratio = modifiers as f32 / tokens.len() as f32;
        (ratio * 3.0).min(1.0)
    }

    fn is_modifier(token: &str) -> bool {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        if token.len() < 3 {
            return false;
        }
        MODIFIER_WORDS.contains(&token)
            || MODIFIER_SUFFIXES
                .iter()
                .any(|suffix| token.len() > suffix.len() + 2 && token.ends_with(suffix))
    }

    /// Per-type heuristic: full credit when the text shows the signal the
    /// type expects, a floor value otherwise
    fn type_factor(tokens: &[&str], description_type: DescriptionType) -> f32 {
        const FLOOR: f32 = 0.3;
        let hit = match description_type {
            DescriptionType::Location => Self::contains_any(tokens, GEOGRAPHIC_NOUNS),
            DescriptionType::Object => Self::contains_any(tokens, ARTIFACT_NOUNS),
            DescriptionType::Atmosphere => Self::contains_any(tokens, MOOD_TERMS),
            DescriptionType::Character => Self::has_proper_noun(tokens),
            // Other carries no type expectation; stay neutral
            DescriptionType::Other => return 0.5,
        };
        if hit {
            1.0
        } else {
            FLOOR
        }
    }

    fn contains_any(tokens: &[&str], vocabulary: &[&str]) -> bool {
        tokens.iter().any(|t| {
            let t = t
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            vocabulary.contains(&t.as_str())
        })
    }

    /// Capitalized non-initial token, the proper-noun pattern names show
    fn has_proper_noun(tokens: &[&str]) -> bool {
        tokens.iter().any(|t| {
            t.chars().next().is_some_and(|c| c.is_uppercase())
                && t.chars().skip(1).any(|c| c.is_lowercase())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limn_core::{ConfigError, ScorerWeights, Span};
    use std::collections::BTreeSet;

    fn candidate(text: &str, ty: DescriptionType, confidence: f32) -> Description {
        Description::new(
            text,
            ty,
            Span::new(0, text.chars().count()),
            confidence,
            BTreeSet::new(),
        )
    }

    fn scorer() -> QualityScorer {
        QualityScorer::new(ScorerConfig::default()).unwrap()
    }

    #[test]
    fn test_unnormalized_weights_rejected() {
        let config = ScorerConfig {
            weights: ScorerWeights {
                span_length: 0.5,
                lexical_richness: 0.5,
                type_heuristics: 0.5,
                agreement: 0.5,
            },
            ..ScorerConfig::default()
        };
        assert!(matches!(
            QualityScorer::new(config),
            Err(ConfigError::WeightsNotNormalized { .. })
        ));
    }

    #[test]
    fn test_score_bounded() {
        let s = scorer();
        for text in ["", "a", "the ancient grey castle on the misty cliff", "x y z"] {
            for ty in [
                DescriptionType::Location,
                DescriptionType::Character,
                DescriptionType::Other,
            ] {
                let score = s.score(&candidate(text, ty, 1.0));
                assert!((0.0..=1.0).contains(&score), "{text} -> {score}");
            }
        }
    }

    #[test]
    fn test_rich_location_outscores_bare_fragment() {
        let s = scorer();
        let rich = s.score(&candidate(
            "the ancient grey castle above the misty harbor",
            DescriptionType::Location,
            0.9,
        ));
        let bare = s.score(&candidate("it was there", DescriptionType::Location, 0.9));
        assert!(rich > bare);
    }

    #[test]
    fn test_short_span_penalized() {
        let s = scorer();
        // Same richness and type signal; only the token count differs
        let short = s.score(&candidate("grey castle", DescriptionType::Location, 0.5));
        let suitable = s.score(&candidate(
            "the grey castle",
            DescriptionType::Location,
            0.5,
        ));
        assert!(suitable > short);
    }

    #[test]
    fn test_long_span_penalized() {
        let s = scorer();
        let word = "word ";
        let very_long = word.repeat(80);
        let long_score = s.score(&candidate(&very_long, DescriptionType::Other, 0.5));
        let ok_score = s.score(&candidate(&word.repeat(10), DescriptionType::Other, 0.5));
        assert!(ok_score > long_score);
    }

    #[test]
    fn test_character_favors_capitalization() {
        let s = scorer();
        let named = s.score(&candidate(
            "the weathered sailor Marlow leaned closer",
            DescriptionType::Character,
            0.5,
        ));
        let unnamed = s.score(&candidate(
            "the weathered sailor leaned in closer",
            DescriptionType::Character,
            0.5,
        ));
        assert!(named > unnamed);
    }

    #[test]
    fn test_agreement_bonus_scales_with_confidence() {
        let s = scorer();
        let high = s.score(&candidate("a dark forest rose", DescriptionType::Location, 0.95));
        let low = s.score(&candidate("a dark forest rose", DescriptionType::Location, 0.1));
        assert!(high > low);
    }

    #[test]
    fn test_acceptance_threshold() {
        let s = scorer();
        assert!(s.accepts(0.3));
        assert!(s.accepts(0.9));
        assert!(!s.accepts(0.29));
    }
}
