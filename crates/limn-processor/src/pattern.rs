//! Regex-pattern processor
//!
//! Rule-based extractor for narrative text: noun phrases anchored on
//! location, object, and figure head nouns, plus bare atmosphere terms.
//! Pattern compilation is the processor's "model" and happens once, inside
//! `initialize`, behind the handle's barrier.

use std::sync::OnceLock;

use regex::Regex;

use crate::{char_span, ProcessorAdapter};
use limn_core::{LimnError, RawEntity, Result};

/// One compiled rule: pattern, native label, confidence
type Rule = (Regex, &'static str, f32);

/// Noun-phrase pattern sources, compiled at initialization
///
/// Phrase patterns allow up to two modifiers before the head noun so that
/// "the ancient crumbling castle" is captured whole.
const RULES: &[(&str, &str, f32)] = &[
    (
        r"(?i)\b(?:the|a|an)\s+(?:[a-z]+\s+){0,2}(?:forest|castle|village|mountain|river|valley|tower|hall|garden|sea|city|road|meadow|cave|harbor|marsh|cliff|courtyard|chamber)\b",
        "LOC_PHRASE",
        0.85,
    ),
    (
        r"(?i)\b(?:the|a|an)\s+(?:[a-z]+\s+){0,2}(?:sword|lantern|cloak|ring|mirror|chest|crown|dagger|amulet|key|map|locket|candle|banner|goblet)\b",
        "OBJ_PHRASE",
        0.8,
    ),
    (
        r"(?i)\b(?:the|a|an)\s+(?:[a-z]+\s+){0,2}(?:stranger|figure|woman|man|child|soldier|rider|priest|merchant|beggar|queen|king)\b",
        "FIGURE_PHRASE",
        0.75,
    ),
    (
        r"(?i)\b(?:mist|fog|gloom|twilight|dusk|dawn|shadows|silence|storm|drizzle|moonlight|sunlight|darkness|chill|haze)\b",
        "ATMO",
        0.7,
    ),
];

/// Regex-based narrative description extractor
pub struct PatternProcessor {
    rules: OnceLock<Vec<Rule>>,
}

impl PatternProcessor {
    pub fn new() -> Self {
        Self {
            rules: OnceLock::new(),
        }
    }

    fn compile() -> Result<Vec<Rule>> {
        let mut rules = Vec::with_capacity(RULES.len());
        for (source, label, confidence) in RULES {
            let regex = Regex::new(source).map_err(|e| {
                LimnError::ProcessorUnavailable {
                    processor_id: "pattern".to_string(),
                    reason: format!("bad pattern {source}: {e}"),
                }
            })?;
            rules.push((regex, *label, *confidence));
        }
        Ok(rules)
    }
}

impl Default for PatternProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProcessorAdapter for PatternProcessor {
    fn id(&self) -> &str {
        "pattern"
    }

    async fn initialize(&self) -> Result<()> {
        if self.rules.get().is_some() {
            return Ok(());
        }
        let compiled = Self::compile()?;
        let _ = self.rules.set(compiled);
        Ok(())
    }

    async fn extract(&self, text: &str, _language_hint: Option<&str>) -> Result<Vec<RawEntity>> {
        let rules = self
            .rules
            .get()
            .ok_or_else(|| LimnError::ProcessorUnavailable {
                processor_id: "pattern".to_string(),
                reason: "patterns not compiled".to_string(),
            })?;

        let mut entities = Vec::new();
        for (regex, label, confidence) in rules {
            for mat in regex.find_iter(text) {
                entities.push(RawEntity::new(
                    char_span(text, mat.start(), mat.end()),
                    mat.as_str(),
                    *label,
                    *confidence,
                    self.id(),
                ));
            }
        }

        entities.sort_by_key(|e| e.span.start);
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready() -> PatternProcessor {
        let p = PatternProcessor::new();
        p.initialize().await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_location_phrase() {
        let p = ready().await;
        let entities = p
            .extract("They rode toward a dark forest at dusk.", None)
            .await
            .unwrap();

        let loc = entities.iter().find(|e| e.native_label == "LOC_PHRASE");
        assert!(loc.is_some());
        assert_eq!(loc.unwrap().text, "a dark forest");
    }

    #[tokio::test]
    async fn test_atmosphere_term() {
        let p = ready().await;
        let entities = p
            .extract("Mist curled over the river.", None)
            .await
            .unwrap();

        assert!(entities.iter().any(|e| e.native_label == "ATMO"));
        assert!(entities.iter().any(|e| e.native_label == "LOC_PHRASE"));
    }

    #[tokio::test]
    async fn test_object_phrase_with_modifiers() {
        let p = ready().await;
        let entities = p
            .extract("She carried an old silver lantern.", None)
            .await
            .unwrap();

        let obj = entities.iter().find(|e| e.native_label == "OBJ_PHRASE");
        assert_eq!(obj.unwrap().text, "an old silver lantern");
    }

    #[tokio::test]
    async fn test_output_sorted_by_span_start() {
        let p = ready().await;
        let entities = p
            .extract("The gloom settled over the grey castle and the harbor.", None)
            .await
            .unwrap();

        assert!(entities.windows(2).all(|w| w[0].span.start <= w[1].span.start));
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_not_error() {
        let p = ready().await;
        let entities = p.extract("It simply happened again.", None).await.unwrap();
        assert!(entities.is_empty());
    }
}
