//! Gazetteer processor
//!
//! Dictionary-based extractor with alias support: a curated lexicon of
//! scene-setting nouns and mood terms, matched case-insensitively on word
//! boundaries. Main terms score higher than aliases.

use std::sync::OnceLock;

use crate::{char_span, ProcessorAdapter};
use limn_core::{LimnError, RawEntity, Result};

/// Dictionary entry: canonical term, native label, aliases
struct GazetteerEntry {
    term: &'static str,
    label: &'static str,
    aliases: &'static [&'static str],
}

const GAZETTEER: &[GazetteerEntry] = &[
    // Places
    GazetteerEntry { term: "forest", label: "PLACE", aliases: &["woods", "woodland", "thicket"] },
    GazetteerEntry { term: "castle", label: "PLACE", aliases: &["keep", "fortress", "citadel"] },
    GazetteerEntry { term: "harbor", label: "PLACE", aliases: &["port", "quay", "wharf"] },
    GazetteerEntry { term: "village", label: "PLACE", aliases: &["hamlet"] },
    GazetteerEntry { term: "tavern", label: "PLACE", aliases: &["inn", "alehouse"] },
    GazetteerEntry { term: "graveyard", label: "PLACE", aliases: &["cemetery", "churchyard"] },
    GazetteerEntry { term: "moor", label: "PLACE", aliases: &["heath"] },
    // Artifacts
    GazetteerEntry { term: "lantern", label: "ARTIFACT", aliases: &["lamp"] },
    GazetteerEntry { term: "sword", label: "ARTIFACT", aliases: &["blade", "sabre"] },
    GazetteerEntry { term: "cloak", label: "ARTIFACT", aliases: &["mantle", "shawl"] },
    GazetteerEntry { term: "carriage", label: "ARTIFACT", aliases: &["coach", "cart"] },
    GazetteerEntry { term: "manuscript", label: "ARTIFACT", aliases: &["parchment", "scroll"] },
    // Moods
    GazetteerEntry { term: "gloom", label: "MOOD", aliases: &["murk", "dimness"] },
    GazetteerEntry { term: "silence", label: "MOOD", aliases: &["stillness", "hush"] },
    GazetteerEntry { term: "storm", label: "MOOD", aliases: &["tempest", "gale"] },
    GazetteerEntry { term: "dread", label: "MOOD", aliases: &["foreboding", "unease"] },
    // Figures
    GazetteerEntry { term: "stranger", label: "FIGURE", aliases: &["newcomer", "wanderer"] },
    GazetteerEntry { term: "innkeeper", label: "FIGURE", aliases: &["landlord"] },
    GazetteerEntry { term: "sentry", label: "FIGURE", aliases: &["watchman", "guard"] },
];

const TERM_CONFIDENCE: f32 = 0.9;
const ALIAS_CONFIDENCE: f32 = 0.85;

/// Flattened lookup: lowercase surface form -> (label, confidence)
type Lookup = Vec<(String, &'static str, f32)>;

/// Dictionary-based narrative description extractor
pub struct LexiconProcessor {
    lookup: OnceLock<Lookup>,
}

impl LexiconProcessor {
    pub fn new() -> Self {
        Self {
            lookup: OnceLock::new(),
        }
    }

    fn build_lookup() -> Lookup {
        let mut lookup = Vec::new();
        for entry in GAZETTEER {
            lookup.push((entry.term.to_lowercase(), entry.label, TERM_CONFIDENCE));
            for alias in entry.aliases {
                lookup.push((alias.to_lowercase(), entry.label, ALIAS_CONFIDENCE));
            }
        }
        // Longest surface forms first so nested terms don't shadow them
        lookup.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        lookup
    }

    /// Lowercase `text` for matching, keeping a map from each byte of the
    /// folded string back to the byte offset of its source character
    ///
    /// Some case folds expand (U+0130 lowercases to two characters), so
    /// offsets into the folded string drift relative to the input and must
    /// be mapped back before slicing.
    fn fold(text: &str) -> (String, Vec<usize>) {
        let mut lowered = String::with_capacity(text.len());
        let mut origin = Vec::with_capacity(text.len());
        for (idx, c) in text.char_indices() {
            for lc in c.to_lowercase() {
                lowered.push(lc);
                origin.resize(lowered.len(), idx);
            }
        }
        (lowered, origin)
    }

    /// Word-boundary check on byte offsets into `text`
    fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
        let before_ok = start == 0
            || text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_alphanumeric());
        let after_ok = end == text.len()
            || text[end..].chars().next().is_some_and(|c| !c.is_alphanumeric());
        before_ok && after_ok
    }
}

impl Default for LexiconProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProcessorAdapter for LexiconProcessor {
    fn id(&self) -> &str {
        "lexicon"
    }

    async fn initialize(&self) -> Result<()> {
        let _ = self.lookup.set(Self::build_lookup());
        Ok(())
    }

    async fn extract(&self, text: &str, _language_hint: Option<&str>) -> Result<Vec<RawEntity>> {
        let lookup = self
            .lookup
            .get()
            .ok_or_else(|| LimnError::ProcessorUnavailable {
                processor_id: "lexicon".to_string(),
                reason: "gazetteer not loaded".to_string(),
            })?;

        let (lowered, origin) = Self::fold(text);
        let mut entities = Vec::new();

        for (surface, label, confidence) in lookup {
            for (start, _) in lowered.match_indices(surface.as_str()) {
                let end = start + surface.len();
                if !Self::on_word_boundary(&lowered, start, end) {
                    continue;
                }
                // Map folded offsets back to the input and slice it, so
                // spans stay valid and casing is preserved
                let orig_start = origin[start];
                let orig_end = origin.get(end).copied().unwrap_or(text.len());
                let span = char_span(text, orig_start, orig_end);
                // Skip positions already claimed by a longer surface form
                let covered = entities
                    .iter()
                    .any(|e: &RawEntity| e.span.overlap_ratio(&span) > 0.0);
                if covered {
                    continue;
                }
                entities.push(RawEntity::new(
                    span,
                    &text[orig_start..orig_end],
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

    async fn ready() -> LexiconProcessor {
        let p = LexiconProcessor::new();
        p.initialize().await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_term_match() {
        let p = ready().await;
        let entities = p
            .extract("The forest lay under a heavy gloom.", None)
            .await
            .unwrap();

        assert!(entities
            .iter()
            .any(|e| e.native_label == "PLACE" && e.text == "forest"));
        assert!(entities
            .iter()
            .any(|e| e.native_label == "MOOD" && e.text == "gloom"));
    }

    #[tokio::test]
    async fn test_alias_scores_below_term() {
        let p = ready().await;
        let entities = p
            .extract("They sheltered in the woods near the fortress.", None)
            .await
            .unwrap();

        let woods = entities.iter().find(|e| e.text == "woods").unwrap();
        let fortress = entities.iter().find(|e| e.text == "fortress").unwrap();
        assert_eq!(woods.native_label, "PLACE");
        assert_eq!(fortress.native_label, "PLACE");
        assert!(woods.confidence < TERM_CONFIDENCE);
        assert!(fortress.confidence < TERM_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_word_boundary_respected() {
        let p = ready().await;
        // "deforestation" must not match "forest"
        let entities = p
            .extract("A report on deforestation trends.", None)
            .await
            .unwrap();
        assert!(entities.is_empty());
    }

    #[tokio::test]
    async fn test_case_insensitive_keeps_original_casing() {
        let p = ready().await;
        let entities = p.extract("SILENCE filled the HALL.", None).await.unwrap();

        let silence = entities.iter().find(|e| e.native_label == "MOOD").unwrap();
        assert_eq!(silence.text, "SILENCE");
    }

    #[tokio::test]
    async fn test_offsets_track_expanding_case_folds() {
        let p = ready().await;
        // U+0130 lowercases to two characters; spans after it must not drift
        let text = "İt was the forest İ feared.";
        let entities = p.extract(text, None).await.unwrap();

        let forest = entities.iter().find(|e| e.native_label == "PLACE").unwrap();
        assert_eq!(forest.text, "forest");
        let by_chars: String = text
            .chars()
            .skip(forest.span.start)
            .take(forest.span.len())
            .collect();
        assert_eq!(by_chars, "forest");
    }
}
