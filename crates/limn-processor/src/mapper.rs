//! Native-label normalization
//!
//! Each extraction engine tags spans with its own label vocabulary. The
//! [`TypeMapper`] holds one lookup table per processor and collapses every
//! native label into the canonical [`DescriptionType`] enum. Unknown labels
//! map to `Other` rather than being dropped, since `Other` entities can
//! still carry quality signal for calibration.

use std::collections::HashMap;

use limn_core::DescriptionType;

/// Per-processor native-label lookup tables
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    /// processor_id -> (lowercase native label -> canonical type)
    tables: HashMap<String, HashMap<String, DescriptionType>>,
}

impl TypeMapper {
    /// Create an empty mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper preloaded with the built-in processors' vocabularies
    pub fn with_builtin() -> Self {
        let mut mapper = Self::new();

        // PatternProcessor vocabulary
        mapper.register("pattern", "LOC_PHRASE", DescriptionType::Location);
        mapper.register("pattern", "OBJ_PHRASE", DescriptionType::Object);
        mapper.register("pattern", "ATMO", DescriptionType::Atmosphere);
        mapper.register("pattern", "FIGURE_PHRASE", DescriptionType::Character);

        // LexiconProcessor vocabulary
        mapper.register("lexicon", "PLACE", DescriptionType::Location);
        mapper.register("lexicon", "ARTIFACT", DescriptionType::Object);
        mapper.register("lexicon", "MOOD", DescriptionType::Atmosphere);
        mapper.register("lexicon", "FIGURE", DescriptionType::Character);

        // ProperNounProcessor vocabulary
        mapper.register("proper_noun", "PERSON_NAME", DescriptionType::Character);
        mapper.register("proper_noun", "PLACE_NAME", DescriptionType::Location);

        mapper
    }

    /// Register a native label for a processor (case-insensitive)
    pub fn register(
        &mut self,
        processor_id: impl Into<String>,
        native_label: &str,
        description_type: DescriptionType,
    ) {
        self.tables
            .entry(processor_id.into())
            .or_default()
            .insert(native_label.to_lowercase(), description_type);
    }

    /// Map a native label to its canonical type; unmapped labels (or
    /// unknown processors) resolve to `Other`
    pub fn map(&self, native_label: &str, processor_id: &str) -> DescriptionType {
        self.tables
            .get(processor_id)
            .and_then(|table| table.get(&native_label.to_lowercase()))
            .copied()
            .unwrap_or(DescriptionType::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_mappings() {
        let mapper = TypeMapper::with_builtin();
        assert_eq!(
            mapper.map("LOC_PHRASE", "pattern"),
            DescriptionType::Location
        );
        assert_eq!(
            mapper.map("PERSON_NAME", "proper_noun"),
            DescriptionType::Character
        );
        assert_eq!(mapper.map("MOOD", "lexicon"), DescriptionType::Atmosphere);
    }

    #[test]
    fn test_mapping_is_case_insensitive() {
        let mapper = TypeMapper::with_builtin();
        assert_eq!(mapper.map("place", "lexicon"), DescriptionType::Location);
    }

    #[test]
    fn test_unknown_label_maps_to_other() {
        let mapper = TypeMapper::with_builtin();
        assert_eq!(mapper.map("DURATION", "pattern"), DescriptionType::Other);
    }

    #[test]
    fn test_vocabularies_are_per_processor() {
        let mapper = TypeMapper::with_builtin();
        // "PLACE" belongs to the lexicon vocabulary, not the pattern one
        assert_eq!(mapper.map("PLACE", "pattern"), DescriptionType::Other);
    }

    #[test]
    fn test_unknown_processor_maps_to_other() {
        let mapper = TypeMapper::with_builtin();
        assert_eq!(mapper.map("PLACE", "statistical"), DescriptionType::Other);
    }
}
