//! Deduplication and cross-set merging
//!
//! Runs after scoring over the full candidate set. Two candidates merge
//! when their normalized texts are equal, or when their edit-distance
//! similarity exceeds the configured threshold and they share a type. The
//! higher-scoring candidate's metadata survives; contributing processors
//! are unioned and occurrence counts accumulate. The operation is
//! idempotent, and `merge_sets` exposes it standalone so callers can merge
//! result sets across chapters.

use limn_core::{DedupConfig, Description};

/// Idempotent near-duplicate merger
#[derive(Debug, Clone)]
pub struct Deduplicator {
    similarity_threshold: f32,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
        }
    }

    /// Merge near-duplicates, keeping the best-scoring instance of each
    ///
    /// Output is sorted by ascending span start. Re-running on an already
    /// deduplicated set is a no-op (up to occurrence counts, which only
    /// change when an actual merge happens).
    pub fn dedup(&self, mut candidates: Vec<Description>) -> Vec<Description> {
        // Highest quality first, so the survivor of any merge is always
        // the best-scoring instance
        candidates.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut survivors: Vec<Description> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match survivors
                .iter_mut()
                .find(|kept| self.should_merge(kept, &candidate))
            {
                Some(kept) => {
                    kept.contributing_processors
                        .extend(candidate.contributing_processors);
                    kept.occurrence_count += candidate.occurrence_count;
                    tracing::debug!(text = %kept.text, "merged duplicate candidate");
                }
                None => survivors.push(candidate),
            }
        }

        survivors.sort_by_key(|d| d.span.start);
        survivors
    }

    /// Standalone entry point for merging multiple prior result sets
    /// (e.g., across chapters); the caller owns the inputs and the result
    pub fn merge_sets(&self, sets: Vec<Vec<Description>>) -> Vec<Description> {
        self.dedup(sets.into_iter().flatten().collect())
    }

    /// Merge rule: normalized equality, or high edit-distance similarity
    /// within the same type
    fn should_merge(&self, a: &Description, b: &Description) -> bool {
        let na = normalize(&a.text);
        let nb = normalize(&b.text);
        if na == nb {
            return true;
        }
        a.description_type == b.description_type
            && strsim::normalized_levenshtein(&na, &nb) as f32 > self.similarity_threshold
    }
}

/// Case-insensitive, whitespace-collapsed comparison form
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
