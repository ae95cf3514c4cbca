//! Ensemble voting
//!
//! Clusters overlapping spans from different processors and resolves each
//! cluster's type and confidence by weighted vote. A cluster only becomes a
//! description candidate when the trust weight of its distinct contributing
//! processors reaches the configured quorum: a deliberate
//! precision-over-recall choice.

use std::collections::{BTreeSet, HashMap};

use limn_core::{Description, DescriptionType, RawEntity, Span, StrategyConfig};

/// A raw entity whose native label has already been normalized
#[derive(Debug, Clone)]
pub struct MappedEntity {
    pub entity: RawEntity,
    pub description_type: DescriptionType,
}

/// Trust parameters of one processor, snapshotted from its descriptor
#[derive(Debug, Clone, Copy)]
struct ProcessorTrust {
    weight: f32,
    priority_rank: u32,
}

/// Weighted-vote reconciler over entities from multiple processors
#[derive(Debug, Clone)]
pub struct EnsembleVoter {
    overlap_tolerance: f32,
    quorum_weight: f32,
    trust: HashMap<String, ProcessorTrust>,
}

impl EnsembleVoter {
    /// Build a voter from the enabled processors of a config snapshot
    pub fn from_config(config: &StrategyConfig) -> Self {
        let trust = config
            .enabled_processors()
            .map(|p| {
                (
                    p.processor_id.clone(),
                    ProcessorTrust {
                        weight: p.trust_weight,
                        priority_rank: p.priority_rank,
                    },
                )
            })
            .collect();

        Self {
            overlap_tolerance: config.overlap_tolerance,
            quorum_weight: config.vote_quorum_weight,
            trust,
        }
    }

    /// Override the quorum weight (the Ensemble strategy forces a majority
    /// of the total configured weight)
    pub fn with_quorum(mut self, quorum_weight: f32) -> Self {
        self.quorum_weight = quorum_weight;
        self
    }

    /// Build a description from a single entity without voting
    ///
    /// Used by the Single strategy: the trivial one-member cluster keeps
    /// the processor's own confidence.
    pub fn singleton(mapped: MappedEntity) -> Description {
        let mut processors = BTreeSet::new();
        processors.insert(mapped.entity.processor_id.clone());
        Description::new(
            mapped.entity.text,
            mapped.description_type,
            mapped.entity.span,
            mapped.entity.confidence,
            processors,
        )
    }

    /// Cluster, vote, and apply the quorum
    ///
    /// Output candidates carry agreement confidence; quality scores are
    /// assigned downstream. Candidates are ordered by ascending span start.
    pub fn vote(&self, entities: Vec<MappedEntity>) -> Vec<Description> {
        let clusters = self.cluster(entities);
        let mut candidates = Vec::new();

        for cluster in clusters {
            if let Some(candidate) = self.resolve(cluster) {
                candidates.push(candidate);
            }
        }

        candidates.sort_by_key(|c| c.span.start);
        candidates
    }

    /// Single-link clustering over entities sorted by span start: an entity
    /// joins the first cluster whose union span overlaps it above tolerance
    fn cluster(&self, mut entities: Vec<MappedEntity>) -> Vec<Vec<MappedEntity>> {
        entities.sort_by_key(|e| (e.entity.span.start, e.entity.span.end));

        let mut clusters: Vec<(Span, Vec<MappedEntity>)> = Vec::new();
        for entity in entities {
            let span = entity.entity.span;
            match clusters
                .iter_mut()
                .find(|(union, _)| union.overlap_ratio(&span) > self.overlap_tolerance)
            {
                Some((union, members)) => {
                    *union = union.union(&span);
                    members.push(entity);
                }
                None => clusters.push((span, vec![entity])),
            }
        }

        clusters.into_iter().map(|(_, members)| members).collect()
    }

    /// Weighted vote within one cluster; returns `None` when the cluster
    /// fails quorum
    fn resolve(&self, members: Vec<MappedEntity>) -> Option<Description> {
        // Per-type tallies: total vote weight, merged span, best (lowest)
        // priority rank among voters
        struct Tally {
            weight: f32,
            merged_span: Span,
            best_rank: u32,
        }

        let mut tallies: HashMap<DescriptionType, Tally> = HashMap::new();
        let mut participants: HashMap<&str, f32> = HashMap::new();
        let mut union_span: Option<Span> = None;
        let mut total_weight = 0.0f32;

        for member in &members {
            let trust = match self.trust.get(&member.entity.processor_id) {
                Some(trust) => *trust,
                // Entities from processors outside the snapshot (disabled
                // mid-flight) carry no vote
                None => continue,
            };

            let vote = trust.weight * member.entity.confidence;
            total_weight += vote;

            let span = member.entity.span;
            union_span = Some(match union_span {
                Some(u) => u.union(&span),
                None => span,
            });

            participants
                .entry(member.entity.processor_id.as_str())
                .or_insert(trust.weight);

            tallies
                .entry(member.description_type)
                .and_modify(|t| {
                    t.weight += vote;
                    t.merged_span = t.merged_span.union(&span);
                    t.best_rank = t.best_rank.min(trust.priority_rank);
                })
                .or_insert(Tally {
                    weight: vote,
                    merged_span: span,
                    best_rank: trust.priority_rank,
                });
        }

        let union_span = union_span?;

        let participating_weight: f32 = participants.values().sum();
        if participating_weight < self.quorum_weight {
            tracing::debug!(
                weight = participating_weight,
                quorum = self.quorum_weight,
                "cluster dropped: insufficient agreement"
            );
            return None;
        }

        // Tie-break order: total weight, longer merged span, lower rank
        let (winner, tally) = tallies.into_iter().max_by(|(_, a), (_, b)| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.merged_span.len().cmp(&b.merged_span.len()))
                .then(b.best_rank.cmp(&a.best_rank))
        })?;

        let confidence = if total_weight > 0.0 {
            (tally.weight / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Text of the longest member span, assumed most complete
        let text = members
            .iter()
            .max_by_key(|m| m.entity.span.len())
            .map(|m| m.entity.text.clone())?;

        let processors: BTreeSet<String> =
            members.iter().map(|m| m.entity.processor_id.clone()).collect();

        Some(Description::new(
            text,
            winner,
            union_span,
            confidence,
            processors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limn_core::{ProcessorDescriptor, StrategyConfig};

    fn config(quorum: f32) -> StrategyConfig {
        let mut config = StrategyConfig {
            processors: vec![
                ProcessorDescriptor::new("alpha", 1.0, 0),
                ProcessorDescriptor::new("beta", 0.8, 1),
                ProcessorDescriptor::new("gamma", 0.6, 2),
            ],
            ..StrategyConfig::default()
        };
        config.vote_quorum_weight = quorum;
        config
    }

    fn mapped(
        processor: &str,
        start: usize,
        end: usize,
        text: &str,
        ty: DescriptionType,
        confidence: f32,
    ) -> MappedEntity {
        MappedEntity {
            entity: RawEntity::new(Span::new(start, end), text, "X", confidence, processor),
            description_type: ty,
        }
    }

    #[test]
    fn test_unanimous_agreement() {
        // Three processors tag the same span as Location
        let voter = EnsembleVoter::from_config(&config(1.0));
        let candidates = voter.vote(vec![
            mapped("alpha", 10, 23, "a dark forest", DescriptionType::Location, 0.9),
            mapped("beta", 10, 23, "a dark forest", DescriptionType::Location, 0.85),
            mapped("gamma", 10, 23, "a dark forest", DescriptionType::Location, 0.8),
        ]);

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.description_type, DescriptionType::Location);
        assert!(c.confidence >= 0.8, "unanimous vote, confidence {}", c.confidence);
        assert_eq!(c.contributing_processors.len(), 3);
    }

    #[test]
    fn test_overlapping_spans_merge_to_union() {
        let voter = EnsembleVoter::from_config(&config(1.0));
        let candidates = voter.vote(vec![
            mapped("alpha", 10, 23, "a dark forest", DescriptionType::Location, 0.9),
            mapped("beta", 12, 23, "dark forest", DescriptionType::Location, 0.9),
        ]);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].span, Span::new(10, 23));
        assert_eq!(candidates[0].text, "a dark forest");
    }

    #[test]
    fn test_disjoint_spans_stay_separate() {
        let voter = EnsembleVoter::from_config(&config(0.5));
        let candidates = voter.vote(vec![
            mapped("alpha", 0, 10, "the harbor", DescriptionType::Location, 0.9),
            mapped("alpha", 50, 60, "a lantern", DescriptionType::Object, 0.9),
        ]);
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].span.start < candidates[1].span.start);
    }

    #[test]
    fn test_heavier_vote_wins_type() {
        let voter = EnsembleVoter::from_config(&config(1.0));
        let candidates = voter.vote(vec![
            mapped("alpha", 5, 20, "the old keep", DescriptionType::Location, 0.9),
            mapped("beta", 5, 20, "the old keep", DescriptionType::Object, 0.5),
        ]);

        // alpha: 1.0*0.9 = 0.9 beats beta: 0.8*0.5 = 0.4
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].description_type, DescriptionType::Location);
        // winning weight / total weight
        let expected = 0.9 / (0.9 + 0.4);
        assert!((candidates[0].confidence - expected).abs() < 1e-5);
    }

    #[test]
    fn test_tie_breaks_on_priority_rank() {
        // Equal vote weight and equal spans: lower rank (alpha) wins
        let mut cfg = config(1.0);
        cfg.processors[1].trust_weight = 1.0;
        let voter = EnsembleVoter::from_config(&cfg);

        let candidates = voter.vote(vec![
            mapped("alpha", 5, 20, "the old keep", DescriptionType::Location, 0.8),
            mapped("beta", 5, 20, "the old keep", DescriptionType::Object, 0.8),
        ]);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].description_type, DescriptionType::Location);
    }

    #[test]
    fn test_quorum_drops_lone_voter() {
        // Quorum of 1.5 exceeds gamma's lone 0.6 trust weight
        let voter = EnsembleVoter::from_config(&config(1.5));
        let candidates = voter.vote(vec![mapped(
            "gamma",
            0,
            8,
            "a cloak",
            DescriptionType::Object,
            0.99,
        )]);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_quorum_uses_trust_not_confidence() {
        // Two low-confidence voters still carry their full trust weight
        // toward quorum (1.0 + 0.8 >= 1.5)
        let voter = EnsembleVoter::from_config(&config(1.5));
        let candidates = voter.vote(vec![
            mapped("alpha", 0, 8, "the moor", DescriptionType::Location, 0.2),
            mapped("beta", 0, 8, "the moor", DescriptionType::Location, 0.2),
        ]);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_output_sorted_by_span_start() {
        let voter = EnsembleVoter::from_config(&config(0.5));
        let candidates = voter.vote(vec![
            mapped("alpha", 40, 50, "a lantern", DescriptionType::Object, 0.9),
            mapped("alpha", 0, 10, "the harbor", DescriptionType::Location, 0.9),
            mapped("alpha", 20, 30, "the gloom", DescriptionType::Atmosphere, 0.9),
        ]);
        let starts: Vec<usize> = candidates.iter().map(|c| c.span.start).collect();
        assert_eq!(starts, vec![0, 20, 40]);
    }

    #[test]
    fn test_singleton_keeps_processor_confidence() {
        let d = EnsembleVoter::singleton(mapped(
            "alpha",
            3,
            10,
            "the fog",
            DescriptionType::Atmosphere,
            0.7,
        ));
        assert!((d.confidence - 0.7).abs() < f32::EPSILON);
        assert!(d.contributing_processors.contains("alpha"));
    }

    #[test]
    fn test_confidence_bounded() {
        let voter = EnsembleVoter::from_config(&config(0.5));
        let candidates = voter.vote(vec![
            mapped("alpha", 0, 10, "the harbor", DescriptionType::Location, 1.0),
            mapped("beta", 0, 10, "the harbor", DescriptionType::Location, 1.0),
            mapped("gamma", 0, 10, "the harbor", DescriptionType::Location, 1.0),
        ]);
        for c in &candidates {
            assert!((0.0..=1.0).contains(&c.confidence));
        }
    }
}
