//! Strategy execution
//!
//! The five orchestration policies over a shared reconciliation pipeline:
//! raw entities from processor handles flow through label mapping, ensemble
//! voting, quality scoring, and deduplication. Strategies differ only in
//! which processors they invoke, when they stop, and which quorum they
//! apply; the degraded flag is computed from invoked vs responding trust
//! weight the same way everywhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use limn_core::{Description, DescriptionType, LimnError, RawEntity, StrategyConfig, StrategyMode};
use limn_ensemble::{Deduplicator, EnsembleVoter, MappedEntity, QualityScorer};
use limn_processor::{mapper::TypeMapper, ProcessorHandle};

/// Raw strategy result, before the manager adds timing and cache metadata
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
    pub descriptions: Vec<Description>,
    pub rejected: Vec<Description>,
    pub degraded: bool,
    pub contributions: BTreeMap<String, usize>,
}

/// One extraction pass over a config snapshot
///
/// Borrowed per call: the manager clones its state `Arc` first, so
/// reconfiguration never changes a pass mid-flight.
pub struct StrategyEngine<'a> {
    config: &'a StrategyConfig,
    handles: &'a [Arc<ProcessorHandle>],
    mapper: &'a TypeMapper,
}

/// Per-call accounting of who was asked and who answered
#[derive(Debug, Default)]
struct Availability {
    invoked_weight: f32,
    responding_weight: f32,
}

impl Availability {
    /// More than half of the invoked trust weight failed to respond
    fn degraded(&self) -> bool {
        self.invoked_weight - self.responding_weight > self.invoked_weight / 2.0
    }
}

impl<'a> StrategyEngine<'a> {
    pub fn new(
        config: &'a StrategyConfig,
        handles: &'a [Arc<ProcessorHandle>],
        mapper: &'a TypeMapper,
    ) -> Self {
        Self {
            config,
            handles,
            mapper,
        }
    }

    /// Execute a concrete strategy; `Adaptive` must be resolved by the
    /// caller first
    pub async fn execute(
        &self,
        mode: StrategyMode,
        text: &str,
        language_hint: Option<&str>,
    ) -> limn_core::Result<StrategyOutcome> {
        match mode {
            StrategyMode::Single => self.run_single(text, language_hint).await,
            StrategyMode::Parallel => {
                self.run_parallel(text, language_hint, self.config.vote_quorum_weight)
                    .await
            }
            StrategyMode::Sequential => self.run_sequential(text, language_hint).await,
            StrategyMode::Ensemble => {
                // Maximum precision: quorum forced up to a majority of the
                // total configured weight
                let majority = self.config.total_enabled_weight() / 2.0;
                let quorum = majority.max(self.config.vote_quorum_weight);
                self.run_parallel(text, language_hint, quorum).await
            }
            StrategyMode::Adaptive => Err(LimnError::InvalidInput(
                "adaptive mode must be resolved before execution".to_string(),
            )),
        }
    }

    /// Handles for enabled processors, in priority-rank order
    fn enabled_handles(&self) -> Vec<&Arc<ProcessorHandle>> {
        let mut handles: Vec<&Arc<ProcessorHandle>> = self
            .handles
            .iter()
            .filter(|h| h.descriptor().enabled)
            .collect();
        handles.sort_by_key(|h| h.descriptor().priority_rank);
        handles
    }

    /// Single: exactly one processor (highest priority, not disabled),
    /// no voting; scoring and dedup still apply
    async fn run_single(
        &self,
        text: &str,
        language_hint: Option<&str>,
    ) -> limn_core::Result<StrategyOutcome> {
        let handle = self
            .enabled_handles()
            .into_iter()
            .find(|h| !h.is_disabled());

        let Some(handle) = handle else {
            tracing::warn!("single strategy has no usable processor");
            return Ok(StrategyOutcome {
                descriptions: Vec::new(),
                rejected: Vec::new(),
                degraded: true,
                contributions: BTreeMap::new(),
            });
        };

        let mut availability = Availability {
            invoked_weight: handle.descriptor().trust_weight,
            responding_weight: 0.0,
        };
        let mut contributions = BTreeMap::new();

        let entities = match handle.extract(text, language_hint).await {
            Ok(entities) => {
                availability.responding_weight = handle.descriptor().trust_weight;
                contributions.insert(handle.id().to_string(), entities.len());
                entities
            }
            Err(e @ LimnError::InvalidInput(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(processor = %handle.id(), error = %e, "single strategy contribution lost");
                Vec::new()
            }
        };

        let mapped = self.map_entities(entities);
        let scorer = self.scorer()?;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for m in mapped {
            let mut description = EnsembleVoter::singleton(m);
            let score = scorer.score(&description);
            description = description.with_quality_score(score);
            if scorer.accepts(score) {
                accepted.push(description);
            } else if scorer.keep_rejected() {
                rejected.push(description);
            }
        }

        let descriptions = Deduplicator::new(&self.config.dedup).dedup(accepted);

        Ok(StrategyOutcome {
            descriptions,
            rejected,
            degraded: availability.degraded(),
            contributions,
        })
    }

    /// Parallel / Ensemble: all enabled processors concurrently, each
    /// bounded by its own timeout, then the full reconciliation pipeline
    async fn run_parallel(
        &self,
        text: &str,
        language_hint: Option<&str>,
        quorum: f32,
    ) -> limn_core::Result<StrategyOutcome> {
        let handles = self.enabled_handles();
        let shared_text: Arc<str> = Arc::from(text);
        let shared_hint: Option<Arc<str>> = language_hint.map(Arc::from);

        let mut tasks = Vec::with_capacity(handles.len());
        for handle in &handles {
            let handle = Arc::clone(*handle);
            let text = Arc::clone(&shared_text);
            let hint = shared_hint.clone();
            tasks.push(tokio::spawn(async move {
                let result = handle.extract(&text, hint.as_deref()).await;
                (handle, result)
            }));
        }

        let mut availability = Availability::default();
        for handle in &handles {
            availability.invoked_weight += handle.descriptor().trust_weight;
        }

        let mut contributions = BTreeMap::new();
        let mut entities = Vec::new();

        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok((handle, Ok(batch))) => {
                    availability.responding_weight += handle.descriptor().trust_weight;
                    contributions.insert(handle.id().to_string(), batch.len());
                    entities.extend(batch);
                }
                Ok((handle, Err(e @ LimnError::InvalidInput(_)))) => {
                    tracing::warn!(processor = %handle.id(), error = %e, "invalid input");
                    return Err(e);
                }
                Ok((handle, Err(e))) => {
                    // Timeouts and unavailability are empty contributions,
                    // never call failures
                    tracing::warn!(processor = %handle.id(), error = %e, "contribution lost");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "processor task aborted");
                }
            }
        }

        let (descriptions, rejected) = self.reconcile(entities, quorum)?;

        Ok(StrategyOutcome {
            descriptions,
            rejected,
            degraded: availability.degraded(),
            contributions,
        })
    }

    /// Sequential: processors in priority order; stop as soon as the best
    /// candidate so far clears the early-exit threshold
    async fn run_sequential(
        &self,
        text: &str,
        language_hint: Option<&str>,
    ) -> limn_core::Result<StrategyOutcome> {
        let mut availability = Availability::default();
        let mut contributions = BTreeMap::new();
        let mut entities: Vec<RawEntity> = Vec::new();
        let mut best_score = 0.0f32;

        let scorer = self.scorer()?;

        for handle in self.enabled_handles() {
            availability.invoked_weight += handle.descriptor().trust_weight;

            match handle.extract(text, language_hint).await {
                Ok(batch) => {
                    availability.responding_weight += handle.descriptor().trust_weight;
                    contributions.insert(handle.id().to_string(), batch.len());
                    entities.extend(batch);
                }
                Err(e @ LimnError::InvalidInput(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(processor = %handle.id(), error = %e, "contribution lost");
                    continue;
                }
            }

            // Score the running aggregate; good-enough results skip the
            // remaining processors
            let candidates = self.vote(entities.clone(), self.config.vote_quorum_weight);
            for candidate in &candidates {
                best_score = best_score.max(scorer.score(candidate));
            }
            if best_score >= self.config.early_exit_threshold {
                tracing::debug!(best_score, "sequential early exit");
                break;
            }
        }

        let (descriptions, rejected) = self.reconcile(entities, self.config.vote_quorum_weight)?;

        Ok(StrategyOutcome {
            descriptions,
            rejected,
            degraded: availability.degraded(),
            contributions,
        })
    }

    /// Label mapping, with optional exclusion of `Other`
    fn map_entities(&self, entities: Vec<RawEntity>) -> Vec<MappedEntity> {
        entities
            .into_iter()
            .map(|entity| {
                let description_type = self.mapper.map(&entity.native_label, &entity.processor_id);
                MappedEntity {
                    entity,
                    description_type,
                }
            })
            .filter(|m| !(self.config.exclude_other && m.description_type == DescriptionType::Other))
            .collect()
    }

    fn vote(&self, entities: Vec<RawEntity>, quorum: f32) -> Vec<Description> {
        EnsembleVoter::from_config(self.config)
            .with_quorum(quorum)
            .vote(self.map_entities(entities))
    }

    fn scorer(&self) -> limn_core::Result<QualityScorer> {
        Ok(QualityScorer::new(self.config.scorer.clone())?)
    }

    /// Voting, scoring, acceptance split, and dedup over a finished entity
    /// aggregate
    fn reconcile(
        &self,
        entities: Vec<RawEntity>,
        quorum: f32,
    ) -> limn_core::Result<(Vec<Description>, Vec<Description>)> {
        let candidates = self.vote(entities, quorum);
        let scorer = self.scorer()?;

        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for candidate in candidates {
            let score = scorer.score(&candidate);
            let candidate = candidate.with_quality_score(score);
            if scorer.accepts(score) {
                accepted.push(candidate);
            } else if scorer.keep_rejected() {
                rejected.push(candidate);
            }
        }

        let descriptions = Deduplicator::new(&self.config.dedup).dedup(accepted);
        Ok((descriptions, rejected))
    }
}
