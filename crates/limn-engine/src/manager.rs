//! Extraction manager
//!
//! Top-level entry point: validates configuration at construction, owns
//! the processor handles (and through them each adapter's one-time model
//! initialization), resolves adaptive strategy selection, wraps the
//! pipeline in the advisory result cache, and assembles the final outcome.
//!
//! Configuration is copy-on-write: `reconfigure` swaps in a new validated
//! snapshot while in-flight calls keep the one they started with.
//! Processor-level failures never escape `extract`; callers inspect the
//! outcome's `degraded` flag instead.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;

use limn_core::{
    ConfigError, ExtractionOutcome, ExtractionRequest, LimnError, ResultCache, StrategyConfig,
    StrategyMode,
};
use limn_processor::{
    lexicon::LexiconProcessor, mapper::TypeMapper, pattern::PatternProcessor,
    proper::ProperNounProcessor, ProcessorAdapter, ProcessorHandle,
};

use crate::adaptive::AdaptiveSelector;
use crate::stats::{StrategyStats, StrategyStatsReport};
use crate::strategy::StrategyEngine;

/// One immutable configuration snapshot with its processor handles
struct EngineState {
    config: StrategyConfig,
    handles: Vec<Arc<ProcessorHandle>>,
}

/// Top-level extraction engine
pub struct ExtractionManager {
    state: RwLock<Arc<EngineState>>,
    /// Registered adapters by id; handles are rebuilt over these on
    /// reconfiguration so model initialization survives config swaps
    adapters: HashMap<String, Arc<dyn ProcessorAdapter>>,
    mapper: TypeMapper,
    stats: Arc<StrategyStats>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl ExtractionManager {
    /// Construct a manager over explicit adapters
    ///
    /// Fails fast with a `ConfigError` on any invalid configuration,
    /// including a configured processor with no registered adapter.
    pub fn new(
        config: StrategyConfig,
        adapters: Vec<Arc<dyn ProcessorAdapter>>,
        mapper: TypeMapper,
    ) -> limn_core::Result<Self> {
        config.validate()?;

        let adapters: HashMap<String, Arc<dyn ProcessorAdapter>> = adapters
            .into_iter()
            .map(|a| (a.id().to_string(), a))
            .collect();

        let handles = Self::build_handles(&config, &adapters, None)?;

        tracing::info!(
            mode = %config.mode,
            processors = handles.len(),
            "extraction manager ready"
        );

        Ok(Self {
            state: RwLock::new(Arc::new(EngineState { config, handles })),
            adapters,
            mapper,
            stats: Arc::new(StrategyStats::new()),
            cache: None,
        })
    }

    /// Construct a manager over the built-in rule-based processors
    pub fn builtin(config: StrategyConfig) -> limn_core::Result<Self> {
        Self::new(
            config,
            vec![
                Arc::new(PatternProcessor::new()),
                Arc::new(LexiconProcessor::new()),
                Arc::new(ProperNounProcessor::new()),
            ],
            TypeMapper::with_builtin(),
        )
    }

    /// Attach an advisory result cache
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Inject a shared statistics collector (e.g. for tests or external
    /// monitoring); by default each manager owns a private one
    pub fn with_stats(mut self, stats: Arc<StrategyStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Strategy statistics snapshot
    pub fn stats_report(&self) -> StrategyStatsReport {
        self.stats.report()
    }

    /// Run one extraction
    pub async fn extract(&self, request: ExtractionRequest) -> limn_core::Result<ExtractionOutcome> {
        if request.text.trim().is_empty() {
            return Err(LimnError::InvalidInput(
                "extraction text must be non-empty".to_string(),
            ));
        }

        // Snapshot: reconfiguration after this point does not affect us
        let state = Arc::clone(&*self.state.read().await);

        let key = Self::cache_key(&request, &state.config);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(key).await {
                tracing::debug!(cache = cache.name(), key, "cache hit");
                return Ok(cached);
            }
        }

        let mode = match state.config.mode {
            StrategyMode::Adaptive => AdaptiveSelector::new(state.config.adaptive.clone())
                .select(&request.text, &self.stats),
            mode => mode,
        };

        let started = Instant::now();
        let engine = StrategyEngine::new(&state.config, &state.handles, &self.mapper);
        let result = engine
            .execute(mode, &request.text, request.language_hint.as_deref())
            .await?;

        self.stats
            .record(mode, !result.degraded && !result.descriptions.is_empty());

        let outcome = ExtractionOutcome {
            descriptions: result.descriptions,
            rejected: result.rejected,
            degraded: result.degraded,
            strategy_used: mode,
            elapsed_ms: started.elapsed().as_millis() as u64,
            processor_contributions: result.contributions,
            completed_at: Utc::now(),
        };

        if let Some(cache) = &self.cache {
            cache.put(key, outcome.clone()).await;
        }

        Ok(outcome)
    }

    /// Swap in a new configuration snapshot
    ///
    /// The new config is validated first; nothing is applied partially.
    /// Handles are rebuilt over the same adapter instances, so one-time
    /// model initialization and permanent-disable state carry over.
    pub async fn reconfigure(&self, config: StrategyConfig) -> limn_core::Result<()> {
        config.validate()?;

        let previous = Arc::clone(&*self.state.read().await);
        let handles = Self::build_handles(&config, &self.adapters, Some(&previous.handles))?;

        let mut state = self.state.write().await;
        *state = Arc::new(EngineState { config, handles });
        tracing::info!("configuration snapshot replaced");
        Ok(())
    }

    fn build_handles(
        config: &StrategyConfig,
        adapters: &HashMap<String, Arc<dyn ProcessorAdapter>>,
        previous: Option<&[Arc<ProcessorHandle>]>,
    ) -> Result<Vec<Arc<ProcessorHandle>>, ConfigError> {
        let mut handles = Vec::new();
        for descriptor in config.enabled_processors() {
            let adapter = adapters
                .get(&descriptor.processor_id)
                .ok_or_else(|| ConfigError::UnknownProcessor(descriptor.processor_id.clone()))?;

            let handle = ProcessorHandle::new(Arc::clone(adapter), descriptor.clone());

            // A processor disabled by a failed initialization stays
            // disabled for the process lifetime, across reconfigurations
            if let Some(previous) = previous {
                if previous
                    .iter()
                    .any(|h| h.id() == descriptor.processor_id && h.is_disabled())
                {
                    handle.disable();
                }
            }

            handles.push(Arc::new(handle));
        }
        Ok(handles)
    }

    /// Cache key: caller-supplied key (or the text) combined with the
    /// config snapshot, so retuned deployments never see stale outcomes
    fn cache_key(request: &ExtractionRequest, config: &StrategyConfig) -> u64 {
        let mut hasher = DefaultHasher::new();
        match &request.cache_key {
            Some(key) => key.hash(&mut hasher),
            None => request.text.hash(&mut hasher),
        }
        if let Ok(json) = serde_json::to_string(config) {
            json.hash(&mut hasher);
        }
        hasher.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
