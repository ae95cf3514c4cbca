//! Limn Processor - Extraction adapter contract and lifecycle
//!
//! Defines the uniform [`ProcessorAdapter`] contract every underlying
//! extraction engine is wrapped in, the [`ProcessorHandle`] that owns an
//! adapter's lifecycle (one-time lazy initialization, permanent disable on
//! initialization failure, per-call timeouts, optional call serialization
//! for non-reentrant engines), and the native-label [`mapper::TypeMapper`].
//!
//! Three rule-based reference processors ship with the crate:
//! - [`pattern::PatternProcessor`]: regex noun-phrase and mood patterns
//! - [`lexicon::LexiconProcessor`]: gazetteer matching with aliases
//! - [`proper::ProperNounProcessor`]: capitalization-run name detection

pub mod lexicon;
pub mod mapper;
pub mod pattern;
pub mod proper;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use limn_core::{LimnError, ProcessorDescriptor, RawEntity, Result, Span};

// ============================================================================
// Adapter Contract
// ============================================================================

/// Uniform wrapper contract around one underlying extraction engine
///
/// Implementations must not mutate the input text. `initialize` may be
/// expensive (model loading); it is called at most once per process through
/// the handle's initialization barrier.
#[async_trait::async_trait]
pub trait ProcessorAdapter: Send + Sync {
    /// Stable processor identifier, matching its descriptor
    fn id(&self) -> &str;

    /// One-time expensive setup; a failure permanently disables the
    /// processor for the process lifetime
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Extract raw entities from non-empty text
    async fn extract(&self, text: &str, language_hint: Option<&str>) -> Result<Vec<RawEntity>>;
}

// ============================================================================
// Processor Handle
// ============================================================================

/// Owns one adapter's lifecycle on behalf of the manager
///
/// Concurrent first callers block on the same initialization via a
/// `OnceCell` barrier rather than racing separate initializations. After a
/// failed initialization the processor is disabled for the rest of the
/// process and excluded from quorum math by the strategy layer.
pub struct ProcessorHandle {
    adapter: Arc<dyn ProcessorAdapter>,
    descriptor: ProcessorDescriptor,
    /// Set after the one initialization attempt: `None` on success, the
    /// failure reason otherwise
    init: OnceCell<Option<String>>,
    disabled: AtomicBool,
    /// Present when the underlying engine is not reentrant-safe; serializes
    /// calls to this adapter only, so unrelated adapters are never blocked
    serial: Option<Mutex<()>>,
}

impl ProcessorHandle {
    /// Wrap an adapter with its static descriptor
    pub fn new(adapter: Arc<dyn ProcessorAdapter>, descriptor: ProcessorDescriptor) -> Self {
        let serial = if descriptor.reentrant {
            None
        } else {
            Some(Mutex::new(()))
        };
        Self {
            adapter,
            descriptor,
            init: OnceCell::new(),
            disabled: AtomicBool::new(false),
            serial,
        }
    }

    /// The static descriptor this handle was configured with
    pub fn descriptor(&self) -> &ProcessorDescriptor {
        &self.descriptor
    }

    /// Processor identifier
    pub fn id(&self) -> &str {
        &self.descriptor.processor_id
    }

    /// Whether the processor has been permanently disabled
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Carry a permanent disable forward, e.g. onto the replacement handle
    /// built during reconfiguration
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Release);
    }

    /// Run one extraction call, bounded by the descriptor's timeout
    ///
    /// Errors:
    /// - `ProcessorUnavailable`: initialization failed (now or earlier);
    ///   the processor will not participate again this process
    /// - `ProcessorTimeout`: this call exceeded its deadline; the processor
    ///   stays usable and the caller treats the contribution as empty
    pub async fn extract(&self, text: &str, language_hint: Option<&str>) -> Result<Vec<RawEntity>> {
        if text.is_empty() {
            return Err(LimnError::InvalidInput(
                "extraction text must be non-empty".to_string(),
            ));
        }

        if self.is_disabled() {
            return Err(LimnError::ProcessorUnavailable {
                processor_id: self.id().to_string(),
                reason: "initialization previously failed".to_string(),
            });
        }

        // Initialization barrier: concurrent first callers await the same
        // future, and the cell records a failure so initialize never runs
        // a second time even when callers race past the disabled check
        let failure = self
            .init
            .get_or_init(|| async {
                tracing::debug!(processor = %self.id(), "initializing processor");
                match self.adapter.initialize().await {
                    Ok(()) => None,
                    Err(e) => {
                        self.disabled.store(true, Ordering::Release);
                        tracing::warn!(processor = %self.id(), error = %e, "processor disabled after failed initialization");
                        Some(e.to_string())
                    }
                }
            })
            .await;

        if let Some(reason) = failure {
            return Err(LimnError::ProcessorUnavailable {
                processor_id: self.id().to_string(),
                reason: reason.clone(),
            });
        }

        let work = async {
            let _guard = match &self.serial {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };
            self.adapter.extract(text, language_hint).await
        };

        match tokio::time::timeout(self.descriptor.timeout(), work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    processor = %self.id(),
                    timeout_ms = self.descriptor.timeout_ms,
                    "processor call timed out"
                );
                Err(LimnError::ProcessorTimeout {
                    processor_id: self.id().to_string(),
                    timeout_ms: self.descriptor.timeout_ms,
                })
            }
        }
    }
}

// ============================================================================
// Offset Utilities
// ============================================================================

/// Convert a byte-offset range (as produced by regex and substring search)
/// into a character-offset [`Span`]
///
/// All processors report character offsets so that span arithmetic in the
/// voter is consistent regardless of the engine's native indexing.
pub fn char_span(text: &str, byte_start: usize, byte_end: usize) -> Span {
    let start = text[..byte_start].chars().count();
    let len = text[byte_start..byte_end].chars().count();
    Span::new(start, start + len)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use limn_core::ProcessorDescriptor;

    struct CountingAdapter {
        inits: AtomicUsize,
        fail_init: bool,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl ProcessorAdapter for CountingAdapter {
        fn id(&self) -> &str {
            "counting"
        }

        async fn initialize(&self) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                Err(LimnError::InvalidInput("model load failed".to_string()))
            } else {
                Ok(())
            }
        }

        async fn extract(&self, text: &str, _hint: Option<&str>) -> Result<Vec<RawEntity>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(vec![RawEntity::new(
                Span::new(0, text.chars().count()),
                text,
                "RAW",
                0.9,
                "counting",
            )])
        }
    }

    fn handle(adapter: Arc<CountingAdapter>, timeout_ms: u64) -> ProcessorHandle {
        ProcessorHandle::new(
            adapter,
            ProcessorDescriptor::new("counting", 1.0, 0).with_timeout_ms(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_initialization_runs_once_across_concurrent_callers() {
        let adapter = Arc::new(CountingAdapter {
            inits: AtomicUsize::new(0),
            fail_init: false,
            delay: None,
        });
        let h = Arc::new(handle(Arc::clone(&adapter), 1_000));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move { h.extract("mist", None).await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(adapter.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_disables_permanently() {
        let adapter = Arc::new(CountingAdapter {
            inits: AtomicUsize::new(0),
            fail_init: true,
            delay: None,
        });
        let h = handle(Arc::clone(&adapter), 1_000);

        let first = h.extract("mist", None).await;
        assert!(matches!(
            first,
            Err(LimnError::ProcessorUnavailable { .. })
        ));
        assert!(h.is_disabled());

        // Second call short-circuits without re-running initialize
        let second = h.extract("mist", None).await;
        assert!(matches!(
            second,
            Err(LimnError::ProcessorUnavailable { .. })
        ));
        assert_eq!(adapter.inits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failed_initialization_runs_once() {
        // Callers racing past the disabled check must still share the one
        // initialization attempt
        let adapter = Arc::new(CountingAdapter {
            inits: AtomicUsize::new(0),
            fail_init: true,
            delay: None,
        });
        let h = Arc::new(handle(Arc::clone(&adapter), 1_000));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move { h.extract("mist", None).await }));
        }
        for task in tasks {
            assert!(matches!(
                task.await.unwrap(),
                Err(LimnError::ProcessorUnavailable { .. })
            ));
        }

        assert_eq!(adapter.inits.load(Ordering::SeqCst), 1);
        assert!(h.is_disabled());
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let h = handle(
            Arc::new(CountingAdapter {
                inits: AtomicUsize::new(0),
                fail_init: false,
                delay: Some(Duration::from_millis(200)),
            }),
            20,
        );

        let result = h.extract("mist", None).await;
        assert!(matches!(result, Err(LimnError::ProcessorTimeout { .. })));

        // The processor is still usable afterwards
        assert!(!h.is_disabled());
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let h = handle(
            Arc::new(CountingAdapter {
                inits: AtomicUsize::new(0),
                fail_init: false,
                delay: None,
            }),
            1_000,
        );
        assert!(matches!(
            h.extract("", None).await,
            Err(LimnError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_char_span_multibyte() {
        let text = "café was dim";
        let byte_start = text.find("was").unwrap();
        let span = char_span(text, byte_start, byte_start + 3);
        assert_eq!(span, Span::new(5, 8));
    }
}
