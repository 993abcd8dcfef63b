use crate::model::ast::Program;
use crate::model::oracle::SemanticOracle;
use anyhow::Result;
use lru::LruCache;
use parking_lot::RwLock;
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub parallel_execution: bool,
    pub cache_enabled: bool,
    pub max_cache_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            parallel_execution: true,
            cache_enabled: true,
            max_cache_size: 1000,
        }
    }
}

/// Cache for derived per-declaration analyses (order indexes, suspension
/// sets). Entries are keyed by detector-chosen strings and must only hold
/// data derived from the immutable snapshot, so concurrent readers always
/// observe equivalent values.
pub struct AnalysisCache {
    entries: LruCache<String, Arc<dyn Any + Send + Sync>>,
}

impl AnalysisCache {
    pub fn new(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get_or_compute<T, F>(&mut self, key: &str, compute: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        if let Some(entry) = self.entries.get(key) {
            if let Some(value) = entry.downcast_ref::<Arc<T>>() {
                return Ok(value.clone());
            }
        }

        let value = Arc::new(compute()?);
        self.entries
            .put(key.to_string(), Arc::new(value.clone()) as Arc<dyn Any + Send + Sync>);

        Ok(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One immutable analysis snapshot: the program model, the host's semantic
/// oracle, and scanner configuration. Shared read-only across scanners.
pub struct AnalysisContext {
    program: Arc<Program>,
    oracle: Arc<dyn SemanticOracle>,
    config: ScannerConfig,
    cache: Arc<RwLock<AnalysisCache>>,
}

impl AnalysisContext {
    pub fn new(program: Arc<Program>, oracle: Arc<dyn SemanticOracle>) -> Self {
        Self::with_config(program, oracle, ScannerConfig::default())
    }

    pub fn with_config(
        program: Arc<Program>,
        oracle: Arc<dyn SemanticOracle>,
        config: ScannerConfig,
    ) -> Self {
        let cache_size = config.max_cache_size;
        Self {
            program,
            oracle,
            config,
            cache: Arc::new(RwLock::new(AnalysisCache::new(cache_size))),
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn oracle(&self) -> &dyn SemanticOracle {
        self.oracle.as_ref()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T>,
    {
        if self.config.cache_enabled {
            self.cache.write().get_or_compute(key, compute)
        } else {
            Ok(Arc::new(compute()?))
        }
    }
}
