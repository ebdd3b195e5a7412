//! Wasmtime engine configuration and creation.
//!
//! The [`WasmEngine`] is the foundation of the pool. It is:
//! - Thread-safe and shared by the loader and every worker
//! - Configured with the threads proposal enabled, so modules can import
//!   a shared linear memory
//! - Set up for async instantiation, the suspension point of the worker
//!   handshake

use std::sync::Arc;

use tracing::info;
use wasmtime::{Config, Engine, MemoryType, OptLevel, SharedMemory};

use wasmpool_common::{EngineConfig, LoadError, MemoryConfig, PoolError};

/// Thread-safe WebAssembly engine wrapper.
///
/// This struct wraps a Wasmtime [`Engine`] configured for shared-memory
/// parallel execution. The engine is shared by the loader and all workers
/// and contains no per-worker state.
///
/// # Configuration
///
/// The engine is configured with:
/// - **Threads proposal**: Always on; shared memories require it
/// - **Async Support**: Instantiation suspends instead of blocking
/// - **Cranelift Optimizations**: On by default, the pool exists for
///   CPU-heavy entry points
///
/// # Example
///
/// ```ignore
/// use wasmpool_common::EngineConfig;
/// use wasmpool_core::WasmEngine;
///
/// let config = EngineConfig::default();
/// let engine = WasmEngine::new(&config)?;
/// ```
#[derive(Clone)]
pub struct WasmEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is invalid.
    pub fn new(config: &EngineConfig) -> Result<Self, PoolError> {
        let mut wasmtime_config = Config::new();

        // Enable async support so instantiation becomes a suspension point
        wasmtime_config.async_support(true);

        // Shared memories live behind the threads proposal
        wasmtime_config.wasm_threads(true);

        if config.optimize {
            wasmtime_config.cranelift_opt_level(OptLevel::Speed);
        } else {
            wasmtime_config.cranelift_opt_level(OptLevel::None);
        }

        wasmtime_config.parallel_compilation(config.parallel_compilation);

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            PoolError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        info!(
            optimize = config.optimize,
            parallel_compilation = config.parallel_compilation,
            "Wasmtime engine initialized"
        );

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
        })
    }

    /// Create the shared linear memory every worker will reference.
    ///
    /// A shared memory must declare both minimum and maximum size up
    /// front; the limits come from [`MemoryConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the limits are rejected (for example
    /// `min_pages` greater than `max_pages`).
    pub fn create_shared_memory(&self, config: &MemoryConfig) -> Result<SharedMemory, LoadError> {
        let ty = MemoryType::shared(config.min_pages, config.max_pages);

        let memory = SharedMemory::new(self.engine.as_ref(), ty)
            .map_err(|e| LoadError::memory(format!("Shared memory creation failed: {e}")))?;

        info!(
            min_pages = config.min_pages,
            max_pages = config.max_pages,
            "Shared linear memory created"
        );

        Ok(memory)
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("optimize", &self.config.optimize)
            .field("parallel_compilation", &self.config.parallel_compilation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_creation_default() {
        let config = EngineConfig::default();
        let engine = WasmEngine::new(&config);

        assert!(engine.is_ok());
        let engine = engine.unwrap();
        assert!(engine.config().optimize);
    }

    #[test]
    fn test_engine_creation_unoptimized() {
        let config = EngineConfig {
            optimize: false,
            ..Default::default()
        };
        let engine = WasmEngine::new(&config);

        assert!(engine.is_ok());
        assert!(!engine.unwrap().config().optimize);
    }

    #[test]
    fn test_shared_memory_creation() {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();
        let memory_config = MemoryConfig {
            min_pages: 1,
            max_pages: 2,
        };

        let memory = engine.create_shared_memory(&memory_config).unwrap();
        assert_eq!(memory.data().len(), 64 * 1024);
    }

    #[test]
    fn test_shared_memory_invalid_limits() {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();
        let memory_config = MemoryConfig {
            min_pages: 4,
            max_pages: 1,
        };

        let result = engine.create_shared_memory(&memory_config);
        assert!(matches!(result, Err(LoadError::Memory { .. })));
    }

    #[test]
    fn test_engine_debug() {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();

        let debug_str = format!("{engine:?}");
        assert!(debug_str.contains("WasmEngine"));
        assert!(debug_str.contains("optimize"));
    }
}
