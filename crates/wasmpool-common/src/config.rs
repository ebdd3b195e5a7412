//! Configuration structures for wasmpool.
//!
//! This module defines configuration options for various components:
//! - [`PoolConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (compilation)
//! - [`MemoryConfig`]: Shared linear memory limits
//! - [`InstanceConfig`]: Per-worker instantiation settings (imports, entry point)
//! - [`LoaderConfig`]: Module transfer and pool-sizing settings

use serde::{Deserialize, Serialize};

/// A WebAssembly linear memory page, in bytes.
pub const WASM_PAGE_SIZE: u64 = 64 * 1024;

/// Top-level pool configuration.
///
/// This structure contains all configuration options for wasmpool.
/// It can be loaded from files (TOML, JSON) or built in code.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Shared linear memory configuration.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Per-worker instantiation configuration.
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Module transfer and pool-sizing configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

/// Wasmtime engine configuration.
///
/// These settings affect the global engine behavior. Support for shared
/// memories and the threads proposal is always enabled; the pool cannot
/// function without it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable Cranelift speed optimizations.
    ///
    /// The pool exists to run CPU-heavy entry points, so this defaults to
    /// `true`. Disable for faster compilation in development.
    #[serde(default = "defaults::optimize")]
    pub optimize: bool,

    /// Compile module functions in parallel.
    #[serde(default = "defaults::parallel_compilation")]
    pub parallel_compilation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            optimize: defaults::optimize(),
            parallel_compilation: defaults::parallel_compilation(),
        }
    }
}

/// Shared linear memory configuration.
///
/// The shared memory is created once by the loader and referenced by every
/// worker. A shared memory must declare a maximum size up front; it cannot
/// grow past `max_pages`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Initial memory size in 64 KiB pages.
    #[serde(default = "defaults::min_pages")]
    pub min_pages: u32,

    /// Maximum memory size in 64 KiB pages.
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            min_pages: defaults::min_pages(),
            max_pages: defaults::max_pages(),
        }
    }
}

impl MemoryConfig {
    /// Initial memory size in bytes.
    pub fn min_bytes(&self) -> u64 {
        u64::from(self.min_pages) * WASM_PAGE_SIZE
    }

    /// Maximum memory size in bytes.
    pub fn max_bytes(&self) -> u64 {
        u64::from(self.max_pages) * WASM_PAGE_SIZE
    }
}

/// Per-worker instantiation configuration.
///
/// Shared-memory modules follow the convention of importing their linear
/// memory; the defaults here match the usual `env.memory` import and a
/// `worker_entry` export taking a single `i32`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Module field of the memory import.
    #[serde(default = "defaults::memory_import_module")]
    pub memory_import_module: String,

    /// Name field of the memory import.
    #[serde(default = "defaults::memory_import_name")]
    pub memory_import_name: String,

    /// Name of the exported entry point each worker invokes per task.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            memory_import_module: defaults::memory_import_module(),
            memory_import_name: defaults::memory_import_name(),
            entry_point: defaults::entry_point(),
        }
    }
}

/// Module transfer and pool-sizing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// Transfer chunk size in bytes.
    ///
    /// Progress is reported once per chunk, so this also sets the
    /// granularity of progress notifications.
    #[serde(default = "defaults::chunk_size")]
    pub chunk_size: usize,

    /// Worker count override.
    ///
    /// When `None`, the pool is sized to the hardware concurrency detected
    /// at the moment the load succeeds.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: defaults::chunk_size(),
            workers: None,
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn optimize() -> bool {
        true
    }

    pub const fn parallel_compilation() -> bool {
        true
    }

    pub const fn min_pages() -> u32 {
        64
    }

    pub const fn max_pages() -> u32 {
        16_384
    }

    pub fn memory_import_module() -> String {
        "env".to_string()
    }

    pub fn memory_import_name() -> String {
        "memory".to_string()
    }

    pub fn entry_point() -> String {
        "worker_entry".to_string()
    }

    pub const fn chunk_size() -> usize {
        64 * 1024
    }
}
