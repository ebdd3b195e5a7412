//! Common types, errors, and utilities for wasmpool.
//!
//! This crate provides shared functionality used across the wasmpool workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for pool settings
//! - Common wire types (`WorkerId`, `TaskMessage`)

pub mod config;
pub mod config_file;
pub mod error;
pub mod types;

pub use config::{EngineConfig, InstanceConfig, LoaderConfig, MemoryConfig, PoolConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use error::{InitError, LoadError, PoolError};
pub use types::{TaskMessage, WorkerId};
