//! Error types for wasmpool.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`PoolError`]: Top-level errors for the pool runtime
//! - [`LoadError`]: Errors from the module load pipeline (fetch, compile,
//!   memory creation, main-context instantiation)
//! - [`InitError`]: Errors from a single worker's initialization handshake

use std::io;

use thiserror::Error;

use crate::WorkerId;

/// Top-level pool errors.
///
/// These errors represent failures across the lifecycle of the pool, from
/// the initial module load to a worker handshake.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The module load pipeline failed before any worker existed.
    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    /// A worker's initialization handshake failed.
    #[error("Worker initialization failed: {0}")]
    Init(#[from] InitError),

    /// A message could not be delivered to a worker.
    ///
    /// This happens when the worker task has already exited, for example
    /// after the pool owning its mailbox was dropped.
    #[error("Worker {worker} is gone: mailbox closed")]
    WorkerGone {
        /// The worker the message was addressed to.
        worker: WorkerId,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the module load pipeline.
///
/// The loader progresses through transfer, compilation, shared-memory
/// creation, and a main-context instantiation; each phase has its own
/// variant so callers can tell how far the run got.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The module transfer failed (file read or network fetch).
    #[error("Transfer failed: {reason}")]
    Fetch {
        /// Description of the transfer failure.
        reason: String,
    },

    /// WebAssembly compilation failed.
    #[error("Compilation failed: {reason}")]
    Compilation {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The shared linear memory could not be created.
    #[error("Shared memory creation failed: {reason}")]
    Memory {
        /// Description of the memory failure.
        reason: String,
    },

    /// The main-context instantiation failed.
    #[error("Instantiation failed: {reason}")]
    Instantiation {
        /// Description of the instantiation failure.
        reason: String,
    },
}

/// Errors from a single worker's initialization handshake.
///
/// A worker that hits one of these is permanently unusable; the error is
/// surfaced through the fatal error sink, never back to the loader. The
/// type is `Clone` so the host error channel can carry it.
#[derive(Error, Debug, Clone)]
pub enum InitError {
    /// Instantiating the module against the shared memory failed.
    #[error("Worker instantiation failed: {reason}")]
    Instantiation {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The module does not export the configured entry point.
    #[error("Entry point '{name}' not found or has the wrong signature")]
    MissingEntryPoint {
        /// The export name that was looked up.
        name: String,
    },

    /// The module's memory import does not match the shared memory.
    #[error("Memory import '{module}'.'{name}' mismatch: {reason}")]
    MemoryImport {
        /// The import's module field.
        module: String,
        /// The import's name field.
        name: String,
        /// Description of the mismatch.
        reason: String,
    },
}

impl PoolError {
    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error originated in the load pipeline.
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load(_))
    }

    /// Returns `true` if this error originated in a worker handshake.
    pub fn is_init(&self) -> bool {
        matches!(self, Self::Init(_))
    }
}

impl LoadError {
    /// Create a new `Fetch` error.
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch {
            reason: reason.into(),
        }
    }

    /// Create a new `Compilation` error.
    pub fn compilation(reason: impl Into<String>) -> Self {
        Self::Compilation {
            reason: reason.into(),
        }
    }

    /// Create a new `Memory` error.
    pub fn memory(reason: impl Into<String>) -> Self {
        Self::Memory {
            reason: reason.into(),
        }
    }

    /// Create a new `Instantiation` error.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::Instantiation {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure happened while bytes were in flight.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

impl InitError {
    /// Create a new `Instantiation` error.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::Instantiation {
            reason: reason.into(),
        }
    }

    /// Create a new `MissingEntryPoint` error.
    pub fn missing_entry_point(name: impl Into<String>) -> Self {
        Self::MissingEntryPoint { name: name.into() }
    }
}

impl From<InitError> for LoadError {
    /// A handshake failure during the loader's main-context validation
    /// instantiation is a load failure, not a worker failure.
    fn from(err: InitError) -> Self {
        LoadError::Instantiation {
            reason: err.to_string(),
        }
    }
}
