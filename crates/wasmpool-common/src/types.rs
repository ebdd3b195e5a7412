//! Common wire types shared between the loader and the pool.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one execution context.
///
/// Id 0 is reserved for the main-context instance created by the loader
/// during its validation instantiation; pool workers are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// The main context, where the loader runs.
    pub const MAIN: WorkerId = WorkerId(0);

    /// Returns `true` if this id names the main context.
    pub fn is_main(self) -> bool {
        self == Self::MAIN
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_main() {
            write!(f, "main")
        } else {
            write!(f, "worker-{}", self.0)
        }
    }
}

/// A steady-state work payload.
///
/// The payload is opaque to the pool: a Ready worker forwards it verbatim
/// to its entry dispatcher, which owns the interpretation. The
/// wasmtime-backed dispatcher reads it as the entry function's scalar
/// argument; test dispatchers treat it as arbitrary bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMessage {
    payload: Vec<u8>,
}

impl TaskMessage {
    /// Create a task from an opaque payload.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Borrow the payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the task, returning the payload bytes.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<&str> for TaskMessage {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}
