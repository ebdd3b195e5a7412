//! Worker pool bootstrap for wasmpool.
//!
//! This crate is the distributed-initialization core of the workspace:
//! - [`Loader`]: fetch/compile/instantiate lifecycle with progress
//!   callbacks; on success, the sole trigger for pool fan-out
//! - [`ThreadPoolCoordinator`] / [`WorkerPool`]: spawns N workers and
//!   delivers each its one-time handshake
//! - [`WorkerHandle`] / [`WorkerState`]: per-worker bootstrap state
//!   machine, `Uninitialized → Ready` with a terminal `Failed` exit
//! - [`FatalErrorSink`] / [`ErrorChannel`]: how fatal handshake errors
//!   escape their asynchronous context
//!
//! # Lifecycle
//!
//! ```text
//!  Loader (main context)
//!    on_start → on_progress* → on_complete → on_success | on_failure
//!                                               │
//!                                               ▼
//!  ThreadPoolCoordinator::spawn(handle, N)   (N sampled at success)
//!    │
//!    ├─ worker-1: Init ─instantiate─▶ Ready ─▶ Task → entry dispatcher
//!    ├─ worker-2: Init ─instantiate─▶ Ready ─▶ ...
//!    └─ worker-N: Init ─instantiate─▶ Failed (reported to the sink)
//! ```

pub mod coordinator;
pub mod loader;
pub mod sink;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use coordinator::{ThreadPoolCoordinator, WorkerPool, detected_parallelism};
pub use loader::{LoadOutcome, Loader, LoaderHooks, LoaderPhase};
pub use sink::{ErrorChannel, FatalErrorSink, FatalWorkerError, LoggingSink};
pub use worker::{WorkerHandle, WorkerMessage, WorkerState};
