//! Wasmtime integration layer for wasmpool.
//!
//! This crate provides the module-facing half of the pool:
//! - [`WasmEngine`]: Configured Wasmtime engine with shared-memory threads
//! - [`CompiledModule`]: Compiled WebAssembly module wrapper
//! - [`ModuleHandle`]: Compiled code paired with the shared linear memory
//! - [`ModuleSource`]: Byte sources for the loader (file, HTTP, in-memory)
//! - [`WorkerRuntime`] / [`EntryDispatcher`]: The instantiation seam workers
//!   use, with the Wasmtime-backed [`WasmWorkerRuntime`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     WasmEngine                          │
//! │  (Shared by loader and workers, thread-safe)            │
//! │  - Threads proposal / shared memories                   │
//! │  - Async instantiation                                  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │           ModuleHandle = CompiledModule + SharedMemory  │
//! │  (Produced once, cloned into every worker)              │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        Store<WorkerContext> + EntryDispatcher           │
//! │  (Per-worker, isolated; references the shared memory)   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod handle;
pub mod module;
pub mod runtime;
pub mod source;

pub use engine::WasmEngine;
pub use handle::ModuleHandle;
pub use module::CompiledModule;
pub use runtime::{EntryDispatcher, WasmWorkerRuntime, WorkerContext, WorkerRuntime};
pub use source::{BytesSource, FileSource, HttpSource, ModuleSource};
