//! The instantiation seam between the pool and the module.
//!
//! Workers do not talk to Wasmtime directly; they instantiate through
//! [`WorkerRuntime`] and execute tasks through [`EntryDispatcher`]. The
//! production implementation here backs both with Wasmtime; tests swap in
//! recording fakes to observe the handshake protocol in isolation.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument};
use wasmtime::{Linker, Store, TypedFunc};

use crate::{ModuleHandle, WasmEngine};
use wasmpool_common::{InitError, InstanceConfig, TaskMessage, WorkerId};

/// The external capability a Ready worker invokes for every task.
///
/// Dispatch is fire-and-forget: nothing observable comes back to the
/// pool, and errors raised while processing a task belong to the module,
/// not to the pool.
#[async_trait]
pub trait EntryDispatcher: Send {
    /// Forward one task payload to the module's entry point.
    async fn dispatch(&mut self, task: TaskMessage);
}

/// Instantiates the module for one execution context.
///
/// Each call produces an isolated instance (own store, own stack) that
/// references the handle's shared memory. Instantiation is asynchronous:
/// it is the suspension point of the worker handshake.
#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    /// Instantiate the module for `worker` against the shared memory.
    async fn instantiate(
        &self,
        worker: WorkerId,
        handle: &ModuleHandle,
    ) -> Result<Box<dyn EntryDispatcher>, InitError>;
}

/// Per-instance execution context stored in each worker's [`Store`].
pub struct WorkerContext {
    /// The execution context this instance belongs to.
    pub worker: WorkerId,

    /// Tasks forwarded to the entry point so far.
    pub tasks_dispatched: u64,

    /// When this instance was created.
    started: Instant,
}

impl WorkerContext {
    /// Create a context for the given worker.
    pub fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            tasks_dispatched: 0,
            started: Instant::now(),
        }
    }

    /// Time since this instance was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

/// Wasmtime-backed [`WorkerRuntime`].
///
/// Links the handle's shared memory under the configured import and
/// resolves the configured entry export, typed `(i32) -> ()`.
#[derive(Clone)]
pub struct WasmWorkerRuntime {
    engine: WasmEngine,
    config: InstanceConfig,
}

impl WasmWorkerRuntime {
    /// Create a runtime using `engine` and the given instantiation settings.
    pub fn new(engine: WasmEngine, config: InstanceConfig) -> Self {
        Self { engine, config }
    }

    /// The instantiation settings.
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }
}

#[async_trait]
impl WorkerRuntime for WasmWorkerRuntime {
    #[instrument(skip(self, handle), fields(worker = %worker))]
    async fn instantiate(
        &self,
        worker: WorkerId,
        handle: &ModuleHandle,
    ) -> Result<Box<dyn EntryDispatcher>, InitError> {
        let start = Instant::now();
        let mut store = Store::new(self.engine.inner(), WorkerContext::new(worker));

        let mut linker: Linker<WorkerContext> = Linker::new(self.engine.inner());
        linker
            .define(
                &mut store,
                &self.config.memory_import_module,
                &self.config.memory_import_name,
                handle.memory().clone(),
            )
            .map_err(|e| InitError::MemoryImport {
                module: self.config.memory_import_module.clone(),
                name: self.config.memory_import_name.clone(),
                reason: e.to_string(),
            })?;

        debug!("Instantiating module");

        let instance = linker
            .instantiate_async(&mut store, handle.module().inner())
            .await
            .map_err(|e| InitError::instantiation(format!("Instantiation failed: {e}")))?;

        let entry = instance
            .get_typed_func::<u32, ()>(&mut store, &self.config.entry_point)
            .map_err(|_| InitError::missing_entry_point(&self.config.entry_point))?;

        info!(
            entry_point = %self.config.entry_point,
            duration_us = start.elapsed().as_micros(),
            "Worker instance ready"
        );

        Ok(Box::new(WasmEntryDispatcher { store, entry }))
    }
}

/// Wasmtime-backed [`EntryDispatcher`].
///
/// The entry contract is a single `i32` argument carried as a 4-byte
/// little-endian payload. Payloads of any other length are a module ABI
/// violation and are logged and dropped here, on the module side of the
/// seam.
struct WasmEntryDispatcher {
    store: Store<WorkerContext>,
    entry: TypedFunc<u32, ()>,
}

#[async_trait]
impl EntryDispatcher for WasmEntryDispatcher {
    async fn dispatch(&mut self, task: TaskMessage) {
        let worker = self.store.data().worker;

        let Some(arg) = decode_entry_arg(task.payload()) else {
            error!(
                worker = %worker,
                payload_len = task.len(),
                "Task payload is not a 4-byte entry argument"
            );
            return;
        };

        self.store.data_mut().tasks_dispatched += 1;

        // A trap here is the module's own runtime error; the pool does not
        // catch or wrap it.
        if let Err(trap) = self.entry.call_async(&mut self.store, arg).await {
            error!(worker = %worker, %trap, "Entry point trapped");
        }
    }
}

/// Decode a task payload into the entry point's scalar argument.
fn decode_entry_arg(payload: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = payload.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}
