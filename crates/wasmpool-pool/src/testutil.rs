//! Shared fakes and helpers for the unit tests in this crate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::coordinator::WorkerPool;
use crate::worker::{WorkerHandle, WorkerState};
use wasmpool_common::{EngineConfig, InitError, MemoryConfig, TaskMessage, WorkerId};
use wasmpool_core::{CompiledModule, EntryDispatcher, ModuleHandle, WasmEngine, WorkerRuntime};

/// Build a throwaway handle; the mock runtime never looks inside it.
pub(crate) fn test_handle() -> ModuleHandle {
    let engine = WasmEngine::new(&EngineConfig::default()).unwrap();
    let memory = engine
        .create_shared_memory(&MemoryConfig {
            min_pages: 1,
            max_pages: 1,
        })
        .unwrap();
    let module = CompiledModule::from_wat(engine.inner(), "(module)").unwrap();
    ModuleHandle::new(module, memory)
}

/// Poll until `condition` holds, panicking after two seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

/// Poll until the worker reports `state`.
pub(crate) async fn wait_for_state(worker: &WorkerHandle, state: WorkerState) {
    wait_until(|| worker.state() == state).await;
}

/// Poll until every worker in the pool is Ready.
pub(crate) async fn wait_for_pool_ready(pool: &WorkerPool) {
    wait_until(|| pool.ready_workers() == pool.worker_count()).await;
}

/// A [`WorkerRuntime`] fake that records instantiations and hands out
/// recording dispatchers.
pub(crate) struct MockRuntime {
    fail_for: Option<Box<dyn Fn(WorkerId) -> bool + Send + Sync>>,
    instantiated: Mutex<Vec<WorkerId>>,
    dispatched: Arc<Mutex<Vec<(WorkerId, TaskMessage)>>>,
}

impl MockRuntime {
    /// Every handshake succeeds.
    pub(crate) fn ok() -> Self {
        Self {
            fail_for: None,
            instantiated: Mutex::new(Vec::new()),
            dispatched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every handshake fails.
    pub(crate) fn failing() -> Self {
        Self::failing_for(|_| true)
    }

    /// Handshakes fail for the workers `predicate` selects.
    pub(crate) fn failing_for(predicate: impl Fn(WorkerId) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_for: Some(Box::new(predicate)),
            instantiated: Mutex::new(Vec::new()),
            dispatched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Workers that reached the runtime's instantiate call.
    pub(crate) fn instantiated(&self) -> Vec<WorkerId> {
        self.instantiated.lock().clone()
    }

    /// Every task forwarded to any dispatcher, in dispatch order.
    pub(crate) fn dispatched(&self) -> Vec<(WorkerId, TaskMessage)> {
        self.dispatched.lock().clone()
    }

    /// Poll until `count` tasks have been dispatched.
    pub(crate) async fn wait_for_dispatches(&self, count: usize) {
        wait_until(|| self.dispatched.lock().len() >= count).await;
    }
}

#[async_trait]
impl WorkerRuntime for MockRuntime {
    async fn instantiate(
        &self,
        worker: WorkerId,
        _handle: &ModuleHandle,
    ) -> Result<Box<dyn EntryDispatcher>, InitError> {
        self.instantiated.lock().push(worker);

        if self.fail_for.as_ref().is_some_and(|f| f(worker)) {
            return Err(InitError::instantiation("forced failure"));
        }

        Ok(Box::new(RecordingDispatcher {
            worker,
            dispatched: Arc::clone(&self.dispatched),
        }))
    }
}

/// An [`EntryDispatcher`] fake that records payloads verbatim.
pub(crate) struct RecordingDispatcher {
    worker: WorkerId,
    dispatched: Arc<Mutex<Vec<(WorkerId, TaskMessage)>>>,
}

#[async_trait]
impl EntryDispatcher for RecordingDispatcher {
    async fn dispatch(&mut self, task: TaskMessage) {
        self.dispatched.lock().push((self.worker, task));
    }
}
