//! Per-worker bootstrap state machine.
//!
//! Each worker owns a mailbox and a state tag. The first (and only valid
//! first) message is the module handshake; once it resolves the worker
//! either forwards every task to its entry dispatcher or is permanently
//! failed. The state is an explicit tag, observable from outside the
//! worker task, and every message is dispatched against the current tag:
//! a message that does not fit the state is rejected loudly, never
//! silently treated as valid.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::sink::FatalErrorSink;
use wasmpool_common::{PoolError, TaskMessage, WorkerId};
use wasmpool_core::{EntryDispatcher, ModuleHandle, WorkerRuntime};

/// Observable lifecycle state of one worker.
///
/// The transition is one-directional: `Uninitialized → Ready`, with the
/// terminal `Failed` exit when the handshake fails. There is no recovery
/// and no retry; a failed worker stays failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned, handshake not yet completed.
    Uninitialized,

    /// Handshake completed; tasks are forwarded to the entry dispatcher.
    Ready,

    /// Handshake failed; the worker is permanently unusable.
    Failed,
}

/// A message addressed to one worker's mailbox.
#[derive(Debug)]
pub enum WorkerMessage {
    /// The one-time handshake payload: the shared module handle, carrying
    /// the module representation and the shared memory descriptor.
    Init(ModuleHandle),

    /// A steady-state work payload for a Ready worker.
    Task(TaskMessage),
}

/// Handle to a spawned worker.
///
/// The handle is how the rest of the system talks to the worker task:
/// send it messages and observe its state tag. Dropping every handle to a
/// worker closes its mailbox and ends its task.
pub struct WorkerHandle {
    id: WorkerId,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    state: Arc<RwLock<WorkerState>>,
}

impl WorkerHandle {
    /// The worker's identity.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Current state of the worker.
    ///
    /// Readiness is eventually consistent: a worker that was just sent
    /// its handshake may still report `Uninitialized` here.
    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// Returns `true` once the worker has completed its handshake.
    pub fn is_ready(&self) -> bool {
        self.state() == WorkerState::Ready
    }

    /// Queue a task for this worker.
    ///
    /// Delivery is fire-and-forget; whether the task is acted upon
    /// depends on the worker's state when it drains its mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task has already exited.
    pub fn send_task(&self, task: TaskMessage) -> Result<(), PoolError> {
        self.tx
            .send(WorkerMessage::Task(task))
            .map_err(|_| PoolError::WorkerGone { worker: self.id })
    }

    /// Queue the one-time handshake message.
    pub(crate) fn send_init(&self, handle: ModuleHandle) -> Result<(), PoolError> {
        self.tx
            .send(WorkerMessage::Init(handle))
            .map_err(|_| PoolError::WorkerGone { worker: self.id })
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// The worker task: mailbox loop plus handshake logic.
pub(crate) struct WorkerBootstrap {
    id: WorkerId,
    runtime: Arc<dyn WorkerRuntime>,
    sink: Arc<dyn FatalErrorSink>,
    state: Arc<RwLock<WorkerState>>,
    dispatcher: Option<Box<dyn EntryDispatcher>>,
}

impl WorkerBootstrap {
    /// Spawn a worker task and return its handle.
    pub(crate) fn spawn(
        id: WorkerId,
        runtime: Arc<dyn WorkerRuntime>,
        sink: Arc<dyn FatalErrorSink>,
    ) -> WorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(WorkerState::Uninitialized));

        let bootstrap = Self {
            id,
            runtime,
            sink,
            state: Arc::clone(&state),
            dispatcher: None,
        };
        tokio::spawn(bootstrap.run(rx));

        WorkerHandle { id, tx, state }
    }

    /// Drain the mailbox one message at a time.
    ///
    /// The handshake awaits inside `handle_message`, so a message that
    /// arrives mid-handshake waits in the mailbox and is handled against
    /// the state the handshake resolved to.
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle_message(msg).await;
        }
        debug!(worker = %self.id, "Mailbox closed; worker exiting");
    }

    async fn handle_message(&mut self, msg: WorkerMessage) {
        let state = *self.state.read();

        match (state, msg) {
            (WorkerState::Uninitialized, WorkerMessage::Init(handle)) => {
                self.handshake(handle).await;
            }
            (_, WorkerMessage::Init(_)) => {
                warn!(worker = %self.id, state = ?state, "Duplicate handshake message ignored");
            }
            (WorkerState::Ready, WorkerMessage::Task(task)) => {
                if let Some(dispatcher) = self.dispatcher.as_mut() {
                    dispatcher.dispatch(task).await;
                }
            }
            (WorkerState::Uninitialized, WorkerMessage::Task(task)) => {
                warn!(
                    worker = %self.id,
                    payload_len = task.len(),
                    "Task received before handshake; rejected"
                );
            }
            (WorkerState::Failed, WorkerMessage::Task(task)) => {
                warn!(
                    worker = %self.id,
                    payload_len = task.len(),
                    "Task received by failed worker; rejected"
                );
            }
        }
    }

    /// The one-time handshake: instantiate the module against the shared
    /// memory, then install the entry dispatcher.
    async fn handshake(&mut self, handle: ModuleHandle) {
        debug!(worker = %self.id, "Handshake started");

        match self.runtime.instantiate(self.id, &handle).await {
            Ok(dispatcher) => {
                self.dispatcher = Some(dispatcher);
                *self.state.write() = WorkerState::Ready;
                info!(worker = %self.id, "Worker ready");
            }
            Err(err) => {
                *self.state.write() = WorkerState::Failed;
                self.sink.report(self.id, &err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ErrorChannel;
    use crate::testutil::{MockRuntime, test_handle, wait_for_state};

    #[tokio::test]
    async fn test_worker_ready_after_handshake() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();

        let worker = WorkerBootstrap::spawn(WorkerId(1), runtime.clone(), Arc::new(sink));
        assert_eq!(worker.state(), WorkerState::Uninitialized);

        worker.send_init(test_handle()).unwrap();
        wait_for_state(&worker, WorkerState::Ready).await;

        assert!(worker.is_ready());
        assert_eq!(runtime.instantiated(), vec![WorkerId(1)]);
    }

    #[tokio::test]
    async fn test_task_forwarded_verbatim_once_ready() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();

        let worker = WorkerBootstrap::spawn(WorkerId(1), runtime.clone(), Arc::new(sink));
        worker.send_init(test_handle()).unwrap();
        wait_for_state(&worker, WorkerState::Ready).await;

        worker.send_task(TaskMessage::from("compute-tile-7")).unwrap();
        runtime.wait_for_dispatches(1).await;

        let dispatched = runtime.dispatched();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].0, WorkerId(1));
        assert_eq!(dispatched[0].1.payload(), b"compute-tile-7");
    }

    #[tokio::test]
    async fn test_task_before_handshake_rejected() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();

        let worker = WorkerBootstrap::spawn(WorkerId(1), runtime.clone(), Arc::new(sink));

        // Arrives ahead of the handshake: must not be treated as valid.
        worker.send_task(TaskMessage::from("too-early")).unwrap();
        worker.send_init(test_handle()).unwrap();
        wait_for_state(&worker, WorkerState::Ready).await;

        assert!(runtime.dispatched().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_handshake_ignored() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();

        let worker = WorkerBootstrap::spawn(WorkerId(1), runtime.clone(), Arc::new(sink));
        worker.send_init(test_handle()).unwrap();
        worker.send_init(test_handle()).unwrap();
        wait_for_state(&worker, WorkerState::Ready).await;

        // The second handshake message never reaches the runtime.
        assert_eq!(runtime.instantiated(), vec![WorkerId(1)]);
    }

    #[tokio::test]
    async fn test_failed_handshake_is_terminal_and_observable() {
        let runtime = Arc::new(MockRuntime::failing());
        let (sink, mut rx) = ErrorChannel::new();

        let worker = WorkerBootstrap::spawn(WorkerId(1), runtime.clone(), Arc::new(sink));
        worker.send_init(test_handle()).unwrap();
        wait_for_state(&worker, WorkerState::Failed).await;

        // Observable on the top-level error channel despite the
        // asynchronous handshake.
        let fatal = rx.recv().await.unwrap();
        assert_eq!(fatal.worker, WorkerId(1));

        // Later tasks are rejected, never dispatched.
        worker.send_task(TaskMessage::from("after-failure")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(runtime.dispatched().is_empty());
        assert_eq!(worker.state(), WorkerState::Failed);
    }

    #[test]
    fn test_send_to_gone_worker_errors() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();

        let worker = {
            let _guard = rt.enter();
            let runtime = Arc::new(MockRuntime::ok());
            let (sink, _rx) = ErrorChannel::new();
            WorkerBootstrap::spawn(WorkerId(1), runtime, Arc::new(sink))
        };

        // Dropping the runtime shuts down the worker task; the handle
        // outlives it and sends must now fail loudly.
        drop(rt);

        let result = worker.send_task(TaskMessage::from("orphaned"));
        assert!(matches!(
            result,
            Err(PoolError::WorkerGone {
                worker: WorkerId(1)
            })
        ));
    }
}
