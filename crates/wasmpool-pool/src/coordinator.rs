//! Pool fan-out.
//!
//! Once a module handle exists, the [`ThreadPoolCoordinator`] spawns the
//! requested number of workers and delivers each its one-time handshake
//! message. The worker count is an explicit argument: the caller samples
//! hardware concurrency (or applies an override) and passes the result
//! in, which keeps fan-out reproducible under test.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{info, warn};

use crate::sink::FatalErrorSink;
use crate::worker::{WorkerBootstrap, WorkerHandle};
use wasmpool_common::WorkerId;
use wasmpool_core::{ModuleHandle, WorkerRuntime};

/// Hardware concurrency as reported by the host, with a floor of one.
pub fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Spawns and initializes the worker set.
pub struct ThreadPoolCoordinator {
    runtime: Arc<dyn WorkerRuntime>,
    sink: Arc<dyn FatalErrorSink>,
}

impl ThreadPoolCoordinator {
    /// Create a coordinator that instantiates through `runtime` and
    /// reports fatal handshake errors to `sink`.
    pub fn new(runtime: Arc<dyn WorkerRuntime>, sink: Arc<dyn FatalErrorSink>) -> Self {
        Self { runtime, sink }
    }

    /// Spawn `workers` independent workers, each handed a clone of the
    /// same module handle as its first and only handshake message.
    ///
    /// Returns as soon as every worker is spawned and its handshake is
    /// queued. There is no all-ready barrier: readiness is eventually
    /// consistent per worker and observable through each handle's state
    /// tag.
    pub fn spawn(&self, handle: &ModuleHandle, workers: usize) -> WorkerPool {
        info!(workers, module = %handle.module().content_hash(), "Spawning worker pool");

        let handles: Vec<WorkerHandle> = (1..=workers as u32)
            .map(|n| {
                let worker = WorkerBootstrap::spawn(
                    WorkerId(n),
                    Arc::clone(&self.runtime),
                    Arc::clone(&self.sink),
                );
                if let Err(err) = worker.send_init(handle.clone()) {
                    warn!(worker = %worker.id(), %err, "Handshake message could not be queued");
                }
                worker
            })
            .collect();

        WorkerPool { workers: handles }
    }
}

/// The spawned worker set.
///
/// Dropping the pool closes every worker mailbox, which ends the worker
/// tasks; anything beyond that is outside this layer's concern.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// All worker handles.
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// Handle for the worker at `index`, if any.
    pub fn worker(&self, index: usize) -> Option<&WorkerHandle> {
        self.workers.get(index)
    }

    /// Number of workers currently Ready.
    ///
    /// Observational only; this is not a barrier and the value can be
    /// stale by the time it is read.
    pub fn ready_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.is_ready()).count()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count())
            .field("ready_workers", &self.ready_workers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ErrorChannel;
    use crate::testutil::{MockRuntime, test_handle, wait_for_pool_ready};
    use crate::worker::WorkerState;

    #[test]
    fn test_detected_parallelism_nonzero() {
        assert!(detected_parallelism() >= 1);
    }

    #[tokio::test]
    async fn test_spawn_sizes_pool_exactly() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();
        let coordinator = ThreadPoolCoordinator::new(runtime, Arc::new(sink));

        let pool = coordinator.spawn(&test_handle(), 4);

        assert_eq!(pool.worker_count(), 4);
        assert!(pool.worker(3).is_some());
        assert!(pool.worker(4).is_none());
    }

    #[tokio::test]
    async fn test_spawn_returns_before_readiness() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();
        let coordinator = ThreadPoolCoordinator::new(runtime, Arc::new(sink));

        let pool = coordinator.spawn(&test_handle(), 2);

        // No barrier: the pool exists immediately, readiness trickles in.
        assert_eq!(pool.worker_count(), 2);
        wait_for_pool_ready(&pool).await;
        assert_eq!(pool.ready_workers(), 2);
    }

    #[tokio::test]
    async fn test_each_worker_handshakes_exactly_once() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();
        let coordinator = ThreadPoolCoordinator::new(runtime.clone(), Arc::new(sink));

        let pool = coordinator.spawn(&test_handle(), 3);
        wait_for_pool_ready(&pool).await;

        let mut instantiated = runtime.instantiated();
        instantiated.sort();
        assert_eq!(instantiated, vec![WorkerId(1), WorkerId(2), WorkerId(3)]);
    }

    #[tokio::test]
    async fn test_worker_ids_start_after_main_context() {
        let runtime = Arc::new(MockRuntime::ok());
        let (sink, _rx) = ErrorChannel::new();
        let coordinator = ThreadPoolCoordinator::new(runtime, Arc::new(sink));

        let pool = coordinator.spawn(&test_handle(), 2);

        for worker in pool.workers() {
            assert!(!worker.id().is_main());
        }
    }

    #[tokio::test]
    async fn test_failed_workers_do_not_block_the_rest() {
        // Fail every even worker id; odd ones still come up.
        let runtime = Arc::new(MockRuntime::failing_for(|id| id.0 % 2 == 0));
        let (sink, mut rx) = ErrorChannel::new();
        let coordinator = ThreadPoolCoordinator::new(runtime, Arc::new(sink));

        let pool = coordinator.spawn(&test_handle(), 4);

        // Workers 2 and 4 fail; both failures land on the channel.
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let mut failed = vec![first.worker, second.worker];
        failed.sort();
        assert_eq!(failed, vec![WorkerId(2), WorkerId(4)]);

        crate::testutil::wait_until(|| pool.ready_workers() == 2).await;
        for worker in pool.workers() {
            let expected = if worker.id().0 % 2 == 0 {
                WorkerState::Failed
            } else {
                WorkerState::Ready
            };
            assert_eq!(worker.state(), expected);
        }
    }
}
