//! Module load lifecycle.
//!
//! The [`Loader`] owns the fetch/compile/instantiate pipeline on the main
//! context and reports it through a fixed callback surface,
//! [`LoaderHooks`]. On success it immediately fans out the worker pool;
//! this is the sole trigger for worker creation. A `Loader` is consumed
//! by [`Loader::load`]; a finished run, successful or not, can never be
//! restarted. Retrying means building a fresh `Loader`.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::coordinator::{ThreadPoolCoordinator, WorkerPool, detected_parallelism};
use crate::sink::FatalErrorSink;
use wasmpool_common::{LoadError, PoolConfig, WorkerId};
use wasmpool_core::{CompiledModule, ModuleHandle, ModuleSource, WasmEngine, WorkerRuntime};

/// Lifecycle phase of one load run.
///
/// The progression is linear: `Idle → Starting → Fetching → Complete`,
/// then exactly one of `Success` or `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    /// Created, not yet started.
    Idle,
    /// Start notification fired, no bytes read yet.
    Starting,
    /// Bytes in flight.
    Fetching,
    /// Transfer finished; instantiation result not yet known.
    Complete,
    /// Module handle produced; terminal.
    Success,
    /// Load failed; terminal.
    Failure,
}

/// Lifecycle notification callbacks for one load run.
///
/// Every callback is optional. Note that without an `on_success` hook the
/// worker pool is never created: pool fan-out rides on the success
/// notification.
#[derive(Default)]
pub struct LoaderHooks {
    on_start: Option<Box<dyn FnMut() + Send>>,
    on_progress: Option<Box<dyn FnMut(u64, Option<u64>) + Send>>,
    on_complete: Option<Box<dyn FnMut() + Send>>,
    on_success: Option<Box<dyn FnMut(&ModuleHandle) + Send>>,
    on_failure: Option<Box<dyn FnMut(&LoadError) + Send>>,
}

impl LoaderHooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once, before any bytes are read.
    pub fn on_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    /// Fired once per chunk with the cumulative byte count and the total
    /// size when known. Counts are non-decreasing within a run; the total
    /// is sampled once and stays constant.
    pub fn on_progress(mut self, f: impl FnMut(u64, Option<u64>) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Fired once, after the transfer finishes, before the instantiation
    /// result is known.
    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Fired at most once, after instantiation succeeds. Installing this
    /// hook is what opts the run into pool fan-out.
    pub fn on_success(mut self, f: impl FnMut(&ModuleHandle) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Fired at most once, when any pipeline step fails.
    pub fn on_failure(mut self, f: impl FnMut(&LoadError) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for LoaderHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderHooks")
            .field("on_start", &self.on_start.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Result of a successful load.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The shared module handle.
    pub handle: ModuleHandle,

    /// The spawned pool, when an `on_success` hook opted into fan-out.
    pub pool: Option<WorkerPool>,
}

/// Drives module acquisition and instantiation on the main context.
pub struct Loader {
    engine: WasmEngine,
    runtime: Arc<dyn WorkerRuntime>,
    sink: Arc<dyn FatalErrorSink>,
    config: PoolConfig,
    phase: LoaderPhase,
}

impl Loader {
    /// Create a loader.
    ///
    /// `runtime` performs both the loader's main-context validation
    /// instantiation and, via the coordinator, every worker handshake.
    /// `sink` is handed to the spawned workers for fatal handshake
    /// errors; loader-side failures are reported through `on_failure`
    /// instead.
    pub fn new(
        engine: WasmEngine,
        runtime: Arc<dyn WorkerRuntime>,
        sink: Arc<dyn FatalErrorSink>,
        config: PoolConfig,
    ) -> Self {
        Self {
            engine,
            runtime,
            sink,
            config,
            phase: LoaderPhase::Idle,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LoaderPhase {
        self.phase
    }

    /// Run the full pipeline: fetch, compile, create the shared memory,
    /// validate with one main-context instantiation, then fan out the
    /// pool sized to the hardware concurrency sampled at that moment (or
    /// the configured override).
    ///
    /// Consumes the loader: a run is terminal whichever way it ends.
    ///
    /// # Errors
    ///
    /// Returns the error already reported through `on_failure`.
    pub async fn load(
        mut self,
        mut source: impl ModuleSource,
        mut hooks: LoaderHooks,
    ) -> Result<LoadOutcome, LoadError> {
        self.set_phase(LoaderPhase::Starting);
        if let Some(f) = hooks.on_start.as_mut() {
            f();
        }

        let total = match source.open().await {
            Ok(total) => total,
            Err(err) => return Err(self.fail(&mut hooks, err)),
        };

        self.set_phase(LoaderPhase::Fetching);
        let bytes = match Self::fetch(&mut source, total, &mut hooks).await {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(&mut hooks, err)),
        };

        self.set_phase(LoaderPhase::Complete);
        if let Some(f) = hooks.on_complete.as_mut() {
            f();
        }

        let handle = match self.instantiate(&bytes).await {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail(&mut hooks, err)),
        };

        self.set_phase(LoaderPhase::Success);
        info!(
            module = %handle.module().content_hash(),
            memory_bytes = handle.memory_bytes(),
            "Module load succeeded"
        );

        let pool = match hooks.on_success.as_mut() {
            Some(f) => {
                f(&handle);

                // Concurrency is sampled here, at success time, and passed
                // to the coordinator verbatim; it is never re-sampled.
                let workers = self
                    .config
                    .loader
                    .workers
                    .unwrap_or_else(detected_parallelism);
                let coordinator =
                    ThreadPoolCoordinator::new(Arc::clone(&self.runtime), Arc::clone(&self.sink));
                Some(coordinator.spawn(&handle, workers))
            }
            None => {
                debug!("No success hook installed; pool fan-out skipped");
                None
            }
        };

        Ok(LoadOutcome { handle, pool })
    }

    /// Stream the module bytes, reporting progress per chunk.
    async fn fetch(
        source: &mut impl ModuleSource,
        total: Option<u64>,
        hooks: &mut LoaderHooks,
    ) -> Result<Vec<u8>, LoadError> {
        let mut bytes: Vec<u8> = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut current: u64 = 0;

        while let Some(chunk) = source.next_chunk().await? {
            current += chunk.len() as u64;
            bytes.extend_from_slice(&chunk);

            if let Some(f) = hooks.on_progress.as_mut() {
                f(current, total);
            }
        }

        if let Some(expected) = total {
            if current != expected {
                return Err(LoadError::fetch(format!(
                    "Transfer ended at {current} of {expected} bytes"
                )));
            }
        }

        Ok(bytes)
    }

    /// Compile the bytes, create the shared memory, and validate the pair
    /// with one instantiation on the main context. The validation
    /// instance is discarded; its only job is failing fast before N
    /// workers are spawned against a module that cannot come up.
    async fn instantiate(&self, bytes: &[u8]) -> Result<ModuleHandle, LoadError> {
        let module = CompiledModule::from_bytes(self.engine.inner(), bytes)?;
        let memory = self.engine.create_shared_memory(&self.config.memory)?;
        let handle = ModuleHandle::new(module, memory);

        self.runtime
            .instantiate(WorkerId::MAIN, &handle)
            .await
            .map_err(LoadError::from)?;

        Ok(handle)
    }

    /// Terminal failure: record the phase, log, notify.
    fn fail(&mut self, hooks: &mut LoaderHooks, err: LoadError) -> LoadError {
        self.set_phase(LoaderPhase::Failure);
        error!(%err, "Module load failed");

        if let Some(f) = hooks.on_failure.as_mut() {
            f(&err);
        }
        err
    }

    fn set_phase(&mut self, next: LoaderPhase) {
        debug!(from = ?self.phase, to = ?next, "Loader phase change");
        self.phase = next;
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
