//! The shared module handle.
//!
//! [`ModuleHandle`] pairs the compiled module with the shared linear
//! memory it operates on. The handle is produced once by the loader and
//! cloned into every worker; clones reference the same compiled code and
//! the same memory.

use wasmtime::SharedMemory;

use crate::CompiledModule;

/// Shared representation of the compiled code plus its linear memory.
///
/// The handle itself is immutable: it is never reassigned after creation.
/// The memory it points to is mutably accessible from every Ready worker;
/// synchronizing access to that memory is entirely the module's concern.
#[derive(Clone)]
pub struct ModuleHandle {
    module: CompiledModule,
    memory: SharedMemory,
}

impl ModuleHandle {
    /// Pair a compiled module with the shared memory it will run against.
    pub fn new(module: CompiledModule, memory: SharedMemory) -> Self {
        Self { module, memory }
    }

    /// The compiled module.
    pub fn module(&self) -> &CompiledModule {
        &self.module
    }

    /// The shared linear memory.
    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    /// Current size of the shared memory in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.memory.data().len()
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("content_hash", &self.module.content_hash())
            .field("memory_bytes", &self.memory_bytes())
            .finish_non_exhaustive()
    }
}
