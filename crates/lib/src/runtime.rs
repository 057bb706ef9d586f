//! Runtime host compiling the guest module and producing sessions.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use wasmtime::{Engine, Linker, Module};

use crate::{
    Error, RuntimeConfig, Session,
    imports::{self, HostState},
};

/// Guest module compiled together with host capability bindings. Immutable after creation.
pub(crate) struct CompiledGuest {
    pub engine: Engine,
    pub module: Module,
    pub linker: Linker<HostState>,
    pub memory_limit: Option<usize>,
}

impl CompiledGuest {
    fn new(config: &RuntimeConfig) -> Result<Self, Error> {
        let bytecode = config.source().load()?;
        let engine = Engine::default();
        let module =
            Module::new(&engine, &*bytecode).map_err(|err| Error::Compile(format!("{err:#}")))?;

        let mut linker = Linker::new(&engine);
        imports::register(&mut linker, config).map_err(|err| {
            Error::Compile(format!("failed registering host capabilities: {err:#}"))
        })?;
        if config.trap_unknown_imports() {
            linker
                .define_unknown_imports_as_traps(&module)
                .map_err(|err| Error::Compile(format!("failed linking guest imports: {err:#}")))?;
        }

        tracing::info!(
            module.len = bytecode.len(),
            module.imports = module.imports().len(),
            module.exports = module.exports().len(),
            "compiled guest module"
        );
        Ok(Self {
            engine,
            module,
            linker,
            memory_limit: config.memory_limit(),
        })
    }
}

/// Host runtime owning the compiled guest module.
///
/// The runtime is created once and produces any number of independent [`Session`]s.
/// It can be shared among threads; each thread should create its own sessions.
///
/// After the runtime is [closed](Self::close()), it rejects creating new sessions.
/// Sessions created before that are not affected: each owns its guest instance and stays
/// usable until it is closed itself.
pub struct Runtime {
    compiled: Mutex<Option<Arc<CompiledGuest>>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Runtime")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.close();
    }
}

impl Runtime {
    /// Loads and compiles the guest module, and registers host capabilities for it.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::Load`] if the module file cannot be read.
    /// - Returns [`Error::Compile`] if the module is malformed or host capabilities
    ///   cannot be registered.
    #[tracing::instrument(level = "info", skip_all, err)]
    pub fn new(config: &RuntimeConfig) -> Result<Self, Error> {
        let compiled = CompiledGuest::new(config)?;
        Ok(Self {
            compiled: Mutex::new(Some(Arc::new(compiled))),
        })
    }

    /// Creates a new session with a fresh guest instance.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::RuntimeClosed`] if the runtime was closed.
    /// - Returns [`Error::Instantiate`] if the guest cannot be instantiated.
    /// - Returns [`Error::MissingExports`] listing all required exports absent from the guest.
    /// - Returns [`Error::ExportSignature`] if a required export has an unexpected signature.
    #[tracing::instrument(level = "debug", skip_all, err)]
    pub fn new_session(&self) -> Result<Session, Error> {
        let compiled = self
            .compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::RuntimeClosed)?;
        Session::new(&compiled)
    }

    /// Closes this runtime, releasing the compiled module. Repeated calls are no-ops.
    pub fn close(&self) {
        let compiled = self
            .compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if compiled.is_some() {
            tracing::info!("closed runtime");
        }
    }

    /// Checks whether this runtime is closed.
    pub fn is_closed(&self) -> bool {
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
