//! Host capabilities provided to the guest.

use wasmtime::{Caller, Extern, Linker, Memory, StoreLimits, StoreLimitsBuilder};

use crate::{GUEST_LOG_TARGET, RuntimeConfig, exports::MEMORY_EXPORT};

const WASI_MODULE: &str = "wasi_snapshot_preview1";
const RANDOM_GET: &str = "random_get";

// WASI errno values.
const ERRNO_SUCCESS: u32 = 0;
const ERRNO_FAULT: u32 = 21;
const ERRNO_IO: u32 = 29;

/// Data associated with a guest store.
pub(crate) struct HostState {
    pub session_id: u64,
    pub limits: StoreLimits,
}

impl HostState {
    pub fn new(session_id: u64, memory_limit: Option<usize>) -> Self {
        let mut limits = StoreLimitsBuilder::new();
        if let Some(limit) = memory_limit {
            limits = limits.memory_size(limit);
        }
        Self {
            session_id,
            limits: limits.build(),
        }
    }
}

pub(crate) fn register(
    linker: &mut Linker<HostState>,
    config: &RuntimeConfig,
) -> wasmtime::Result<()> {
    let (module, name) = config.log_sink();
    linker.func_wrap(module, name, log_string)?;
    linker.func_wrap(WASI_MODULE, RANDOM_GET, random_get)?;
    Ok(())
}

fn guest_memory(caller: &mut Caller<'_, HostState>) -> Option<Memory> {
    caller.get_export(MEMORY_EXPORT).and_then(Extern::into_memory)
}

fn guest_range(ptr: u32, len: u32) -> Option<std::ops::Range<usize>> {
    let start = ptr as usize;
    Some(start..start.checked_add(len as usize)?)
}

fn log_string(mut caller: Caller<'_, HostState>, ptr: u32, len: u32) {
    let session = caller.data().session_id;
    let Some(memory) = guest_memory(&mut caller) else {
        tracing::warn!(session, "guest logged a message without exporting memory");
        return;
    };

    let data = memory.data(&caller);
    match guest_range(ptr, len).and_then(|range| data.get(range)) {
        Some(message) => {
            let message = String::from_utf8_lossy(message);
            tracing::info!(
                target: GUEST_LOG_TARGET,
                session,
                guest_message = &*message,
                "guest log"
            );
        }
        None => {
            tracing::warn!(session, ptr, len, "guest log message is out of bounds");
        }
    }
}

fn random_get(mut caller: Caller<'_, HostState>, ptr: u32, len: u32) -> u32 {
    let session = caller.data().session_id;
    let Some(memory) = guest_memory(&mut caller) else {
        return ERRNO_FAULT;
    };

    let data = memory.data_mut(&mut caller);
    let Some(buffer) = guest_range(ptr, len).and_then(|range| data.get_mut(range)) else {
        tracing::warn!(session, ptr, len, "guest requested randomness out of bounds");
        return ERRNO_FAULT;
    };
    match getrandom::getrandom(buffer) {
        Ok(()) => ERRNO_SUCCESS,
        Err(err) => {
            tracing::error!(session, %err, "failed obtaining randomness from OS");
            ERRNO_IO
        }
    }
}
