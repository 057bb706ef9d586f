//! Host capabilities imported by the guest.

#[cfg(target_arch = "wasm32")]
mod imports {
    #[link(wasm_import_module = "env")]
    unsafe extern "C" {
        pub(super) fn host_log_string(message_ptr: *const u8, message_len: usize);
    }

    #[link(wasm_import_module = "wasi_snapshot_preview1")]
    unsafe extern "C" {
        pub(super) fn random_get(buf: *mut u8, buf_len: usize) -> i32;
    }
}

pub(crate) fn log(message: &str) {
    #[cfg(target_arch = "wasm32")]
    unsafe {
        imports::host_log_string(message.as_ptr(), message.len());
    }
    #[cfg(not(target_arch = "wasm32"))]
    let _ = message;
}

/// Fills `buffer` with random bytes, returning the WASI errno on failure.
#[cfg(target_arch = "wasm32")]
pub(crate) fn random_bytes(buffer: &mut [u8]) -> Result<(), i32> {
    let errno = unsafe { imports::random_get(buffer.as_mut_ptr(), buffer.len()) };
    if errno == 0 { Ok(()) } else { Err(errno) }
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn random_bytes(_: &mut [u8]) -> Result<(), i32> {
    panic!("only callable from WASM")
}
