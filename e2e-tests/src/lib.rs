//! Stand-in guest module for end-to-end tests of `schnorr-host`.
//!
//! The module exposes the full export table expected by the host. Algorithms behind it
//! are deterministic placeholders producing outputs of the right shape; none of them
//! is cryptographically meaningful. The pure parts of the algorithms are public so that
//! tests can compute expected outputs natively.

#[cfg(target_arch = "wasm32")]
#[global_allocator]
static ALLOCATOR: dlmalloc::GlobalDlmalloc = dlmalloc::GlobalDlmalloc;

pub mod format;
pub mod hash;
mod host;
pub mod keys;
mod memory;

pub use crate::memory::{alloc, dealloc};

/// Packed result signalling a failure to the host.
const FAILURE: u64 = 0;

#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn new_private_key() -> u64 {
    let mut seed = [0_u8; keys::SEED_LEN];
    if let Err(errno) = host::random_bytes(&mut seed) {
        host::log(&format!("failed getting randomness: errno {errno}"));
        return FAILURE;
    }
    let key = keys::private_key(&seed);
    host::log("generated private key");
    memory::forget_buffer(&key)
}

/// # Safety
///
/// The pointer must reference `key_len` readable bytes.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn get_address(key_ptr: *const u8, key_len: usize) -> u64 {
    let key = unsafe { memory::input(key_ptr, key_len) };
    match keys::address(key) {
        Some(address) => memory::forget_buffer(&address),
        None => {
            host::log("cannot derive address: malformed private key");
            FAILURE
        }
    }
}

/// # Safety
///
/// Pointers must reference the specified number of readable bytes.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn sign(
    key_ptr: *const u8,
    key_len: usize,
    message_ptr: *const u8,
    message_len: usize,
) -> u64 {
    let key = unsafe { memory::input(key_ptr, key_len) };
    let message = unsafe { memory::input(message_ptr, message_len) };
    match keys::sign(key, message) {
        Some(signature) => memory::forget_buffer(&signature),
        None => {
            host::log("cannot sign: malformed private key");
            FAILURE
        }
    }
}

/// # Safety
///
/// The pointer must reference `message_len` readable bytes.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn hash_message(message_ptr: *const u8, message_len: usize) -> u64 {
    let message = unsafe { memory::input(message_ptr, message_len) };
    memory::forget_buffer(hash::literal(message).as_bytes())
}

/// # Safety
///
/// The pointer must reference `message_len` readable bytes.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn hash_message_bytes(message_ptr: *const u8, message_len: usize) -> u64 {
    let message = unsafe { memory::input(message_ptr, message_len) };
    memory::forget_buffer(&hash::le_bytes(message))
}

/// # Safety
///
/// The pointer must reference `message_len` readable bytes.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn format_message(
    message_ptr: *const u8,
    message_len: usize,
    target_chunks: usize,
) -> u64 {
    let message = unsafe { memory::input(message_ptr, message_len) };
    match format::render(message, target_chunks) {
        Some(formatted) => memory::forget_buffer(formatted.as_bytes()),
        None => {
            host::log("message does not fit into the requested chunks");
            FAILURE
        }
    }
}

/// # Safety
///
/// The pointer must reference `formatted_len` readable bytes.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn formatted_message_to_bytes(
    formatted_ptr: *const u8,
    formatted_len: usize,
) -> u64 {
    let formatted = unsafe { memory::input(formatted_ptr, formatted_len) };
    let message = std::str::from_utf8(formatted).ok().and_then(format::parse);
    match message {
        Some(message) => memory::forget_buffer(&message),
        None => {
            host::log("cannot parse formatted message");
            FAILURE
        }
    }
}
