//! Host-side bridge for signing, hashing and message formatting performed
//! inside a sandboxed WASM guest module.
//!
//! The guest module implements the cryptography (key generation, address derivation,
//! Schnorr signing, Poseidon hashing, message formatting) and exposes it as a fixed table
//! of exported functions. This crate is the host half: it compiles the module once,
//! creates isolated guest instances ([`Session`]s) and moves operands and results
//! across the boundary without ever handing the guest access to host memory.
//!
//! # Guest ABI
//!
//! The guest is a 32-bit WASM module exporting its linear memory as `memory`,
//! an allocator pair (`alloc(size) -> ptr`, `dealloc(ptr, size_hint)`) and a set of
//! functions returning *packed result words*. A packed word is an `i64` with the pointer
//! to the result buffer in the low 32 bits and the buffer length in the high 32 bits;
//! a zero pointer always means failure (see [`PackedResult`]). Result buffers belong
//! to the guest allocator; the host copies them out and releases them via `dealloc`.
//!
//! The guest may import two capabilities from the host:
//!
//! - A log sink (`env::host_log_string(ptr, len)` by default) which forwards the referenced
//!   bytes to the [`tracing`] facade with the `schnorr_host::guest` target.
//! - `wasi_snapshot_preview1::random_get(ptr, len) -> errno` backed by the OS CSPRNG.
//!
//! # Memory discipline
//!
//! Every guest allocation made while serving an operation is released before the operation
//! returns, on success and on every failure path, including guest traps and host panics.
//! Guest memory that held private key bytes is overwritten with zeros before it is released.
//! Key bytes returned to the caller are copies in host memory; disposing of them
//! (e.g., with `zeroize`) is the caller's responsibility.
//!
//! # Examples
//!
//! ```no_run
//! use schnorr_host::{Runtime, RuntimeConfig};
//!
//! let config = RuntimeConfig::new(std::path::PathBuf::from("signer.wasm"));
//! let runtime = Runtime::new(&config)?;
//! let mut session = runtime.new_session()?;
//!
//! let key_pair = session.new_private_key()?;
//! let formatted = session.format_message(b"btc/usd = 1.0", 1)?;
//! let hash = session.hash_message(&formatted)?;
//! let signature = session.sign(&key_pair.private_key, &hash)?;
//! println!("{}: {signature}", key_pair.address);
//!
//! session.close();
//! runtime.close();
//! # Ok::<_, schnorr_host::Error>(())
//! ```

// Documentation settings.
#![cfg_attr(docsrs, feature(doc_cfg))]
// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

pub use crate::{
    alloc::AllocationStats,
    config::{GuestSource, RuntimeConfig},
    error::{Error, Fault, InputError, ResultError},
    memory::PackedResult,
    runtime::Runtime,
    session::{KeyPair, Session},
};

mod alloc;
mod config;
mod error;
mod exports;
mod fault;
mod guard;
mod imports;
mod memory;
mod runtime;
mod session;

/// Size of a private key in bytes.
pub const PRIVATE_KEY_SIZE: usize = 59;
/// Size of an address in bytes.
pub const ADDRESS_SIZE: usize = 63;
/// Size of a signature in bytes.
pub const SIGNATURE_SIZE: usize = 216;
/// Number of message bytes packed into a single format chunk (32 fields of 16 bytes each).
pub const FORMAT_BLOCK_SIZE: usize = 16 * 32;
/// Maximum number of chunks in a formatted message.
pub const MAX_FORMAT_CHUNKS: usize = 32;

/// `tracing` target used for log lines emitted by the guest module.
pub const GUEST_LOG_TARGET: &str = "schnorr_host::guest";
