//! Errors produced by the host bridge.

use std::{error, fmt, io, path::PathBuf};

use wasmtime::Trap;

/// Host-side precondition that was violated before crossing into the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputError {
    /// Number of format chunks is outside `1..=MAX_FORMAT_CHUNKS`.
    ChunkCount(usize),
    /// Message does not fit into the requested number of format chunks.
    MessageTooLong {
        /// Length of the supplied message.
        len: usize,
        /// Maximum length for the requested number of chunks.
        max_len: usize,
    },
    /// Private key has an unexpected length.
    KeyLength {
        /// Expected key length.
        expected: usize,
        /// Actual key length.
        actual: usize,
    },
    /// Buffer length cannot be expressed in the 32-bit guest address space.
    TooLarge(usize),
}

impl fmt::Display for InputError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkCount(count) => write!(
                formatter,
                "target number of chunks must be between 1 and {}, got {count}",
                crate::MAX_FORMAT_CHUNKS
            ),
            Self::MessageTooLong { len, max_len } => write!(
                formatter,
                "message length {len} exceeds the maximum of {max_len} bytes \
                 for the requested number of chunks"
            ),
            Self::KeyLength { expected, actual } => write!(
                formatter,
                "invalid private key size: expected {expected} bytes, got {actual}"
            ),
            Self::TooLarge(len) => {
                write!(formatter, "buffer of {len} bytes exceeds guest address space")
            }
        }
    }
}

/// Kind of a malformed or failed guest result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    /// The guest function returned no result word at all.
    EmptyReturn,
    /// The guest returned a result word whose pointer field is zero.
    InvalidInput,
    /// The guest returned a value of an unexpected type instead of a packed `i64` word.
    UnexpectedType(String),
    /// The guest buffer has an unexpected length.
    UnexpectedLength {
        /// Expected length of the buffer.
        expected: usize,
        /// Length reported by the guest.
        actual: usize,
    },
    /// The guest buffer was expected to hold text, but is not valid UTF-8.
    NotUtf8,
}

impl fmt::Display for ResultError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyReturn => formatter.write_str("empty return"),
            Self::InvalidInput => formatter.write_str("invalid input"),
            Self::UnexpectedType(ty) => {
                write!(formatter, "unexpected result type {ty}; expected `i64`")
            }
            Self::UnexpectedLength { expected, actual } => write!(
                formatter,
                "unexpected length: expected {expected} bytes, got {actual}"
            ),
            Self::NotUtf8 => formatter.write_str("not UTF-8"),
        }
    }
}

/// Failure raised while a guest function was running or while its result was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Fault {
    /// Guest execution trapped.
    Trap {
        /// Name of the export being called.
        export: &'static str,
        /// Trap code, if the failure was a WASM trap rather than a host error.
        code: Option<Trap>,
        /// Human-readable description of the failure.
        message: String,
    },
    /// Panic with a textual payload.
    Panic(String),
    /// Panic with a payload of unknown type.
    Unknown,
}

impl fmt::Display for Fault {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trap {
                export,
                code: Some(code),
                message,
            } => write!(formatter, "guest `{export}` trapped ({code}): {message}"),
            Self::Trap {
                export, message, ..
            } => write!(formatter, "guest `{export}` failed: {message}"),
            Self::Panic(message) => write!(formatter, "panic: {message}"),
            Self::Unknown => formatter.write_str("unknown internal failure"),
        }
    }
}

/// Errors returned by [`Runtime`](crate::Runtime) and [`Session`](crate::Session) operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error reading guest bytecode from the file system.
    Load {
        /// Path to the bytecode file.
        path: PathBuf,
        /// I/O error.
        source: io::Error,
    },
    /// Guest bytecode is malformed or incompatible, or host capabilities could not be registered.
    Compile(String),
    /// Error instantiating a guest module for a session.
    Instantiate(String),
    /// One or more required exports are absent from the guest. Contains all missing names.
    MissingExports(Vec<String>),
    /// Required export has an unexpected signature.
    ExportSignature {
        /// Name of the export.
        name: &'static str,
        /// Expected signature.
        expected: &'static str,
        /// Actual signature.
        actual: String,
    },
    /// The runtime was closed and cannot create sessions.
    RuntimeClosed,
    /// The session was closed.
    SessionClosed,
    /// Guest allocator failed to provide memory.
    Allocation {
        /// Requested size in bytes.
        size: u32,
        /// Description of the failure.
        reason: String,
    },
    /// Read or write outside guest linear memory.
    MemoryAccess {
        /// Offset of the accessed range.
        offset: u32,
        /// Length of the accessed range.
        len: u32,
        /// Current size of guest memory in bytes.
        memory_size: usize,
    },
    /// Host-side validation failed; the guest was not called.
    InvalidInput(InputError),
    /// The guest reported a failure or returned a malformed result.
    InvalidResult {
        /// Name of the export that produced the result.
        export: &'static str,
        /// Kind of the failure.
        kind: ResultError,
    },
    /// Guest fault converted into an error.
    Fault(Fault),
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { path, source } => write!(
                formatter,
                "failed reading guest module from `{}`: {source}",
                path.display()
            ),
            Self::Compile(message) => write!(formatter, "failed compiling guest module: {message}"),
            Self::Instantiate(message) => {
                write!(formatter, "failed instantiating guest session: {message}")
            }
            Self::MissingExports(names) => {
                formatter.write_str("missing required wasm exports: ")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        formatter.write_str(", ")?;
                    }
                    write!(formatter, "`{name}`")?;
                }
                Ok(())
            }
            Self::ExportSignature {
                name,
                expected,
                actual,
            } => write!(
                formatter,
                "export `{name}` has unexpected signature; expected {expected}, got {actual}"
            ),
            Self::RuntimeClosed => formatter.write_str("runtime is closed, create a new one"),
            Self::SessionClosed => formatter.write_str("session module is closed"),
            Self::Allocation { size, reason } => write!(
                formatter,
                "failed to allocate {size} bytes in guest memory: {reason}"
            ),
            Self::MemoryAccess {
                offset,
                len,
                memory_size,
            } => write!(
                formatter,
                "guest memory access out of bounds: {len} bytes at {offset} \
                 (memory size is {memory_size} bytes)"
            ),
            Self::InvalidInput(err) => write!(formatter, "invalid input: {err}"),
            Self::InvalidResult { export, kind } => {
                write!(formatter, "invalid result from `{export}`: {kind}")
            }
            Self::Fault(fault) => fmt::Display::fmt(fault, formatter),
        }
    }
}

impl From<InputError> for Error {
    fn from(err: InputError) -> Self {
        Self::InvalidInput(err)
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Load { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error {
    pub(crate) fn invalid_result(export: &'static str, kind: ResultError) -> Self {
        Self::InvalidResult { export, kind }
    }

    /// Returns `true` if this error was produced by host-side validation, i.e., the guest
    /// was never called.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
