//! Copying bytes across the guest boundary and decoding packed result words.

use wasmtime::{AsContext, AsContextMut, Memory, Val};

use crate::{Error, ResultError};

/// Outcome encoded in a packed result word returned by guest functions.
///
/// The word holds a guest pointer in its low 32 bits and a length in its high 32 bits.
/// A zero pointer denotes failure regardless of the length field.
///
/// # Examples
///
/// ```
/// use schnorr_host::PackedResult;
///
/// let word = (16_u64 << 32) | 0x1_0000;
/// assert_eq!(
///     PackedResult::decode(word),
///     PackedResult::Success { ptr: 0x1_0000, len: 16 }
/// );
/// // A null pointer is a failure, even with a non-zero length.
/// assert!(!PackedResult::decode(16_u64 << 32).is_success());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedResult {
    /// Guest produced a buffer.
    Success {
        /// Pointer to the buffer in guest memory.
        ptr: u32,
        /// Length of the buffer in bytes.
        len: u32,
    },
    /// Guest reported a failure.
    Failure {
        /// Length field of the word. It carries no meaning and is retained for diagnostics.
        len: u32,
    },
}

impl PackedResult {
    /// Decodes a packed result word.
    #[allow(clippy::cast_possible_truncation)] // intentional
    pub fn decode(word: u64) -> Self {
        let ptr = word as u32;
        let len = (word >> 32) as u32;
        if ptr == 0 {
            Self::Failure { len }
        } else {
            Self::Success { ptr, len }
        }
    }

    /// Encodes this result into a word.
    pub fn encode(self) -> u64 {
        match self {
            Self::Success { ptr, len } => (u64::from(len) << 32) | u64::from(ptr),
            Self::Failure { len } => u64::from(len) << 32,
        }
    }

    /// Checks whether this result denotes success.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Buffer in guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub ptr: u32,
    pub len: u32,
}

impl Region {
    pub fn expect_len(self, export: &'static str, expected: usize) -> Result<Self, Error> {
        if self.len as usize == expected {
            Ok(self)
        } else {
            let kind = ResultError::UnexpectedLength {
                expected,
                actual: self.len as usize,
            };
            Err(Error::invalid_result(export, kind))
        }
    }
}

/// Extracts the packed word from the values returned by a guest function.
pub(crate) fn unpack(export: &'static str, results: &[Val]) -> Result<Region, Error> {
    let word = match results.first() {
        None => return Err(Error::invalid_result(export, ResultError::EmptyReturn)),
        #[allow(clippy::cast_sign_loss)] // intentional
        Some(Val::I64(word)) => *word as u64,
        Some(other) => {
            let kind = ResultError::UnexpectedType(val_type_name(other).to_owned());
            return Err(Error::invalid_result(export, kind));
        }
    };

    match PackedResult::decode(word) {
        PackedResult::Success { ptr, len } => Ok(Region { ptr, len }),
        PackedResult::Failure { len } => {
            tracing::debug!(export, len, "guest returned null pointer");
            Err(Error::invalid_result(export, ResultError::InvalidInput))
        }
    }
}

fn val_type_name(value: &Val) -> &'static str {
    match value {
        Val::I32(_) => "i32",
        Val::I64(_) => "i64",
        Val::F32(_) => "f32",
        Val::F64(_) => "f64",
        Val::V128(_) => "v128",
        _ => "reference",
    }
}

/// Converts a guest pointer or length into a WASM `i32` argument.
#[allow(clippy::cast_possible_wrap)] // intentional
pub(crate) fn wasm_arg(value: u32) -> Val {
    Val::I32(value as i32)
}

/// Linear memory of a guest instance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GuestMemory(pub Memory);

impl GuestMemory {
    fn access_error(self, store: impl AsContext, offset: u32, len: u32) -> Error {
        Error::MemoryAccess {
            offset,
            len,
            memory_size: self.0.data_size(store),
        }
    }

    /// Copies `bytes` into guest memory at `ptr`.
    pub fn write(self, mut store: impl AsContextMut, ptr: u32, bytes: &[u8]) -> Result<(), Error> {
        if self.0.write(&mut store, ptr as usize, bytes).is_err() {
            #[allow(clippy::cast_possible_truncation)] // lengths are validated by callers
            let len = bytes.len() as u32;
            return Err(self.access_error(&store, ptr, len));
        }
        Ok(())
    }

    /// Copies `len` bytes at `ptr` out of guest memory into a new host buffer.
    pub fn read(self, store: impl AsContext, ptr: u32, len: u32) -> Result<Vec<u8>, Error> {
        let data = self.0.data(&store);
        let range = (ptr as usize)..(ptr as usize).saturating_add(len as usize);
        match data.get(range) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => Err(self.access_error(&store, ptr, len)),
        }
    }

    /// Overwrites `len` bytes at `ptr` with zeros.
    pub fn zero(self, mut store: impl AsContextMut, ptr: u32, len: u32) -> Result<(), Error> {
        let data = self.0.data_mut(&mut store);
        let range = (ptr as usize)..(ptr as usize).saturating_add(len as usize);
        if let Some(bytes) = data.get_mut(range) {
            bytes.fill(0);
            Ok(())
        } else {
            Err(self.access_error(&store, ptr, len))
        }
    }
}
