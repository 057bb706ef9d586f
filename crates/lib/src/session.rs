//! Guest sessions.

use std::{
    fmt, mem,
    sync::atomic::{AtomicU64, Ordering},
};

use wasmtime::Store;
use zeroize::Zeroizing;

use crate::{
    ADDRESS_SIZE, AllocationStats, Error, FORMAT_BLOCK_SIZE, InputError, MAX_FORMAT_CHUNKS,
    PRIVATE_KEY_SIZE, SIGNATURE_SIZE,
    exports::{Export, Exports},
    fault,
    guard::{AllocScope, Sensitivity, guest_len},
    imports::HostState,
    memory::Region,
    runtime::CompiledGuest,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Live guest instance.
pub(crate) struct Guest {
    pub store: Store<HostState>,
    pub exports: Exports,
}

impl fmt::Debug for Guest {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Guest")
            .field("session_id", &self.store.data().session_id)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

/// Newly generated private key together with its address.
///
/// The private key is a copy in host memory, independent of the guest. The caller owns it
/// and is responsible for erasing it (e.g., with `zeroize`) once it is no longer needed.
pub struct KeyPair {
    /// Private key bytes (the textual key representation).
    pub private_key: Vec<u8>,
    /// Address derived from the private key.
    pub address: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Isolated guest instance with its own linear memory.
///
/// A session is not meant for concurrent use; all operations take `&mut self`.
/// Threads that need parallelism should create separate sessions from a shared
/// [`Runtime`](crate::Runtime).
///
/// After the session is [closed](Self::close()), all its operations return
/// [`Error::SessionClosed`].
pub struct Session {
    id: u64,
    guest: Option<Guest>,
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl Session {
    pub(crate) fn new(compiled: &CompiledGuest) -> Result<Self, Error> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let mut store = Store::new(
            &compiled.engine,
            HostState::new(id, compiled.memory_limit),
        );
        store.limiter(|state| &mut state.limits);

        let instance = compiled
            .linker
            .instantiate(&mut store, &compiled.module)
            .map_err(|err| Error::Instantiate(format!("{err:#}")))?;
        // On failure, `store` is dropped together with the partially initialized instance.
        let exports = Exports::resolve(&mut store, instance).inspect_err(|err| {
            tracing::warn!(session = id, %err, "discarding unusable guest instance");
        })?;

        tracing::debug!(session = id, "created session");
        Ok(Self {
            id,
            guest: Some(Guest { store, exports }),
        })
    }

    /// Returns the process-unique ID of this session used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Checks whether this session is closed.
    pub fn is_closed(&self) -> bool {
        self.guest.is_none()
    }

    /// Closes this session, releasing the guest instance. Repeated calls are no-ops.
    pub fn close(&mut self) {
        if let Some(guest) = self.guest.take() {
            let stats = guest.exports.allocator.stats();
            drop(guest);
            tracing::debug!(session = self.id, ?stats, "closed session");
        }
    }

    /// Returns guest allocation counters for this session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session is closed.
    pub fn allocation_stats(&self) -> Result<AllocationStats, Error> {
        let guest = self.guest.as_ref().ok_or(Error::SessionClosed)?;
        Ok(guest.exports.allocator.stats())
    }

    fn guest(&mut self) -> Result<&mut Guest, Error> {
        self.guest.as_mut().ok_or(Error::SessionClosed)
    }

    /// Generates a new private key and derives its address.
    ///
    /// Guest memory holding the key is zeroed before it is released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResult`] if the guest fails to generate the key or the address,
    /// or returns buffers of unexpected lengths.
    #[tracing::instrument(level = "debug", skip_all, fields(session = self.id), err)]
    pub fn new_private_key(&mut self) -> Result<KeyPair, Error> {
        let guest = self.guest()?;
        fault::shield("new_private_key", || {
            let mut scope = AllocScope::new(guest);
            let key = scope.call_packed(Export::NewPrivateKey, &[])?;
            scope.mark_secret(key);
            let key = key.expect_len(Export::NewPrivateKey.name(), PRIVATE_KEY_SIZE)?;
            let mut private_key = Zeroizing::new(scope.read(key)?);

            let address = scope.call_packed(Export::GetAddress, &[key.ptr, key.len])?;
            let address = address.expect_len(Export::GetAddress.name(), ADDRESS_SIZE)?;
            let address = scope.read_text(Export::GetAddress, address)?;
            Ok(KeyPair {
                private_key: mem::take(&mut *private_key),
                address,
            })
        })
    }

    /// Formats `message` as a struct of `target_chunks` chunks, each holding
    /// [`FORMAT_BLOCK_SIZE`] bytes. Newlines are removed from the formatted output.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::InvalidInput`] without calling the guest if `target_chunks`
    ///   is not in `1..=MAX_FORMAT_CHUNKS`, or the message does not fit into the chunks.
    /// - Returns [`Error::InvalidResult`] if the guest rejects the message.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(session = self.id, message.len = message.len(), target_chunks = target_chunks),
        err
    )]
    pub fn format_message(
        &mut self,
        message: &[u8],
        target_chunks: usize,
    ) -> Result<Vec<u8>, Error> {
        self.guest()?;
        check_format_args(message.len(), target_chunks)?;
        let target_chunks = guest_len(target_chunks)?;

        let mut formatted = self.transform(
            Export::FormatMessage,
            message,
            &[target_chunks],
            |scope, output| scope.read(output),
        )?;
        formatted.retain(|&byte| byte != b'\n');
        Ok(formatted)
    }

    /// Recovers the original message from the output of [`Self::format_message()`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResult`] if the guest cannot parse the formatted message.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(session = self.id, formatted.len = formatted_message.len()),
        err
    )]
    pub fn recover_message(&mut self, formatted_message: &[u8]) -> Result<Vec<u8>, Error> {
        self.transform(
            Export::RecoverMessage,
            formatted_message,
            &[],
            |scope, output| scope.read(output),
        )
    }

    /// Hashes `message` and returns the textual literal of the hash, suitable for use
    /// in contracts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResult`] if the guest fails to hash the message.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(session = self.id, message.len = message.len()),
        err
    )]
    pub fn hash_message_to_string(&mut self, message: &[u8]) -> Result<String, Error> {
        self.transform(Export::HashMessage, message, &[], |scope, output| {
            scope.read_text(Export::HashMessage, output)
        })
    }

    /// Hashes `message` and returns the little-endian byte representation of the hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResult`] if the guest fails to hash the message.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(session = self.id, message.len = message.len()),
        err
    )]
    pub fn hash_message(&mut self, message: &[u8]) -> Result<Vec<u8>, Error> {
        self.transform(Export::HashMessageBytes, message, &[], |scope, output| {
            scope.read(output)
        })
    }

    /// Signs `message` with `private_key`. The message is normally the textual
    /// or little-endian byte representation of a hash.
    ///
    /// The key is copied into guest memory for the duration of the call and is zeroed
    /// before that memory is released.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::InvalidInput`] without calling the guest if the key length
    ///   is not [`PRIVATE_KEY_SIZE`].
    /// - Returns [`Error::InvalidResult`] if the guest fails to sign the message.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(session = self.id, message.len = message.len()),
        err
    )]
    pub fn sign(&mut self, private_key: &[u8], message: &[u8]) -> Result<String, Error> {
        let guest = self.guest()?;
        if private_key.len() != PRIVATE_KEY_SIZE {
            return Err(InputError::KeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: private_key.len(),
            }
            .into());
        }
        guest_len(message.len())?;

        fault::shield("sign", || {
            let mut scope = AllocScope::new(guest);
            let message = scope.alloc_bytes(message, Sensitivity::Public)?;
            let key = scope.alloc_bytes(private_key, Sensitivity::Secret)?;
            let args = [key.ptr, key.len, message.ptr, message.len];
            let signature = scope.call_packed(Export::Sign, &args)?;
            let signature = signature.expect_len(Export::Sign.name(), SIGNATURE_SIZE)?;
            scope.read_text(Export::Sign, signature)
        })
    }

    /// Copies `input` into the guest, calls `export` with it (followed by `extra_args`)
    /// and reads the produced buffer.
    fn transform<T>(
        &mut self,
        export: Export,
        input: &[u8],
        extra_args: &[u32],
        read: impl FnOnce(&AllocScope<'_>, Region) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let guest = self.guest()?;
        guest_len(input.len())?;

        fault::shield(export.name(), || {
            let mut scope = AllocScope::new(guest);
            let input = scope.alloc_bytes(input, Sensitivity::Public)?;
            let mut args = vec![input.ptr, input.len];
            args.extend_from_slice(extra_args);
            let output = scope.call_packed(export, &args)?;
            read(&scope, output)
        })
    }
}

fn check_format_args(message_len: usize, target_chunks: usize) -> Result<(), InputError> {
    if !(1..=MAX_FORMAT_CHUNKS).contains(&target_chunks) {
        return Err(InputError::ChunkCount(target_chunks));
    }
    let max_len = target_chunks * FORMAT_BLOCK_SIZE;
    if message_len > max_len {
        return Err(InputError::MessageTooLong {
            len: message_len,
            max_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn format_args_validation() {
        check_format_args(0, 1).unwrap();
        check_format_args(FORMAT_BLOCK_SIZE, 1).unwrap();
        check_format_args(MAX_FORMAT_CHUNKS * FORMAT_BLOCK_SIZE, MAX_FORMAT_CHUNKS).unwrap();

        assert_matches!(check_format_args(0, 0), Err(InputError::ChunkCount(0)));
        assert_matches!(check_format_args(0, 33), Err(InputError::ChunkCount(33)));
        assert_matches!(
            check_format_args(FORMAT_BLOCK_SIZE + 1, 1),
            Err(InputError::MessageTooLong { len: 513, max_len: 512 })
        );
    }

    #[test]
    fn key_pair_debug_output_hides_key() {
        let key_pair = KeyPair {
            private_key: b"APrivateKey1secret".to_vec(),
            address: "aleo1address".to_owned(),
        };
        let debug_output = format!("{key_pair:?}");
        assert!(debug_output.contains("aleo1address"), "{debug_output}");
        assert!(!debug_output.contains("secret"), "{debug_output}");
    }
}
