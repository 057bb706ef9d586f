//! Scoped acquisition of guest memory.

use wasmtime::Val;

use crate::{
    Error, InputError,
    exports::Export,
    fault,
    memory::{self, Region},
    session::Guest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sensitivity {
    Public,
    /// Contents must be wiped from guest memory before release.
    Secret,
}

#[derive(Debug)]
struct Held {
    region: Region,
    size_hint: u32,
    sensitivity: Sensitivity,
}

/// Guest memory held for the duration of a single operation.
///
/// Every region acquired through the scope, either allocated by the host or returned
/// by the guest, is released when the scope is dropped, on any exit path. Secret regions
/// are zeroed before release. Cleanup failures are logged and do not override the outcome
/// of the operation.
#[derive(Debug)]
pub(crate) struct AllocScope<'a> {
    guest: &'a mut Guest,
    held: Vec<Held>,
}

impl Drop for AllocScope<'_> {
    fn drop(&mut self) {
        let guest = &mut *self.guest;
        let memory = guest.exports.memory;
        for held in self.held.drain(..).rev() {
            let Region { ptr, len } = held.region;
            if held.sensitivity == Sensitivity::Secret {
                if let Err(err) = memory.zero(&mut guest.store, ptr, len) {
                    tracing::warn!(ptr, len, %err, "failed wiping secret from guest memory");
                }
            }
            let allocator = &mut guest.exports.allocator;
            if let Err(err) = allocator.deallocate(&mut guest.store, ptr, held.size_hint) {
                tracing::warn!(ptr, len, %err, "failed releasing guest memory");
            }
        }
    }
}

impl<'a> AllocScope<'a> {
    pub fn new(guest: &'a mut Guest) -> Self {
        Self {
            guest,
            held: vec![],
        }
    }

    /// Allocates guest memory and copies `bytes` into it.
    pub fn alloc_bytes(&mut self, bytes: &[u8], sensitivity: Sensitivity) -> Result<Region, Error> {
        let len = guest_len(bytes.len())?;
        let guest = &mut *self.guest;
        let ptr = guest.exports.allocator.allocate(&mut guest.store, len)?;
        let region = Region { ptr, len };
        self.held.push(Held {
            region,
            size_hint: len,
            sensitivity,
        });

        let guest = &mut *self.guest;
        guest.exports.memory.write(&mut guest.store, ptr, bytes)?;
        Ok(region)
    }

    /// Calls a guest function returning a packed result word and takes over the returned
    /// buffer for release.
    pub fn call_packed(&mut self, export: Export, args: &[u32]) -> Result<Region, Error> {
        let guest = &mut *self.guest;
        let function = guest.exports.get(export);
        let params: Vec<_> = args.iter().copied().map(memory::wasm_arg).collect();
        let mut results = vec![Val::I64(0); function.ty(&guest.store).results().len()];
        function
            .call(&mut guest.store, &params, &mut results)
            .map_err(|err| fault::trap(export.name(), &err))?;

        let region = memory::unpack(export.name(), &results)?;
        guest.exports.allocator.adopt(region.ptr, region.len);
        // The buffer was allocated by the guest; its capacity is known only to the guest allocator.
        self.held.push(Held {
            region,
            size_hint: 0,
            sensitivity: Sensitivity::Public,
        });
        Ok(region)
    }

    /// Marks a held region as containing secret data.
    pub fn mark_secret(&mut self, region: Region) {
        let held = self.held.iter_mut().find(|held| held.region == region);
        if let Some(held) = held {
            held.sensitivity = Sensitivity::Secret;
        }
    }

    pub fn read(&self, region: Region) -> Result<Vec<u8>, Error> {
        let guest = &*self.guest;
        guest.exports.memory.read(&guest.store, region.ptr, region.len)
    }

    pub fn read_text(&self, export: Export, region: Region) -> Result<String, Error> {
        let bytes = self.read(region)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::invalid_result(export.name(), crate::ResultError::NotUtf8))
    }
}

/// Converts a host buffer length into a guest length.
pub(crate) fn guest_len(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| InputError::TooLarge(len).into())
}
