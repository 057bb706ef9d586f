//! Guest allocator broker.

use std::fmt;

use wasmtime::{AsContextMut, TypedFunc};

use crate::{Error, fault};

/// Counters of guest memory allocations made by a [`Session`](crate::Session).
///
/// All counters are cumulative over the session lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Number of successful allocations requested by the host.
    pub allocated: u64,
    /// Number of result buffers allocated by the guest and taken over by the host for release.
    pub adopted: u64,
    /// Number of successful deallocations.
    pub released: u64,
    /// Number of failed deallocation calls.
    pub release_failures: u64,
}

impl AllocationStats {
    /// Returns the number of allocations not released (yet).
    pub fn outstanding(&self) -> u64 {
        (self.allocated + self.adopted).saturating_sub(self.released)
    }

    /// Checks whether every allocation was matched by exactly one successful deallocation.
    pub fn is_balanced(&self) -> bool {
        self.allocated + self.adopted == self.released
    }
}

/// Calls into the guest `alloc` / `dealloc` pair.
///
/// The guest tracks the capacity of its allocations itself. The host knows only the size
/// it requested and never relies on the size hint passed to `dealloc` being honored.
pub(crate) struct Allocator {
    alloc: TypedFunc<u32, u32>,
    dealloc: TypedFunc<(u32, u32), ()>,
    stats: AllocationStats,
}

impl fmt::Debug for Allocator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Allocator")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Allocator {
    pub const ALLOC: &'static str = "alloc";
    pub const DEALLOC: &'static str = "dealloc";

    pub fn new(alloc: TypedFunc<u32, u32>, dealloc: TypedFunc<(u32, u32), ()>) -> Self {
        Self {
            alloc,
            dealloc,
            stats: AllocationStats::default(),
        }
    }

    pub fn stats(&self) -> AllocationStats {
        self.stats
    }

    pub fn allocate(&mut self, store: impl AsContextMut, size: u32) -> Result<u32, Error> {
        let ptr = self
            .alloc
            .call(store, size)
            .map_err(|err| Error::Allocation {
                size,
                reason: format!("{err:#}"),
            })?;
        if ptr == 0 {
            return Err(Error::Allocation {
                size,
                reason: "guest allocator returned a null pointer".to_owned(),
            });
        }

        self.stats.allocated += 1;
        tracing::trace!(ptr, size, "allocated guest memory");
        Ok(ptr)
    }

    /// Registers a result buffer that was allocated by the guest itself.
    pub fn adopt(&mut self, ptr: u32, len: u32) {
        self.stats.adopted += 1;
        tracing::trace!(ptr, len, "adopted guest buffer");
    }

    pub fn deallocate(
        &mut self,
        store: impl AsContextMut,
        ptr: u32,
        size_hint: u32,
    ) -> Result<(), Error> {
        if let Err(err) = self.dealloc.call(store, (ptr, size_hint)) {
            self.stats.release_failures += 1;
            return Err(fault::trap(Self::DEALLOC, &err));
        }
        self.stats.released += 1;
        tracing::trace!(ptr, size_hint, "released guest memory");
        Ok(())
    }
}
