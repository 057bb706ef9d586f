//! Guest allocator exports and result packing.
//!
//! Each allocation is preceded by a header holding its size, so the host does not need
//! to know capacities of buffers it releases.

use std::{alloc::Layout, ptr, slice};

const HEADER_LEN: usize = 8;

fn layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size.checked_add(HEADER_LEN)?, HEADER_LEN).ok()
}

#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn alloc(size: usize) -> *mut u8 {
    let Some(layout) = layout(size) else {
        return ptr::null_mut();
    };
    unsafe {
        let base = std::alloc::alloc(layout);
        if base.is_null() {
            return base;
        }
        base.cast::<usize>().write(size);
        base.add(HEADER_LEN)
    }
}

/// Releases memory obtained from [`alloc()`] or returned to the host in a packed result.
/// The size hint is ignored; the size is read from the allocation header.
///
/// # Safety
///
/// `data_ptr` must be null or a live pointer produced by this module.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub unsafe extern "C" fn dealloc(data_ptr: *mut u8, _size_hint: usize) {
    if data_ptr.is_null() {
        return;
    }
    unsafe {
        let base = data_ptr.sub(HEADER_LEN);
        let size = base.cast::<usize>().read();
        let layout = Layout::from_size_align_unchecked(size + HEADER_LEN, HEADER_LEN);
        std::alloc::dealloc(base, layout);
    }
}

/// # Safety
///
/// The pointer must reference `len` readable bytes (it is not accessed if `len == 0`).
pub(crate) unsafe fn input<'a>(ptr: *const u8, len: usize) -> &'a [u8] {
    if len == 0 {
        &[]
    } else {
        unsafe { slice::from_raw_parts(ptr, len) }
    }
}

/// Copies `bytes` into a new allocation owned by the host and packs its location.
pub(crate) fn forget_buffer(bytes: &[u8]) -> u64 {
    let ptr = alloc(bytes.len());
    if ptr.is_null() {
        return crate::FAILURE;
    }
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
    }
    pack(ptr as usize, bytes.len())
}

/// Packs a pointer into the low 32 bits and a length into the high 32 bits.
#[allow(clippy::cast_possible_truncation)] // guest addresses are 32-bit
fn pack(ptr: usize, len: usize) -> u64 {
    (u64::from(len as u32) << 32) | u64::from(ptr as u32)
}
