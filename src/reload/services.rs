// ── Host allocator service ────────────────────────────────────────────────────
//
// The memory half of the host-provided table.  The module allocates its
// state (and anything else that must survive a reload) here instead of in
// its own statics, because the module's image is unmapped on every reload
// while the process heap is not.

#![allow(unsafe_code)]

use std::{
    alloc::{self, Layout},
    ffi::c_void,
    mem, ptr,
};

use log::{debug, error};

/// Two words stored just below every block: the underlying allocation's
/// size and alignment.  Freeing reads them back, so the module's size and
/// alignment arguments to `sys_deallocate` are informational.
const HEADER: usize = 2 * mem::size_of::<usize>();

/// Zero-initialised, `align`-aligned block of `size` bytes.
///
/// Returns null for `size == 0`, for an invalid alignment (not a power of
/// two) and when the allocator is out of memory.
pub(crate) unsafe extern "C" fn sys_allocate(size: usize, align: usize) -> *mut c_void {
    let Some(layout) = layout_for(size, align) else {
        return ptr::null_mut();
    };
    // SAFETY: `layout` has a non-zero size (checked by `layout_for`).
    let base = unsafe { alloc::alloc_zeroed(layout) };
    if base.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: `offset(layout)` is at least HEADER and leaves `size` bytes
    // after it inside the block.  The block and the offset are both
    // multiples of `usize` alignment, so the header words are aligned.
    unsafe {
        let block = base.add(offset(layout.align()));
        let header = block.cast::<usize>().sub(2);
        header.write(layout.size());
        header.add(1).write(layout.align());
        block.cast()
    }
}

/// Release a block returned by `sys_allocate`.  Null is a no-op.
///
/// The block's real layout comes from its header; `size` and `align` are
/// only compared against it for a debug log.
///
/// # Safety
/// `p` must be null or come from `sys_allocate`, and must not be used
/// afterwards.
pub(crate) unsafe extern "C" fn sys_deallocate(p: *mut c_void, size: usize, align: usize) {
    if p.is_null() {
        return;
    }
    // SAFETY: caller contract: `p` came from `sys_allocate`, so the two
    // header words sit directly below it.
    let (total, block_align) = unsafe {
        let header = p.cast::<usize>().sub(2);
        (header.read(), header.add(1).read())
    };
    let Ok(layout) = Layout::from_size_align(total, block_align) else {
        error!("sys_deallocate: corrupt block header at {p:p}");
        return;
    };
    let offset = offset(block_align);
    if layout_for(size, align) != Some(layout) {
        debug!(
            "sys_deallocate: freeing {} bytes at {p:p} (caller passed size {size}, align {align})",
            total.saturating_sub(offset)
        );
    }
    // SAFETY: the base pointer and layout are exactly those `sys_allocate`
    // passed to the global allocator.
    unsafe { alloc::dealloc(p.cast::<u8>().sub(offset), layout) }
}

/// Layout of the underlying allocation for a `size`/`align` request,
/// header included.
fn layout_for(size: usize, align: usize) -> Option<Layout> {
    if size == 0 {
        return None;
    }
    let align = align.max(1);
    if !align.is_power_of_two() {
        return None;
    }
    let align = align.max(mem::align_of::<usize>());
    Layout::from_size_align(offset(align).checked_add(size)?, align).ok()
}

/// Distance from the allocation base to the block handed out.
fn offset(align: usize) -> usize {
    HEADER.max(align)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
