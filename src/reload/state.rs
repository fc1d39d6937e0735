// ── Opaque application state ──────────────────────────────────────────────────
//
// The module's accumulated data, carried across reloads.  The host stores the
// pointer and hands it back; it never reads, writes, moves or frees the
// memory behind it.  Only the module's migration entry point interprets it.

use std::{ffi::c_void, ptr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpaqueState {
    ptr: *mut c_void,
    /// Number of migrations this value has been through.
    generation: u64,
}

impl OpaqueState {
    /// "No prior state": what the first module load receives.
    pub(crate) const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            generation: 0,
        }
    }

    pub(crate) fn as_ptr(self) -> *mut c_void {
        self.ptr
    }

    pub(crate) fn generation(self) -> u64 {
        self.generation
    }

    pub(crate) fn is_empty(self) -> bool {
        self.ptr.is_null()
    }

    /// The value returned by a migration call.  The pointer may differ from
    /// the one passed in; it is stored as is.
    pub(crate) fn migrated(self, next: *mut c_void) -> Self {
        Self {
            ptr: next,
            generation: self.generation + 1,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
