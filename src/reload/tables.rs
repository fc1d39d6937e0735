// ── Function tables ───────────────────────────────────────────────────────────
//
// Three disjoint tables, one type each:
//
//   HostProvided    host → module   host service addresses written into slots
//   DriverResolved  host → module   GL entry points, resolved once at startup
//   ModuleExports   module → host   typed entry points the host calls
//
// Every entry is validated at bind time; a missing one is a fatal
// configuration error, never a null pointer discovered mid-frame.

#![allow(unsafe_code)]

use std::{ffi::c_void, fmt, ptr::NonNull};

use super::symbols::{resolve, SymbolSource};
use crate::{
    abi::{
        self, AllocateFn, CreateFontFn, DeallocateFn, MouseFn, ReloadFn, RenderFn,
        RenderGlyphFn,
    },
    error::{HostError, Result},
};

/// Which way a table's pointers flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    HostProvided,
    DriverResolved,
    ModuleExported,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HostProvided => "host-provided",
            Self::DriverResolved => "driver-resolved",
            Self::ModuleExported => "module-exported",
        })
    }
}

/// One named entry of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotEntry {
    pub(crate) name: &'static str,
    /// Expected signature; reported when the slot is missing.
    pub(crate) signature: &'static str,
    pub(crate) category: Category,
}

/// An entry paired with the function address to write into the module's slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlotBinding {
    pub(crate) entry: SlotEntry,
    pub(crate) address: NonNull<c_void>,
}

/// A table whose addresses the host writes into the module.
pub(crate) trait SlotTable {
    const CATEGORY: Category;

    fn bindings(&self) -> &[SlotBinding];
}

// ── Host-provided ─────────────────────────────────────────────────────────────

/// Services the host implements for the module to call back into.
#[derive(Clone, Copy)]
pub(crate) struct HostServices {
    pub(crate) allocate: AllocateFn,
    pub(crate) deallocate: DeallocateFn,
    pub(crate) create_font: CreateFontFn,
    pub(crate) render_glyph: RenderGlyphFn,
}

pub(crate) struct HostProvided {
    bindings: Vec<SlotBinding>,
}

impl HostProvided {
    pub(crate) fn new(services: HostServices) -> Self {
        let addresses: [*const c_void; 4] = [
            services.allocate as *const c_void,
            services.deallocate as *const c_void,
            services.create_font as *const c_void,
            services.render_glyph as *const c_void,
        ];

        let bindings = abi::HOST_FUNCTIONS
            .iter()
            .zip(addresses)
            .filter_map(|(&(name, signature), address)| {
                // Function pointers are never null.
                NonNull::new(address.cast_mut()).map(|address| SlotBinding {
                    entry: SlotEntry {
                        name,
                        signature,
                        category: Category::HostProvided,
                    },
                    address,
                })
            })
            .collect();

        Self { bindings }
    }
}

impl SlotTable for HostProvided {
    const CATEGORY: Category = Category::HostProvided;

    fn bindings(&self) -> &[SlotBinding] {
        &self.bindings
    }
}

// ── Driver-resolved ───────────────────────────────────────────────────────────

/// The graphics driver's procedure lookup.
pub(crate) trait DriverResolver {
    fn proc_address(&self, name: &str) -> Option<NonNull<c_void>>;
}

pub(crate) struct DriverResolved {
    bindings: Vec<SlotBinding>,
}

impl DriverResolved {
    /// Resolve every `abi::DRIVER_FUNCTIONS` entry once.  A function the
    /// driver does not provide means the host cannot run at all.
    pub(crate) fn resolve(resolver: &impl DriverResolver) -> Result<Self> {
        let bindings = abi::DRIVER_FUNCTIONS
            .iter()
            .map(|&(name, signature)| {
                let address = resolver.proc_address(name).ok_or_else(|| {
                    HostError::MissingDriverCapability {
                        what: format!("OpenGL function {name}"),
                    }
                })?;
                Ok(SlotBinding {
                    entry: SlotEntry {
                        name,
                        signature,
                        category: Category::DriverResolved,
                    },
                    address,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { bindings })
    }
}

impl SlotTable for DriverResolved {
    const CATEGORY: Category = Category::DriverResolved;

    fn bindings(&self) -> &[SlotBinding] {
        &self.bindings
    }
}

// ── Module-exported ───────────────────────────────────────────────────────────

/// Entry points resolved from the module for the host to call.
#[derive(Clone, Copy)]
pub(crate) struct ModuleExports {
    pub(crate) reload: ReloadFn,
    pub(crate) render: RenderFn,
    pub(crate) mouse: MouseFn,
}

impl ModuleExports {
    pub(crate) fn resolve(module: &impl SymbolSource) -> Result<Self> {
        let export = |name, signature| resolve(module, Category::ModuleExported, name, signature);
        let reload = export(abi::RELOAD_SYMBOL, abi::RELOAD_SIGNATURE)?;
        let render = export(abi::RENDER_SYMBOL, abi::RENDER_SIGNATURE)?;
        let mouse = export(abi::MOUSE_SYMBOL, abi::MOUSE_SIGNATURE)?;

        // SAFETY: each address is a non-null function export whose signature
        // is fixed by the module contract in `abi`.  Data and function
        // pointers have the same size on every supported target.
        unsafe {
            Ok(Self {
                reload: std::mem::transmute::<*mut c_void, ReloadFn>(reload.as_ptr()),
                render: std::mem::transmute::<*mut c_void, RenderFn>(render.as_ptr()),
                mouse: std::mem::transmute::<*mut c_void, MouseFn>(mouse.as_ptr()),
            })
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
