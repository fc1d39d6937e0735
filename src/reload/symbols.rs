// ── Symbol table binder ───────────────────────────────────────────────────────
//
// Resolves a named export of a loaded module to an address.  `SymbolSource`
// is the seam between the reload logic and the dynamic loader: production
// code goes through `libloading`, tests through in-process fakes.

#![allow(unsafe_code)]

use std::{
    ffi::c_void,
    path::{Path, PathBuf},
    ptr::NonNull,
};

use libloading::Library;
use log::debug;

use super::tables::Category;
use crate::error::{HostError, Result};

/// Something exports can be looked up in.
pub(crate) trait SymbolSource {
    /// Address of `name`, or `None` if the export is absent.
    fn address(&self, name: &str) -> Option<NonNull<c_void>>;
}

/// Opens a staged artifact as a `SymbolSource`.
pub(crate) trait ModuleLoader {
    type Module: SymbolSource;

    fn load(&mut self, path: &Path) -> Result<Self::Module>;
}

/// Resolve `name` or fail with a `MissingSymbol` naming the table it belongs
/// to and the signature expected there.  An absent export and a null export
/// are the same failure here.
pub(crate) fn resolve(
    source: &impl SymbolSource,
    category: Category,
    name: &str,
    signature: &'static str,
) -> Result<NonNull<c_void>> {
    source.address(name).ok_or_else(|| HostError::MissingSymbol {
        category,
        name: name.to_owned(),
        signature,
    })
}

// ── libloading backend ────────────────────────────────────────────────────────

/// A module mapped with `libloading`.  Dropping it unloads the library.
pub(crate) struct DynamicModule {
    library: Library,
    path: PathBuf,
}

impl SymbolSource for DynamicModule {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        // SAFETY: the symbol is requested as a plain data pointer, so no
        // signature is assumed here; the value is the export's address.
        // It stays valid as long as `self.library` is loaded, and callers
        // never keep it past the lifetime of the `BoundModule` owning `self`.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}

impl Drop for DynamicModule {
    fn drop(&mut self) {
        debug!("unloading {}", self.path.display());
    }
}

/// Loads staged artifacts from disk.
#[derive(Debug, Default)]
pub(crate) struct DynamicLoader;

impl ModuleLoader for DynamicLoader {
    type Module = DynamicModule;

    fn load(&mut self, path: &Path) -> Result<DynamicModule> {
        // SAFETY: loading runs the module's initialisers.  The module is
        // built against this host's contract and does no work before
        // `reload` is called; the file is the host's private staged copy,
        // so the build process cannot rewrite it while it is mapped.
        let library = unsafe { Library::new(path) }.map_err(|source| HostError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded {}", path.display());
        Ok(DynamicModule {
            library,
            path: path.to_path_buf(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
