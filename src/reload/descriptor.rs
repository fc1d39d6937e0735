// ── Module descriptor ─────────────────────────────────────────────────────────
//
// The single record of where the module lives on disk, which build is
// installed, and (once installed) the bound module itself.  Mutated only by
// the installer and the lifecycle manager.

use std::{path::PathBuf, time::SystemTime};

use super::lifecycle::BoundModule;

/// The three files the reload protocol works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArtifactPaths {
    /// Build output written by the external build process.
    pub(crate) source: PathBuf,
    /// Host-owned copy that is actually loaded.
    pub(crate) staged: PathBuf,
    /// Marker whose existence means "artifact is being written".
    pub(crate) lock: PathBuf,
}

pub(crate) struct ModuleDescriptor<M> {
    pub(crate) paths: ArtifactPaths,
    /// Modification time of the artifact that was last staged.
    /// `None` until the first successful install.
    pub(crate) last_write: Option<SystemTime>,
    /// Present iff a module has been installed and bound.
    pub(crate) loaded: Option<BoundModule<M>>,
}

impl<M> ModuleDescriptor<M> {
    pub(crate) fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            last_write: None,
            loaded: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }
}
