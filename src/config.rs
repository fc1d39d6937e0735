// ── Host configuration ────────────────────────────────────────────────────────
//
// Reads the optional `reload-host.json` that sits next to the executable.
// No `unsafe`; pure safe Rust + serde_json.
//
// Every field has a default, so a missing file, a partial file or a file
// written by an older host all load.  A file that is not valid JSON is
// reported and ignored; a file that exists but cannot be read is fatal.

use std::{
    env::consts::{DLL_PREFIX, DLL_SUFFIX},
    fs, io,
    path::{Path, PathBuf},
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    error::{HostError, Result},
    reload::{descriptor::ArtifactPaths, installer::LockPolicy},
};

pub(crate) const CONFIG_FILE_NAME: &str = "reload-host.json";

const CONFIG_VERSION: u32 = 1;

// ── On-disk type ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct HostConfig {
    pub(crate) version: u32,
    /// Build artifact written by the external build.
    pub(crate) artifact: PathBuf,
    /// Private copy the host loads.
    pub(crate) staged: PathBuf,
    /// Marker the build creates while writing the artifact.
    pub(crate) lock: PathBuf,
    /// Give up waiting on the lock after this long; 0 waits forever.
    pub(crate) lock_timeout_ms: u64,
    pub(crate) window_title: String,
    /// Initial window size; `None` lets the OS choose.
    pub(crate) width: Option<i32>,
    pub(crate) height: Option<i32>,
    pub(crate) vsync: bool,
    pub(crate) gl_major: i32,
    pub(crate) gl_minor: i32,
    pub(crate) gl_debug: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            artifact: PathBuf::from(format!("{DLL_PREFIX}code{DLL_SUFFIX}")),
            staged: PathBuf::from(format!("{DLL_PREFIX}loaded{DLL_SUFFIX}")),
            lock: PathBuf::from("build.lock"),
            lock_timeout_ms: 10_000,
            window_title: "Untitled".to_owned(),
            width: None,
            height: None,
            vsync: true,
            gl_major: 3,
            gl_minor: 3,
            gl_debug: false,
        }
    }
}

impl HostConfig {
    /// Resolve the three artifact paths against `base` (the executable's
    /// directory).  Absolute paths in the file are kept as they are.
    pub(crate) fn artifact_paths(&self, base: &Path) -> ArtifactPaths {
        ArtifactPaths {
            source: base.join(&self.artifact),
            staged: base.join(&self.staged),
            lock: base.join(&self.lock),
        }
    }

    pub(crate) fn lock_policy(&self) -> LockPolicy {
        LockPolicy::from_millis(self.lock_timeout_ms)
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

/// Directory containing the running executable.
pub(crate) fn exe_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| HostError::io("locate executable", "", e))?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or_default())
}

// ── Load ──────────────────────────────────────────────────────────────────────

/// Load `reload-host.json` from `dir`, falling back to defaults.
pub(crate) fn load(dir: &Path) -> Result<HostConfig> {
    let path = dir.join(CONFIG_FILE_NAME);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HostConfig::default()),
        Err(source) => return Err(HostError::Config { path, source }),
    };

    Ok(parse(&path, &data))
}

fn parse(path: &Path, data: &[u8]) -> HostConfig {
    match serde_json::from_slice::<HostConfig>(data) {
        Ok(config) if config.version == CONFIG_VERSION => config,
        Ok(config) => {
            warn!(
                "{}: unsupported version {}, using defaults",
                path.display(),
                config.version
            );
            HostConfig::default()
        }
        Err(e) => {
            warn!("{}: {e}, using defaults", path.display());
            HostConfig::default()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
