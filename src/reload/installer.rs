// ── Lock-respecting installer ─────────────────────────────────────────────────
//
// Waits for the external build to remove its lock marker, copies the artifact
// to the staged path and records the artifact's timestamp as the new
// baseline.  The wait is a cooperative spin (yield, re-check); no OS lock
// primitive is involved because the build process only creates and deletes
// a plain file.

use std::{
    fs,
    path::Path,
    thread,
    time::{Duration, Instant, SystemTime},
};

use log::debug;

use super::{descriptor::ModuleDescriptor, lifecycle};
use crate::error::{HostError, Result};

/// How long the installer spins on a present lock marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LockPolicy {
    /// `None` spins until the marker disappears.
    pub(crate) timeout: Option<Duration>,
}

impl LockPolicy {
    /// Build a policy from a millisecond count; 0 means "no limit".
    pub(crate) fn from_millis(ms: u64) -> Self {
        Self {
            timeout: (ms > 0).then(|| Duration::from_millis(ms)),
        }
    }
}

/// Spin, yielding the scheduler each iteration, while `lock` exists.
///
/// Returns how long the wait took.  Fails with `HostError::BuildStuck` once
/// the policy's timeout has elapsed with the marker still present.
pub(crate) fn wait_for_unlock(lock: &Path, policy: LockPolicy) -> Result<Duration> {
    let start = Instant::now();
    let mut spins: u64 = 0;

    while lock.exists() {
        let waited = start.elapsed();
        if policy.timeout.is_some_and(|limit| waited >= limit) {
            return Err(HostError::BuildStuck {
                lock: lock.to_path_buf(),
                waited,
            });
        }
        spins += 1;
        thread::yield_now();
    }

    let waited = start.elapsed();
    if spins > 0 {
        debug!("build lock released after {spins} spins ({:.1} ms)", waited.as_secs_f64() * 1000.0);
    }
    Ok(waited)
}

/// Copy the artifact over the staged path and record its timestamp.
///
/// The timestamp is re-read after the copy so that a build finishing during
/// the lock wait is recorded with its final write time.  The descriptor is
/// only updated once every step has succeeded.
pub(crate) fn stage<M>(desc: &mut ModuleDescriptor<M>) -> Result<SystemTime> {
    let paths = &desc.paths;

    let bytes = fs::copy(&paths.source, &paths.staged)
        .map_err(|e| HostError::io("copy artifact", &paths.source, e))?;

    let modified = fs::metadata(&paths.source)
        .and_then(|m| m.modified())
        .map_err(|e| HostError::io("read artifact timestamp", &paths.source, e))?;

    debug!("staged {} ({bytes} bytes) → {}", paths.source.display(), paths.staged.display());
    desc.last_write = Some(modified);
    Ok(modified)
}

/// Wait for the lock, release the current module, then stage.
///
/// A loaded module keeps its image file open, so it is dropped after the
/// wait (the old code stays in service for the whole wait) and before the
/// staged copy is overwritten.  On `BuildStuck` nothing has changed.
pub(crate) fn install<M>(desc: &mut ModuleDescriptor<M>, policy: LockPolicy) -> Result<SystemTime> {
    wait_for_unlock(&desc.paths.lock, policy)?;
    if lifecycle::unload(desc) {
        debug!("released previous module");
    }
    stage(desc)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
