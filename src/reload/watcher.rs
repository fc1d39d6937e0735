// ── Build artifact watcher ────────────────────────────────────────────────────
//
// Compares the artifact's modification time against the last installed one.
// Equal timestamps never count as an update: on filesystems with a coarse
// clock two builds inside one tick look identical, and the second is only
// picked up once the artifact is written again.

use std::{fs, path::Path, time::SystemTime};

use super::descriptor::ModuleDescriptor;

/// `true` when the build artifact is strictly newer than the installed one.
///
/// A missing artifact is not an error: the host may start before the first
/// build exists.  Never mutates the descriptor.
pub(crate) fn check_for_update<M>(desc: &ModuleDescriptor<M>) -> bool {
    match write_time(&desc.paths.source) {
        Some(modified) => is_newer(modified, desc.last_write),
        None => false,
    }
}

/// Modification time of `path`, or `None` if it cannot be read.
pub(crate) fn write_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn is_newer(candidate: SystemTime, baseline: Option<SystemTime>) -> bool {
    baseline.map_or(true, |installed| candidate > installed)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::reload::testing::{FakeModule, Scratch};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    #[test]
    fn missing_artifact_is_not_an_update() {
        let scratch = Scratch::new("watch-missing");
        let desc = ModuleDescriptor::<FakeModule>::new(scratch.paths());
        assert!(!check_for_update(&desc));
    }

    #[test]
    fn first_artifact_is_an_update() {
        let scratch = Scratch::new("watch-first");
        scratch.write_artifact("A", at(0));
        let desc = ModuleDescriptor::<FakeModule>::new(scratch.paths());
        assert!(check_for_update(&desc));
    }

    #[test]
    fn equal_timestamp_is_not_an_update() {
        let scratch = Scratch::new("watch-equal");
        scratch.write_artifact("A", at(5));
        let mut desc = ModuleDescriptor::<FakeModule>::new(scratch.paths());
        desc.last_write = Some(at(5));
        assert!(!check_for_update(&desc));
    }

    #[test]
    fn older_artifact_is_not_an_update() {
        let scratch = Scratch::new("watch-older");
        scratch.write_artifact("A", at(3));
        let mut desc = ModuleDescriptor::<FakeModule>::new(scratch.paths());
        desc.last_write = Some(at(5));
        assert!(!check_for_update(&desc));
    }

    #[test]
    fn fires_once_per_strict_increase() {
        let scratch = Scratch::new("watch-sequence");
        let mut desc = ModuleDescriptor::<FakeModule>::new(scratch.paths());
        let mut fired = 0;

        // Each timestamp is presented twice; repeats must stay silent.
        for t in [1, 1, 2, 2, 2, 7, 7] {
            scratch.write_artifact("A", at(t));
            if check_for_update(&desc) {
                fired += 1;
                desc.last_write = write_time(&desc.paths.source);
            }
        }

        assert_eq!(fired, 3);
    }

    #[test]
    fn check_does_not_mutate_descriptor() {
        let scratch = Scratch::new("watch-pure");
        scratch.write_artifact("A", at(9));
        let desc = ModuleDescriptor::<FakeModule>::new(scratch.paths());
        assert!(check_for_update(&desc));
        assert!(check_for_update(&desc));
        assert_eq!(desc.last_write, None);
    }
}
