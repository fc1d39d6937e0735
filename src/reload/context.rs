// ── Host context ──────────────────────────────────────────────────────────────
//
// The one explicit root for everything that survives across reloads: the
// descriptor (paths, baseline timestamp, bound module), the loader, the
// host/driver tables and the opaque state.  Owned by the frame driver and
// passed by reference to each step; there is no global mutable state.

use std::time::Instant;

use log::{debug, info};

use super::{
    descriptor::{ArtifactPaths, ModuleDescriptor},
    installer::{self, LockPolicy},
    lifecycle::{self, Tables},
    state::OpaqueState,
    symbols::ModuleLoader,
    watcher,
};
use crate::{
    error::Result,
    frame::{FrameRequest, InputEvent},
};

pub(crate) struct HostContext<L: ModuleLoader> {
    descriptor: ModuleDescriptor<L::Module>,
    loader: L,
    tables: Tables,
    policy: LockPolicy,
    state: OpaqueState,
}

impl<L: ModuleLoader> HostContext<L> {
    pub(crate) fn new(paths: ArtifactPaths, loader: L, tables: Tables, policy: LockPolicy) -> Self {
        Self {
            descriptor: ModuleDescriptor::new(paths),
            loader,
            tables,
            policy,
            state: OpaqueState::empty(),
        }
    }

    #[cfg(test)]
    pub(crate) fn descriptor(&self) -> &ModuleDescriptor<L::Module> {
        &self.descriptor
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> OpaqueState {
        self.state
    }

    /// Run one watcher → installer → lifecycle cycle.
    ///
    /// Returns `Ok(true)` when a new module was put into service.  A stuck
    /// build lock surfaces as `HostError::BuildStuck` with the current module
    /// still loaded; any other error is fatal.
    pub(crate) fn hot_reload(&mut self) -> Result<bool> {
        if !watcher::check_for_update(&self.descriptor) {
            return Ok(false);
        }

        let start = Instant::now();
        debug!("newer artifact at {}", self.descriptor.paths.source.display());

        installer::install(&mut self.descriptor, self.policy)?;
        self.state = lifecycle::reload(&mut self.descriptor, &mut self.loader, &self.tables, self.state)?;

        info!(
            "reloaded {} (generation {}) in {:.1} ms",
            self.descriptor.paths.staged.display(),
            self.state.generation(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(true)
    }

    /// Forward one input event.  No-op until a module is loaded.
    pub(crate) fn mouse(&self, event: InputEvent) {
        if let Some(module) = &self.descriptor.loaded {
            module.mouse(self.state, event);
        }
    }

    /// Render one frame.  Returns `false` when there is no module to call.
    pub(crate) fn render(&self, frame: FrameRequest) -> bool {
        match &self.descriptor.loaded {
            Some(module) => {
                module.render(self.state, frame);
                true
            }
            None => false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::{
        error::HostError,
        reload::testing::{calls, reset_calls, test_tables, Call, FakeLoader, Scratch},
    };

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn context(scratch: &Scratch, timeout_ms: u64) -> HostContext<FakeLoader> {
        HostContext::new(
            scratch.paths(),
            FakeLoader::default(),
            test_tables(),
            LockPolicy::from_millis(timeout_ms),
        )
    }

    #[test]
    fn nothing_to_do_before_first_build() {
        let scratch = Scratch::new("ctx-empty");
        let mut ctx = context(&scratch, 100);

        assert!(!ctx.hot_reload().expect("no-op"));
        assert!(!ctx.descriptor().is_loaded());
        assert!(!ctx.render(FrameRequest { width: 1, height: 1 }));
    }

    #[test]
    fn second_cycle_without_change_is_idempotent() {
        let scratch = Scratch::new("ctx-idempotent");
        scratch.write_artifact("A", at(1));
        let mut ctx = context(&scratch, 100);

        assert!(ctx.hot_reload().expect("first"));
        let state = ctx.state();
        let last_write = ctx.descriptor().last_write;

        assert!(!ctx.hot_reload().expect("second"));
        assert_eq!(ctx.state(), state);
        assert_eq!(ctx.descriptor().last_write, last_write);
        assert_eq!(ctx.loader.loads(), 1);
    }

    #[test]
    fn newer_build_replaces_module_and_keeps_state() {
        reset_calls();
        let scratch = Scratch::new("ctx-newer");
        scratch.write_artifact("A", at(1));
        let mut ctx = context(&scratch, 100);
        ctx.hot_reload().expect("A");
        let state_a = ctx.state();

        // Same content, newer stamp: module A's identity migration.
        scratch.write_artifact("A", at(2));
        assert!(ctx.hot_reload().expect("A again"));

        assert_eq!(ctx.state().as_ptr(), state_a.as_ptr());
        assert_eq!(ctx.state().generation(), 2);
        assert_eq!(
            calls()[1],
            Call::Reload { module: 'A', previous: state_a.as_ptr() as usize }
        );
    }

    #[test]
    fn stuck_build_keeps_old_module_running() {
        reset_calls();
        let scratch = Scratch::new("ctx-stuck");
        scratch.write_artifact("A", at(1));
        let mut ctx = context(&scratch, 10);
        ctx.hot_reload().expect("A");

        scratch.write_artifact("B", at(2));
        scratch.create_lock();
        let err = ctx.hot_reload().expect_err("lock never released");
        assert!(matches!(err, HostError::BuildStuck { .. }));
        assert!(ctx.descriptor().is_loaded());
        assert_eq!(ctx.descriptor().last_write, Some(at(1)));

        ctx.render(FrameRequest { width: 2, height: 2 });
        assert_eq!(
            calls().last(),
            Some(&Call::Render { module: 'A', width: 2, height: 2 })
        );

        // Next frame after the build finishes picks up B.
        scratch.remove_lock();
        assert!(ctx.hot_reload().expect("B"));
        ctx.render(FrameRequest { width: 2, height: 2 });
        assert_eq!(
            calls().last(),
            Some(&Call::Render { module: 'B', width: 2, height: 2 })
        );
    }

    #[test]
    fn broken_build_is_fatal() {
        let scratch = Scratch::new("ctx-broken");
        scratch.write_artifact("no-render", at(1));
        let mut ctx = context(&scratch, 100);

        let err = ctx.hot_reload().expect_err("missing export");
        assert!(err.is_fatal());
        assert!(!ctx.descriptor().is_loaded());
    }
}
