// ── Module lifecycle manager ──────────────────────────────────────────────────
//
// Unload → load → bind → migrate.  Binding is two-phase: every slot and
// export is located first, and only when all of them exist are the host and
// driver addresses written.  A module with an incomplete surface is rejected
// before any of its code runs.

#![allow(unsafe_code)]

use std::{ffi::c_void, ptr::NonNull};

use log::{debug, trace};

use super::{
    descriptor::ModuleDescriptor,
    state::OpaqueState,
    symbols::{resolve, ModuleLoader, SymbolSource},
    tables::{DriverResolved, HostProvided, ModuleExports, SlotBinding, SlotEntry, SlotTable},
};
use crate::{
    error::Result,
    frame::{FrameRequest, InputEvent},
};

/// The host-to-module tables, built once at startup and reused for every load.
pub(crate) struct Tables {
    pub(crate) host: HostProvided,
    pub(crate) driver: DriverResolved,
}

/// A loaded module together with its resolved entry points.
///
/// The exports point into `module`'s image, so they are only ever called
/// through `&self` while `module` is alive.
pub(crate) struct BoundModule<M> {
    exports: ModuleExports,
    module: M,
}

impl<M> BoundModule<M> {
    #[cfg(test)]
    pub(crate) fn module(&self) -> &M {
        &self.module
    }

    pub(crate) fn render(&self, state: OpaqueState, frame: FrameRequest) {
        // SAFETY: `render` was resolved from `self.module`, which is still
        // loaded, and every slot it may call through was written at bind time.
        unsafe { (self.exports.render)(state.as_ptr(), frame.width, frame.height) }
    }

    pub(crate) fn mouse(&self, state: OpaqueState, event: InputEvent) {
        // SAFETY: as for `render`.
        unsafe { (self.exports.mouse)(state.as_ptr(), event.x, event.y, event.buttons) }
    }
}

/// Drop the current module, if any.  The opaque state is untouched: it lives
/// on the host heap, not in the module's image.
pub(crate) fn unload<M>(desc: &mut ModuleDescriptor<M>) -> bool {
    desc.loaded.take().is_some()
}

/// Load the staged artifact, bind all three tables and run the migration.
///
/// Returns the state the new module handed back.  Any error leaves the
/// descriptor without a loaded module; the caller treats it as fatal.
pub(crate) fn reload<L: ModuleLoader>(
    desc: &mut ModuleDescriptor<L::Module>,
    loader: &mut L,
    tables: &Tables,
    state: OpaqueState,
) -> Result<OpaqueState> {
    unload(desc);

    let module = loader.load(&desc.paths.staged)?;
    let exports = bind(&module, tables)?;

    // SAFETY: `reload` comes from the module just bound; every slot it can
    // reach is populated.  The previous state pointer is passed through
    // untouched, and whatever comes back is stored without inspection.
    let next = unsafe { (exports.reload)(state.as_ptr()) };
    let state = state.migrated(next);

    desc.loaded = Some(BoundModule { exports, module });
    Ok(state)
}

/// Validate every slot and export, then write the host and driver addresses.
fn bind(module: &impl SymbolSource, tables: &Tables) -> Result<ModuleExports> {
    let host_slots = locate_slots(module, &tables.host)?;
    let driver_slots = locate_slots(module, &tables.driver)?;
    let exports = ModuleExports::resolve(module)?;

    let writes = host_slots
        .iter()
        .zip(tables.host.bindings())
        .chain(driver_slots.iter().zip(tables.driver.bindings()));

    for (slot, binding) in writes {
        let SlotEntry { category, name, signature } = binding.entry;
        trace!("{category} {name}: {signature} = {:p}", binding.address);
        // SAFETY: `slot` is the address of a pointer-sized, writable export
        // of the module (module contract), located just above and valid while
        // the module is loaded.  Nothing in the module runs concurrently.
        unsafe { slot.cast::<*mut c_void>().as_ptr().write(binding.address.as_ptr()) }
    }

    debug!(
        "bound {} host, {} driver slots and 3 exports",
        host_slots.len(),
        driver_slots.len()
    );
    Ok(exports)
}

fn locate_slots<T: SlotTable>(module: &impl SymbolSource, table: &T) -> Result<Vec<NonNull<c_void>>> {
    table
        .bindings()
        .iter()
        .map(|SlotBinding { entry, .. }| resolve(module, T::CATEGORY, entry.name, entry.signature))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abi,
        error::HostError,
        reload::{
            tables::Category,
            testing::{calls, reset_calls, test_tables, Call, FakeLoader, FakeModule, Scratch},
        },
    };

    fn loaded_desc(scratch: &Scratch, content: &str) -> ModuleDescriptor<FakeModule> {
        scratch.write_staged(content);
        ModuleDescriptor::new(scratch.paths())
    }

    #[test]
    fn reload_binds_every_slot() {
        let scratch = Scratch::new("life-bind");
        let mut desc = loaded_desc(&scratch, "A");
        let tables = test_tables();

        reload(&mut desc, &mut FakeLoader::default(), &tables, OpaqueState::empty()).expect("reload");

        let module = desc.loaded.as_ref().expect("loaded").module();
        for binding in tables.host.bindings().iter().chain(tables.driver.bindings()) {
            assert_eq!(
                module.slot(binding.entry.name),
                Some(binding.address.as_ptr()),
                "slot {} not written",
                binding.entry.name
            );
        }
    }

    #[test]
    fn first_load_migrates_from_empty_state() {
        reset_calls();
        let scratch = Scratch::new("life-first");
        let mut desc = loaded_desc(&scratch, "A");

        let state = reload(&mut desc, &mut FakeLoader::default(), &test_tables(), OpaqueState::empty())
            .expect("reload");

        assert_eq!(calls(), [Call::Reload { module: 'A', previous: 0 }]);
        assert!(!state.is_empty(), "module A allocates state on first load");
        assert_eq!(state.generation(), 1);
    }

    #[test]
    fn identity_migrations_preserve_state() {
        let scratch = Scratch::new("life-identity");
        let mut desc = loaded_desc(&scratch, "A");
        let mut loader = FakeLoader::default();
        let tables = test_tables();

        let initial = reload(&mut desc, &mut loader, &tables, OpaqueState::empty()).expect("first");
        let mut state = initial;
        for _ in 0..5 {
            state = reload(&mut desc, &mut loader, &tables, state).expect("again");
        }

        assert_eq!(state.as_ptr(), initial.as_ptr());
        assert_eq!(state.generation(), 6);
        assert_eq!(loader.loads(), 6);
    }

    #[test]
    fn replacement_state_is_stored_as_returned() {
        let scratch = Scratch::new("life-replace");
        let mut desc = loaded_desc(&scratch, "A");
        let mut loader = FakeLoader::default();
        let tables = test_tables();

        let before = reload(&mut desc, &mut loader, &tables, OpaqueState::empty()).expect("A");
        scratch.write_staged("B");
        let after = reload(&mut desc, &mut loader, &tables, before).expect("B");

        // Module B's migration allocates a fresh block.
        assert_ne!(after.as_ptr(), before.as_ptr());
        assert!(!after.is_empty());
    }

    #[test]
    fn missing_export_fails_before_any_call() {
        reset_calls();
        let scratch = Scratch::new("life-missing-export");
        let mut desc = loaded_desc(&scratch, "no-render");

        let err = reload(&mut desc, &mut FakeLoader::default(), &test_tables(), OpaqueState::empty())
            .err()
            .expect("must fail");

        assert!(matches!(
            &err,
            HostError::MissingSymbol { category: Category::ModuleExported, name, .. } if name == abi::RENDER_SYMBOL
        ));
        assert!(!desc.is_loaded());
        assert!(calls().is_empty(), "module code ran: {:?}", calls());
    }

    #[test]
    fn missing_slot_fails_without_writing_any_slot() {
        let scratch = Scratch::new("life-missing-slot");
        let mut desc = loaded_desc(&scratch, "no-glClear");
        let mut loader = FakeLoader::default();

        let err = reload(&mut desc, &mut loader, &test_tables(), OpaqueState::empty())
            .err()
            .expect("must fail");

        assert!(matches!(
            &err,
            HostError::MissingSymbol { category: Category::DriverResolved, name, .. } if name == "glClear"
        ));
        assert_eq!(
            err.to_string(),
            "driver-resolved symbol `glClear` (fn(GLbitfield)) is missing"
        );
        let slots = loader.last_slots().expect("module was loaded");
        assert_eq!(slots.get("sys_allocate"), Some(std::ptr::null_mut()));
    }

    #[test]
    fn unload_keeps_state_and_clears_handle() {
        let scratch = Scratch::new("life-unload");
        let mut desc = loaded_desc(&scratch, "A");
        let state = reload(&mut desc, &mut FakeLoader::default(), &test_tables(), OpaqueState::empty())
            .expect("reload");

        assert!(unload(&mut desc));
        assert!(!desc.is_loaded());
        assert!(!unload(&mut desc));
        assert!(!state.is_empty());
    }

    #[test]
    fn render_and_mouse_dispatch_to_bound_module() {
        reset_calls();
        let scratch = Scratch::new("life-dispatch");
        let mut desc = loaded_desc(&scratch, "A");
        let state = reload(&mut desc, &mut FakeLoader::default(), &test_tables(), OpaqueState::empty())
            .expect("reload");
        let bound = desc.loaded.as_ref().expect("loaded");

        bound.render(state, FrameRequest { width: 640, height: 480 });
        bound.mouse(state, InputEvent { x: 3, y: 4, buttons: abi::BUTTON_LEFT });

        assert_eq!(
            &calls()[1..],
            [
                Call::Render { module: 'A', width: 640, height: 480 },
                Call::Mouse { module: 'A', x: 3, y: 4, buttons: abi::BUTTON_LEFT },
            ]
        );
    }
}
