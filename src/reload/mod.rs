// ── Hot-reload subsystem ──────────────────────────────────────────────────────
//
// Detects a new build of the module, waits out the build lock, stages a
// private copy, rebinds the three function tables and hands the opaque state
// to the new code.  Nothing here touches the OS windowing layer, so the whole
// subsystem builds and is tested on every platform.
//
// Data flow, once per frame:
//
//   watcher::check_for_update ─ stale? ─▶ installer::install
//        (wait for unlock, unload, stage) ▶ lifecycle::reload
//
// `unsafe` is permitted only in `symbols`, `tables`, `lifecycle` and
// `services`, the modules that cross the raw-pointer boundary into the
// loaded code.

pub(crate) mod context;
pub(crate) mod descriptor;
pub(crate) mod installer;
pub(crate) mod lifecycle;
pub(crate) mod services;
pub(crate) mod state;
pub(crate) mod symbols;
pub(crate) mod tables;
pub(crate) mod watcher;

#[cfg(test)]
pub(crate) mod testing;
