// ── Test doubles for the reload subsystem ─────────────────────────────────────
//
// In-process stand-ins for a built module: a `FakeModule` exports ordinary
// `extern "C"` test functions plus writable slots, and a `FakeLoader` picks
// the module to "load" from the staged file's contents.  Calls made by fake
// module code are recorded per test thread.

#![allow(unsafe_code)]

use std::{
    cell::{RefCell, UnsafeCell},
    collections::HashMap,
    ffi::c_void,
    fs,
    path::{Path, PathBuf},
    ptr::{self, NonNull},
    rc::Rc,
    time::SystemTime,
};

use super::{
    descriptor::ArtifactPaths,
    lifecycle::Tables,
    services::{sys_allocate, sys_deallocate},
    symbols::{ModuleLoader, SymbolSource},
    tables::{DriverResolved, DriverResolver, HostProvided, HostServices},
};
use crate::{
    abi::{self, Font, MouseFn, ReloadFn, RenderFn},
    error::{HostError, Result},
};

// ── Scratch directory ─────────────────────────────────────────────────────────

/// A per-test directory under the system temp dir, removed on drop.
pub(crate) struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    pub(crate) fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("reload-host-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        Self { dir }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            source: self.dir.join("code.bin"),
            staged: self.dir.join("loaded.bin"),
            lock: self.dir.join("build.lock"),
        }
    }

    /// Write the build artifact and pin its modification time.
    pub(crate) fn write_artifact(&self, content: &str, modified: SystemTime) {
        let path = self.paths().source;
        fs::write(&path, content).expect("write artifact");
        fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(modified))
            .expect("set artifact mtime");
    }

    pub(crate) fn write_staged(&self, content: &str) {
        fs::write(self.paths().staged, content).expect("write staged copy");
    }

    pub(crate) fn staged_contents(&self) -> String {
        fs::read_to_string(self.paths().staged).expect("read staged copy")
    }

    pub(crate) fn create_lock(&self) {
        fs::write(self.paths().lock, b"").expect("create lock");
    }

    pub(crate) fn remove_lock(&self) {
        fs::remove_file(self.paths().lock).expect("remove lock");
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

// ── Recorded calls ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Reload { module: char, previous: usize },
    Render { module: char, width: i32, height: i32 },
    Mouse { module: char, x: i32, y: i32, buttons: u32 },
}

thread_local! {
    static CALLS: RefCell<Vec<Call>> = const { RefCell::new(Vec::new()) };
}

fn record(call: Call) {
    CALLS.with(|c| c.borrow_mut().push(call));
}

pub(crate) fn calls() -> Vec<Call> {
    CALLS.with(|c| c.borrow().clone())
}

pub(crate) fn reset_calls() {
    CALLS.with(|c| c.borrow_mut().clear());
}

// ── Fake module code ──────────────────────────────────────────────────────────

/// Module A keeps its state across reloads, allocating it on first load.
/// Module B always migrates into a fresh block.
unsafe extern "C" fn fake_reload<const TAG: char>(previous: *mut c_void) -> *mut c_void {
    record(Call::Reload {
        module: TAG,
        previous: previous as usize,
    });
    if TAG == 'A' && !previous.is_null() {
        return previous;
    }
    Box::into_raw(Box::new(u64::from(TAG))).cast()
}

unsafe extern "C" fn fake_render<const TAG: char>(_state: *mut c_void, width: i32, height: i32) {
    record(Call::Render {
        module: TAG,
        width,
        height,
    });
}

unsafe extern "C" fn fake_mouse<const TAG: char>(_state: *mut c_void, x: i32, y: i32, buttons: u32) {
    record(Call::Mouse {
        module: TAG,
        x,
        y,
        buttons,
    });
}

unsafe extern "C" fn fake_create_font(_name: *const u16, _pixel_height: i32) -> *mut Font {
    ptr::null_mut()
}

unsafe extern "C" fn fake_render_glyph(_font: *mut Font, _codepoint: u32) -> i32 {
    0
}

extern "C" fn gl_stub() {}

pub(crate) fn test_services() -> HostServices {
    HostServices {
        allocate: sys_allocate,
        deallocate: sys_deallocate,
        create_font: fake_create_font,
        render_glyph: fake_render_glyph,
    }
}

pub(crate) fn test_tables() -> Tables {
    Tables {
        host: HostProvided::new(test_services()),
        driver: DriverResolved::resolve(&FakeDriver::complete()).expect("fake driver"),
    }
}

// ── Fake driver ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct FakeDriver {
    missing: Option<&'static str>,
}

impl FakeDriver {
    pub(crate) fn complete() -> Self {
        Self::default()
    }

    pub(crate) fn without(mut self, name: &'static str) -> Self {
        self.missing = Some(name);
        self
    }
}

impl DriverResolver for FakeDriver {
    fn proc_address(&self, name: &str) -> Option<NonNull<c_void>> {
        if self.missing == Some(name) {
            return None;
        }
        NonNull::new(gl_stub as *mut c_void)
    }
}

// ── Fake module ───────────────────────────────────────────────────────────────

/// Writable pointer-sized slots, one per host/driver table entry.
pub(crate) struct Slots {
    index: HashMap<&'static str, usize>,
    cells: Box<[UnsafeCell<*mut c_void>]>,
}

impl Slots {
    fn new() -> Self {
        let names = abi::HOST_FUNCTIONS
            .iter()
            .chain(abi::DRIVER_FUNCTIONS)
            .map(|&(name, _)| name);
        let index: HashMap<_, _> = names.enumerate().map(|(i, n)| (n, i)).collect();
        let cells = (0..index.len())
            .map(|_| UnsafeCell::new(ptr::null_mut()))
            .collect();
        Self { index, cells }
    }

    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        let cell = &self.cells[*self.index.get(name)?];
        NonNull::new(cell.get().cast())
    }

    /// Current value of slot `name`.
    pub(crate) fn get(&self, name: &str) -> Option<*mut c_void> {
        let cell = &self.cells[*self.index.get(name)?];
        // SAFETY: single-threaded test access; no write is in progress.
        Some(unsafe { *cell.get() })
    }
}

pub(crate) struct FakeModule {
    exports: HashMap<&'static str, NonNull<c_void>>,
    slots: Rc<Slots>,
    missing: Vec<&'static str>,
}

impl FakeModule {
    /// A module exporting every symbol the contract requires.
    pub(crate) fn complete(tag: char) -> Self {
        let (reload, render, mouse) = match tag {
            'A' => (
                fake_reload::<'A'> as ReloadFn,
                fake_render::<'A'> as RenderFn,
                fake_mouse::<'A'> as MouseFn,
            ),
            _ => (
                fake_reload::<'B'> as ReloadFn,
                fake_render::<'B'> as RenderFn,
                fake_mouse::<'B'> as MouseFn,
            ),
        };
        let exports = [
            (abi::RELOAD_SYMBOL, reload as *mut c_void),
            (abi::RENDER_SYMBOL, render as *mut c_void),
            (abi::MOUSE_SYMBOL, mouse as *mut c_void),
        ]
        .into_iter()
        .filter_map(|(name, p)| NonNull::new(p).map(|p| (name, p)))
        .collect();

        Self {
            exports,
            slots: Rc::new(Slots::new()),
            missing: Vec::new(),
        }
    }

    pub(crate) fn without(mut self, name: &'static str) -> Self {
        self.missing.push(name);
        self
    }

    pub(crate) fn slot(&self, name: &str) -> Option<*mut c_void> {
        self.slots.get(name)
    }
}

impl SymbolSource for FakeModule {
    fn address(&self, name: &str) -> Option<NonNull<c_void>> {
        if self.missing.iter().any(|m| *m == name) {
            return None;
        }
        self.exports
            .get(name)
            .copied()
            .or_else(|| self.slots.address(name))
    }
}

/// Chooses a fake module from the staged file's contents:
/// `A`, `B`, `no-render` (A without `render`), `no-glClear` (A without the
/// `glClear` slot).
#[derive(Default)]
pub(crate) struct FakeLoader {
    loads: usize,
    last: Option<Rc<Slots>>,
}

impl FakeLoader {
    pub(crate) fn loads(&self) -> usize {
        self.loads
    }

    /// Slots of the most recently loaded module, even if binding rejected it.
    pub(crate) fn last_slots(&self) -> Option<Rc<Slots>> {
        self.last.clone()
    }
}

impl ModuleLoader for FakeLoader {
    type Module = FakeModule;

    fn load(&mut self, path: &Path) -> Result<FakeModule> {
        let content = fs::read_to_string(path).map_err(|e| HostError::io("load module", path, e))?;
        let module = match content.as_str() {
            "A" => FakeModule::complete('A'),
            "B" => FakeModule::complete('B'),
            "no-render" => FakeModule::complete('A').without(abi::RENDER_SYMBOL),
            "no-glClear" => FakeModule::complete('A').without("glClear"),
            other => {
                return Err(HostError::io(
                    "load module",
                    path,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, format!("unknown module {other:?}")),
                ))
            }
        };
        self.loads += 1;
        self.last = Some(Rc::clone(&module.slots));
        Ok(module)
    }
}
