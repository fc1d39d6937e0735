// ── Win32 platform implementation ─────────────────────────────────────────────
//
// The only part of the host that talks to Win32, WGL and GDI directly.
// Every `unsafe` block MUST carry a `// SAFETY:` comment that states:
//   • which invariant makes the operation sound, and
//   • what the caller is responsible for maintaining.
//
// Nothing in this module is `pub` beyond what callers genuinely need; keep the
// unsafe surface as small as possible.

#![allow(unsafe_code)]

use std::{path::Path, time::Instant};

use log::debug;
use windows::Win32::{Foundation::HINSTANCE, System::LibraryLoader::GetModuleHandleW};

use crate::{
    config::HostConfig,
    error::{HostError, Result},
    frame::FrameDriver,
    reload::{
        context::HostContext,
        lifecycle::Tables,
        services::{sys_allocate, sys_deallocate},
        symbols::DynamicLoader,
        tables::{DriverResolved, HostProvided, HostServices},
    },
};

// ── Sub-modules ───────────────────────────────────────────────────────────────

pub(crate) mod dpi; // process DPI awareness
pub(crate) mod font; // GDI glyph rasteriser behind sys_create_font / sys_render_glyph
pub(crate) mod gl; // WGL extension probe, context creation, driver resolver
pub mod window; // main window, WndProc, message pump

/// Host services handed to the module: the heap allocator plus GDI fonts.
fn host_services() -> HostServices {
    HostServices {
        allocate: sys_allocate,
        deallocate: sys_deallocate,
        create_font: font::sys_create_font,
        render_glyph: font::sys_render_glyph,
    }
}

/// Bring up the window and GL context, install the first build, then run the
/// frame loop until the window is closed.
pub(crate) fn run(config: &HostConfig, base: &Path) -> Result<()> {
    let t0 = Instant::now();

    dpi::init();

    // SAFETY: GetModuleHandleW(None) returns the .exe's own HMODULE, which is
    // valid for the process lifetime.
    let hmodule = unsafe { GetModuleHandleW(None) }.map_err(HostError::from)?;
    let hinstance = HINSTANCE(hmodule.0);

    // Environment-fatal: checked once, before anything is shown.
    let wgl = gl::probe_extensions(hinstance)?;

    window::register_class(hinstance)?;
    let hwnd = window::create_window(hinstance, config)?;
    let context = gl::GlContext::create(hwnd, &wgl, config)?;

    let tables = Tables {
        host: HostProvided::new(host_services()),
        driver: DriverResolved::resolve(&gl::WglResolver::new()?)?,
    };

    let host = HostContext::new(
        config.artifact_paths(base),
        DynamicLoader,
        tables,
        config.lock_policy(),
    );
    let mut driver = FrameDriver::new(host, window::Win32Env::new(hwnd, context));

    driver.prime()?;
    window::show(hwnd);
    debug!("window visible in {:.1} ms", t0.elapsed().as_secs_f64() * 1000.0);

    driver.run()
}
