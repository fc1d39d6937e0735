#![allow(unsafe_code)]

use log::debug;
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};

/// Opt into Per-Monitor v2 DPI awareness so the GL surface is never
/// bitmap-stretched by the compositor.
/// MUST be called before any window is created on the calling thread.
pub(crate) fn init() {
    // SAFETY: Must precede all window creation; single call at process start.
    let result = unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
    if let Err(e) = result {
        // Already set by a manifest, or pre-1703 Windows: not fatal.
        debug!("SetProcessDpiAwarenessContext: {e}");
    }
}
