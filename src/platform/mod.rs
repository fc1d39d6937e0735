// ── Platform abstraction layer ────────────────────────────────────────────────
//
// The window, the GL context and the OS message pump.  No `unsafe` lives
// here; all Win32 FFI is confined to the `win32` sub-module and never leaks
// outward.  Other targets have no backend: the host reports that and exits.

use std::path::Path;

use crate::{
    config::HostConfig,
    error::{HostError, Result},
};

#[cfg(windows)]
pub mod win32;

/// Create the window and context, then drive the frame loop until quit.
#[cfg(windows)]
pub(crate) fn run(config: &HostConfig, base: &Path) -> Result<()> {
    win32::run(config, base)
}

#[cfg(not(windows))]
pub(crate) fn run(_config: &HostConfig, _base: &Path) -> Result<()> {
    Err(HostError::UnsupportedPlatform)
}

/// Make a fatal error visible to the user before the process exits.
#[cfg(windows)]
pub(crate) fn report_fatal(error: &HostError) {
    let (title, message) = fatal_dialog(error);
    win32::window::show_error_dialog(title, &message);
}

#[cfg(not(windows))]
pub(crate) fn report_fatal(error: &HostError) {
    eprintln!("reload-host: {error}");
}

/// Title and body of the fatal-error dialog.
fn fatal_dialog(error: &HostError) -> (&'static str, String) {
    match error {
        HostError::MissingDriverCapability { .. } => (
            "Missing OpenGL Function",
            format!("Please update your graphics card driver.\n\n{error}"),
        ),
        _ => ("Reload Host: Fatal Error", error.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_capability_asks_for_a_driver_update() {
        let error = HostError::MissingDriverCapability {
            what: "OpenGL function glClear".to_owned(),
        };
        let (title, message) = fatal_dialog(&error);
        assert_eq!(title, "Missing OpenGL Function");
        assert_eq!(
            message,
            "Please update your graphics card driver.\n\ngraphics driver is missing OpenGL function glClear"
        );
    }

    #[test]
    fn other_errors_use_a_plain_ascii_title() {
        let (title, message) = fatal_dialog(&HostError::UnsupportedPlatform);
        assert_eq!(title, "Reload Host: Fatal Error");
        assert!(title.is_ascii());
        assert_eq!(message, HostError::UnsupportedPlatform.to_string());
    }
}
