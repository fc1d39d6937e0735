// ── Safety policy ────────────────────────────────────────────────────────────
// Unsafe code is forbidden everywhere except:
//   • `platform::win32` – Win32 / WGL / GDI FFI
//   • `reload`          – dynamic loading, slot writes, module calls
// Each unsafe block in those modules MUST carry a `// SAFETY:` comment.
#![deny(unsafe_code)]
// Release builds run as a GUI application (no console window).
// Debug builds keep the console so that log output is visible.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
// Without a window backend only the reload subsystem's tests use most items.
#![cfg_attr(not(windows), allow(dead_code))]

mod abi;
mod config;
mod error;
mod frame;
mod platform;
mod reload;

use log::{error, info};

fn main() {
    // `RUST_LOG` overrides the default filter.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("reload_host=info"))
        .init();

    match run() {
        Ok(()) => info!("window closed; exiting"),
        Err(e) => {
            // The only safe output path in a GUI build is a modal dialog.
            error!("{e}");
            platform::report_fatal(&e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run() -> error::Result<()> {
    let base = config::exe_dir()?;
    let config = config::load(&base)?;
    info!(
        "watching {} (lock {})",
        base.join(&config.artifact).display(),
        base.join(&config.lock).display()
    );
    platform::run(&config, &base)
}
