// ── Central error type ────────────────────────────────────────────────────────
//
// All fallible operations in the host return `error::Result<T>`.  No panics
// in production paths; fatal errors propagate to `main()`, which logs them,
// shows a dialog (Windows) and exits with `HostError::exit_code()`.

use std::{fmt, path::PathBuf, time::Duration};

use crate::reload::tables::Category;

/// Every error that the host can produce.
#[derive(Debug)]
pub enum HostError {
    /// A filesystem operation on an artifact that was already confirmed to
    /// exist failed (copy, metadata re-read, …).
    Io {
        /// What the host was doing, for display purposes.
        context: &'static str,
        /// The path the operation targeted.
        path: PathBuf,
        source: std::io::Error,
    },

    /// The staged module could not be loaded as a dynamic library.
    Load {
        path: PathBuf,
        source: libloading::Error,
    },

    /// A slot or export named by one of the function tables is absent from
    /// the loaded module (or from the graphics driver).
    MissingSymbol {
        category: Category,
        name: String,
        /// The signature the table expects at that name.
        signature: &'static str,
    },

    /// The build lock marker was still present when the installer gave up.
    /// Not fatal: the next frame retries.
    BuildStuck {
        lock: PathBuf,
        waited: Duration,
    },

    /// A graphics driver capability required at startup is unavailable.
    MissingDriverCapability {
        what: String,
    },

    /// A Win32 API call returned a failure code.
    Win32 {
        /// The name of the failing function, for display purposes.
        function: &'static str,
        /// The raw Win32 error code (`GetLastError()` value) or HRESULT.
        code: u32,
    },

    /// The configuration file exists but could not be read.
    Config {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The host is running on a platform without a window/context backend.
    UnsupportedPlatform,
}

impl HostError {
    /// `false` only for conditions the frame loop recovers from by itself.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::BuildStuck { .. })
    }

    /// Process exit code for a fatal error.
    ///
    /// | Error | Code |
    /// |---|---|
    /// | missing driver capability, unsupported platform | 1 |
    /// | everything else | 2 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingDriverCapability { .. } | Self::UnsupportedPlatform => 1,
            _ => 2,
        }
    }

    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { context, path, source } => {
                write!(f, "{context} failed for {}: {source}", path.display())
            }
            Self::Load { path, source } => {
                write!(f, "failed to load module {}: {source}", path.display())
            }
            Self::MissingSymbol { category, name, signature } => {
                write!(f, "{category} symbol `{name}` ({signature}) is missing")
            }
            Self::BuildStuck { lock, waited } => write!(
                f,
                "build lock {} still present after {:.1} s",
                lock.display(),
                waited.as_secs_f64()
            ),
            Self::MissingDriverCapability { what } => {
                write!(f, "graphics driver is missing {what}")
            }
            Self::Win32 { function, code } => {
                write!(f, "{function} failed (error {code:#010x})")
            }
            Self::Config { path, source } => {
                write!(f, "cannot read configuration {}: {source}", path.display())
            }
            Self::UnsupportedPlatform => {
                write!(f, "no window/context backend for {}", std::env::consts::OS)
            }
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } | Self::Config { source, .. } => Some(source),
            Self::Load { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Convert a windows-crate error (HRESULT) directly into a HostError so that
// `?` can be used on `windows::core::Result<T>` throughout the platform module.
#[cfg(windows)]
impl From<windows::core::Error> for HostError {
    fn from(e: windows::core::Error) -> Self {
        // HRESULT.0 is i32; reinterpret bits as u32 for display purposes.
        Self::Win32 {
            function: "windows",
            code: e.code().0 as u32,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HostError>;

// ── Tests ─────────────────────────────────────────────────────────────────────
