// ── WGL context ───────────────────────────────────────────────────────────────
//
// Context creation is a two-step negotiation: a throwaway window with a
// legacy context exposes `wglGetExtensionsStringARB`, which tells us whether
// the ARB pixel-format and context-profile entry points exist.  Only then is
// the real core-profile context created on the main window.

#![allow(unsafe_code)]

use std::{
    ffi::{c_char, c_void, CStr, CString},
    mem,
    ptr::{self, NonNull},
};

use log::{debug, info};
use windows::{
    core::{s, w, PCSTR},
    Win32::{
        Foundation::{BOOL, HINSTANCE, HMODULE, HWND, LPARAM, LRESULT, WPARAM},
        Graphics::{
            Gdi::{GetDC, ReleaseDC, HDC},
            OpenGL::{
                wglCreateContext, wglDeleteContext, wglGetProcAddress, wglMakeCurrent,
                ChoosePixelFormat, SetPixelFormat, SwapBuffers, HGLRC, PFD_DRAW_TO_WINDOW,
                PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR,
            },
        },
        System::LibraryLoader::{GetModuleHandleW, GetProcAddress},
        UI::WindowsAndMessaging::{
            CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassW, UnregisterClassW,
            CW_USEDEFAULT, HMENU, WINDOW_EX_STYLE, WNDCLASSW, WS_OVERLAPPEDWINDOW,
        },
    },
};

use super::window::last_error;
use crate::{
    config::HostConfig,
    error::{HostError, Result},
    reload::tables::DriverResolver,
};

// ── WGL_ARB_pixel_format / WGL_ARB_create_context_profile tokens ──────────────

const WGL_DRAW_TO_WINDOW_ARB: i32 = 0x2001;
const WGL_ACCELERATION_ARB: i32 = 0x2003;
const WGL_SUPPORT_OPENGL_ARB: i32 = 0x2010;
const WGL_DOUBLE_BUFFER_ARB: i32 = 0x2011;
const WGL_PIXEL_TYPE_ARB: i32 = 0x2013;
const WGL_COLOR_BITS_ARB: i32 = 0x2014;
const WGL_ALPHA_BITS_ARB: i32 = 0x201B;
const WGL_FULL_ACCELERATION_ARB: i32 = 0x2027;
const WGL_TYPE_RGBA_ARB: i32 = 0x202B;
const WGL_FRAMEBUFFER_SRGB_CAPABLE_ARB: i32 = 0x20A9;

const WGL_CONTEXT_MAJOR_VERSION_ARB: i32 = 0x2091;
const WGL_CONTEXT_MINOR_VERSION_ARB: i32 = 0x2092;
const WGL_CONTEXT_LAYER_PLANE_ARB: i32 = 0x2093;
const WGL_CONTEXT_FLAGS_ARB: i32 = 0x2094;
const WGL_CONTEXT_PROFILE_MASK_ARB: i32 = 0x9126;
const WGL_CONTEXT_DEBUG_BIT_ARB: i32 = 0x0001;
const WGL_CONTEXT_CORE_PROFILE_BIT_ARB: i32 = 0x0001;

type GetExtensionsStringArb = unsafe extern "system" fn(hdc: HDC) -> *const c_char;
type ChoosePixelFormatArb = unsafe extern "system" fn(
    hdc: HDC,
    int_attribs: *const i32,
    float_attribs: *const f32,
    max_formats: u32,
    formats: *mut i32,
    num_formats: *mut u32,
) -> BOOL;
type CreateContextAttribsArb =
    unsafe extern "system" fn(hdc: HDC, share: HGLRC, attribs: *const i32) -> HGLRC;
type SwapIntervalExt = unsafe extern "system" fn(interval: i32) -> BOOL;

type RawProc = unsafe extern "system" fn() -> isize;

// ── Extension probe ───────────────────────────────────────────────────────────

/// The WGL extensions the host cannot run without.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ExtensionSet {
    pixel_format: bool,
    create_context_profile: bool,
    swap_control: bool,
    framebuffer_srgb: bool,
}

impl ExtensionSet {
    /// Scan a space-separated extension list; tokens must match exactly.
    fn parse(list: &str) -> Self {
        let mut set = Self::default();
        for token in list.split_ascii_whitespace() {
            match token {
                "WGL_ARB_pixel_format" => set.pixel_format = true,
                "WGL_ARB_create_context_profile" => set.create_context_profile = true,
                "WGL_EXT_swap_control" => set.swap_control = true,
                "WGL_EXT_framebuffer_sRGB" => set.framebuffer_srgb = true,
                _ => {}
            }
        }
        set
    }

    /// First required extension that is absent.
    fn missing(&self) -> Option<&'static str> {
        [
            (self.pixel_format, "WGL_ARB_pixel_format"),
            (self.create_context_profile, "WGL_ARB_create_context_profile"),
            (self.swap_control, "WGL_EXT_swap_control"),
            (self.framebuffer_srgb, "WGL_EXT_framebuffer_sRGB"),
        ]
        .into_iter()
        .find_map(|(present, name)| (!present).then_some(name))
    }
}

/// Entry points of the required extensions, valid for any context created
/// on the same device afterwards.
pub(crate) struct WglExtensions {
    choose_pixel_format: ChoosePixelFormatArb,
    create_context_attribs: CreateContextAttribsArb,
    swap_interval: SwapIntervalExt,
}

/// Throwaway window + legacy context; everything is torn down on drop.
struct ProbeWindow {
    hinstance: HINSTANCE,
    hwnd: HWND,
    dc: HDC,
    rc: HGLRC,
}

impl Drop for ProbeWindow {
    fn drop(&mut self) {
        // SAFETY: each handle is either null (never created) or owned by this
        // struct; teardown runs in reverse creation order.
        unsafe {
            let _ = wglMakeCurrent(HDC::default(), HGLRC::default());
            if !self.rc.0.is_null() {
                let _ = wglDeleteContext(self.rc);
            }
            if !self.dc.0.is_null() {
                ReleaseDC(self.hwnd, self.dc);
            }
            if !self.hwnd.0.is_null() {
                let _ = DestroyWindow(self.hwnd);
            }
            let _ = UnregisterClassW(w!("ReloadHostProbe"), self.hinstance);
        }
    }
}

unsafe extern "system" fn probe_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Query the driver's WGL extensions through a throwaway legacy context.
///
/// Any required extension missing is `MissingDriverCapability`.
pub(crate) fn probe_extensions(hinstance: HINSTANCE) -> Result<WglExtensions> {
    let class = WNDCLASSW {
        lpfnWndProc: Some(probe_proc),
        hInstance: hinstance,
        lpszClassName: w!("ReloadHostProbe"),
        ..Default::default()
    };
    // SAFETY: class is fully initialised; the name is a static literal.
    if unsafe { RegisterClassW(&class) } == 0 {
        return Err(last_error("RegisterClassW"));
    }

    let mut probe = ProbeWindow {
        hinstance,
        hwnd: HWND::default(),
        dc: HDC::default(),
        rc: HGLRC::default(),
    };

    // SAFETY: the probe class was just registered; the window is never shown.
    probe.hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            w!("ReloadHostProbe"),
            w!(""),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            HWND::default(),
            HMENU::default(),
            hinstance,
            None,
        )
    }
    .map_err(|_| last_error("CreateWindowExW"))?;

    // SAFETY: probe.hwnd is a live window owned by this thread.
    probe.dc = unsafe { GetDC(probe.hwnd) };
    if probe.dc.0.is_null() {
        return Err(last_error("GetDC"));
    }

    let pfd = PIXELFORMATDESCRIPTOR {
        nSize: mem::size_of::<PIXELFORMATDESCRIPTOR>() as u16,
        nVersion: 1,
        dwFlags: PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL,
        iPixelType: PFD_TYPE_RGBA,
        cColorBits: 24,
        ..Default::default()
    };

    // SAFETY: probe.dc is a valid window DC; pfd outlives both calls.
    unsafe {
        let format = ChoosePixelFormat(probe.dc, &pfd);
        if format == 0 {
            return Err(last_error("ChoosePixelFormat"));
        }
        SetPixelFormat(probe.dc, format, &pfd).map_err(|_| last_error("SetPixelFormat"))?;
        probe.rc = wglCreateContext(probe.dc).map_err(HostError::from)?;
        wglMakeCurrent(probe.dc, probe.rc).map_err(HostError::from)?;
    }

    let extensions = extension_list(probe.dc);
    debug!("WGL extensions: {extensions}");

    if let Some(name) = ExtensionSet::parse(&extensions).missing() {
        return Err(HostError::MissingDriverCapability {
            what: name.to_owned(),
        });
    }

    // SAFETY: each transmute turns the driver's untyped PROC into the
    // signature documented by the extension that was just confirmed present.
    let wgl = unsafe {
        WglExtensions {
            choose_pixel_format: mem::transmute::<RawProc, ChoosePixelFormatArb>(
                required_proc(s!("wglChoosePixelFormatARB"), "wglChoosePixelFormatARB")?,
            ),
            create_context_attribs: mem::transmute::<RawProc, CreateContextAttribsArb>(
                required_proc(s!("wglCreateContextAttribsARB"), "wglCreateContextAttribsARB")?,
            ),
            swap_interval: mem::transmute::<RawProc, SwapIntervalExt>(required_proc(
                s!("wglSwapIntervalEXT"),
                "wglSwapIntervalEXT",
            )?),
        }
    };

    Ok(wgl)
}

/// The space-separated WGL extension list; empty when the driver does not
/// implement `WGL_ARB_extensions_string`.
fn extension_list(dc: HDC) -> String {
    let Some(entry) = wgl_proc(s!("wglGetExtensionsStringARB")) else {
        return String::new();
    };
    // SAFETY: the returned string is owned by the driver and null-terminated;
    // it is copied before the probe context goes away.
    unsafe {
        let get = mem::transmute::<RawProc, GetExtensionsStringArb>(entry);
        let list = get(dc);
        if list.is_null() {
            return String::new();
        }
        CStr::from_ptr(list).to_string_lossy().into_owned()
    }
}

fn required_proc(name: PCSTR, display: &str) -> Result<RawProc> {
    wgl_proc(name).ok_or_else(|| HostError::MissingDriverCapability {
        what: display.to_owned(),
    })
}

/// `wglGetProcAddress` with the documented failure sentinels filtered out.
/// Requires a current context.
fn wgl_proc(name: PCSTR) -> Option<RawProc> {
    // SAFETY: name is a valid null-terminated ANSI string.
    let entry = unsafe { wglGetProcAddress(name) }?;
    match entry as usize as isize {
        0 | 1 | 2 | 3 | -1 => None,
        _ => Some(entry),
    }
}

// ── Main context ──────────────────────────────────────────────────────────────

/// The core-profile context bound to the main window's own DC.
pub(crate) struct GlContext {
    hwnd: HWND,
    dc: HDC,
    rc: HGLRC,
}

impl GlContext {
    /// Choose the sRGB pixel format, create the configured core-profile
    /// context, make it current and apply the swap interval.
    pub(crate) fn create(hwnd: HWND, wgl: &WglExtensions, config: &HostConfig) -> Result<Self> {
        // SAFETY: hwnd is the live main window (CS_OWNDC, so the DC is private).
        let dc = unsafe { GetDC(hwnd) };
        if dc.0.is_null() {
            return Err(last_error("GetDC"));
        }

        #[rustfmt::skip]
        let pixel_attribs = [
            WGL_DRAW_TO_WINDOW_ARB, 1,
            WGL_ACCELERATION_ARB, WGL_FULL_ACCELERATION_ARB,
            WGL_SUPPORT_OPENGL_ARB, 1,
            WGL_DOUBLE_BUFFER_ARB, 1,
            WGL_PIXEL_TYPE_ARB, WGL_TYPE_RGBA_ARB,
            WGL_COLOR_BITS_ARB, 24,
            WGL_ALPHA_BITS_ARB, 8,
            WGL_FRAMEBUFFER_SRGB_CAPABLE_ARB, 1,
            0,
        ];
        let mut format = 0;
        let mut count = 0;
        // SAFETY: attribute list is zero-terminated; out-pointers are valid
        // for one format.
        let ok = unsafe {
            (wgl.choose_pixel_format)(
                dc,
                pixel_attribs.as_ptr(),
                ptr::null(),
                1,
                &mut format,
                &mut count,
            )
        };
        if !ok.as_bool() || count == 0 {
            // SAFETY: dc was obtained from hwnd above.
            unsafe { ReleaseDC(hwnd, dc) };
            return Err(HostError::MissingDriverCapability {
                what: "an sRGB double-buffered RGBA8 pixel format".to_owned(),
            });
        }

        let pfd = PIXELFORMATDESCRIPTOR {
            nSize: mem::size_of::<PIXELFORMATDESCRIPTOR>() as u16,
            nVersion: 1,
            ..Default::default()
        };
        // SAFETY: format came from the driver for this DC.
        unsafe { SetPixelFormat(dc, format, &pfd) }.map_err(|_| last_error("SetPixelFormat"))?;

        let flags = if config.gl_debug { WGL_CONTEXT_DEBUG_BIT_ARB } else { 0 };
        #[rustfmt::skip]
        let context_attribs = [
            WGL_CONTEXT_MAJOR_VERSION_ARB, config.gl_major,
            WGL_CONTEXT_MINOR_VERSION_ARB, config.gl_minor,
            WGL_CONTEXT_LAYER_PLANE_ARB, 0,
            WGL_CONTEXT_FLAGS_ARB, flags,
            WGL_CONTEXT_PROFILE_MASK_ARB, WGL_CONTEXT_CORE_PROFILE_BIT_ARB,
            0,
        ];
        // SAFETY: attribute list is zero-terminated; no share context.
        let rc = unsafe { (wgl.create_context_attribs)(dc, HGLRC::default(), context_attribs.as_ptr()) };
        if rc.0.is_null() {
            // SAFETY: dc was obtained from hwnd above.
            unsafe { ReleaseDC(hwnd, dc) };
            return Err(HostError::MissingDriverCapability {
                what: format!("an OpenGL {}.{} core profile context", config.gl_major, config.gl_minor),
            });
        }

        let context = Self { hwnd, dc, rc };

        // SAFETY: dc and rc belong to this thread and this window.
        unsafe { wglMakeCurrent(context.dc, context.rc) }.map_err(HostError::from)?;

        // SAFETY: WGL_EXT_swap_control was confirmed by the probe; a context
        // is current.
        unsafe { (wgl.swap_interval)(i32::from(config.vsync)) };

        info!(
            "OpenGL {}.{} core context ready (vsync {})",
            config.gl_major,
            config.gl_minor,
            if config.vsync { "on" } else { "off" }
        );

        Ok(context)
    }

    pub(crate) fn swap_buffers(&self) -> Result<()> {
        // SAFETY: self.dc is the double-buffered DC the context renders into.
        unsafe { SwapBuffers(self.dc) }.map_err(|_| last_error("SwapBuffers"))
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        // SAFETY: the handles are owned by this struct and still valid.
        unsafe {
            let _ = wglMakeCurrent(HDC::default(), HGLRC::default());
            let _ = wglDeleteContext(self.rc);
            ReleaseDC(self.hwnd, self.dc);
        }
    }
}

// ── Driver resolver ───────────────────────────────────────────────────────────

/// Looks up GL entry points: `wglGetProcAddress` first (extensions and
/// post-1.1 core), then `opengl32.dll` exports (the 1.1 core).
pub(crate) struct WglResolver {
    opengl32: HMODULE,
}

impl WglResolver {
    pub(crate) fn new() -> Result<Self> {
        // SAFETY: opengl32.dll is loaded for the process lifetime (the wgl*
        // imports above keep it mapped).
        let opengl32 = unsafe { GetModuleHandleW(w!("opengl32.dll")) }.map_err(HostError::from)?;
        Ok(Self { opengl32 })
    }
}

impl DriverResolver for WglResolver {
    fn proc_address(&self, name: &str) -> Option<NonNull<c_void>> {
        let name = CString::new(name).ok()?;
        let name = PCSTR(name.as_ptr().cast());
        let entry = wgl_proc(name).or_else(|| {
            // SAFETY: opengl32 is a loaded module; name is null-terminated.
            unsafe { GetProcAddress(self.opengl32, name) }
        })?;
        NonNull::new(entry as *mut c_void)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
