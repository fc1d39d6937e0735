// ── Main window ───────────────────────────────────────────────────────────────
//
// Responsibilities in this file (unsafe confined here):
//   • Register the window class and create the top-level window.
//   • Translate mouse messages into `InputEvent`s for the frame loop.
//   • Drain the message queue without blocking (`PeekMessageW`).
//   • Render and present from `WM_PAINT` while a pump is dispatching.
//   • Expose a safe error-dialog helper for use by main().

#![allow(unsafe_code)]

use std::{
    cell::{Cell, RefCell},
    ffi::c_void,
    ptr,
};

use log::warn;

use windows::{
    core::{w, PCWSTR},
    Win32::{
        Foundation::{GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, RECT, WPARAM},
        Graphics::Gdi::{BeginPaint, EndPaint, PAINTSTRUCT},
        UI::{
            Input::KeyboardAndMouse::{ReleaseCapture, SetCapture},
            WindowsAndMessaging::{
                CreateWindowExW, DefWindowProcW, DispatchMessageW, GetClientRect, LoadCursorW,
                LoadIconW, MessageBoxW, PeekMessageW, PostQuitMessage, RegisterClassExW,
                ShowWindow, TranslateMessage, UpdateWindow, CS_HREDRAW, CS_OWNDC, CS_VREDRAW,
                CW_USEDEFAULT, HMENU, IDC_ARROW, IDI_APPLICATION, MB_ICONERROR, MB_OK, MSG,
                PM_REMOVE, SW_SHOW, UNICODE_NOCHAR, WINDOW_EX_STYLE, WM_CHAR, WM_DESTROY,
                WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_PAINT, WM_QUIT,
                WM_RBUTTONDOWN, WM_RBUTTONUP, WM_UNICHAR, WNDCLASSEXW, WS_OVERLAPPEDWINDOW,
            },
        },
    },
};

use super::gl::GlContext;
use crate::{
    abi::{BUTTON_LEFT, BUTTON_RIGHT},
    config::HostConfig,
    error::{HostError, Result},
    frame::{FrameRequest, HostEnvironment, InputEvent, Pump},
};

// ── Window identity ───────────────────────────────────────────────────────────

/// Atom name used to register (and later find) the main window class.
const CLASS_NAME: PCWSTR = w!("ReloadHostMainWindow");

// wParam key-state bits of the mouse messages.
const MK_LBUTTON: usize = 0x0001;
const MK_RBUTTON: usize = 0x0002;

thread_local! {
    /// Mouse input collected by `wnd_proc` during one pump.  WndProc runs on
    /// the thread that owns the window, which is the thread running the loop.
    static PENDING: RefCell<Vec<InputEvent>> = const { RefCell::new(Vec::new()) };

    /// The running pump's `PaintTarget`, type-erased.  Null outside a pump
    /// and while a repaint is in progress.
    static PAINT: Cell<*mut c_void> = const { Cell::new(ptr::null_mut()) };
}

/// What `wnd_proc` needs to answer `WM_PAINT` during a pump.
struct PaintTarget<'a, 'f> {
    repaint: &'a mut (dyn FnMut(FrameRequest) -> bool + 'f),
    gl: &'a GlContext,
}

/// Publishes a `PaintTarget` to `wnd_proc` until dropped.  Must be dropped
/// before the target it points at.
struct PaintScope;

impl PaintScope {
    fn enter(target: &mut PaintTarget<'_, '_>) -> Self {
        let erased = (target as *mut PaintTarget<'_, '_>).cast::<c_void>();
        PAINT.with(|paint| paint.set(erased));
        Self
    }
}

impl Drop for PaintScope {
    fn drop(&mut self) {
        PAINT.with(|paint| paint.set(ptr::null_mut()));
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Show a modal error dialog with the given title and message.
///
/// Safe to call from any context; performs the UTF-16 conversion internally.
/// Used by `main()` when the host stops with a fatal error.
pub(crate) fn show_error_dialog(title: &str, message: &str) {
    let msg_wide = wide(message);
    let title_wide = wide(title);

    // SAFETY: msg_wide and title_wide are valid null-terminated UTF-16 strings
    // that remain allocated for the duration of the MessageBoxW call.
    // HWND::default() (null) means the dialog has no owner window.
    unsafe {
        let _ = MessageBoxW(
            HWND::default(),
            PCWSTR(msg_wide.as_ptr()),
            PCWSTR(title_wide.as_ptr()),
            MB_OK | MB_ICONERROR,
        );
    }
}

pub(crate) fn show(hwnd: HWND) {
    // SAFETY: hwnd was returned by CreateWindowExW and is valid.
    // ShowWindow returns the previous visibility state; UpdateWindow returns
    // a success BOOL; both are intentionally ignored here.
    unsafe {
        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = UpdateWindow(hwnd);
    }
}

// ── Window class registration ─────────────────────────────────────────────────

pub(crate) fn register_class(hinstance: HINSTANCE) -> Result<()> {
    // SAFETY: LoadIconW with IDI_APPLICATION loads a built-in resource that
    // exists on all Windows versions.
    let icon = unsafe { LoadIconW(None, IDI_APPLICATION) }.map_err(HostError::from)?;

    // SAFETY: same for the built-in arrow cursor.
    let cursor = unsafe { LoadCursorW(None, IDC_ARROW) }.map_err(HostError::from)?;

    let wndclass = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        // CS_OWNDC: the GL context is bound to one DC for the window lifetime.
        style: CS_OWNDC | CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(wnd_proc),
        hInstance: hinstance,
        hIcon: icon,
        hCursor: cursor,
        lpszClassName: CLASS_NAME,
        hIconSm: icon,
        ..Default::default()
    };

    // SAFETY: wndclass is fully initialised with valid handles;
    // CLASS_NAME is a valid null-terminated UTF-16 string literal.
    let atom = unsafe { RegisterClassExW(&wndclass) };
    if atom == 0 {
        return Err(last_error("RegisterClassExW"));
    }

    Ok(())
}

// ── Window creation ───────────────────────────────────────────────────────────

pub(crate) fn create_window(hinstance: HINSTANCE, config: &HostConfig) -> Result<HWND> {
    let title = wide(&config.window_title);

    // SAFETY: CLASS_NAME was registered by register_class; hinstance is the
    // exe's module; title outlives the call.  The window stays hidden until
    // `show` so the first frame is rendered before it appears.
    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            CLASS_NAME,
            PCWSTR(title.as_ptr()),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            config.width.unwrap_or(CW_USEDEFAULT),
            config.height.unwrap_or(CW_USEDEFAULT),
            HWND::default(),
            HMENU::default(),
            hinstance,
            None,
        )
    }
    .map_err(|_| last_error("CreateWindowExW"))?;

    Ok(hwnd)
}

// ── Frame-loop environment ────────────────────────────────────────────────────

/// The main window plus its GL context, as seen by the frame loop.
pub(crate) struct Win32Env {
    hwnd: HWND,
    gl: GlContext,
}

impl Win32Env {
    pub(crate) fn new(hwnd: HWND, gl: GlContext) -> Self {
        Self { hwnd, gl }
    }
}

impl HostEnvironment for Win32Env {
    fn pump(
        &mut self,
        events: &mut Vec<InputEvent>,
        repaint: &mut dyn FnMut(FrameRequest) -> bool,
    ) -> Result<Pump> {
        let mut pump = Pump::Continue;
        let mut msg = MSG::default();

        let mut target = PaintTarget { repaint, gl: &self.gl };
        let scope = PaintScope::enter(&mut target);

        // SAFETY: &mut msg is a valid MSG pointer; HWND::default() retrieves
        // messages for every window on this thread; 0,0 accepts all.
        while unsafe { PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_QUIT {
                pump = Pump::Quit;
                continue;
            }
            // SAFETY: msg was populated by a successful PeekMessageW call.
            unsafe {
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }
        }

        drop(scope);

        PENDING.with(|pending| events.append(&mut pending.borrow_mut()));
        Ok(pump)
    }

    fn viewport(&self) -> FrameRequest {
        client_size(self.hwnd)
    }

    fn present(&mut self) -> Result<()> {
        self.gl.swap_buffers()
    }
}

// ── Window procedure ──────────────────────────────────────────────────────────

// SAFETY: wnd_proc is registered as lpfnWndProc in WNDCLASSEXW.
// Windows guarantees that hwnd, msg, wparam, and lparam are valid for the
// lifetime of this call; we must not store hwnd beyond the message handler.
unsafe extern "system" fn wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // ── Lifecycle ─────────────────────────────────────────────────────────
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }

        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            BeginPaint(hwnd, &mut ps);
            paint(hwnd);
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }

        // ── Mouse ─────────────────────────────────────────────────────────────
        WM_LBUTTONDOWN => {
            if wparam.0 & MK_RBUTTON == 0 {
                SetCapture(hwnd);
            }
            queue_mouse(wparam, lparam);
            LRESULT(0)
        }

        WM_RBUTTONDOWN => {
            if wparam.0 & MK_LBUTTON == 0 {
                SetCapture(hwnd);
            }
            queue_mouse(wparam, lparam);
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            if wparam.0 & MK_RBUTTON == 0 {
                let _ = ReleaseCapture();
            }
            queue_mouse(wparam, lparam);
            LRESULT(0)
        }

        WM_RBUTTONUP => {
            if wparam.0 & MK_LBUTTON == 0 {
                let _ = ReleaseCapture();
            }
            queue_mouse(wparam, lparam);
            LRESULT(0)
        }

        WM_MOUSEMOVE => {
            queue_mouse(wparam, lparam);
            LRESULT(0)
        }

        // ── Text input (accepted, not forwarded) ──────────────────────────────
        WM_CHAR => LRESULT(0),

        // TRUE for UNICODE_NOCHAR advertises WM_UNICHAR support.
        WM_UNICHAR => LRESULT((wparam.0 == UNICODE_NOCHAR as usize) as isize),

        // SAFETY: hwnd and message parameters are valid; provided by Windows.
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Render and present one frame for `WM_PAINT`.  Outside a pump (e.g. the
/// first paint from `show`) the region is only validated; the next loop
/// iteration draws it.
fn paint(hwnd: HWND) {
    // Taken out for the call so a nested WM_PAINT finds nothing.
    let erased = PAINT.with(|paint| paint.replace(ptr::null_mut()));
    if erased.is_null() {
        return;
    }

    // SAFETY: PAINT is only non-null while `Win32Env::pump` runs on this
    // thread with the target alive on its stack, and taking the pointer out
    // above makes this the only reference to it.
    let target = unsafe { &mut *erased.cast::<PaintTarget<'_, '_>>() };
    if (target.repaint)(client_size(hwnd)) {
        if let Err(e) = target.gl.swap_buffers() {
            warn!("repaint: {e}");
        }
    }

    PAINT.with(|paint| paint.set(erased));
}

fn client_size(hwnd: HWND) -> FrameRequest {
    let mut rect = RECT::default();
    // SAFETY: hwnd is a live window; rect is a valid out-pointer.
    if unsafe { GetClientRect(hwnd, &mut rect) }.is_err() {
        return FrameRequest { width: 0, height: 0 };
    }
    FrameRequest {
        width: rect.right - rect.left,
        height: rect.bottom - rect.top,
    }
}

fn queue_mouse(wparam: WPARAM, lparam: LPARAM) {
    let event = mouse_event(wparam, lparam);
    PENDING.with(|pending| pending.borrow_mut().push(event));
}

/// Client coordinates are signed 16-bit values while the mouse is captured.
fn mouse_event(wparam: WPARAM, lparam: LPARAM) -> InputEvent {
    let x = (lparam.0 & 0xFFFF) as u16 as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as u16 as i16 as i32;

    let mut buttons = 0;
    if wparam.0 & MK_LBUTTON != 0 {
        buttons |= BUTTON_LEFT;
    }
    if wparam.0 & MK_RBUTTON != 0 {
        buttons |= BUTTON_RIGHT;
    }

    InputEvent { x, y, buttons }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Null-terminated UTF-16 copy of `s`.
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Capture the current Win32 last-error code and wrap it in a `HostError`.
///
/// Call immediately after a Win32 function that signals failure; `GetLastError`
/// reads thread-local state that can be overwritten by any subsequent API call.
pub(crate) fn last_error(function: &'static str) -> HostError {
    // SAFETY: GetLastError reads thread-local state set by the last Win32 call.
    let code = unsafe { GetLastError() };
    HostError::Win32 {
        function,
        code: code.0,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
