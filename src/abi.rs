// ── Module contract ───────────────────────────────────────────────────────────
//
// The interface shared by the host and the hot-reloaded module.  Every type
// here is `#[repr(C)]` and every function pointer is `extern "C"` so that
// the module can be built by any toolchain that speaks the C ABI.
//
// A module must:
//   • export `reload`, `render` and `mouse` (see `*Fn` aliases below);
//   • export one writable pointer-sized slot per `HOST_FUNCTIONS` and
//     `DRIVER_FUNCTIONS` entry, named exactly like the entry.  The host
//     writes the function address into each slot on every load.

use std::ffi::c_void;

// ── Module-exported entry points ──────────────────────────────────────────────

/// Migration entry point.  Receives the previous opaque state (null on the
/// first load) and returns the state the new code will use from now on.
pub type ReloadFn = unsafe extern "C" fn(state: *mut c_void) -> *mut c_void;

/// Draw one frame into the current GL context.
pub type RenderFn = unsafe extern "C" fn(state: *mut c_void, width: i32, height: i32);

/// Pointer input.  `y` has a bottom-left origin.
pub type MouseFn = unsafe extern "C" fn(state: *mut c_void, x: i32, y: i32, buttons: u32);

pub const RELOAD_SYMBOL: &str = "reload";
pub const RENDER_SYMBOL: &str = "render";
pub const MOUSE_SYMBOL: &str = "mouse";

/// Export signatures, reported when an export is missing.
pub const RELOAD_SIGNATURE: &str = "fn(*mut c_void) -> *mut c_void";
pub const RENDER_SIGNATURE: &str = "fn(*mut c_void, i32, i32)";
pub const MOUSE_SIGNATURE: &str = "fn(*mut c_void, i32, i32, u32)";

// ── Button mask ───────────────────────────────────────────────────────────────

/// Bit 0: primary (left) button held.
pub const BUTTON_LEFT: u32 = 1 << 0;
/// Bit 1: secondary (right) button held.
pub const BUTTON_RIGHT: u32 = 1 << 1;

// ── Host-provided services ────────────────────────────────────────────────────

/// Zero-initialised allocation with the requested alignment.  Size 0 → null.
pub type AllocateFn = unsafe extern "C" fn(size: usize, align: usize) -> *mut c_void;

/// Release memory from `AllocateFn`.  The host records each block's layout,
/// so `size`/`align` are advisory; a mismatch is logged, not fatal.
pub type DeallocateFn = unsafe extern "C" fn(ptr: *mut c_void, size: usize, align: usize);

/// Create a font from a null-terminated UTF-16 face name.
pub type CreateFontFn = unsafe extern "C" fn(name: *const u16, pixel_height: i32) -> *mut Font;

/// Rasterise one codepoint into `Font::bits` and return its advance width.
pub type RenderGlyphFn = unsafe extern "C" fn(font: *mut Font, codepoint: u32) -> i32;

/// Slot names for the host-provided services, in table order.
pub const HOST_FUNCTIONS: [(&str, &str); 4] = [
    ("sys_allocate", "fn(usize, usize) -> *mut c_void"),
    ("sys_deallocate", "fn(*mut c_void, usize, usize)"),
    ("sys_create_font", "fn(*const u16, i32) -> *mut Font"),
    ("sys_render_glyph", "fn(*mut Font, u32) -> i32"),
];

/// Capacity of `Font::glyphs` as allocated by the host.
pub const GLYPH_CAPACITY: i32 = 256;

/// Per-glyph cache entry.  The host only allocates the array; the module
/// fills and interprets it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Glyph {
    pub codepoint: u32,
    pub advance: i32,
    pub x: i32,
    pub y: i32,
}

/// A rasterisation surface for one font face.
///
/// `bits` points at `bitmap_width * bitmap_height` 32-bit pixels, bottom-up.
/// Glyphs are drawn with their origin at (`default_x`, `default_y`) so that
/// overhangs in every direction stay inside the bitmap.
#[repr(C)]
#[derive(Debug)]
pub struct Font {
    /// Platform rasteriser handle (a memory DC on Windows).
    pub sys: *mut c_void,
    pub default_x: i32,
    pub default_y: i32,
    pub bitmap_width: i32,
    pub bitmap_height: i32,
    /// Pixels above the baseline (GDI `tmAscent`).
    pub ascent: i32,
    /// Pixels below the baseline (GDI `tmDescent`).  Modules that read
    /// these two fields the other way round must swap them on their side.
    pub descent: i32,
    pub height: i32,
    pub external_leading: i32,
    pub bits: *mut u32,
    pub glyphs_max: i32,
    pub glyphs_used: i32,
    pub glyphs: *mut Glyph,
}

// ── Driver-resolved functions ─────────────────────────────────────────────────

/// OpenGL entry points the module may call, resolved once from the driver and
/// written into the module's slots on every load.
pub const DRIVER_FUNCTIONS: &[(&str, &str)] = &[
    ("glActiveTexture", "fn(GLenum)"),
    ("glAttachShader", "fn(GLuint, GLuint)"),
    ("glBindBuffer", "fn(GLenum, GLuint)"),
    ("glBindTexture", "fn(GLenum, GLuint)"),
    ("glBindVertexArray", "fn(GLuint)"),
    ("glBlendFunc", "fn(GLenum, GLenum)"),
    ("glBufferData", "fn(GLenum, GLsizeiptr, *const c_void, GLenum)"),
    ("glBufferSubData", "fn(GLenum, GLintptr, GLsizeiptr, *const c_void)"),
    ("glClear", "fn(GLbitfield)"),
    ("glClearColor", "fn(GLfloat, GLfloat, GLfloat, GLfloat)"),
    ("glCompileShader", "fn(GLuint)"),
    ("glCreateProgram", "fn() -> GLuint"),
    ("glCreateShader", "fn(GLenum) -> GLuint"),
    ("glDeleteBuffers", "fn(GLsizei, *const GLuint)"),
    ("glDeleteProgram", "fn(GLuint)"),
    ("glDeleteShader", "fn(GLuint)"),
    ("glDeleteTextures", "fn(GLsizei, *const GLuint)"),
    ("glDeleteVertexArrays", "fn(GLsizei, *const GLuint)"),
    ("glDisable", "fn(GLenum)"),
    ("glDrawArrays", "fn(GLenum, GLint, GLsizei)"),
    ("glEnable", "fn(GLenum)"),
    ("glEnableVertexAttribArray", "fn(GLuint)"),
    ("glGenBuffers", "fn(GLsizei, *mut GLuint)"),
    ("glGenTextures", "fn(GLsizei, *mut GLuint)"),
    ("glGenVertexArrays", "fn(GLsizei, *mut GLuint)"),
    ("glGetError", "fn() -> GLenum"),
    ("glGetProgramInfoLog", "fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar)"),
    ("glGetProgramiv", "fn(GLuint, GLenum, *mut GLint)"),
    ("glGetShaderInfoLog", "fn(GLuint, GLsizei, *mut GLsizei, *mut GLchar)"),
    ("glGetShaderiv", "fn(GLuint, GLenum, *mut GLint)"),
    ("glGetUniformLocation", "fn(GLuint, *const GLchar) -> GLint"),
    ("glLinkProgram", "fn(GLuint)"),
    ("glPixelStorei", "fn(GLenum, GLint)"),
    ("glScissor", "fn(GLint, GLint, GLsizei, GLsizei)"),
    ("glShaderSource", "fn(GLuint, GLsizei, *const *const GLchar, *const GLint)"),
    ("glTexImage2D", "fn(GLenum, GLint, GLint, GLsizei, GLsizei, GLint, GLenum, GLenum, *const c_void)"),
    ("glTexParameteri", "fn(GLenum, GLenum, GLint)"),
    ("glTexSubImage2D", "fn(GLenum, GLint, GLint, GLint, GLsizei, GLsizei, GLenum, GLenum, *const c_void)"),
    ("glUniform1i", "fn(GLint, GLint)"),
    ("glUniform2f", "fn(GLint, GLfloat, GLfloat)"),
    ("glUniform4f", "fn(GLint, GLfloat, GLfloat, GLfloat, GLfloat)"),
    ("glUniformMatrix4fv", "fn(GLint, GLsizei, GLboolean, *const GLfloat)"),
    ("glUseProgram", "fn(GLuint)"),
    ("glVertexAttribPointer", "fn(GLuint, GLint, GLenum, GLboolean, GLsizei, *const c_void)"),
    ("glViewport", "fn(GLint, GLint, GLsizei, GLsizei)"),
];

// ── Tests ─────────────────────────────────────────────────────────────────────
