// ── GDI glyph rasteriser ──────────────────────────────────────────────────────
//
// The font half of the host-provided table.  Each `Font` owns a memory DC
// with the face and a 32-bit DIB section selected into it; the module reads
// the DIB pixels directly after `sys_render_glyph`.  Fonts are never
// destroyed; the module creates a handful at startup and keeps them in its
// migrated state.

#![allow(unsafe_code)]

use std::{
    ffi::c_void,
    mem,
    ptr::{self, NonNull},
};

use log::{debug, error};
use windows::Win32::{
    Foundation::COLORREF,
    Graphics::Gdi::{
        CreateCompatibleDC, CreateDIBSection, CreateFontIndirectW, DeleteDC, GetCharABCWidthsW,
        GetDeviceCaps, GetTextMetricsW, SelectObject, SetBkColor, SetTextColor, TextOutW, ABC,
        ANTIALIASED_QUALITY, BITMAPINFO, BITMAPINFOHEADER, DIB_RGB_COLORS, HDC, HGDIOBJ,
        LOGFONTW, LOGPIXELSY, TEXTMETRICW,
    },
};

use crate::{
    abi::{Font, Glyph, GLYPH_CAPACITY},
    reload::services::sys_allocate,
};

const FW_NORMAL: i32 = 400;

// ── Host services ─────────────────────────────────────────────────────────────

/// Create a font from a null-terminated UTF-16 face name at `pixel_height`
/// points.  Returns null (and logs) if GDI refuses any step.
pub(crate) unsafe extern "C" fn sys_create_font(name: *const u16, pixel_height: i32) -> *mut Font {
    if name.is_null() {
        error!("sys_create_font: null face name");
        return ptr::null_mut();
    }

    // SAFETY: caller contract: `name` is a null-terminated UTF-16 string.
    let face = unsafe { face_name(name) };

    // SAFETY: `face` is a fully initialised LOGFONTW face array.
    let Some(font) = (unsafe { create(&face, pixel_height) }) else {
        return ptr::null_mut();
    };

    debug!(
        "created font {} px: {}x{} bitmap",
        pixel_height, font.bitmap_width, font.bitmap_height
    );

    // SAFETY: size and alignment describe `Font`; the block is zeroed.
    let slot = unsafe { sys_allocate(mem::size_of::<Font>(), mem::align_of::<Font>()) }.cast::<Font>();
    let Some(slot) = NonNull::new(slot) else {
        error!("sys_create_font: out of memory");
        return ptr::null_mut();
    };
    // SAFETY: `slot` is a fresh, aligned, writable block of the right size.
    unsafe { slot.as_ptr().write(font) };
    slot.as_ptr()
}

/// Clear the font's bitmap, draw `codepoint` at the default origin and
/// return its advance width (A+B+C).  Returns 0 for a null font or a
/// value outside the Unicode range.
pub(crate) unsafe extern "C" fn sys_render_glyph(font: *mut Font, codepoint: u32) -> i32 {
    // SAFETY: caller contract: `font` is null or came from sys_create_font.
    let Some(font) = (unsafe { font.as_ref() }) else {
        return 0;
    };
    let Some((units, len)) = utf16_units(codepoint) else {
        return 0;
    };
    let dc = HDC(font.sys);

    let mut abc = ABC::default();
    // SAFETY: dc is the font's memory DC; abc receives exactly one entry.
    let advance = if unsafe { GetCharABCWidthsW(dc, codepoint, codepoint, &mut abc) }.as_bool() {
        abc.abcA + abc.abcB as i32 + abc.abcC
    } else {
        0
    };

    let pixels = (font.bitmap_width * font.bitmap_height).max(0) as usize;
    // SAFETY: `bits` is the DIB section of exactly bitmap_width x
    // bitmap_height 32-bit pixels created with this font.
    unsafe {
        ptr::write_bytes(font.bits, 0, pixels);
        let _ = TextOutW(dc, font.default_x, font.default_y, &units[..len]);
    }

    advance
}

// ── Construction ──────────────────────────────────────────────────────────────

/// Copy up to 31 UTF-16 units of the face name into a LOGFONTW array.
unsafe fn face_name(name: *const u16) -> [u16; 32] {
    let mut face = [0u16; 32];
    for (i, slot) in face.iter_mut().take(31).enumerate() {
        // SAFETY: caller contract; reading stops at the terminator.
        let unit = unsafe { *name.add(i) };
        if unit == 0 {
            break;
        }
        *slot = unit;
    }
    face
}

unsafe fn create(face: &[u16; 32], pixel_height: i32) -> Option<Font> {
    // SAFETY: a memory DC compatible with the screen; released on failure.
    let dc = unsafe { CreateCompatibleDC(None) };
    if dc.0.is_null() {
        error!("sys_create_font: CreateCompatibleDC failed");
        return None;
    }

    // SAFETY: every call below operates on `dc`, which this function owns
    // until the Font takes it over.
    unsafe {
        SetBkColor(dc, COLORREF(0x0000_0000));
        SetTextColor(dc, COLORREF(0x00FF_FFFF));

        let logfont = LOGFONTW {
            lfHeight: -mul_div(pixel_height, GetDeviceCaps(dc, LOGPIXELSY), 72),
            lfWeight: FW_NORMAL,
            lfQuality: ANTIALIASED_QUALITY,
            lfFaceName: *face,
            ..Default::default()
        };
        let hfont = CreateFontIndirectW(&logfont);
        if hfont.0.is_null() {
            error!("sys_create_font: CreateFontIndirectW failed");
            let _ = DeleteDC(dc);
            return None;
        }
        SelectObject(dc, HGDIOBJ(hfont.0));

        let mut tm = TEXTMETRICW::default();
        if !GetTextMetricsW(dc, &mut tm).as_bool() {
            error!("sys_create_font: GetTextMetricsW failed");
            let _ = DeleteDC(dc);
            return None;
        }

        let metrics = Metrics::from_text_metrics(&tm);

        let info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: metrics.bitmap_width,
                biHeight: metrics.bitmap_height,
                biPlanes: 1,
                biBitCount: 32,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut bits: *mut c_void = ptr::null_mut();
        let bitmap = match CreateDIBSection(dc, &info, DIB_RGB_COLORS, &mut bits, None, 0) {
            Ok(bitmap) if !bits.is_null() => bitmap,
            _ => {
                error!("sys_create_font: CreateDIBSection failed");
                let _ = DeleteDC(dc);
                return None;
            }
        };
        SelectObject(dc, HGDIOBJ(bitmap.0));

        let glyphs = sys_allocate(
            GLYPH_CAPACITY as usize * mem::size_of::<Glyph>(),
            mem::align_of::<Glyph>(),
        )
        .cast::<Glyph>();

        Some(Font {
            sys: dc.0,
            default_x: metrics.default_x,
            default_y: metrics.default_y,
            bitmap_width: metrics.bitmap_width,
            bitmap_height: metrics.bitmap_height,
            ascent: metrics.ascent,
            descent: metrics.descent,
            height: tm.tmHeight,
            external_leading: tm.tmExternalLeading,
            bits: bits.cast(),
            glyphs_max: if glyphs.is_null() { 0 } else { GLYPH_CAPACITY },
            glyphs_used: 0,
            glyphs,
        })
    }
}

/// Bitmap geometry: three widest glyphs by three lines, with the drawing
/// origin one glyph in from the corner so overhangs stay inside.  The
/// vertical metrics pass through under GDI's names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Metrics {
    default_x: i32,
    default_y: i32,
    bitmap_width: i32,
    bitmap_height: i32,
    ascent: i32,
    descent: i32,
}

impl Metrics {
    fn new(max_char_width: i32, height: i32) -> Self {
        Self {
            default_x: max_char_width,
            default_y: height,
            bitmap_width: max_char_width * 3,
            bitmap_height: height * 3,
            ascent: 0,
            descent: 0,
        }
    }

    fn from_text_metrics(tm: &TEXTMETRICW) -> Self {
        Self {
            ascent: tm.tmAscent,
            descent: tm.tmDescent,
            ..Self::new(tm.tmMaxCharWidth, tm.tmHeight)
        }
    }
}

/// `a * b / c` rounded to nearest, as GDI's `MulDiv`.
fn mul_div(a: i32, b: i32, c: i32) -> i32 {
    if c == 0 {
        return -1;
    }
    let n = i64::from(a) * i64::from(b);
    let c = i64::from(c);
    let half = c.abs() / 2;
    let rounded = if (n < 0) != (c < 0) { (n - half) / c } else { (n + half) / c };
    rounded as i32
}

/// UTF-16 code units for `codepoint`: one unit below U+10000 (surrogate
/// values pass through unchanged), a surrogate pair above.
fn utf16_units(codepoint: u32) -> Option<([u16; 2], usize)> {
    match codepoint {
        0..=0xFFFF => Some(([codepoint as u16, 0], 1)),
        0x1_0000..=0x10_FFFF => {
            let v = codepoint - 0x1_0000;
            Some(([0xD800 + (v >> 10) as u16, 0xDC00 + (v & 0x3FF) as u16], 2))
        }
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmp_codepoint_is_one_unit() {
        assert_eq!(utf16_units('A' as u32), Some(([0x41, 0], 1)));
    }

    #[test]
    fn supplementary_codepoint_is_a_surrogate_pair() {
        let mut expected = [0u16; 2];
        char::from_u32(0x1F600)
            .expect("valid scalar")
            .encode_utf16(&mut expected);
        assert_eq!(utf16_units(0x1F600), Some((expected, 2)));
    }

    #[test]
    fn out_of_range_codepoint_is_rejected() {
        assert_eq!(utf16_units(0x11_0000), None);
    }

    #[test]
    fn mul_div_rounds_like_gdi() {
        assert_eq!(mul_div(12, 96, 72), 16);
        assert_eq!(mul_div(10, 96, 72), 13);
        assert_eq!(mul_div(-10, 96, 72), -13);
        assert_eq!(mul_div(1, 1, 0), -1);
    }

    #[test]
    fn bitmap_leaves_room_around_the_origin() {
        let m = Metrics::new(14, 19);
        assert_eq!((m.default_x, m.default_y), (14, 19));
        assert_eq!((m.bitmap_width, m.bitmap_height), (42, 57));
    }

    #[test]
    fn ascent_and_descent_keep_their_gdi_meaning() {
        let tm = TEXTMETRICW {
            tmHeight: 19,
            tmAscent: 15,
            tmDescent: 4,
            tmMaxCharWidth: 14,
            ..Default::default()
        };
        let m = Metrics::from_text_metrics(&tm);
        assert_eq!((m.ascent, m.descent), (15, 4));
        assert_eq!((m.bitmap_width, m.bitmap_height), (42, 57));
    }

    #[test]
    fn null_font_renders_nothing() {
        // SAFETY: null is an accepted input.
        assert_eq!(unsafe { sys_render_glyph(ptr::null_mut(), 'x' as u32) }, 0);
    }

    #[test]
    fn face_name_is_truncated_and_terminated() {
        let long: Vec<u16> = "A".repeat(40).encode_utf16().chain([0]).collect();
        // SAFETY: `long` is null-terminated.
        let face = unsafe { face_name(long.as_ptr()) };
        assert_eq!(face[30], b'A' as u16);
        assert_eq!(face[31], 0);
    }
}
