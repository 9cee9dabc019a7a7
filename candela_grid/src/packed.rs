//! Packed data words shared with the GPU.
//!
//! The bit layouts in this module are mirrored by the shaders; changing any
//! of them requires updating the vertex attribute setup and the GLSL sources
//! in the renderer crate. Host code goes through the accessors below and
//! never open-codes the shifts.

use std::fmt;

use bitflags::bitflags;

/// Code point sentinel marking the trailing half of a full-width glyph.
///
/// The cell exists so the grid stays rectangular, but it never resolves to
/// an atlas slot of its own.
pub const FULLWIDTH_FILLER: u32 = 0x11_0000;

/// A color in the RGB color space.
#[derive(Debug, Default, Eq, PartialEq, Copy, Clone)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn packed(self) -> u32 {
        u32::from(self.r) | u32::from(self.g) << 8 | u32::from(self.b) << 16
    }

    fn from_packed(raw: u32) -> Self {
        Self { r: (raw & 0xFF) as u8, g: (raw >> 8 & 0xFF) as u8, b: (raw >> 16 & 0xFF) as u8 }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

bitflags! {
    /// Line decoration bits carried in the top byte of the foreground word.
    ///
    /// Bits 0 and 1 are not flags; they hold the cursor visibility (0, 1 or
    /// 2) and are overlaid separately via [`CellColors::overlay_cursor`].
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineFlags: u8 {
        const UNDERLINE  = 1 << 2;
        const OVERLINE   = 1 << 3;
        const STRIKEOUT  = 1 << 4;
        const LEFT_LINE  = 1 << 5;
        const RIGHT_LINE = 1 << 6;
    }
}

/// Per-cell color record, one per grid cell, uploaded verbatim.
///
/// `bg` keeps the background RGB in its low three bytes; the top byte is
/// reserved. `fg` keeps the foreground RGB in its low three bytes and the
/// line attributes plus cursor visibility in the top byte.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CellColors {
    bg: u32,
    fg: u32,
}

impl CellColors {
    pub fn new(bg: Rgb, fg: Rgb, flags: LineFlags) -> Self {
        Self { bg: bg.packed(), fg: fg.packed() | u32::from(flags.bits()) << 24 }
    }

    pub fn bg(self) -> Rgb {
        Rgb::from_packed(self.bg)
    }

    pub fn fg(self) -> Rgb {
        Rgb::from_packed(self.fg)
    }

    pub fn line_flags(self) -> LineFlags {
        LineFlags::from_bits_truncate((self.fg >> 24) as u8)
    }

    /// Cursor visibility stored in bits 0-1 of the attribute byte.
    pub fn cursor(self) -> u8 {
        (self.fg >> 24 & 0b11) as u8
    }

    /// OR cursor visibility bits into the attribute byte.
    ///
    /// The bits are cleared again by rewriting the cell, not by this type.
    pub fn overlay_cursor(&mut self, visibility: u8) {
        self.fg |= u32::from(visibility & 0b11) << 24;
    }
}

/// Glyph style selecting one of four rasterizations of a code point.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Style {
    #[default]
    Normal = 0,
    Bold = 1,
    Italic = 2,
    BoldItalic = 3,
}

impl Style {
    pub fn new(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => Style::Normal,
            (true, false) => Style::Bold,
            (false, true) => Style::Italic,
            (true, true) => Style::BoldItalic,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Style::Normal,
            1 => Style::Bold,
            2 => Style::Italic,
            _ => Style::BoldItalic,
        }
    }

    pub fn bold(self) -> bool {
        matches!(self, Style::Bold | Style::BoldItalic)
    }

    pub fn italic(self) -> bool {
        matches!(self, Style::Italic | Style::BoldItalic)
    }
}

/// Pending cell content: `code:30 | style:2`.
///
/// Code point 0 marks an erased cell.
#[repr(transparent)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GlyphWord(u32);

impl GlyphWord {
    pub const ERASED: GlyphWord = GlyphWord(0);

    pub fn new(code: u32, style: Style) -> Self {
        debug_assert!(code < 1 << 30);
        Self(code & 0x3FFF_FFFF | (style as u32) << 30)
    }

    pub fn from_char(c: char, style: Style) -> Self {
        Self::new(c as u32, style)
    }

    pub fn code(self) -> u32 {
        self.0 & 0x3FFF_FFFF
    }

    pub fn style(self) -> Style {
        Style::from_bits(self.0 >> 30)
    }

    pub fn is_erased(self) -> bool {
        self.0 == 0
    }
}

/// Location of a glyph in the atlas: `col:15 | row:15 | advance:2`.
///
/// Advance 0 means "empty / nonexistent"; the raw value 0 doubles as the
/// empty sentinel, which is why the (0, 0) slot is never handed out.
#[repr(transparent)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AtlasCoord(u32);

impl AtlasCoord {
    pub const EMPTY: AtlasCoord = AtlasCoord(0);

    pub fn new(col: i32, row: i32, advance: i32) -> Self {
        debug_assert!((0..1 << 15).contains(&col));
        debug_assert!((0..1 << 15).contains(&row));
        debug_assert!((0..4).contains(&advance));
        Self(col as u32 | (row as u32) << 15 | (advance as u32) << 30)
    }

    pub fn col(self) -> i32 {
        (self.0 & 0x7FFF) as i32
    }

    pub fn row(self) -> i32 {
        (self.0 >> 15 & 0x7FFF) as i32
    }

    pub fn advance(self) -> i32 {
        (self.0 >> 30) as i32
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}
