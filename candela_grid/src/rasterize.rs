//! Capabilities consumed from the host: glyph rasterization and palette
//! lookup.

use crate::packed::{Rgb, Style};

/// Key for a single rasterization.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GlyphKey {
    pub ch: char,
    pub style: Style,
}

/// A rasterized glyph: single-channel coverage, row-major, one byte per
/// pixel.
#[derive(Clone, Default)]
pub struct RasterizedGlyph {
    pub width: i32,
    pub height: i32,
    pub buf: Vec<u8>,
}

impl std::fmt::Debug for RasterizedGlyph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterizedGlyph")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("buf", &self.buf.len())
            .finish()
    }
}

/// Glyph rasterization capability.
pub trait Rasterize {
    /// Errors occurring in Rasterize methods.
    type Err: std::error::Error + Send + Sync + 'static;

    /// Rasterize the glyph described by `GlyphKey`.
    fn glyph(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, Self::Err>;

    /// Whether code points outside the BMP can be rasterized.
    ///
    /// When `false`, the atlas substitutes `?` for supplementary plane
    /// code points.
    fn supplementary_planes(&self) -> bool {
        true
    }
}

/// Palette lookup capability.
pub trait Palette {
    /// Foreground and background color indices of a color pair.
    fn pair(&self, pair: u16) -> (i32, i32);

    /// RGB value of a color index.
    fn color(&self, index: i32) -> Rgb;
}
