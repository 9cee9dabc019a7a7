//! Source cells as delivered by the character-cell API.

use bitflags::bitflags;

bitflags! {
    /// Attributes of a source cell.
    ///
    /// BOLD, ITALIC and BLINK only take effect when the host also lists
    /// them in the active attribute mask; the remaining bits map directly
    /// onto [`crate::packed::LineFlags`].
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attrs: u16 {
        const BOLD       = 1;
        const ITALIC     = 1 << 1;
        const BLINK      = 1 << 2;
        const REVERSE    = 1 << 3;
        const UNDERLINE  = 1 << 4;
        const OVERLINE   = 1 << 5;
        const STRIKEOUT  = 1 << 6;
        const LEFT_LINE  = 1 << 7;
        const RIGHT_LINE = 1 << 8;
    }
}

/// One character cell as seen by `transform_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCell {
    pub ch: char,

    /// Combining characters stacked on top of the base character.
    pub combining: Option<Box<[char]>>,

    pub attrs: Attrs,

    /// Color pair index, resolved through the palette.
    pub pair: u16,
}

impl Default for SourceCell {
    fn default() -> Self {
        Self { ch: ' ', combining: None, attrs: Attrs::empty(), pair: 0 }
    }
}

impl SourceCell {
    pub fn new(ch: char) -> Self {
        Self { ch, ..Self::default() }
    }

    /// The attribute word runs are split on.
    pub fn attr_word(&self) -> u32 {
        u32::from(self.attrs.bits()) | u32::from(self.pair) << 16
    }
}

/// Current cursor cell.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct CursorState {
    pub line: usize,
    pub column: usize,
}

/// Read access to the host's screen contents.
///
/// Consulted by the operations that re-read cells the engine has already
/// drawn: clearing the previous cursor location and re-submitting blinking
/// segments.
pub trait ScreenSource {
    /// Screen size as (columns, lines).
    fn dims(&self) -> (usize, usize);

    /// Source cells of one line.
    fn line(&self, lineno: usize) -> &[SourceCell];
}
