//! The screen model: a dense color grid plus a stack of glyph layers.
//!
//! Layer 0 holds the base character of every cell; layers above it hold
//! combining characters drawn on top. Layers keep two parallel grids: the
//! `pending` code points written by the producer and the `resolved` atlas
//! coordinates filled in at render time.

use log::trace;

use crate::packed::{AtlasCoord, CellColors, GlyphWord, LineFlags, Rgb};

/// One glyph layer at cell resolution.
#[derive(Debug, Default, Clone)]
pub struct GlyphLayer {
    /// Number of non-erased cells in `pending`. Non-base layers are
    /// reclaimed when this drops to zero.
    pub(crate) occupancy: u32,

    pub(crate) pending: Vec<GlyphWord>,

    /// Atlas coordinates from the last resolve. Stale between frames; the
    /// atlas reads them to find the live set during eviction.
    pub(crate) resolved: Vec<AtlasCoord>,
}

impl GlyphLayer {
    fn new(cells: usize) -> Self {
        Self {
            occupancy: 0,
            pending: vec![GlyphWord::ERASED; cells],
            resolved: vec![AtlasCoord::EMPTY; cells],
        }
    }

    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    pub fn pending(&self) -> &[GlyphWord] {
        &self.pending
    }

    pub fn resolved(&self) -> &[AtlasCoord] {
        &self.resolved
    }
}

/// The cell grid: colors plus glyph layers.
#[derive(Debug, Default, Clone)]
pub struct ScreenGrid {
    cols: usize,
    lines: usize,
    colors: Vec<CellColors>,
    pub(crate) layers: Vec<GlyphLayer>,
}

impl ScreenGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn cells(&self) -> usize {
        self.cols * self.lines
    }

    pub fn colors(&self) -> &[CellColors] {
        &self.colors
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> &GlyphLayer {
        &self.layers[index]
    }

    /// Make sure the grid has the requested dimensions and at least
    /// `min_layers` layers.
    ///
    /// Resizing preserves the overlapping top-left rectangle of every grid
    /// and zeroes only the newly exposed cells. Layers are extended here
    /// but never removed; that is [`ScreenGrid::shrink_layers`]' job.
    pub fn ensure(&mut self, cols: usize, lines: usize, min_layers: usize) {
        let min_layers = min_layers.max(1);
        let cells = cols * lines;

        if cols != self.cols || lines != self.lines {
            let copy_w = cols.min(self.cols);
            let copy_h = lines.min(self.lines);

            let mut colors = vec![CellColors::default(); cells];
            for line in 0..copy_h {
                colors[line * cols..line * cols + copy_w]
                    .copy_from_slice(&self.colors[line * self.cols..line * self.cols + copy_w]);
            }
            self.colors = colors;

            for layer in &mut self.layers {
                let mut pending = vec![GlyphWord::ERASED; cells];
                for line in 0..copy_h {
                    pending[line * cols..line * cols + copy_w].copy_from_slice(
                        &layer.pending[line * self.cols..line * self.cols + copy_w],
                    );
                }
                layer.pending = pending;

                // The resolved grid is rewritten in full before it is drawn
                // again; it only has to keep its cells addressable so the
                // atlas can scan them for eviction.
                layer.resolved.resize(cells, AtlasCoord::EMPTY);
            }

            self.cols = cols;
            self.lines = lines;

            // A shrink can drop occupied cells; recount so empty layers are
            // still reclaimed.
            for layer in self.layers.iter_mut().skip(1) {
                layer.occupancy =
                    layer.pending.iter().filter(|word| !word.is_erased()).count() as u32;
            }
        }

        while self.layers.len() < min_layers {
            self.layers.push(GlyphLayer::new(cells));
            trace!("added glyph layer {}", self.layers.len() - 1);
        }
    }

    /// Write the base glyph and color record of one cell.
    ///
    /// All combining layers are cleared at the cell. Out-of-range writes
    /// are ignored.
    pub fn write_glyph(
        &mut self,
        line: usize,
        column: usize,
        word: GlyphWord,
        bg: Rgb,
        fg: Rgb,
        flags: LineFlags,
    ) {
        if line >= self.lines || column >= self.cols || self.layers.is_empty() {
            return;
        }
        let index = line * self.cols + column;

        self.colors[index] = CellColors::new(bg, fg, flags);

        for layer in self.layers.iter_mut().skip(1) {
            if !layer.pending[index].is_erased() {
                layer.occupancy -= 1;
                layer.pending[index] = GlyphWord::ERASED;
            }
        }

        self.layers[0].pending[index] = word;
    }

    /// Write a combining character on `layer` (>= 1), creating the layer if
    /// needed.
    pub fn write_combining(&mut self, line: usize, column: usize, layer: usize, word: GlyphWord) {
        if line >= self.lines || column >= self.cols || layer == 0 {
            return;
        }
        self.ensure(self.cols, self.lines, layer + 1);

        let index = line * self.cols + column;
        let layer = &mut self.layers[layer];
        let old = layer.pending[index];
        if !old.is_erased() {
            layer.occupancy -= 1;
        }
        if !word.is_erased() {
            layer.occupancy += 1;
        }
        layer.pending[index] = word;
    }

    /// Overlay cursor visibility bits onto a cell's color record.
    pub fn write_cursor(&mut self, line: usize, column: usize, visibility: u8) {
        if line >= self.lines || column >= self.cols {
            return;
        }
        let visibility = if visibility <= 2 { visibility } else { 0 };
        self.colors[line * self.cols + column].overlay_cursor(visibility);
    }

    /// Remove empty layers from the top of the stack. Layer 0 is always
    /// retained.
    pub fn shrink_layers(&mut self) {
        let mut layer = 1;
        while layer < self.layers.len() {
            if self.layers[layer].occupancy != 0 {
                layer += 1;
                continue;
            }
            self.layers.remove(layer);
            trace!("reclaimed glyph layer {}", layer);
        }
    }

    /// Deep-copy `src` into `self`, reconciling layer count and grid size
    /// while reusing existing allocations.
    ///
    /// The resolved grids are not copied: the renderer rewrites them in
    /// full, and keeping this side's stale coordinates (resized to the new
    /// cell count, growth zero-filled) is exactly what atlas eviction
    /// needs.
    pub(crate) fn copy_from(&mut self, src: &ScreenGrid) {
        let cells = src.cells();

        self.layers.truncate(src.layers.len());
        for (index, src_layer) in src.layers.iter().enumerate() {
            if index == self.layers.len() {
                self.layers.push(GlyphLayer::new(cells));
            }
            let layer = &mut self.layers[index];
            layer.occupancy = src_layer.occupancy;
            layer.pending.clone_from(&src_layer.pending);
            layer.resolved.resize(cells, AtlasCoord::EMPTY);
        }

        self.colors.clone_from(&src.colors);
        self.cols = src.cols;
        self.lines = src.lines;
    }
}
