//! The glyph atlas: a single-channel texture image caching rasterized
//! glyphs, keyed by (code point, style).
//!
//! Glyphs are packed into rows of the cell height, each row filling left to
//! right. When no row can host a new glyph the atlas doubles in size; once
//! the GPU's maximum texture dimension is reached it instead evicts every
//! glyph not referenced by the current frame and repacks the survivors.
//!
//! The pixel store lives on the CPU; the renderer uploads it (in full after
//! a grow or compaction, per fresh-glyph rectangle otherwise). Coordinates
//! handed out here stay valid until the next compaction rewrites them
//! through the frame's resolved grids.

use ahash::{AHashMap, AHashSet};
use log::{debug, trace};

use crate::config::CellMetrics;
use crate::packed::{AtlasCoord, GlyphWord, FULLWIDTH_FILLER};
use crate::rasterize::{GlyphKey, Rasterize};
use crate::screen::{GlyphLayer, ScreenGrid};

/// Dense cache below this bound, hash map above it.
const DENSE_LIMIT: u32 = 0x1_0000;

/// Initial dense cache size; grows geometrically from here.
const INITIAL_DENSE_SIZE: usize = 256;

/// Cached coordinates for one style.
#[derive(Debug, Default)]
struct StyleCache {
    dense: Vec<AtlasCoord>,
    high: AHashMap<u32, AtlasCoord>,
}

impl StyleCache {
    fn get(&self, code: u32) -> AtlasCoord {
        if code < DENSE_LIMIT {
            self.dense.get(code as usize).copied().unwrap_or(AtlasCoord::EMPTY)
        } else {
            self.high.get(&code).copied().unwrap_or(AtlasCoord::EMPTY)
        }
    }

    fn insert(&mut self, code: u32, coord: AtlasCoord) {
        if code < DENSE_LIMIT {
            if self.dense.len() <= code as usize {
                let mut len = self.dense.len().max(INITIAL_DENSE_SIZE);
                while len <= code as usize {
                    len *= 2;
                }
                self.dense.resize(len, AtlasCoord::EMPTY);
            }
            self.dense[code as usize] = coord;
        } else if coord.is_empty() {
            self.high.remove(&code);
        } else {
            self.high.insert(code, coord);
        }
    }

    fn clear(&mut self) {
        self.dense.clear();
        self.high.clear();
    }
}

/// A pixel rectangle within the atlas image.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AtlasRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Texture maintenance owed to the GPU since the last frame.
#[derive(Debug, Default)]
pub struct AtlasUpdates {
    /// The image was reallocated (grow or compaction); upload everything.
    pub resized: bool,

    /// Rectangles of freshly inserted glyphs, empty when `resized`.
    pub rects: Vec<AtlasRect>,
}

pub struct GlyphAtlas {
    metrics: CellMetrics,

    /// Maximum texture dimension the GPU supports.
    max_size: i32,

    width: i32,
    height: i32,

    /// R8 image backing the atlas texture, row-major.
    pixels: Vec<u8>,

    /// Next free column per row. Row 0 starts at column 1, reserving the
    /// (0, 0) slot as the empty sentinel.
    row_cursor: Vec<i32>,

    caches: [StyleCache; 4],

    resized: bool,
    fresh: Vec<AtlasRect>,
}

impl GlyphAtlas {
    pub fn new(metrics: CellMetrics, max_size: i32) -> Self {
        Self {
            metrics,
            max_size,
            width: 0,
            height: 0,
            pixels: Vec::new(),
            row_cursor: Vec::new(),
            caches: Default::default(),
            resized: false,
            fresh: Vec::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Drop all cached code point -> coordinate mappings.
    ///
    /// Used when the atlas texture is replaced wholesale, e.g. on a font
    /// change.
    pub fn reset_caches(&mut self) {
        for cache in &mut self.caches {
            cache.clear();
        }
    }

    /// Pending texture uploads, handed to the GL side once per frame.
    pub fn take_updates(&mut self) -> AtlasUpdates {
        AtlasUpdates {
            resized: std::mem::take(&mut self.resized),
            rects: std::mem::take(&mut self.fresh),
        }
    }

    /// Resolve every pending code point of every layer into its atlas
    /// coordinate, rasterizing and inserting on misses.
    pub fn resolve<R: Rasterize>(&mut self, grid: &mut ScreenGrid, rasterizer: &mut R) {
        let cells = grid.cells();
        for layer in 0..grid.layer_count() {
            for index in 0..cells {
                let word = grid.layers[layer].pending[index];
                let coord = self.lookup(rasterizer, word, &mut grid.layers);
                grid.layers[layer].resolved[index] = coord;
            }
        }
    }

    /// Cached coordinate of `word`, inserting it on a miss.
    ///
    /// `live` is the frame's resolved grids; compaction scans them for the
    /// live set and rewrites relocated coordinates in place. Returns the
    /// empty coordinate for erased cells, full-width fillers, and glyphs
    /// that cannot be rasterized or placed.
    pub fn lookup<R: Rasterize>(
        &mut self,
        rasterizer: &mut R,
        word: GlyphWord,
        live: &mut [GlyphLayer],
    ) -> AtlasCoord {
        let mut code = word.code();
        let style = word.style();

        if code == 0 || code == FULLWIDTH_FILLER {
            return AtlasCoord::EMPTY;
        }
        if self.metrics.width <= 0 || self.metrics.height <= 0 {
            return AtlasCoord::EMPTY;
        }
        if code > 0xFFFF && !rasterizer.supplementary_planes() {
            code = '?' as u32;
        }

        let cached = self.caches[style.index()].get(code);
        if !cached.is_empty() {
            return cached;
        }

        let ch = match char::from_u32(code) {
            Some(ch) => ch,
            None => return AtlasCoord::EMPTY,
        };

        let glyph = match rasterizer.glyph(GlyphKey { ch, style }) {
            Ok(glyph) => glyph,
            // Not cached: the cell stays blank and a later frame may retry.
            Err(err) => {
                trace!("rasterization failed for {:?}: {}", ch, err);
                return AtlasCoord::EMPTY;
            },
        };
        if glyph.width < 0
            || glyph.height < 0
            || glyph.buf.len() < (glyph.width * glyph.height) as usize
        {
            return AtlasCoord::EMPTY;
        }

        // Italics can overstep the cell and legitimately produce 2 here.
        let advance = ((glyph.width + self.metrics.width - 1) / self.metrics.width).clamp(1, 2);

        let coord = match self.allocate(advance, live) {
            Some(coord) => coord,
            None => {
                debug!("glyph atlas exhausted, dropping {:?}", ch);
                return AtlasCoord::EMPTY;
            },
        };

        self.blit(coord, glyph.width, glyph.height, &glyph.buf);
        self.caches[style.index()].insert(code, coord);
        trace!("cached {:?} ({:?}) at {},{}", ch, style, coord.col(), coord.row());
        coord
    }

    /// Row-packed first-fit scan. Does not grow.
    fn find_slot(&mut self, advance: i32) -> Option<AtlasCoord> {
        let cols = self.col_capacity();
        for row in 0..self.row_cursor.len() {
            let col = self.row_cursor[row];
            if col + advance <= cols {
                self.row_cursor[row] = col + advance;
                return Some(AtlasCoord::new(col, row as i32, advance));
            }
        }
        None
    }

    /// Find a slot, growing or evicting until one exists or the atlas is
    /// provably out of room.
    fn allocate(&mut self, advance: i32, live: &mut [GlyphLayer]) -> Option<AtlasCoord> {
        loop {
            if let Some(coord) = self.find_slot(advance) {
                return Some(coord);
            }
            if !self.grow() {
                // Already at the maximum size; evict and try one last time.
                self.compact(live);
                return self.find_slot(advance);
            }
        }
    }

    /// Double the atlas, clamped to the maximum texture size. Existing
    /// content keeps its position, so coordinates stay valid. Returns false
    /// when the size cannot change.
    fn grow(&mut self) -> bool {
        let CellMetrics { width: fw, height: fh, .. } = self.metrics;

        let mut new_size = 2 * self.width;
        if new_size == 0 {
            new_size = ((fw.max(fh) as u32 * 16).next_power_of_two()) as i32;
        }
        new_size = new_size.min(self.max_size);
        if new_size == self.width {
            return false;
        }

        let mut pixels = vec![0u8; (new_size * new_size) as usize];
        for y in 0..self.height {
            let src = (y * self.width) as usize;
            let dst = (y * new_size) as usize;
            pixels[dst..dst + self.width as usize]
                .copy_from_slice(&self.pixels[src..src + self.width as usize]);
        }
        self.pixels = pixels;

        let old_rows = self.row_cursor.len();
        self.row_cursor.resize((new_size / fh) as usize, 0);
        if old_rows == 0 && !self.row_cursor.is_empty() {
            self.row_cursor[0] = 1;
        }

        self.width = new_size;
        self.height = new_size;
        self.resized = true;
        self.fresh.clear();
        debug!("glyph atlas grown to {}x{}", self.width, self.height);
        true
    }

    /// Evict every cached glyph not referenced by the frame's resolved
    /// grids and repack the survivors, rewriting relocated references in
    /// the grids.
    fn compact(&mut self, live: &mut [GlyphLayer]) {
        let CellMetrics { width: fw, height: fh, .. } = self.metrics;

        let mut used = AHashSet::default();
        for layer in live.iter() {
            for coord in &layer.resolved {
                if !coord.is_empty() {
                    used.insert(coord.as_u32());
                }
            }
        }

        let mut entries = Vec::new();
        for (style, cache) in self.caches.iter().enumerate() {
            for (code, coord) in cache.dense.iter().enumerate() {
                if !coord.is_empty() {
                    entries.push((style, code as u32, *coord));
                }
            }
            for (&code, &coord) in &cache.high {
                entries.push((style, code, coord));
            }
        }
        for cache in &mut self.caches {
            cache.clear();
        }

        let old_pixels = std::mem::replace(&mut self.pixels, vec![0u8; (self.width * self.height) as usize]);
        for cursor in self.row_cursor.iter_mut() {
            *cursor = 0;
        }
        if !self.row_cursor.is_empty() {
            self.row_cursor[0] = 1;
        }

        let total = entries.len();
        let mut kept = 0;
        let mut remap: AHashMap<u32, AtlasCoord> = AHashMap::default();
        for (style, code, old) in entries {
            if !used.contains(&old.as_u32()) {
                continue;
            }

            let coord = match self.find_slot(old.advance()) {
                Some(coord) => coord,
                None => {
                    remap.insert(old.as_u32(), AtlasCoord::EMPTY);
                    continue;
                },
            };

            let glyph_w = (old.advance() * fw) as usize;
            for y in 0..fh {
                let src = ((old.row() * fh + y) * self.width + old.col() * fw) as usize;
                let dst = ((coord.row() * fh + y) * self.width + coord.col() * fw) as usize;
                self.pixels[dst..dst + glyph_w].copy_from_slice(&old_pixels[src..src + glyph_w]);
            }

            self.caches[style].insert(code, coord);
            remap.insert(old.as_u32(), coord);
            kept += 1;
        }

        // Rewrite relocated references; every cell is visited exactly once.
        for layer in live.iter_mut() {
            for coord in layer.resolved.iter_mut() {
                if let Some(&new) = remap.get(&coord.as_u32()) {
                    *coord = new;
                }
            }
        }

        self.resized = true;
        self.fresh.clear();
        debug!("glyph atlas compacted: {} of {} cached glyphs kept", kept, total);
    }

    /// Copy a glyph bitmap into its slot, clipped to the slot rectangle.
    fn blit(&mut self, coord: AtlasCoord, width: i32, height: i32, buf: &[u8]) {
        let CellMetrics { width: fw, height: fh, .. } = self.metrics;
        let x0 = coord.col() * fw;
        let y0 = coord.row() * fh;
        let w = width.min(coord.advance() * fw);
        let h = height.min(fh);

        for y in 0..h {
            let src = (y * width) as usize;
            let dst = ((y0 + y) * self.width + x0) as usize;
            self.pixels[dst..dst + w as usize].copy_from_slice(&buf[src..src + w as usize]);
        }

        if !self.resized && w > 0 && h > 0 {
            self.fresh.push(AtlasRect { x: x0, y: y0, width: w, height: h });
        }
    }

    fn col_capacity(&self) -> i32 {
        if self.metrics.width > 0 {
            self.width / self.metrics.width
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;
    use crate::config::Viewport;
    use crate::handoff::{FrameState, Handoff};
    use crate::packed::{LineFlags, Rgb, Style};
    use crate::rasterize::RasterizedGlyph;

    #[derive(Debug)]
    struct NoGlyph;

    impl fmt::Display for NoGlyph {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("no glyph")
        }
    }

    impl std::error::Error for NoGlyph {}

    struct MockRasterizer {
        fw: i32,
        fh: i32,
        wide: Vec<char>,
        fail: Vec<char>,
        zero: Vec<char>,
        supplementary: bool,
        calls: Vec<char>,
    }

    impl MockRasterizer {
        fn new(fw: i32, fh: i32) -> Self {
            Self {
                fw,
                fh,
                wide: Vec::new(),
                fail: Vec::new(),
                zero: Vec::new(),
                supplementary: true,
                calls: Vec::new(),
            }
        }
    }

    fn fill_byte(ch: char) -> u8 {
        (ch as u32 % 251) as u8 + 1
    }

    impl Rasterize for MockRasterizer {
        type Err = NoGlyph;

        fn glyph(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, NoGlyph> {
            self.calls.push(key.ch);
            if self.fail.contains(&key.ch) {
                return Err(NoGlyph);
            }
            if self.zero.contains(&key.ch) {
                return Ok(RasterizedGlyph::default());
            }
            let width = if self.wide.contains(&key.ch) { 2 * self.fw } else { self.fw };
            Ok(RasterizedGlyph {
                width,
                height: self.fh,
                buf: vec![fill_byte(key.ch); (width * self.fh) as usize],
            })
        }

        fn supplementary_planes(&self) -> bool {
            self.supplementary
        }
    }

    fn atlas(fw: i32, fh: i32, max: i32) -> GlyphAtlas {
        GlyphAtlas::new(CellMetrics::new(fw, fh), max)
    }

    fn word(ch: char) -> GlyphWord {
        GlyphWord::from_char(ch, Style::Normal)
    }

    fn show(grid: &mut ScreenGrid, text: &str) {
        for (column, ch) in text.chars().enumerate() {
            grid.write_glyph(
                0,
                column,
                word(ch),
                Rgb::new(0, 0, 0),
                Rgb::new(0xFF, 0xFF, 0xFF),
                LineFlags::empty(),
            );
        }
    }

    #[test]
    fn resolve_basic_grid() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        let mut grid = ScreenGrid::new();
        grid.ensure(4, 1, 1);
        show(&mut grid, "ABCD");

        atlas.resolve(&mut grid, &mut rasterizer);

        assert_eq!(grid.layer_count(), 1);
        assert_eq!(rasterizer.calls.len(), 4);
        let coords = grid.layer(0).resolved().to_vec();
        for (i, coord) in coords.iter().enumerate() {
            assert_eq!(coord.advance(), 1, "cell {}", i);
            // Cell/cache consistency.
            let expected = atlas.caches[0].get(grid.layer(0).pending()[i].code());
            assert_eq!(*coord, expected);
        }
        let distinct: AHashSet<u32> = coords.iter().map(|c| c.as_u32()).collect();
        assert_eq!(distinct.len(), 4);

        // A second resolve is pure cache hits.
        atlas.resolve(&mut grid, &mut rasterizer);
        assert_eq!(rasterizer.calls.len(), 4);
        assert_eq!(grid.layer(0).resolved(), coords.as_slice());
    }

    #[test]
    fn erased_and_filler_cells_stay_empty() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        let mut grid = ScreenGrid::new();
        grid.ensure(2, 1, 1);
        grid.write_glyph(0, 0, word('W'), Rgb::default(), Rgb::default(), LineFlags::empty());
        grid.layers[0].pending[1] = GlyphWord::new(FULLWIDTH_FILLER, Style::Normal);

        atlas.resolve(&mut grid, &mut rasterizer);

        assert_eq!(rasterizer.calls, vec!['W']);
        assert!(grid.layer(0).resolved()[1].is_empty());
    }

    #[test]
    fn first_insert_sizes_atlas_and_reserves_origin() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        let coord = atlas.lookup(&mut rasterizer, word('A'), &mut []);

        // next_power_of_two(max(8, 16) * 16)
        assert_eq!(atlas.width(), 256);
        assert_eq!(atlas.height(), 256);
        // Row 0 starts at column 1; (0, 0) is the empty sentinel.
        assert_eq!((coord.col(), coord.row(), coord.advance()), (1, 0, 1));

        let updates = atlas.take_updates();
        assert!(updates.resized);
        assert!(updates.rects.is_empty());
    }

    #[test]
    fn growth_preserves_coordinates_and_pixels() {
        // 128x128 initially: 16 columns x 16 rows of 8x8 cells.
        let mut atlas = atlas(8, 8, 4096);
        let mut rasterizer = MockRasterizer::new(8, 8);

        let a = atlas.lookup(&mut rasterizer, word('A'), &mut []);
        assert_eq!(atlas.width(), 128);

        // 16 * 16 slots minus the reserved origin.
        let capacity = 16 * 16 - 1;
        for i in 1..capacity {
            let ch = char::from_u32(0x100 + i as u32).unwrap();
            let coord = atlas.lookup(&mut rasterizer, word(ch), &mut []);
            assert!(!coord.is_empty());
        }
        assert_eq!(atlas.width(), 128);

        // One more forces a doubling.
        let overflow = atlas.lookup(&mut rasterizer, word('\u{3000}'), &mut []);
        assert_eq!(atlas.width(), 256);
        assert!(!overflow.is_empty());

        // Coordinates survived and so did the pixels under them.
        assert_eq!(atlas.lookup(&mut rasterizer, word('A'), &mut []), a);
        let x = (a.col() * 8) as usize;
        let y = (a.row() * 8) as usize;
        assert_eq!(atlas.pixels()[y * atlas.width() as usize + x], fill_byte('A'));
    }

    #[test]
    fn fresh_glyph_rects_reported_between_frames() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);

        atlas.lookup(&mut rasterizer, word('A'), &mut []);
        // First frame reallocated the texture.
        assert!(atlas.take_updates().resized);

        let b = atlas.lookup(&mut rasterizer, word('B'), &mut []);
        let updates = atlas.take_updates();
        assert!(!updates.resized);
        assert_eq!(
            updates.rects,
            vec![AtlasRect { x: b.col() * 8, y: 0, width: 8, height: 16 }]
        );
    }

    #[test]
    fn wide_glyphs_take_two_columns() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        rasterizer.wide.push('\u{5B57}');

        let wide = atlas.lookup(&mut rasterizer, word('\u{5B57}'), &mut []);
        assert_eq!(wide.advance(), 2);
        assert_eq!((wide.col(), wide.row()), (1, 0));

        let next = atlas.lookup(&mut rasterizer, word('x'), &mut []);
        assert_eq!((next.col(), next.row()), (3, 0));
    }

    #[test]
    fn zero_width_bitmap_still_occupies_a_slot() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        rasterizer.zero.push(' ');

        let space = atlas.lookup(&mut rasterizer, word(' '), &mut []);
        assert_eq!(space.advance(), 1);
        assert!(!space.is_empty());

        // Cached: no second rasterization.
        atlas.lookup(&mut rasterizer, word(' '), &mut []);
        assert_eq!(rasterizer.calls, vec![' ']);
    }

    #[test]
    fn rasterization_failure_is_not_cached() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        rasterizer.fail.push('A');

        assert!(atlas.lookup(&mut rasterizer, word('A'), &mut []).is_empty());
        assert!(atlas.lookup(&mut rasterizer, word('A'), &mut []).is_empty());
        assert_eq!(rasterizer.calls, vec!['A', 'A']);
    }

    #[test]
    fn supplementary_plane_fallback() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        rasterizer.supplementary = false;

        let emoji = atlas.lookup(&mut rasterizer, word('\u{1F600}'), &mut []);
        assert_eq!(rasterizer.calls, vec!['?']);

        // Both resolve to the same cached slot.
        let question = atlas.lookup(&mut rasterizer, word('?'), &mut []);
        assert_eq!(emoji, question);
        assert_eq!(rasterizer.calls.len(), 1);
    }

    #[test]
    fn reset_caches_forces_rerasterization() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);

        atlas.lookup(&mut rasterizer, word('A'), &mut []);
        atlas.reset_caches();
        atlas.lookup(&mut rasterizer, word('A'), &mut []);
        assert_eq!(rasterizer.calls, vec!['A', 'A']);
    }

    #[test]
    fn coordinates_are_injective_and_in_bounds() {
        let mut atlas = atlas(8, 16, 4096);
        let mut rasterizer = MockRasterizer::new(8, 16);
        rasterizer.wide.push('\u{4E00}');
        rasterizer.wide.push('\u{4E01}');

        let mut coords = Vec::new();
        for i in 0..40u32 {
            let ch = char::from_u32('0' as u32 + i).unwrap();
            coords.push(atlas.lookup(&mut rasterizer, word(ch), &mut []));
        }
        coords.push(atlas.lookup(&mut rasterizer, word('\u{4E00}'), &mut []));
        coords.push(atlas.lookup(&mut rasterizer, word('\u{4E01}'), &mut []));

        let distinct: AHashSet<u32> = coords.iter().map(|c| c.as_u32()).collect();
        assert_eq!(distinct.len(), coords.len());

        let cols = atlas.width() / 8;
        let rows = atlas.height() / 16;
        for coord in coords {
            assert!(coord.advance() >= 1);
            assert!(coord.col() + coord.advance() <= cols);
            assert!(coord.row() < rows);
        }
    }

    /// Eviction at the clamped maximum size, exercised through the real
    /// producer/renderer handoff so the live set comes from the renderer's
    /// snapshot, exactly as in two-thread operation.
    #[test]
    fn eviction_at_maximum_size() {
        // 40x40 texture of 8x40 cells: one row, four usable slots.
        let mut atlas = atlas(8, 40, 40);
        let mut rasterizer = MockRasterizer::new(8, 40);
        let handoff = Handoff::new();
        let mut locked = FrameState::default();

        let mut screen = ScreenGrid::new();
        screen.ensure(4, 1, 1);
        show(&mut screen, "ABCD");
        handoff.commit(&screen, Viewport::default(), None);
        assert!(handoff.acquire(&mut locked));
        atlas.resolve(&mut locked.grid, &mut rasterizer);

        let coords = locked.grid.layer(0).resolved().to_vec();
        assert!(coords.iter().all(|c| !c.is_empty()));
        assert_eq!(atlas.width(), 40);

        // Replace the contents: 'E' followed by spaces.
        show(&mut screen, "E   ");
        handoff.commit(&screen, Viewport::default(), None);
        assert!(handoff.acquire(&mut locked));
        atlas.resolve(&mut locked.grid, &mut rasterizer);

        // Nothing was live in the new snapshot, so A-D were evicted and 'E'
        // went into the first free slot after the reserved origin.
        let e = locked.grid.layer(0).resolved()[0];
        assert_eq!((e.col(), e.row(), e.advance()), (1, 0, 1));
        for ch in ['A', 'B', 'C', 'D'] {
            assert!(atlas.caches[0].get(ch as u32).is_empty(), "{} still cached", ch);
        }
        assert_eq!(atlas.caches[0].get('E' as u32), e);
        assert_eq!(atlas.caches[0].get(' ' as u32), locked.grid.layer(0).resolved()[1]);
    }

    #[test]
    fn compaction_keeps_live_glyphs_and_their_pixels() {
        let mut atlas = atlas(8, 40, 40);
        let mut rasterizer = MockRasterizer::new(8, 40);

        let mut grid = ScreenGrid::new();
        grid.ensure(2, 1, 1);
        show(&mut grid, "AB");
        atlas.resolve(&mut grid, &mut rasterizer);
        let a = grid.layer(0).resolved()[0];
        let b = grid.layer(0).resolved()[1];

        // Fill the remaining two slots with glyphs no cell references.
        atlas.lookup(&mut rasterizer, word('C'), &mut grid.layers);
        atlas.lookup(&mut rasterizer, word('D'), &mut grid.layers);

        // A fifth glyph triggers compaction; A and B are live via the grid.
        let e = atlas.lookup(&mut rasterizer, word('E'), &mut grid.layers);
        assert!(!e.is_empty());

        let a_new = atlas.caches[0].get('A' as u32);
        let b_new = atlas.caches[0].get('B' as u32);
        assert!(!a_new.is_empty());
        assert!(!b_new.is_empty());
        assert_eq!(grid.layer(0).resolved()[0], a_new);
        assert_eq!(grid.layer(0).resolved()[1], b_new);
        assert!(atlas.caches[0].get('C' as u32).is_empty());
        assert!(atlas.caches[0].get('D' as u32).is_empty());

        // Pixels moved with the glyphs.
        let x = (a_new.col() * 8) as usize;
        let y = (a_new.row() * 40) as usize;
        assert_eq!(atlas.pixels()[y * atlas.width() as usize + x], fill_byte('A'));
        let _ = (a, b);
    }

    #[test]
    fn exhausted_atlas_drops_the_new_glyph() {
        let mut atlas = atlas(8, 40, 40);
        let mut rasterizer = MockRasterizer::new(8, 40);

        let mut grid = ScreenGrid::new();
        grid.ensure(4, 1, 1);
        show(&mut grid, "ABCD");
        atlas.resolve(&mut grid, &mut rasterizer);

        // Every slot is live; the fifth glyph cannot be placed anywhere.
        grid.ensure(5, 1, 1);
        grid.write_glyph(0, 4, word('E'), Rgb::default(), Rgb::default(), LineFlags::empty());
        atlas.resolve(&mut grid, &mut rasterizer);

        assert!(grid.layer(0).resolved()[4].is_empty());
        assert!(atlas.caches[0].get('E' as u32).is_empty());
        // The survivors are intact.
        for (i, ch) in ['A', 'B', 'C', 'D'].into_iter().enumerate() {
            assert_eq!(grid.layer(0).resolved()[i], atlas.caches[0].get(ch as u32));
        }
    }

    #[test]
    fn oversized_advance_is_rejected_without_looping() {
        // Single-column atlas: a double-width glyph can never fit.
        let mut atlas = atlas(8, 8, 8);
        let mut rasterizer = MockRasterizer::new(8, 8);
        rasterizer.wide.push('\u{5B57}');

        assert!(atlas.lookup(&mut rasterizer, word('\u{5B57}'), &mut []).is_empty());
    }
}
