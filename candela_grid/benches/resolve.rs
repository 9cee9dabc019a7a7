//! Full-frame throughput: every cell rewritten with random content, then
//! committed and resolved.

use std::fmt;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use candela_grid::atlas::GlyphAtlas;
use candela_grid::config::{CellMetrics, Viewport};
use candela_grid::handoff::{FrameState, Handoff};
use candela_grid::packed::{GlyphWord, LineFlags, Rgb, Style};
use candela_grid::rasterize::{GlyphKey, Rasterize, RasterizedGlyph};
use candela_grid::screen::ScreenGrid;

const COLS: usize = 132;
const LINES: usize = 43;

#[derive(Debug)]
struct NoGlyph;

impl fmt::Display for NoGlyph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no glyph")
    }
}

impl std::error::Error for NoGlyph {}

struct BenchRasterizer {
    fw: i32,
    fh: i32,
}

impl Rasterize for BenchRasterizer {
    type Err = NoGlyph;

    fn glyph(&mut self, key: GlyphKey) -> Result<RasterizedGlyph, NoGlyph> {
        Ok(RasterizedGlyph {
            width: self.fw,
            height: self.fh,
            buf: vec![(key.ch as u32 & 0xFF) as u8; (self.fw * self.fh) as usize],
        })
    }
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }
}

fn full_frame(c: &mut Criterion) {
    let mut atlas = GlyphAtlas::new(CellMetrics::new(8, 16), 4096);
    let mut rasterizer = BenchRasterizer { fw: 8, fh: 16 };
    let handoff = Handoff::new();
    let mut locked = FrameState::default();
    let mut grid = ScreenGrid::new();
    grid.ensure(COLS, LINES, 1);
    let mut rng = Lcg(0x5EED);

    c.bench_function("commit_and_resolve_full_grid", |b| {
        b.iter(|| {
            for line in 0..LINES {
                for column in 0..COLS {
                    let raw = rng.next();
                    let ch = char::from_u32('!' as u32 + raw % 94).unwrap();
                    let fg = Rgb::new(raw as u8, (raw >> 8) as u8, (raw >> 16) as u8);
                    grid.write_glyph(
                        line,
                        column,
                        GlyphWord::from_char(ch, Style::Normal),
                        Rgb::default(),
                        fg,
                        LineFlags::empty(),
                    );
                }
            }
            handoff.commit(&grid, Viewport::new(0, 0, 1056, 688), None);
            assert!(handoff.acquire(&mut locked));
            atlas.resolve(&mut locked.grid, &mut rasterizer);
            black_box(locked.grid.layer(0).resolved()[0])
        })
    });
}

criterion_group!(benches, full_frame);
criterion_main!(benches);
