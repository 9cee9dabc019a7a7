//! The producer side of the engine: cell ingestion, cursor handling,
//! blinking, and frame submission.
//!
//! A [`Display`] carries all producer-side state: the live screen model,
//! the currently resolved colors and style, the blink phase, and the route
//! frames take to the GPU. In single-threaded mode it owns the [`Renderer`]
//! and draws directly; in two-thread mode it shares a [`Handoff`] with the
//! render thread.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use candela_grid::cell::{Attrs, CursorState, ScreenSource, SourceCell};
use candela_grid::config::{Options, Viewport};
use candela_grid::handoff::Handoff;
use candela_grid::packed::{GlyphWord, LineFlags, Rgb, Style};
use candela_grid::rasterize::{Palette, Rasterize};
use candela_grid::scheduler::{Scheduler, TimerId};
use candela_grid::screen::ScreenGrid;

use crate::event::{Event, EventPump, WindowEvent};
use crate::renderer::Renderer;

/// Where completed frames go.
pub enum DrawTarget<R: Rasterize> {
    /// Render on the calling thread.
    Direct(Renderer<R>),

    /// Submit to a render thread through the shared handoff.
    Threaded(Arc<Handoff>),
}

pub struct Display<P: Palette, R: Rasterize> {
    screen: ScreenGrid,
    palette: P,
    target: DrawTarget<R>,

    scheduler: Scheduler<Event>,
    blink_interval: Duration,
    blink_timer: Option<TimerId>,
    blinked_off: bool,

    /// Requested grid dimensions; the screen model is grown or cropped to
    /// these lazily, on the next write.
    cols: usize,
    lines: usize,

    active_attrs: Attrs,
    line_color_index: i32,
    viewport: Viewport,
    cursor: CursorState,

    // Attribute resolution state, valid for the current packet.
    cur_style: Style,
    cur_fg: Rgb,
    cur_bg: Rgb,
}

impl<P: Palette, R: Rasterize> Display<P, R> {
    pub fn new(options: &Options, palette: P, target: DrawTarget<R>) -> Self {
        Self {
            screen: ScreenGrid::new(),
            palette,
            target,
            scheduler: Scheduler::new(),
            blink_interval: options.blink_interval(),
            blink_timer: None,
            blinked_off: false,
            cols: 0,
            lines: 0,
            active_attrs: Attrs::empty(),
            line_color_index: 0,
            viewport: Viewport::default(),
            cursor: CursorState::default(),
            cur_style: Style::Normal,
            cur_fg: Rgb::default(),
            cur_bg: Rgb::default(),
        }
    }

    pub fn screen(&self) -> &ScreenGrid {
        &self.screen
    }

    pub fn blinked_off(&self) -> bool {
        self.blinked_off
    }

    /// Set the grid dimensions in cells.
    pub fn resize(&mut self, cols: usize, lines: usize) {
        self.cols = cols;
        self.lines = lines;
    }

    /// Set the target rectangle inside the default framebuffer.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Set which of bold/italic/blink are actually active system-wide.
    pub fn set_active_attrs(&mut self, attrs: Attrs) {
        self.active_attrs = attrs;
    }

    /// Set the highlight color index used for line decorations; values
    /// <= 0 use each cell's own foreground.
    pub fn set_line_color(&mut self, index: i32) {
        self.line_color_index = index;
    }

    /// Ingest `cells` at (`lineno`, `x`).
    ///
    /// The cells are scanned into runs of identical attribute words and
    /// each run is committed as one packet.
    pub fn transform_line(&mut self, lineno: usize, x: usize, cells: &[SourceCell]) {
        if cells.is_empty() {
            return;
        }

        let mut start = 0;
        let mut attr_word = cells[0].attr_word();
        for (i, cell) in cells.iter().enumerate().skip(1) {
            if cell.attr_word() != attr_word {
                self.new_packet(&cells[start..i], lineno, x + start);
                attr_word = cell.attr_word();
                start = i;
            }
        }
        self.new_packet(&cells[start..], lineno, x + start);
    }

    /// Write one run of identically attributed cells into the screen model.
    fn new_packet(&mut self, cells: &[SourceCell], lineno: usize, x: usize) {
        self.screen.ensure(self.cols, self.lines, 1);

        let attrs = cells[0].attrs;
        let blink = self.blinked_off
            && attrs.contains(Attrs::BLINK)
            && self.active_attrs.contains(Attrs::BLINK);

        self.set_attr(attrs, cells[0].pair);
        let flags = line_flags(attrs);

        for (j, cell) in cells.iter().enumerate() {
            let column = x + j;
            let ch = if blink { ' ' } else { cell.ch };

            self.screen.write_glyph(
                lineno,
                column,
                GlyphWord::from_char(ch, self.cur_style),
                self.cur_bg,
                self.cur_fg,
                flags,
            );

            if blink {
                continue;
            }
            if let Some(marks) = &cell.combining {
                for (layer, &mark) in marks.iter().enumerate() {
                    self.screen.write_combining(
                        lineno,
                        column,
                        layer + 1,
                        GlyphWord::from_char(mark, self.cur_style),
                    );
                }
            }
        }
    }

    /// Resolve the packet's style and colors from its attributes.
    fn set_attr(&mut self, attrs: Attrs, pair: u16) {
        let active = self.active_attrs;
        self.cur_style = Style::new(
            attrs.contains(Attrs::BOLD) && active.contains(Attrs::BOLD),
            attrs.contains(Attrs::ITALIC) && active.contains(Attrs::ITALIC),
        );

        let (mut fg, mut bg) = self.palette.pair(pair);

        // Without real bold or blink, fall back to the bright color block.
        if attrs.contains(Attrs::BOLD) && !active.contains(Attrs::BOLD) {
            fg |= 8;
        }
        if attrs.contains(Attrs::BLINK) && !active.contains(Attrs::BLINK) {
            bg |= 8;
        }

        if attrs.contains(Attrs::REVERSE) {
            mem::swap(&mut fg, &mut bg);
        }

        self.cur_fg = self.palette.color(fg.max(0));
        self.cur_bg = self.palette.color(bg.max(0));
    }

    /// Move the cursor: re-transform the previously occupied cell to clear
    /// the old overlay, mark the new cell, and submit.
    pub fn goto_yx<S: ScreenSource>(
        &mut self,
        line: usize,
        column: usize,
        visibility: u8,
        screen: &S,
    ) {
        let old = self.cursor;
        let (cols, lines) = screen.dims();
        if old.line < lines && old.column < cols {
            let src = screen.line(old.line);
            if old.column < src.len() {
                self.transform_line(old.line, old.column, &src[old.column..old.column + 1]);
            }
        }

        self.cursor = CursorState { line, column };
        if visibility > 0 {
            self.screen.write_cursor(line, column, visibility);
        }
        self.do_update();
    }

    /// Finish the pending updates and hand the frame to the renderer.
    pub fn do_update(&mut self) {
        self.screen.ensure(self.cols, self.lines, 1);
        self.screen.shrink_layers();

        let line_color = if self.line_color_index > 0 {
            Some(self.palette.color(self.line_color_index))
        } else {
            None
        };

        match &mut self.target {
            DrawTarget::Threaded(handoff) => {
                handoff.commit(&self.screen, self.viewport, line_color)
            },
            DrawTarget::Direct(renderer) => {
                renderer.draw(&mut self.screen, self.viewport, line_color)
            },
        }
    }

    /// Toggle the blink phase and re-submit every blinking segment.
    ///
    /// Also starts or stops the periodic blink timer depending on whether
    /// blinking is active at all.
    pub fn blink_text<S: ScreenSource>(&mut self, screen: &S) {
        if !self.active_attrs.contains(Attrs::BLINK) {
            if let Some(id) = self.blink_timer.take() {
                self.scheduler.unschedule(id);
            }
        } else if self.blink_timer.is_none() {
            let id = self.scheduler.schedule(Event::Blink, self.blink_interval, true, None);
            self.blink_timer = Some(id);
            self.blinked_off = true;
        }

        self.blinked_off = !self.blinked_off;

        let (cols, lines) = screen.dims();
        for lineno in 0..lines {
            let src = screen.line(lineno);
            let end = cols.min(src.len());
            let mut column = 0;
            while column < end {
                if !src[column].attrs.contains(Attrs::BLINK) {
                    column += 1;
                    continue;
                }
                let mut run_end = column;
                while run_end < end && src[run_end].attrs.contains(Attrs::BLINK) {
                    run_end += 1;
                }
                self.transform_line(lineno, column, &src[column..run_end]);
                column = run_end;
            }
        }

        self.do_update();
    }

    /// Run due timers; returns the next deadline, if any.
    pub fn process_timers<S: ScreenSource>(&mut self, screen: &S) -> Option<Instant> {
        let mut events = Vec::new();
        let next = self.scheduler.update(&mut events);
        for event in events {
            match event {
                Event::Blink => self.blink_text(screen),
            }
        }
        next
    }

    /// Poll one host event; expose-style notifications force a redraw.
    pub fn pump_and_peep<E: EventPump>(&mut self, pump: &mut E) {
        if let Some(event) = pump.peep() {
            if matches!(event, WindowEvent::Exposed | WindowEvent::Restored | WindowEvent::Shown) {
                pump.poll();
                self.do_update();
            }
        }
    }

    /// Ask a waiting render thread to quit. No-op in single-threaded mode.
    pub fn shutdown(&self) {
        if let DrawTarget::Threaded(handoff) = &self.target {
            handoff.wake();
        }
    }
}

fn line_flags(attrs: Attrs) -> LineFlags {
    let mut flags = LineFlags::empty();
    if attrs.contains(Attrs::UNDERLINE) {
        flags |= LineFlags::UNDERLINE;
    }
    if attrs.contains(Attrs::OVERLINE) {
        flags |= LineFlags::OVERLINE;
    }
    if attrs.contains(Attrs::STRIKEOUT) {
        flags |= LineFlags::STRIKEOUT;
    }
    if attrs.contains(Attrs::LEFT_LINE) {
        flags |= LineFlags::LEFT_LINE;
    }
    if attrs.contains(Attrs::RIGHT_LINE) {
        flags |= LineFlags::RIGHT_LINE;
    }
    flags
}
