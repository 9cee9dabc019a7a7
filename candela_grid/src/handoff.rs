//! Double-buffered state exchange between the producer thread and the
//! renderer thread.
//!
//! The producer deep-copies its live grids into the `submitted` buffer and
//! signals the renderer; the renderer swaps `submitted` with its privately
//! owned `locked` buffer and draws from that. Submitting only blocks for
//! the duration of the swap, never for a whole frame, and consecutive
//! commits the renderer never saw are coalesced.

use parking_lot::{Condvar, Mutex};

use crate::config::Viewport;
use crate::packed::Rgb;
use crate::screen::ScreenGrid;

/// One exchangeable frame snapshot.
#[derive(Debug, Default)]
pub struct FrameState {
    pub grid: ScreenGrid,
    pub viewport: Viewport,

    /// Highlight color for line decorations; `None` uses each cell's
    /// foreground.
    pub line_color: Option<Rgb>,
}

#[derive(Default)]
struct Submitted {
    frame: FrameState,
    updated: bool,
}

/// The mutex-and-condvar protected submission slot.
#[derive(Default)]
pub struct Handoff {
    submitted: Mutex<Submitted>,
    condvar: Condvar,
}

impl Handoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the producer's live state.
    ///
    /// Reconciles the submitted buffer's layer count and grid size against
    /// the live grid, then deep-copies colors, pending glyphs, viewport and
    /// highlight color. Existing allocations are reused when the
    /// dimensions have not changed.
    pub fn commit(&self, grid: &ScreenGrid, viewport: Viewport, line_color: Option<Rgb>) {
        let mut submitted = self.submitted.lock();
        submitted.frame.grid.copy_from(grid);
        submitted.frame.viewport = viewport;
        submitted.frame.line_color = line_color;
        submitted.updated = true;
        drop(submitted);
        self.condvar.notify_all();
    }

    /// Exchange `locked` for the most recent submission, waiting for one if
    /// necessary.
    ///
    /// Only the buffer handles move; no cell data is copied. Returns false
    /// when the waiting renderer was woken without a pending update, which
    /// is the cooperative quit signal.
    pub fn acquire(&self, locked: &mut FrameState) -> bool {
        let mut submitted = self.submitted.lock();
        if !submitted.updated {
            self.condvar.wait(&mut submitted);
            if !submitted.updated {
                return false;
            }
        }
        std::mem::swap(&mut submitted.frame, locked);
        submitted.updated = false;
        true
    }

    /// Wake a waiting renderer without submitting anything, asking it to
    /// quit.
    pub fn wake(&self) {
        self.condvar.notify_all();
    }
}
