//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// How frames make it from the cell grid to the GPU.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadingMode {
    /// The thread mutating cells also issues the GL calls.
    #[default]
    Single,

    /// A producer thread submits snapshots to a dedicated render thread.
    Threaded,
}

/// Filtering applied when the content size differs from the viewport.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
}

/// How the cell grid reacts to window resizes.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// The grid is re-dimensioned; content is drawn 1:1.
    #[default]
    Normal,

    /// The grid keeps its size and is scaled to the viewport.
    Stretch,

    /// Like `Stretch`, but only by whole-pixel factors.
    Integer,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Options {
    pub threading: ThreadingMode,
    pub interpolation: Interpolation,
    pub resize: ResizeMode,

    /// Blink phase length in milliseconds.
    pub blink_interval: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            threading: ThreadingMode::default(),
            interpolation: Interpolation::default(),
            resize: ResizeMode::default(),
            blink_interval: 500,
        }
    }
}

impl Options {
    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval)
    }
}

/// Pixel metrics of the character cell, fixed for the atlas lifetime.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
pub struct CellMetrics {
    /// Cell width in pixels.
    pub width: i32,

    /// Cell height in pixels; also the atlas row height.
    pub height: i32,

    /// Thickness of line decorations and the thin cursor.
    pub thickness: i32,
}

impl CellMetrics {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, thickness: (height / 16).max(1) }
    }
}

/// Target rectangle inside the default framebuffer, in pixels.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}
