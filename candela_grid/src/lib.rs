//! Core model for the candela display engine.
//!
//! Everything in this crate is independent of the GPU: the packed data
//! words shared with the shaders, the screen model with its glyph layers,
//! the glyph atlas with its CPU-side pixel store, the double-buffered
//! producer/renderer handoff, and the timer scheduler driving blinking.
//! The `candela` crate supplies the OpenGL half.

pub mod atlas;
pub mod cell;
pub mod config;
pub mod handoff;
pub mod packed;
pub mod rasterize;
pub mod scheduler;
pub mod screen;

pub use crate::atlas::GlyphAtlas;
pub use crate::handoff::{FrameState, Handoff};
pub use crate::screen::ScreenGrid;
