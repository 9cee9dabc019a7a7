//! GPU-accelerated character cell display engine.
//!
//! The producer side ([`display::Display`]) turns host cell updates into
//! screen-model writes and submits frames; the renderer side
//! ([`renderer::Renderer`]) owns the OpenGL objects and turns submitted
//! frames into instanced draws. The data model lives in `candela_grid`.

pub mod display;
pub mod event;
pub mod renderer;

pub use crate::display::{Display, DrawTarget};
pub use crate::renderer::Renderer;

pub mod gl {
    #![allow(clippy::all)]
    #![allow(non_upper_case_globals)]
    include!(concat!(env!("OUT_DIR"), "/gl_bindings.rs"));
}
