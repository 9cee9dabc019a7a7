//! The frame pipeline: one instanced background draw plus one instanced
//! foreground draw per glyph layer, all geometry synthesized from the
//! instance id in the vertex stage.
//!
//! The CPU uploads two tightly packed buffers per frame (the color grid and
//! one layer's resolved glyph grid at a time); everything else lives in the
//! atlas texture. With bilinear interpolation and a scaling resize mode the
//! passes render into an intermediate target that is blitted to the
//! viewport with linear filtering, so glyph edges can blend across cell
//! boundaries.

pub mod shader;
mod texture;

use std::fmt;
use std::mem;
use std::os::raw::c_void;
use std::ptr;

use log::info;

use candela_grid::atlas::GlyphAtlas;
use candela_grid::config::{CellMetrics, Interpolation, Options, ResizeMode, Viewport};
use candela_grid::handoff::{FrameState, Handoff};
use candela_grid::packed::{CellColors, Rgb};
use candela_grid::rasterize::Rasterize;
use candela_grid::screen::ScreenGrid;

use crate::gl;
use crate::gl::types::*;

use self::shader::{ShaderError, ShaderProgram};
use self::texture::PixelFormat;

static BACKGROUND_SHADER_V: &str = include_str!("../../res/background.v.glsl");
static BACKGROUND_SHADER_F: &str = include_str!("../../res/background.f.glsl");
static FOREGROUND_SHADER_V: &str = include_str!("../../res/foreground.v.glsl");
static FOREGROUND_SHADER_F: &str = include_str!("../../res/foreground.f.glsl");

#[derive(Debug)]
pub enum Error {
    ShaderCreation(ShaderError),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ShaderCreation(err) => Some(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShaderCreation(err) => {
                write!(f, "There was an error initializing the shaders: {}", err)
            },
        }
    }
}

impl From<ShaderError> for Error {
    fn from(val: ShaderError) -> Self {
        Error::ShaderCreation(val)
    }
}

#[derive(Debug)]
struct BackgroundProgram {
    program: ShaderProgram,
    u_screen_size: GLint,
}

impl BackgroundProgram {
    fn new() -> Result<Self, ShaderError> {
        let program = ShaderProgram::new(BACKGROUND_SHADER_V, BACKGROUND_SHADER_F)?;
        Ok(Self { u_screen_size: program.get_uniform_location(c"screen_size")?, program })
    }
}

#[derive(Debug)]
struct ForegroundProgram {
    program: ShaderProgram,
    u_screen_size: GLint,
    u_glyph_size: GLint,
    u_fthick: GLint,
    u_line_color: GLint,
    u_atlas: GLint,
}

impl ForegroundProgram {
    fn new() -> Result<Self, ShaderError> {
        let program = ShaderProgram::new(FOREGROUND_SHADER_V, FOREGROUND_SHADER_F)?;
        Ok(Self {
            u_screen_size: program.get_uniform_location(c"screen_size")?,
            u_glyph_size: program.get_uniform_location(c"glyph_size")?,
            u_fthick: program.get_uniform_location(c"fthick")?,
            u_line_color: program.get_uniform_location(c"line_color")?,
            u_atlas: program.get_uniform_location(c"atlas")?,
            program,
        })
    }
}

/// Off-screen color target used for bilinear scaling.
struct RenderTarget {
    texture: GLuint,
    width: i32,
    height: i32,
}

/// The render-thread half of the engine.
///
/// Owns the GL context's objects, the glyph atlas and the rasterizer; in
/// two-thread mode it additionally owns the `locked` frame snapshot. All
/// GPU resources are released on this object's teardown path only.
pub struct Renderer<R: Rasterize> {
    rasterizer: R,
    atlas: GlyphAtlas,
    locked: FrameState,

    metrics: CellMetrics,
    interpolation: Interpolation,
    resize_mode: ResizeMode,

    background: BackgroundProgram,
    foreground: ForegroundProgram,

    vao: GLuint,
    color_vbo: GLuint,
    glyph_vbo: GLuint,
    atlas_tex: GLuint,
    tex_fbo: GLuint,
    render_target: Option<RenderTarget>,
}

impl<R: Rasterize> Renderer<R> {
    /// Build the renderer on the thread that holds the GL context.
    ///
    /// `loader` resolves GL symbols, typically the context's
    /// `get_proc_address`.
    pub fn new<F>(
        options: &Options,
        metrics: CellMetrics,
        rasterizer: R,
        loader: F,
    ) -> Result<Self, Error>
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);

        let background = BackgroundProgram::new()?;
        let foreground = ForegroundProgram::new()?;

        let mut max_texture_size: GLint = 0;
        let mut vao: GLuint = 0;
        let mut color_vbo: GLuint = 0;
        let mut glyph_vbo: GLuint = 0;
        let mut tex_fbo: GLuint = 0;

        unsafe {
            gl::GetIntegerv(gl::MAX_TEXTURE_SIZE, &mut max_texture_size);

            // Depth is irrelevant.
            gl::DepthMask(gl::FALSE);

            gl::GenVertexArrays(1, &mut vao);
            gl::BindVertexArray(vao);

            // Per-instance cell colors: two packed words per cell.
            gl::GenBuffers(1, &mut color_vbo);
            gl::BindBuffer(gl::ARRAY_BUFFER, color_vbo);
            gl::VertexAttribIPointer(
                0,
                2,
                gl::UNSIGNED_INT,
                mem::size_of::<CellColors>() as i32,
                ptr::null(),
            );
            gl::EnableVertexAttribArray(0);
            gl::VertexAttribDivisor(0, 1);

            // Per-instance resolved atlas coordinate.
            gl::GenBuffers(1, &mut glyph_vbo);
            gl::BindBuffer(gl::ARRAY_BUFFER, glyph_vbo);
            gl::VertexAttribIPointer(1, 1, gl::UNSIGNED_INT, mem::size_of::<u32>() as i32, ptr::null());
            gl::EnableVertexAttribArray(1);
            gl::VertexAttribDivisor(1, 1);

            gl::GenFramebuffers(1, &mut tex_fbo);

            gl::BindVertexArray(0);
            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
        }

        info!("renderer initialized, max texture size {}", max_texture_size);

        Ok(Self {
            rasterizer,
            atlas: GlyphAtlas::new(metrics, max_texture_size),
            locked: FrameState::default(),
            metrics,
            interpolation: options.interpolation,
            resize_mode: options.resize,
            background,
            foreground,
            vao,
            color_vbo,
            glyph_vbo,
            atlas_tex: 0,
            tex_fbo,
            render_target: None,
        })
    }

    /// Render one frame in two-thread mode.
    ///
    /// Blocks on the handoff until the producer submits a frame. Returns
    /// false when woken without one, which is the quit signal.
    pub fn render_frame(&mut self, handoff: &Handoff) -> bool {
        if !handoff.acquire(&mut self.locked) {
            return false;
        }

        let mut frame = mem::take(&mut self.locked);
        self.draw(&mut frame.grid, frame.viewport, frame.line_color);
        self.locked = frame;
        true
    }

    /// Resolve and draw straight from a live grid (single-threaded mode).
    pub fn draw(&mut self, grid: &mut ScreenGrid, viewport: Viewport, line_color: Option<Rgb>) {
        {
            let Self { atlas, rasterizer, .. } = self;
            atlas.resolve(grid, rasterizer);
        }
        self.sync_atlas_texture();
        self.draw_passes(grid, viewport, line_color);
    }

    /// Push pending atlas pixel updates into the atlas texture.
    fn sync_atlas_texture(&mut self) {
        let updates = self.atlas.take_updates();
        if self.atlas.width() == 0 {
            return;
        }

        unsafe {
            if updates.resized || self.atlas_tex == 0 {
                if self.atlas_tex == 0 {
                    self.atlas_tex = texture::create_texture(
                        self.atlas.width(),
                        self.atlas.height(),
                        PixelFormat::R8,
                        false,
                    );
                }
                gl::BindTexture(gl::TEXTURE_2D, self.atlas_tex);
                gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
                texture::upload_texture(
                    self.atlas.width(),
                    self.atlas.height(),
                    PixelFormat::R8,
                    self.atlas.pixels().as_ptr() as *const _,
                );
            } else if !updates.rects.is_empty() {
                gl::BindTexture(gl::TEXTURE_2D, self.atlas_tex);
                gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
                for rect in &updates.rects {
                    let offset = (rect.y * self.atlas.width() + rect.x) as usize;
                    texture::upload_subtexture(
                        rect.x,
                        rect.y,
                        rect.width,
                        rect.height,
                        self.atlas.width(),
                        PixelFormat::R8,
                        self.atlas.pixels()[offset..].as_ptr() as *const _,
                    );
                }
            }
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
    }

    fn draw_passes(&mut self, grid: &ScreenGrid, viewport: Viewport, line_color: Option<Rgb>) {
        if grid.layer_count() == 0 {
            return;
        }

        let cols = grid.cols() as i32;
        let lines = grid.lines() as i32;
        let cells = cols * lines;
        let CellMetrics { width: fw, height: fh, thickness } = self.metrics;

        let use_target =
            self.interpolation == Interpolation::Bilinear && self.resize_mode != ResizeMode::Normal;

        unsafe {
            self.upload_stream(
                self.color_vbo,
                grid.colors().len() * mem::size_of::<CellColors>(),
                grid.colors().as_ptr() as *const _,
            );
            self.upload_stream(
                self.glyph_vbo,
                grid.layer(0).resolved().len() * mem::size_of::<u32>(),
                grid.layer(0).resolved().as_ptr() as *const _,
            );

            if use_target {
                let content_w = cols * fw;
                let content_h = lines * fh;
                self.ensure_render_target(content_w, content_h);
                let target = self.render_target.as_ref().map(|t| t.texture).unwrap_or(0);

                gl::BindFramebuffer(gl::FRAMEBUFFER, self.tex_fbo);
                gl::FramebufferTexture(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, target, 0);
                gl::Viewport(0, 0, content_w, content_h);
            } else {
                if let Some(target) = self.render_target.take() {
                    gl::DeleteTextures(1, &target.texture);
                }
                gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
                gl::Viewport(viewport.x, viewport.y, viewport.width, viewport.height);
            }

            gl::ClearColor(0.0, 0.0, 0.0, 0.0);
            gl::Clear(gl::COLOR_BUFFER_BIT);

            gl::BindVertexArray(self.vao);
            gl::ActiveTexture(gl::TEXTURE0);
            gl::BindTexture(gl::TEXTURE_2D, self.atlas_tex);

            // Background colors replace the destination outright.
            gl::Disable(gl::BLEND);
            gl::UseProgram(self.background.program.id());
            gl::Uniform2i(self.background.u_screen_size, cols, lines);
            gl::DrawArraysInstanced(gl::TRIANGLES, 0, 6, cells);

            // Foreground layers blend over it in order.
            gl::Enable(gl::BLEND);
            gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA);
            gl::UseProgram(self.foreground.program.id());
            gl::Uniform2i(self.foreground.u_screen_size, cols, lines);
            gl::Uniform2i(self.foreground.u_glyph_size, fw, fh);
            gl::Uniform1i(self.foreground.u_fthick, thickness);
            gl::Uniform1i(self.foreground.u_atlas, 0);
            match line_color {
                Some(color) => gl::Uniform3f(
                    self.foreground.u_line_color,
                    f32::from(color.r) / 255.0,
                    f32::from(color.g) / 255.0,
                    f32::from(color.b) / 255.0,
                ),
                None => gl::Uniform3f(self.foreground.u_line_color, -1.0, -1.0, -1.0),
            }

            for layer in 0..grid.layer_count() {
                if layer != 0 {
                    // Layer 0 went up before the background pass already.
                    self.upload_stream(
                        self.glyph_vbo,
                        grid.layer(layer).resolved().len() * mem::size_of::<u32>(),
                        grid.layer(layer).resolved().as_ptr() as *const _,
                    );
                }
                gl::DrawArraysInstanced(gl::TRIANGLES, 0, 6, cells);
            }

            if use_target {
                let (content_w, content_h) = self
                    .render_target
                    .as_ref()
                    .map(|t| (t.width, t.height))
                    .unwrap_or((0, 0));
                gl::BindFramebuffer(gl::READ_FRAMEBUFFER, self.tex_fbo);
                gl::BindFramebuffer(gl::DRAW_FRAMEBUFFER, 0);
                gl::BlitFramebuffer(
                    0,
                    0,
                    content_w,
                    content_h,
                    viewport.x,
                    viewport.y,
                    viewport.x + viewport.width,
                    viewport.y + viewport.height,
                    gl::COLOR_BUFFER_BIT,
                    gl::LINEAR,
                );
                gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
            }

            gl::BindVertexArray(0);
        }
    }

    unsafe fn upload_stream(&self, vbo: GLuint, bytes: usize, ptr: *const c_void) {
        gl::BindBuffer(gl::ARRAY_BUFFER, vbo);
        gl::BufferData(gl::ARRAY_BUFFER, bytes as isize, ptr, gl::STREAM_DRAW);
    }

    unsafe fn ensure_render_target(&mut self, width: i32, height: i32) {
        if let Some(target) = &self.render_target {
            if target.width == width && target.height == height {
                return;
            }
            gl::DeleteTextures(1, &target.texture);
        }

        let texture = texture::create_texture(width, height, PixelFormat::RGBA8, true);
        self.render_target = Some(RenderTarget { texture, width, height });
    }
}

impl<R: Rasterize> Drop for Renderer<R> {
    fn drop(&mut self) {
        unsafe {
            if let Some(target) = self.render_target.take() {
                gl::DeleteTextures(1, &target.texture);
            }
            if self.atlas_tex != 0 {
                gl::DeleteTextures(1, &self.atlas_tex);
            }
            gl::DeleteFramebuffers(1, &self.tex_fbo);
            gl::DeleteBuffers(1, &self.color_vbo);
            gl::DeleteBuffers(1, &self.glyph_vbo);
            gl::DeleteVertexArrays(1, &self.vao);
        }
    }
}
