use std::ptr;

use crate::gl;
use crate::gl::types::*;

#[derive(Debug, Copy, Clone)]
pub enum PixelFormat {
    R8,
    RGBA8,
}

struct TextureFormat {
    internal: i32,
    format: u32,
    texel_type: u32,
}

fn gl_format(format: PixelFormat) -> TextureFormat {
    match format {
        PixelFormat::R8 => TextureFormat {
            internal: gl::R8 as i32,
            format: gl::RED,
            texel_type: gl::UNSIGNED_BYTE,
        },
        PixelFormat::RGBA8 => TextureFormat {
            internal: gl::RGBA8 as i32,
            format: gl::RGBA,
            texel_type: gl::UNSIGNED_BYTE,
        },
    }
}

pub unsafe fn create_texture(width: i32, height: i32, format: PixelFormat, linear: bool) -> GLuint {
    let mut id: GLuint = 0;
    let format = gl_format(format);
    let filter = if linear { gl::LINEAR } else { gl::NEAREST } as i32;

    gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);

    gl::GenTextures(1, &mut id);
    gl::BindTexture(gl::TEXTURE_2D, id);
    gl::TexImage2D(
        gl::TEXTURE_2D,
        0,
        format.internal,
        width,
        height,
        0,
        format.format,
        format.texel_type,
        ptr::null(),
    );

    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as i32);
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as i32);
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, filter);
    gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, filter);

    gl::BindTexture(gl::TEXTURE_2D, 0);
    id
}

/// Re-specify the full image of the bound texture.
pub unsafe fn upload_texture(
    width: i32,
    height: i32,
    format: PixelFormat,
    ptr: *const libc::c_void,
) {
    let format = gl_format(format);
    gl::TexImage2D(
        gl::TEXTURE_2D,
        0,
        format.internal,
        width,
        height,
        0,
        format.format,
        format.texel_type,
        ptr,
    );
}

/// Update a sub-rectangle of the bound texture from an image that is
/// `row_length` pixels wide.
pub unsafe fn upload_subtexture(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    row_length: i32,
    format: PixelFormat,
    ptr: *const libc::c_void,
) {
    let format = gl_format(format);
    gl::PixelStorei(gl::UNPACK_ROW_LENGTH, row_length);
    gl::TexSubImage2D(
        gl::TEXTURE_2D,
        0,
        x,
        y,
        width,
        height,
        format.format,
        format.texel_type,
        ptr,
    );
    gl::PixelStorei(gl::UNPACK_ROW_LENGTH, 0);
}
