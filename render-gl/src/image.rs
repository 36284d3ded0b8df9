//! GL textures, samplers and cubemaps.

use std::sync::{Arc, Mutex};

use levikno_render::backend::{BackendCubemap, BackendSampler, BackendTexture};
use levikno_render::format::ImageData;
use levikno_render::texture::{CubemapCreateInfo, SamplerCreateInfo, TextureCreateInfo};

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::framebuffer::GlFrameBufferData;
use crate::translate::*;

#[derive(Debug)]
pub enum GlTexture {
    Image {
        id: GLuint,
        /// External sampler object bound alongside the texture, if any.
        sampler: GLuint,
    },
    /// Color attachment of a framebuffer; resolves its current texture id
    /// through the shared framebuffer state so resizes stay transparent.
    Attachment {
        data: Arc<Mutex<GlFrameBufferData>>,
        index: usize,
    },
}

impl BackendTexture for GlTexture {}

impl GlTexture {
    /// The texture object to bind right now.
    pub(crate) fn resolve_id(&self) -> GLuint {
        match self {
            GlTexture::Image { id, .. } => *id,
            GlTexture::Attachment { data, index } => {
                let data = data.lock().unwrap();
                data.sample_target_id(*index)
            }
        }
    }

    pub(crate) fn sampler_id(&self) -> GLuint {
        match self {
            GlTexture::Image { sampler, .. } => *sampler,
            GlTexture::Attachment { .. } => 0,
        }
    }

    pub(crate) fn destroy(&self, gl: &Gl) {
        if let GlTexture::Image { id, .. } = self {
            unsafe {
                gl.DeleteTextures(1, id);
            }
        }
        // attachment textures die with their framebuffer
    }
}

fn upload_texture(gl: &Gl, image: &ImageData, internal: GLenum, upload: GLenum) -> GLuint {
    let mut id = 0;
    unsafe {
        gl.CreateTextures(gl::TEXTURE_2D, 1, &mut id);
        let levels = mip_levels(image.width, image.height);
        gl.TextureStorage2D(
            id,
            levels,
            internal,
            image.width as GLsizei,
            image.height as GLsizei,
        );
        gl.PixelStorei(gl::UNPACK_ALIGNMENT, 1);
        gl.TextureSubImage2D(
            id,
            0,
            0,
            0,
            image.width as GLsizei,
            image.height as GLsizei,
            upload,
            gl::UNSIGNED_BYTE,
            image.pixels.as_ptr() as *const _,
        );
        gl.GenerateTextureMipmap(id);
    }
    id
}

fn mip_levels(width: u32, height: u32) -> GLsizei {
    (32 - width.max(height).max(1).leading_zeros()) as GLsizei
}

pub(crate) fn create_texture(gl: &Gl, info: &TextureCreateInfo) -> GlTexture {
    let (internal, upload) = color_format_to_gl(info.format, info.image.channels);
    let id = upload_texture(gl, &info.image, internal, upload);
    unsafe {
        gl.TextureParameteri(id, gl::TEXTURE_MIN_FILTER, min_filter_to_gl(info.min_filter) as GLint);
        gl.TextureParameteri(id, gl::TEXTURE_MAG_FILTER, filter_to_gl(info.mag_filter) as GLint);
        gl.TextureParameteri(id, gl::TEXTURE_WRAP_S, wrap_to_gl(info.wrap_s) as GLint);
        gl.TextureParameteri(id, gl::TEXTURE_WRAP_T, wrap_to_gl(info.wrap_t) as GLint);
    }
    GlTexture::Image { id, sampler: 0 }
}

pub(crate) fn create_texture_with_sampler(
    gl: &Gl,
    image: &ImageData,
    format: levikno_render::format::ColorImageFormat,
    sampler: GLuint,
) -> GlTexture {
    let (internal, upload) = color_format_to_gl(format, image.channels);
    let id = upload_texture(gl, image, internal, upload);
    GlTexture::Image { id, sampler }
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct GlSampler {
    pub id: GLuint,
}

impl BackendSampler for GlSampler {}

impl GlSampler {
    pub(crate) fn new(gl: &Gl, info: &SamplerCreateInfo) -> GlSampler {
        let mut id = 0;
        unsafe {
            gl.CreateSamplers(1, &mut id);
            gl.SamplerParameteri(id, gl::TEXTURE_MIN_FILTER, min_filter_to_gl(info.min_filter) as GLint);
            gl.SamplerParameteri(id, gl::TEXTURE_MAG_FILTER, filter_to_gl(info.mag_filter) as GLint);
            gl.SamplerParameteri(id, gl::TEXTURE_WRAP_S, wrap_to_gl(info.wrap_s) as GLint);
            gl.SamplerParameteri(id, gl::TEXTURE_WRAP_T, wrap_to_gl(info.wrap_t) as GLint);
            gl.SamplerParameteri(id, gl::TEXTURE_WRAP_R, wrap_to_gl(info.wrap_r) as GLint);
        }
        GlSampler { id }
    }

    pub(crate) fn destroy(&self, gl: &Gl) {
        unsafe {
            gl.DeleteSamplers(1, &self.id);
        }
    }
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct GlCubemap {
    pub id: GLuint,
}

impl BackendCubemap for GlCubemap {}

impl GlCubemap {
    pub(crate) fn new(gl: &Gl, info: &CubemapCreateInfo) -> GlCubemap {
        let faces = [
            &info.pos_x,
            &info.neg_x,
            &info.pos_y,
            &info.neg_y,
            &info.pos_z,
            &info.neg_z,
        ];
        let (width, height) = (info.pos_x.width, info.pos_x.height);
        let (internal, upload) = color_format_to_gl(
            levikno_render::format::ColorImageFormat::Rgba8,
            info.pos_x.channels,
        );

        let mut id = 0;
        unsafe {
            gl.CreateTextures(gl::TEXTURE_CUBE_MAP, 1, &mut id);
            gl.TextureStorage2D(id, 1, internal, width as GLsizei, height as GLsizei);
            gl.PixelStorei(gl::UNPACK_ALIGNMENT, 1);
            for (face, image) in faces.iter().enumerate() {
                gl.TextureSubImage3D(
                    id,
                    0,
                    0,
                    0,
                    face as GLint,
                    width as GLsizei,
                    height as GLsizei,
                    1,
                    upload,
                    gl::UNSIGNED_BYTE,
                    image.pixels.as_ptr() as *const _,
                );
            }
            gl.TextureParameteri(id, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
            gl.TextureParameteri(id, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
            gl.TextureParameteri(id, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);
            gl.TextureParameteri(id, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint);
            gl.TextureParameteri(id, gl::TEXTURE_WRAP_R, gl::CLAMP_TO_EDGE as GLint);
        }
        GlCubemap { id }
    }

    pub(crate) fn destroy(&self, gl: &Gl) {
        unsafe {
            gl.DeleteTextures(1, &self.id);
        }
    }
}
