//! GL framebuffer objects.
//!
//! Each framebuffer owns one sampleable texture per color attachment.
//! When multisampling is requested, rendering goes into an MSAA
//! renderbuffer pair and `end` blits into the single-sampled resolve
//! textures, which are what attachment textures sample.

use std::sync::{Arc, Mutex};

use levikno_render::backend::{BackendFrameBuffer, BackendTexture, FrameBufferParts};
use levikno_render::framebuffer::FrameBufferCreateInfo;

use crate::image::GlTexture;

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::translate::*;

#[derive(Debug)]
pub struct GlFrameBufferData {
    pub fbo: GLuint,
    pub msaa_fbo: GLuint,
    pub width: u32,
    pub height: u32,
    pub samples: GLsizei,
    pub color_internal_formats: Vec<GLenum>,
    pub depth_format: Option<(GLenum, GLenum)>,
    /// Single-sampled, sampleable color textures (the resolve targets
    /// when multisampling).
    pub color_textures: Vec<GLuint>,
    pub msaa_color_renderbuffers: Vec<GLuint>,
    pub depth_renderbuffer: GLuint,
    pub msaa_depth_renderbuffer: GLuint,
    pub clear_colors: Vec<[f32; 4]>,
    pub min_filter: GLenum,
    pub mag_filter: GLenum,
    pub wrap: GLenum,
}

impl GlFrameBufferData {
    pub(crate) fn multisampled(&self) -> bool {
        self.samples > 1
    }

    pub(crate) fn sample_target_id(&self, index: usize) -> GLuint {
        self.color_textures.get(index).copied().unwrap_or(0)
    }

    /// The framebuffer draws go into.
    pub(crate) fn draw_fbo(&self) -> GLuint {
        if self.multisampled() {
            self.msaa_fbo
        } else {
            self.fbo
        }
    }
}

#[derive(Debug)]
pub struct GlFrameBuffer {
    pub data: Arc<Mutex<GlFrameBufferData>>,
}

impl BackendFrameBuffer for GlFrameBuffer {}

/// Creates the framebuffer payload plus one attachment-texture payload
/// per color attachment, all sharing the same inner state so resizes
/// propagate.
pub(crate) fn create_frame_buffer(gl: &Gl, info: &FrameBufferCreateInfo) -> FrameBufferParts {
    let data = Arc::new(Mutex::new(create_frame_buffer_data(gl, info)));
    let attachment_textures = (0..info.color_attachments.len())
        .map(|index| {
            Box::new(GlTexture::Attachment {
                data: data.clone(),
                index,
            }) as Box<dyn BackendTexture>
        })
        .collect();
    FrameBufferParts {
        framebuffer: Box::new(GlFrameBuffer { data }),
        attachment_textures,
    }
}

pub(crate) fn create_frame_buffer_data(gl: &Gl, info: &FrameBufferCreateInfo) -> GlFrameBufferData {
    let mut data = GlFrameBufferData {
        fbo: 0,
        msaa_fbo: 0,
        width: info.width,
        height: info.height,
        samples: info.sample_count.samples() as GLsizei,
        color_internal_formats: info
            .color_attachments
            .iter()
            .map(|a| color_format_to_gl(a.format, 4).0)
            .collect(),
        depth_format: info
            .depth_attachment
            .map(|d| (depth_format_to_gl(d.format), depth_attachment_point(d.format))),
        color_textures: Vec::new(),
        msaa_color_renderbuffers: Vec::new(),
        depth_renderbuffer: 0,
        msaa_depth_renderbuffer: 0,
        clear_colors: vec![[0.0; 4]; info.color_attachments.len()],
        min_filter: filter_to_gl(info.texture_filter),
        mag_filter: filter_to_gl(info.texture_filter),
        wrap: wrap_to_gl(info.texture_mode),
    };
    create_attachments(gl, &mut data);
    data
}

pub(crate) fn create_attachments(gl: &Gl, data: &mut GlFrameBufferData) {
    let (w, h) = (data.width as GLsizei, data.height as GLsizei);

    unsafe {
        gl.CreateFramebuffers(1, &mut data.fbo);
    }

    // sampleable single-sampled color textures
    for (index, &internal) in data.color_internal_formats.iter().enumerate() {
        let mut tex = 0;
        unsafe {
            gl.CreateTextures(gl::TEXTURE_2D, 1, &mut tex);
            gl.TextureStorage2D(tex, 1, internal, w, h);
            gl.TextureParameteri(tex, gl::TEXTURE_MIN_FILTER, data.min_filter as GLint);
            gl.TextureParameteri(tex, gl::TEXTURE_MAG_FILTER, data.mag_filter as GLint);
            gl.TextureParameteri(tex, gl::TEXTURE_WRAP_S, data.wrap as GLint);
            gl.TextureParameteri(tex, gl::TEXTURE_WRAP_T, data.wrap as GLint);
            gl.NamedFramebufferTexture(data.fbo, gl::COLOR_ATTACHMENT0 + index as u32, tex, 0);
        }
        data.color_textures.push(tex);
    }

    if let Some((internal, attach_point)) = data.depth_format {
        unsafe {
            gl.CreateRenderbuffers(1, &mut data.depth_renderbuffer);
            gl.NamedRenderbufferStorage(data.depth_renderbuffer, internal, w, h);
            gl.NamedFramebufferRenderbuffer(
                data.fbo,
                attach_point,
                gl::RENDERBUFFER,
                data.depth_renderbuffer,
            );
        }
    }

    let draw_buffers: Vec<GLenum> = (0..data.color_internal_formats.len())
        .map(|i| gl::COLOR_ATTACHMENT0 + i as u32)
        .collect();
    unsafe {
        gl.NamedFramebufferDrawBuffers(
            data.fbo,
            draw_buffers.len() as GLsizei,
            draw_buffers.as_ptr(),
        );
        let status = gl.CheckNamedFramebufferStatus(data.fbo, gl::DRAW_FRAMEBUFFER);
        if status != gl::FRAMEBUFFER_COMPLETE {
            log::error!(target: "levikno", "framebuffer incomplete: {:#x}", status);
        }
    }

    // MSAA pair rendered into and resolved at end
    if data.multisampled() {
        unsafe {
            gl.CreateFramebuffers(1, &mut data.msaa_fbo);
        }
        for (index, &internal) in data.color_internal_formats.iter().enumerate() {
            let mut rbo = 0;
            unsafe {
                gl.CreateRenderbuffers(1, &mut rbo);
                gl.NamedRenderbufferStorageMultisample(rbo, data.samples, internal, w, h);
                gl.NamedFramebufferRenderbuffer(
                    data.msaa_fbo,
                    gl::COLOR_ATTACHMENT0 + index as u32,
                    gl::RENDERBUFFER,
                    rbo,
                );
            }
            data.msaa_color_renderbuffers.push(rbo);
        }
        if let Some((internal, attach_point)) = data.depth_format {
            unsafe {
                gl.CreateRenderbuffers(1, &mut data.msaa_depth_renderbuffer);
                gl.NamedRenderbufferStorageMultisample(
                    data.msaa_depth_renderbuffer,
                    data.samples,
                    internal,
                    w,
                    h,
                );
                gl.NamedFramebufferRenderbuffer(
                    data.msaa_fbo,
                    attach_point,
                    gl::RENDERBUFFER,
                    data.msaa_depth_renderbuffer,
                );
            }
        }
        unsafe {
            gl.NamedFramebufferDrawBuffers(
                data.msaa_fbo,
                draw_buffers.len() as GLsizei,
                draw_buffers.as_ptr(),
            );
            let status = gl.CheckNamedFramebufferStatus(data.msaa_fbo, gl::DRAW_FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE {
                log::error!(target: "levikno", "MSAA framebuffer incomplete: {:#x}", status);
            }
        }
    }
}

pub(crate) fn destroy_attachments(gl: &Gl, data: &mut GlFrameBufferData) {
    unsafe {
        for tex in data.color_textures.drain(..) {
            gl.DeleteTextures(1, &tex);
        }
        for rbo in data.msaa_color_renderbuffers.drain(..) {
            gl.DeleteRenderbuffers(1, &rbo);
        }
        if data.depth_renderbuffer != 0 {
            gl.DeleteRenderbuffers(1, &data.depth_renderbuffer);
            data.depth_renderbuffer = 0;
        }
        if data.msaa_depth_renderbuffer != 0 {
            gl.DeleteRenderbuffers(1, &data.msaa_depth_renderbuffer);
            data.msaa_depth_renderbuffer = 0;
        }
        if data.fbo != 0 {
            gl.DeleteFramebuffers(1, &data.fbo);
            data.fbo = 0;
        }
        if data.msaa_fbo != 0 {
            gl.DeleteFramebuffers(1, &data.msaa_fbo);
            data.msaa_fbo = 0;
        }
    }
}

/// Recreates every attachment at the new size; formats, attachment count
/// and sample count carry over.
pub(crate) fn resize(gl: &Gl, data: &mut GlFrameBufferData, width: u32, height: u32) {
    destroy_attachments(gl, data);
    data.width = width;
    data.height = height;
    create_attachments(gl, data);
}

/// Binds the framebuffer for drawing, sets the viewport and clears every
/// attachment with its clear color.
pub(crate) fn begin(gl: &Gl, data: &GlFrameBufferData) {
    let fbo = data.draw_fbo();
    unsafe {
        gl.BindFramebuffer(gl::FRAMEBUFFER, fbo);
        gl.Viewport(0, 0, data.width as GLsizei, data.height as GLsizei);
        for (index, clear) in data.clear_colors.iter().enumerate() {
            gl.ClearNamedFramebufferfv(fbo, gl::COLOR, index as GLint, clear.as_ptr());
        }
        if data.depth_format.is_some() {
            let depth = 1.0f32;
            gl.ClearNamedFramebufferfv(fbo, gl::DEPTH, 0, &depth);
        }
    }
}

/// Resolves MSAA attachments into the sampleable textures and unbinds.
pub(crate) fn end(gl: &Gl, data: &GlFrameBufferData, window_dims: (i32, i32)) {
    if data.multisampled() {
        let (w, h) = (data.width as GLint, data.height as GLint);
        for index in 0..data.color_textures.len() {
            let attachment = gl::COLOR_ATTACHMENT0 + index as u32;
            unsafe {
                gl.NamedFramebufferReadBuffer(data.msaa_fbo, attachment);
                gl.NamedFramebufferDrawBuffers(data.fbo, 1, &attachment);
                gl.BlitNamedFramebuffer(
                    data.msaa_fbo,
                    data.fbo,
                    0,
                    0,
                    w,
                    h,
                    0,
                    0,
                    w,
                    h,
                    gl::COLOR_BUFFER_BIT,
                    gl::NEAREST,
                );
            }
        }
        // restore the resolve fbo's draw buffer set
        let draw_buffers: Vec<GLenum> = (0..data.color_textures.len())
            .map(|i| gl::COLOR_ATTACHMENT0 + i as u32)
            .collect();
        unsafe {
            gl.NamedFramebufferDrawBuffers(
                data.fbo,
                draw_buffers.len() as GLsizei,
                draw_buffers.as_ptr(),
            );
        }
    }
    unsafe {
        gl.BindFramebuffer(gl::FRAMEBUFFER, 0);
        gl.Viewport(0, 0, window_dims.0.max(0), window_dims.1.max(0));
    }
}
