//! GL buffer objects.

use levikno_render::backend::{BackendBuffer, BackendUniformBuffer};
use levikno_render::buffer::{BufferCreateInfo, BufferTypeFlags, BufferUsage, UniformBufferCreateInfo};

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;

/// Vertex and index data live in separate named buffer objects.
#[derive(Debug)]
pub struct GlBuffer {
    pub vbo: GLuint,
    pub ibo: GLuint,
}

impl BackendBuffer for GlBuffer {}

impl GlBuffer {
    pub(crate) fn new(gl: &Gl, info: &BufferCreateInfo) -> GlBuffer {
        let usage = match info.usage {
            BufferUsage::Static => gl::STATIC_DRAW,
            BufferUsage::Dynamic | BufferUsage::Resize => gl::DYNAMIC_DRAW,
        };

        let mut vbo = 0;
        unsafe {
            gl.CreateBuffers(1, &mut vbo);
            match info.vertex_data {
                Some(data) => gl.NamedBufferData(
                    vbo,
                    data.len() as GLsizeiptr,
                    data.as_ptr() as *const _,
                    usage,
                ),
                None => gl.NamedBufferData(
                    vbo,
                    info.vertex_buffer_size as GLsizeiptr,
                    std::ptr::null(),
                    usage,
                ),
            }
        }

        let mut ibo = 0;
        if info.buffer_type.contains(BufferTypeFlags::INDEX) {
            unsafe {
                gl.CreateBuffers(1, &mut ibo);
                match info.index_data {
                    Some(indices) => gl.NamedBufferData(
                        ibo,
                        (indices.len() * 4) as GLsizeiptr,
                        indices.as_ptr() as *const _,
                        usage,
                    ),
                    None => gl.NamedBufferData(
                        ibo,
                        info.index_buffer_size as GLsizeiptr,
                        std::ptr::null(),
                        usage,
                    ),
                }
            }
        }

        GlBuffer { vbo, ibo }
    }

    pub(crate) fn destroy(&self, gl: &Gl) {
        unsafe {
            gl.DeleteBuffers(1, &self.vbo);
            if self.ibo != 0 {
                gl.DeleteBuffers(1, &self.ibo);
            }
        }
    }
}

/// Uniform or shader-storage buffer; a single object on GL, updated with
/// `glNamedBufferSubData`.
#[derive(Debug)]
pub struct GlUniformBuffer {
    pub ubo: GLuint,
    /// `UNIFORM_BUFFER` or `SHADER_STORAGE_BUFFER`.
    pub target: GLenum,
    pub size: u64,
}

impl BackendUniformBuffer for GlUniformBuffer {}

impl GlUniformBuffer {
    pub(crate) fn new(gl: &Gl, info: &UniformBufferCreateInfo) -> GlUniformBuffer {
        let target = if info.buffer_type.contains(BufferTypeFlags::STORAGE) {
            gl::SHADER_STORAGE_BUFFER
        } else {
            gl::UNIFORM_BUFFER
        };
        let mut ubo = 0;
        unsafe {
            gl.CreateBuffers(1, &mut ubo);
            let data_ptr = info
                .initial_data
                .map(|d| d.as_ptr() as *const _)
                .unwrap_or(std::ptr::null());
            gl.NamedBufferData(ubo, info.size as GLsizeiptr, data_ptr, gl::DYNAMIC_DRAW);
        }
        GlUniformBuffer {
            ubo,
            target,
            size: info.size,
        }
    }

    pub(crate) fn destroy(&self, gl: &Gl) {
        unsafe {
            gl.DeleteBuffers(1, &self.ubo);
        }
    }
}
