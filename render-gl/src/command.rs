//! The typed command stream.
//!
//! Every `render_cmd_*` call becomes a [`GlCommand`]. In immediate mode
//! the command executes its GL calls at once; in deferred mode it is
//! appended to the window's stream and the whole stream is interpreted
//! sequentially at `render_end_command_recording`. Both modes run through
//! the same executor, which keeps them observationally equivalent.

use std::sync::{Arc, Mutex};

use levikno_render::backend::BackendWindow;
use smallvec::SmallVec;

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::descriptor::GlSetBinds;
use crate::framebuffer::{self, GlFrameBufferData};
use crate::pipeline::GlPipelineState;
use crate::state::StateCache;

#[derive(Clone, Debug)]
pub enum GlCommand {
    BeginRenderPass {
        width: i32,
        height: i32,
    },
    EndRenderPass,
    ClearColor([f32; 4]),
    BindPipeline {
        program: GLuint,
        vao: GLuint,
        state: GlPipelineState,
        strides: SmallVec<[GLsizei; 4]>,
    },
    BindVertexBuffer {
        vbo: GLuint,
    },
    BindIndexBuffer {
        ibo: GLuint,
    },
    BindDescriptorSets(GlSetBinds),
    Draw {
        vertices: u32,
    },
    DrawIndexed {
        indices: u32,
    },
    DrawInstanced {
        vertices: u32,
        instances: u32,
        first_instance: u32,
    },
    DrawIndexedInstanced {
        indices: u32,
        instances: u32,
        first_instance: u32,
    },
    SetStencilReference(u32),
    SetStencilMask {
        compare_mask: u32,
        write_mask: u32,
    },
    BeginFrameBuffer(Arc<Mutex<GlFrameBufferData>>),
    EndFrameBuffer(Arc<Mutex<GlFrameBufferData>>),
}

/// Per-window state threaded through command execution: the bound VAO and
/// topology come from the last bound pipeline.
#[derive(Debug)]
pub struct GlExecState {
    pub topology: GLenum,
    pub vao: GLuint,
    pub strides: SmallVec<[GLsizei; 4]>,
    pub window_dims: (i32, i32),
    pub stencil_func: GLenum,
    pub stencil_ref: GLint,
    pub stencil_compare_mask: GLuint,
    pub stencil_write_mask: GLuint,
}

impl Default for GlExecState {
    fn default() -> Self {
        GlExecState {
            topology: gl::TRIANGLES,
            vao: 0,
            strides: SmallVec::new(),
            window_dims: (0, 0),
            stencil_func: gl::ALWAYS,
            stencil_ref: 0,
            stencil_compare_mask: !0,
            stencil_write_mask: !0,
        }
    }
}

/// Backend payload of a window: the execution mode, the deferred stream
/// and the execution state.
#[derive(Debug)]
pub struct GlWindowData {
    pub deferred: bool,
    pub commands: Vec<GlCommand>,
    pub exec: GlExecState,
}

impl BackendWindow for GlWindowData {}

pub(crate) fn execute(gl: &Gl, cache: &mut StateCache, exec: &mut GlExecState, command: &GlCommand) {
    match command {
        GlCommand::BeginRenderPass { width, height } => unsafe {
            gl.BindFramebuffer(gl::FRAMEBUFFER, 0);
            gl.Viewport(0, 0, *width, *height);
            exec.window_dims = (*width, *height);
        },
        GlCommand::EndRenderPass => {}
        GlCommand::ClearColor([r, g, b, a]) => unsafe {
            gl.ClearColor(*r, *g, *b, *a);
            gl.Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        },
        GlCommand::BindPipeline {
            program,
            vao,
            state,
            strides,
        } => {
            cache.set_program(gl, *program);
            cache.set_vertex_array(gl, *vao);
            cache.apply_pipeline_state(gl, state);
            exec.topology = state.topology;
            exec.vao = *vao;
            exec.strides = strides.clone();
            exec.stencil_func = state.stencil_func;
            exec.stencil_ref = state.stencil_ref;
            exec.stencil_compare_mask = state.stencil_compare_mask;
            exec.stencil_write_mask = state.stencil_write_mask;
        }
        GlCommand::BindVertexBuffer { vbo } => unsafe {
            for (slot, stride) in exec.strides.iter().enumerate() {
                gl.VertexArrayVertexBuffer(exec.vao, slot as GLuint, *vbo, 0, *stride);
            }
        },
        GlCommand::BindIndexBuffer { ibo } => unsafe {
            gl.VertexArrayElementBuffer(exec.vao, *ibo);
        },
        GlCommand::BindDescriptorSets(binds) => {
            binds.issue(gl);
        }
        GlCommand::Draw { vertices } => unsafe {
            gl.DrawArrays(exec.topology, 0, *vertices as GLsizei);
        },
        GlCommand::DrawIndexed { indices } => unsafe {
            gl.DrawElements(
                exec.topology,
                *indices as GLsizei,
                gl::UNSIGNED_INT,
                std::ptr::null(),
            );
        },
        GlCommand::DrawInstanced {
            vertices,
            instances,
            first_instance,
        } => unsafe {
            gl.DrawArraysInstancedBaseInstance(
                exec.topology,
                0,
                *vertices as GLsizei,
                *instances as GLsizei,
                *first_instance,
            );
        },
        GlCommand::DrawIndexedInstanced {
            indices,
            instances,
            first_instance,
        } => unsafe {
            gl.DrawElementsInstancedBaseInstance(
                exec.topology,
                *indices as GLsizei,
                gl::UNSIGNED_INT,
                std::ptr::null(),
                *instances as GLsizei,
                *first_instance,
            );
        },
        GlCommand::SetStencilReference(reference) => unsafe {
            exec.stencil_ref = *reference as GLint;
            gl.StencilFunc(exec.stencil_func, exec.stencil_ref, exec.stencil_compare_mask);
        },
        GlCommand::SetStencilMask {
            compare_mask,
            write_mask,
        } => unsafe {
            exec.stencil_compare_mask = *compare_mask;
            exec.stencil_write_mask = *write_mask;
            gl.StencilFunc(exec.stencil_func, exec.stencil_ref, exec.stencil_compare_mask);
            gl.StencilMask(exec.stencil_write_mask);
        },
        GlCommand::BeginFrameBuffer(data) => {
            let data = data.lock().unwrap();
            framebuffer::begin(gl, &data);
        }
        GlCommand::EndFrameBuffer(data) => {
            let data = data.lock().unwrap();
            framebuffer::end(gl, &data, exec.window_dims);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // recording-side behavior of the deferred stream; execution needs a
    // live GL context and is covered by the examples
    #[test]
    fn deferred_stream_preserves_record_order() {
        let mut data = GlWindowData {
            deferred: true,
            commands: Vec::new(),
            exec: GlExecState::default(),
        };
        data.commands.push(GlCommand::BeginRenderPass {
            width: 800,
            height: 600,
        });
        data.commands.push(GlCommand::ClearColor([0.0, 0.0, 0.0, 1.0]));
        data.commands.push(GlCommand::Draw { vertices: 3 });
        data.commands.push(GlCommand::EndRenderPass);

        assert!(matches!(
            data.commands.as_slice(),
            [
                GlCommand::BeginRenderPass { .. },
                GlCommand::ClearColor(_),
                GlCommand::Draw { vertices: 3 },
                GlCommand::EndRenderPass,
            ]
        ));
    }
}
