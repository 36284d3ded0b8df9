//! Cache of GL pipeline state to skip redundant state changes.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::pipeline::GlPipelineState;

#[derive(Default)]
pub struct StateCache {
    program: Option<GLuint>,
    vao: Option<GLuint>,
    depth_test: Option<bool>,
    depth_func: Option<GLenum>,
    depth_write: Option<bool>,
    blend: Option<bool>,
    blend_funcs: Option<(GLenum, GLenum, GLenum, GLenum)>,
    blend_eqs: Option<(GLenum, GLenum)>,
    cull: Option<Option<GLenum>>,
    front_face: Option<GLenum>,
    stencil_test: Option<bool>,
    line_width: Option<f32>,
}

impl StateCache {
    pub fn new() -> StateCache {
        StateCache::default()
    }

    /// Forgets everything; objects may have been deleted (which unbinds
    /// them behind the cache's back) between two command streams.
    pub fn invalidate(&mut self) {
        *self = StateCache::default();
    }

    pub(crate) fn set_program(&mut self, gl: &Gl, program: GLuint) {
        if self.program != Some(program) {
            unsafe { gl.UseProgram(program) };
            self.program = Some(program);
        }
    }

    pub(crate) fn set_vertex_array(&mut self, gl: &Gl, vao: GLuint) {
        if self.vao != Some(vao) {
            unsafe { gl.BindVertexArray(vao) };
            self.vao = Some(vao);
        }
    }

    fn set_enabled(gl: &Gl, cap: GLenum, cached: &mut Option<bool>, enabled: bool) {
        if *cached != Some(enabled) {
            unsafe {
                if enabled {
                    gl.Enable(cap);
                } else {
                    gl.Disable(cap);
                }
            }
            *cached = Some(enabled);
        }
    }

    /// Applies a pipeline's fixed-function snapshot.
    pub(crate) fn apply_pipeline_state(&mut self, gl: &Gl, state: &GlPipelineState) {
        Self::set_enabled(gl, gl::DEPTH_TEST, &mut self.depth_test, state.enable_depth);
        if state.enable_depth {
            if self.depth_func != Some(state.depth_func) {
                unsafe { gl.DepthFunc(state.depth_func) };
                self.depth_func = Some(state.depth_func);
            }
            if self.depth_write != Some(state.depth_write) {
                unsafe { gl.DepthMask(state.depth_write as GLboolean) };
                self.depth_write = Some(state.depth_write);
            }
        }

        Self::set_enabled(gl, gl::BLEND, &mut self.blend, state.enable_blend);
        if state.enable_blend {
            let funcs = (state.src_rgb, state.dst_rgb, state.src_alpha, state.dst_alpha);
            if self.blend_funcs != Some(funcs) {
                unsafe {
                    gl.BlendFuncSeparate(funcs.0, funcs.1, funcs.2, funcs.3);
                }
                self.blend_funcs = Some(funcs);
            }
            let eqs = (state.blend_eq_rgb, state.blend_eq_alpha);
            if self.blend_eqs != Some(eqs) {
                unsafe { gl.BlendEquationSeparate(eqs.0, eqs.1) };
                self.blend_eqs = Some(eqs);
            }
        }

        if self.cull != Some(state.cull) {
            unsafe {
                match state.cull {
                    Some(mode) => {
                        gl.Enable(gl::CULL_FACE);
                        gl.CullFace(mode);
                    }
                    None => gl.Disable(gl::CULL_FACE),
                }
            }
            self.cull = Some(state.cull);
        }
        if self.front_face != Some(state.front_face) {
            unsafe { gl.FrontFace(state.front_face) };
            self.front_face = Some(state.front_face);
        }

        Self::set_enabled(
            gl,
            gl::STENCIL_TEST,
            &mut self.stencil_test,
            state.enable_stencil,
        );
        if state.enable_stencil {
            unsafe {
                gl.StencilFunc(
                    state.stencil_func,
                    state.stencil_ref,
                    state.stencil_compare_mask,
                );
                gl.StencilMask(state.stencil_write_mask);
                gl.StencilOp(state.stencil_fail, state.stencil_depth_fail, state.stencil_pass);
            }
        }

        if self.line_width != Some(state.line_width) {
            unsafe { gl.LineWidth(state.line_width) };
            self.line_width = Some(state.line_width);
        }
    }
}
