//! Shader compilation and graphics pipelines.
//!
//! A pipeline owns the linked program, a VAO carrying the vertex
//! attribute formats (separate-format path, so vertex buffers bind
//! per-binding without rebuilding the VAO) and the fixed-function state
//! snapshot applied when the pipeline is bound.

use std::ffi::CString;
use std::fs;

use levikno_render::backend::{BackendPipeline, BackendShader, PipelineBackendCreateInfo};
use levikno_render::error::{Error, Result};
use levikno_render::pipeline::PipelineSpecification;
use levikno_render::shader::ShaderCreateInfo;
use smallvec::SmallVec;

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::translate::*;

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug)]
pub struct GlShader {
    pub vertex: GLuint,
    pub fragment: GLuint,
}

impl BackendShader for GlShader {}

impl GlShader {
    pub(crate) fn destroy(&self, gl: &Gl) {
        unsafe {
            gl.DeleteShader(self.vertex);
            gl.DeleteShader(self.fragment);
        }
    }
}

fn shader_info_log(gl: &Gl, obj: GLuint) -> String {
    unsafe {
        let mut log_size: GLint = 0;
        gl.GetShaderiv(obj, gl::INFO_LOG_LENGTH, &mut log_size);
        let mut log_buf = vec![0u8; log_size.max(1) as usize];
        let mut written: GLsizei = 0;
        gl.GetShaderInfoLog(
            obj,
            log_buf.len() as GLsizei,
            &mut written,
            log_buf.as_mut_ptr() as *mut GLchar,
        );
        log_buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&log_buf).into_owned()
    }
}

fn program_info_log(gl: &Gl, obj: GLuint) -> String {
    unsafe {
        let mut log_size: GLint = 0;
        gl.GetProgramiv(obj, gl::INFO_LOG_LENGTH, &mut log_size);
        let mut log_buf = vec![0u8; log_size.max(1) as usize];
        let mut written: GLsizei = 0;
        gl.GetProgramInfoLog(
            obj,
            log_buf.len() as GLsizei,
            &mut written,
            log_buf.as_mut_ptr() as *mut GLchar,
        );
        log_buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&log_buf).into_owned()
    }
}

fn compile_glsl(gl: &Gl, stage: GLenum, stage_name: &str, source: &[u8]) -> Result<GLuint> {
    unsafe {
        let obj = gl.CreateShader(stage);
        let sources = [source.as_ptr() as *const GLchar];
        let lengths = [source.len() as GLint];
        gl.ShaderSource(obj, 1, sources.as_ptr(), lengths.as_ptr());
        gl.CompileShader(obj);

        let mut status: GLint = 0;
        gl.GetShaderiv(obj, gl::COMPILE_STATUS, &mut status);
        if status != gl::TRUE as GLint {
            let info = shader_info_log(gl, obj);
            gl.DeleteShader(obj);
            return Err(Error::validation(format!(
                "{} shader compilation failed: {}",
                stage_name, info
            )));
        }
        Ok(obj)
    }
}

/// SPIR-V path: `glShaderBinary` + `glSpecializeShader` with entry point
/// `main`.
fn specialize_spirv(gl: &Gl, stage: GLenum, stage_name: &str, binary: &[u8]) -> Result<GLuint> {
    unsafe {
        let obj = gl.CreateShader(stage);
        gl.ShaderBinary(
            1,
            &obj,
            gl::SHADER_BINARY_FORMAT_SPIR_V,
            binary.as_ptr() as *const _,
            binary.len() as GLsizei,
        );
        let entry = CString::new("main").unwrap();
        gl.SpecializeShader(obj, entry.as_ptr(), 0, std::ptr::null(), std::ptr::null());

        let mut status: GLint = 0;
        gl.GetShaderiv(obj, gl::COMPILE_STATUS, &mut status);
        if status != gl::TRUE as GLint {
            let info = shader_info_log(gl, obj);
            gl.DeleteShader(obj);
            return Err(Error::validation(format!(
                "{} shader specialization failed: {}",
                stage_name, info
            )));
        }
        Ok(obj)
    }
}

fn looks_like_spirv(data: &[u8]) -> bool {
    data.len() >= 4 && u32::from_le_bytes([data[0], data[1], data[2], data[3]]) == SPIRV_MAGIC
}

fn compile_stage(gl: &Gl, stage: GLenum, stage_name: &str, source: &[u8]) -> Result<GLuint> {
    if looks_like_spirv(source) {
        specialize_spirv(gl, stage, stage_name, source)
    } else {
        compile_glsl(gl, stage, stage_name, source)
    }
}

pub(crate) fn create_shader_from_src(gl: &Gl, info: &ShaderCreateInfo) -> Result<GlShader> {
    let vertex = compile_stage(gl, gl::VERTEX_SHADER, "vertex", info.vertex_src.as_bytes())?;
    let fragment = match compile_stage(
        gl,
        gl::FRAGMENT_SHADER,
        "fragment",
        info.fragment_src.as_bytes(),
    ) {
        Ok(fragment) => fragment,
        Err(err) => {
            unsafe { gl.DeleteShader(vertex) };
            return Err(err);
        }
    };
    Ok(GlShader { vertex, fragment })
}

pub(crate) fn create_shader_from_files(gl: &Gl, info: &ShaderCreateInfo) -> Result<GlShader> {
    let vertex_src = fs::read(&info.vertex_src).map_err(|e| {
        Error::validation(format!("cannot read vertex shader file {}: {}", info.vertex_src, e))
    })?;
    let fragment_src = fs::read(&info.fragment_src).map_err(|e| {
        Error::validation(format!(
            "cannot read fragment shader file {}: {}",
            info.fragment_src, e
        ))
    })?;

    let vertex = compile_stage(gl, gl::VERTEX_SHADER, "vertex", &vertex_src)?;
    let fragment = match compile_stage(gl, gl::FRAGMENT_SHADER, "fragment", &fragment_src) {
        Ok(fragment) => fragment,
        Err(err) => {
            unsafe { gl.DeleteShader(vertex) };
            return Err(err);
        }
    };
    Ok(GlShader { vertex, fragment })
}

//--------------------------------------------------------------------------------------------------

/// Fixed-function snapshot translated to GL enums at pipeline creation.
#[derive(Copy, Clone, Debug)]
pub struct GlPipelineState {
    pub topology: GLenum,
    pub enable_depth: bool,
    pub depth_write: bool,
    pub depth_func: GLenum,
    pub enable_blend: bool,
    pub src_rgb: GLenum,
    pub dst_rgb: GLenum,
    pub src_alpha: GLenum,
    pub dst_alpha: GLenum,
    pub blend_eq_rgb: GLenum,
    pub blend_eq_alpha: GLenum,
    pub cull: Option<GLenum>,
    pub front_face: GLenum,
    pub enable_stencil: bool,
    pub stencil_func: GLenum,
    pub stencil_ref: GLint,
    pub stencil_compare_mask: GLuint,
    pub stencil_write_mask: GLuint,
    pub stencil_fail: GLenum,
    pub stencil_depth_fail: GLenum,
    pub stencil_pass: GLenum,
    pub line_width: f32,
}

pub(crate) fn translate_specification(spec: &PipelineSpecification) -> GlPipelineState {
    // GL applies one blend state to all draw buffers; the first
    // attachment's state wins
    let blend = spec
        .color_blend
        .attachments
        .first()
        .copied()
        .unwrap_or_default();
    let stencil = spec.depth_stencil.stencil_front;

    GlPipelineState {
        topology: topology_to_gl(spec.input_assembly.topology),
        enable_depth: spec.depth_stencil.enable_depth,
        depth_write: spec.depth_stencil.depth_write_enable || spec.depth_stencil.enable_depth,
        depth_func: compare_op_to_gl(spec.depth_stencil.depth_op_compare),
        enable_blend: blend.blend_enable,
        src_rgb: blend_factor_to_gl(blend.src_color_blend_factor),
        dst_rgb: blend_factor_to_gl(blend.dst_color_blend_factor),
        src_alpha: blend_factor_to_gl(blend.src_alpha_blend_factor),
        dst_alpha: blend_factor_to_gl(blend.dst_alpha_blend_factor),
        blend_eq_rgb: blend_op_to_gl(blend.color_blend_op),
        blend_eq_alpha: blend_op_to_gl(blend.alpha_blend_op),
        cull: cull_mode_to_gl(spec.rasterizer.cull_mode),
        front_face: front_face_to_gl(spec.rasterizer.front_face),
        enable_stencil: spec.depth_stencil.enable_stencil,
        stencil_func: compare_op_to_gl(stencil.compare_op),
        stencil_ref: stencil.reference as GLint,
        stencil_compare_mask: stencil.compare_mask,
        stencil_write_mask: stencil.write_mask,
        stencil_fail: stencil_op_to_gl(stencil.fail_op),
        stencil_depth_fail: stencil_op_to_gl(stencil.depth_fail_op),
        stencil_pass: stencil_op_to_gl(stencil.pass_op),
        line_width: spec.rasterizer.line_width.into_inner(),
    }
}

#[derive(Debug)]
pub struct GlPipeline {
    pub program: GLuint,
    pub vao: GLuint,
    pub state: GlPipelineState,
    /// Stride per vertex buffer binding slot, for
    /// `glVertexArrayVertexBuffer` at bind time.
    pub binding_strides: SmallVec<[GLsizei; 4]>,
}

impl BackendPipeline for GlPipeline {}

impl GlPipeline {
    pub(crate) fn destroy(&self, gl: &Gl) {
        unsafe {
            gl.DeleteProgram(self.program);
            gl.DeleteVertexArrays(1, &self.vao);
        }
    }
}

pub(crate) fn create_pipeline(gl: &Gl, info: &PipelineBackendCreateInfo) -> Result<GlPipeline> {
    let shader = info
        .shader
        .backend()
        .downcast_ref::<GlShader>()
        .expect("shader payload does not belong to the OpenGL backend");

    // the program keeps the linked stages alive; the shader object may be
    // destroyed right after this returns
    let program = unsafe {
        let program = gl.CreateProgram();
        gl.AttachShader(program, shader.vertex);
        gl.AttachShader(program, shader.fragment);
        gl.LinkProgram(program);

        let mut status: GLint = 0;
        gl.GetProgramiv(program, gl::LINK_STATUS, &mut status);
        if status != gl::TRUE as GLint {
            let info_log = program_info_log(gl, program);
            gl.DetachShader(program, shader.vertex);
            gl.DetachShader(program, shader.fragment);
            gl.DeleteProgram(program);
            return Err(Error::validation(format!(
                "shader program link failed: {}",
                info_log
            )));
        }
        gl.DetachShader(program, shader.vertex);
        gl.DetachShader(program, shader.fragment);
        program
    };

    // separate-format VAO: attribute formats fixed here, buffers attach
    // per binding at draw time
    let mut vao = 0;
    unsafe {
        gl.CreateVertexArrays(1, &mut vao);
        for attribute in info.vertex_attributes {
            let (gl_type, components, normalized) = vertex_data_type_to_gl(attribute.data_type);
            gl.EnableVertexArrayAttrib(vao, attribute.layout);
            match gl_type {
                gl::INT | gl::UNSIGNED_INT | gl::BYTE | gl::UNSIGNED_BYTE if !normalized => {
                    gl.VertexArrayAttribIFormat(
                        vao,
                        attribute.layout,
                        components,
                        gl_type,
                        attribute.offset,
                    );
                }
                gl::DOUBLE => {
                    gl.VertexArrayAttribLFormat(
                        vao,
                        attribute.layout,
                        components,
                        gl_type,
                        attribute.offset,
                    );
                }
                _ => {
                    gl.VertexArrayAttribFormat(
                        vao,
                        attribute.layout,
                        components,
                        gl_type,
                        normalized as GLboolean,
                        attribute.offset,
                    );
                }
            }
            gl.VertexArrayAttribBinding(vao, attribute.layout, attribute.binding);
        }
    }

    let mut binding_strides: SmallVec<[GLsizei; 4]> = SmallVec::new();
    for description in info.vertex_binding_descriptions {
        let slot = description.binding as usize;
        if binding_strides.len() <= slot {
            binding_strides.resize(slot + 1, 0);
        }
        binding_strides[slot] = description.stride as GLsizei;
    }

    Ok(GlPipeline {
        program,
        vao,
        state: translate_specification(info.specification),
        binding_strides,
    })
}
