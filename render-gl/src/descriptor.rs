//! Descriptor-set emulation.
//!
//! GL has no descriptor sets; each set keeps per-binding records that
//! `render_cmd_bind_descriptor_sets` turns into `glBindBufferRange` /
//! `glBindTextureUnit` calls. Bindless image arrays are backed by an SSBO
//! of `ARB_bindless_texture` handles whose residency is toggled when the
//! array is written.

use levikno_render::backend::{
    BackendDescriptorLayout, BackendDescriptorSet, DescriptorWrite, ResolvedDescriptorUpdate,
};
use levikno_render::descriptor::DescriptorLayout;

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::buffer::GlUniformBuffer;
use crate::image::GlTexture;

#[derive(Debug)]
pub struct GlDescriptorLayout;

impl BackendDescriptorLayout for GlDescriptorLayout {}

/// One buffer-range binding (`glBindBufferRange`).
#[derive(Copy, Clone, Debug)]
pub struct GlBufferBinding {
    pub binding: GLuint,
    pub target: GLenum,
    pub id: GLuint,
    pub offset: GLintptr,
    pub range: GLsizeiptr,
}

/// One combined-image-sampler binding (`glBindTextureUnit`).
#[derive(Copy, Clone, Debug)]
pub struct GlTextureBinding {
    pub unit: GLuint,
    pub id: GLuint,
    pub sampler: GLuint,
}

/// Bindless image array: an SSBO of 64-bit resident texture handles.
#[derive(Clone, Debug)]
pub struct GlBindlessBinding {
    pub binding: GLuint,
    pub ssbo: GLuint,
    pub handles: Vec<u64>,
}

#[derive(Debug)]
pub struct GlDescriptorSet {
    /// (binding, declared array length) copied from the layout.
    pub binding_counts: Vec<(u32, u32)>,
    pub buffers: Vec<GlBufferBinding>,
    pub textures: Vec<GlTextureBinding>,
    pub bindless: Vec<GlBindlessBinding>,
}

impl BackendDescriptorSet for GlDescriptorSet {}

impl GlDescriptorSet {
    pub(crate) fn new(layout: &DescriptorLayout) -> GlDescriptorSet {
        GlDescriptorSet {
            binding_counts: layout
                .bindings()
                .iter()
                .map(|b| (b.binding, b.descriptor_count))
                .collect(),
            buffers: Vec::new(),
            textures: Vec::new(),
            bindless: Vec::new(),
        }
    }

    fn declared_count(&self, binding: u32) -> u32 {
        self.binding_counts
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, count)| *count)
            .unwrap_or(1)
    }

    /// Applies updates; overwrites whatever was previously stored for the
    /// touched bindings.
    pub(crate) fn apply_updates(&mut self, gl: &Gl, updates: &[ResolvedDescriptorUpdate]) {
        for update in updates {
            match &update.write {
                DescriptorWrite::Buffer {
                    buffer,
                    offset,
                    range,
                } => {
                    let payload = buffer
                        .backend()
                        .downcast_ref::<GlUniformBuffer>()
                        .expect("uniform buffer payload does not belong to the OpenGL backend");
                    let range = if *range == 0 { payload.size } else { *range };
                    self.buffers.retain(|b| b.binding != update.binding);
                    self.buffers.push(GlBufferBinding {
                        binding: update.binding,
                        target: payload.target,
                        id: payload.ubo,
                        offset: *offset as GLintptr,
                        range: range as GLsizeiptr,
                    });
                }
                DescriptorWrite::Textures(textures) => {
                    if self.declared_count(update.binding) > 1 {
                        self.write_bindless(gl, update.binding, textures);
                    } else if let Some(texture) = textures.first() {
                        let payload = texture
                            .backend()
                            .downcast_ref::<GlTexture>()
                            .expect("texture payload does not belong to the OpenGL backend");
                        self.textures.retain(|t| t.unit != update.binding);
                        self.textures.push(GlTextureBinding {
                            unit: update.binding,
                            id: payload.resolve_id(),
                            sampler: payload.sampler_id(),
                        });
                    }
                }
            }
        }
    }

    fn write_bindless(
        &mut self,
        gl: &Gl,
        binding: u32,
        textures: &[&levikno_render::texture::Texture],
    ) {
        let entry = match self.bindless.iter_mut().find(|b| b.binding == binding) {
            Some(entry) => entry,
            None => {
                let mut ssbo = 0;
                unsafe {
                    gl.CreateBuffers(1, &mut ssbo);
                }
                self.bindless.push(GlBindlessBinding {
                    binding,
                    ssbo,
                    handles: Vec::new(),
                });
                self.bindless.last_mut().unwrap()
            }
        };

        entry.handles.clear();
        for texture in textures {
            let payload = texture
                .backend()
                .downcast_ref::<GlTexture>()
                .expect("texture payload does not belong to the OpenGL backend");
            let id = payload.resolve_id();
            unsafe {
                let handle = gl.GetTextureHandleARB(id);
                if gl.IsTextureHandleResidentARB(handle) == 0 {
                    gl.MakeTextureHandleResidentARB(handle);
                }
                entry.handles.push(handle);
            }
        }
        unsafe {
            gl.NamedBufferData(
                entry.ssbo,
                (entry.handles.len() * std::mem::size_of::<u64>()) as GLsizeiptr,
                entry.handles.as_ptr() as *const _,
                gl::DYNAMIC_DRAW,
            );
        }
    }

    pub(crate) fn destroy(&self, gl: &Gl) {
        for bindless in &self.bindless {
            unsafe {
                gl.DeleteBuffers(1, &bindless.ssbo);
            }
        }
    }
}

/// Flattened, resolved bind list captured when descriptor sets are bound
/// inside a command stream.
#[derive(Clone, Debug, Default)]
pub struct GlSetBinds {
    pub buffers: Vec<GlBufferBinding>,
    pub textures: Vec<GlTextureBinding>,
    pub bindless: Vec<(GLuint, GLuint)>,
}

impl GlSetBinds {
    pub(crate) fn gather(sets: &[&levikno_render::descriptor::DescriptorSet]) -> GlSetBinds {
        let mut binds = GlSetBinds::default();
        for set in sets {
            let payload = set
                .backend()
                .downcast_ref::<GlDescriptorSet>()
                .expect("descriptor set payload does not belong to the OpenGL backend");
            binds.buffers.extend_from_slice(&payload.buffers);
            binds.textures.extend_from_slice(&payload.textures);
            binds
                .bindless
                .extend(payload.bindless.iter().map(|b| (b.binding, b.ssbo)));
        }
        binds
    }

    pub(crate) fn issue(&self, gl: &Gl) {
        unsafe {
            for buffer in &self.buffers {
                gl.BindBufferRange(
                    buffer.target,
                    buffer.binding,
                    buffer.id,
                    buffer.offset,
                    buffer.range,
                );
            }
            for texture in &self.textures {
                gl.BindTextureUnit(texture.unit, texture.id);
                gl.BindSampler(texture.unit, texture.sampler);
            }
            for (binding, ssbo) in &self.bindless {
                gl.BindBufferBase(gl::SHADER_STORAGE_BUFFER, *binding, *ssbo);
            }
        }
    }
}
