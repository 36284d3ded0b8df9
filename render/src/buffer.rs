//! Vertex/index buffers and uniform/storage buffers.

use crate::vertex::{VertexAttribute, VertexBindingDescription};

bitflags::bitflags! {
    /// What a buffer object holds. Vertex/index bits are exclusive with
    /// uniform/storage bits: plain buffers carry geometry, uniform buffers
    /// carry shader-visible data.
    #[derive(Default)]
    pub struct BufferTypeFlags: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
    }
}

/// How buffer contents may change after creation. Writes after creation
/// require `Dynamic` or `Resize`; `Resize` additionally allows growing or
/// shrinking the allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
    Resize,
}

impl BufferUsage {
    pub fn writable(self) -> bool {
        matches!(self, BufferUsage::Dynamic | BufferUsage::Resize)
    }
}

#[derive(Clone, Debug)]
pub struct BufferCreateInfo<'a> {
    pub buffer_type: BufferTypeFlags,
    pub usage: BufferUsage,
    pub vertex_attributes: &'a [VertexAttribute],
    pub vertex_binding_descriptions: &'a [VertexBindingDescription],
    /// Initial vertex bytes; may be `None` only for dynamic/resize usage.
    pub vertex_data: Option<&'a [u8]>,
    /// Allocation size when `vertex_data` is `None`.
    pub vertex_buffer_size: u64,
    pub index_data: Option<&'a [u32]>,
    pub index_buffer_size: u64,
}

impl<'a> Default for BufferCreateInfo<'a> {
    fn default() -> Self {
        BufferCreateInfo {
            buffer_type: BufferTypeFlags::VERTEX,
            usage: BufferUsage::Static,
            vertex_attributes: &[],
            vertex_binding_descriptions: &[],
            vertex_data: None,
            vertex_buffer_size: 0,
            index_data: None,
            index_buffer_size: 0,
        }
    }
}

/// Pooled buffer object.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) buffer_type: BufferTypeFlags,
    pub(crate) usage: BufferUsage,
    pub(crate) vertex_size: u64,
    pub(crate) index_size: u64,
    pub(crate) backend: Box<dyn crate::backend::BackendBuffer>,
}

impl Buffer {
    pub fn buffer_type(&self) -> BufferTypeFlags {
        self.buffer_type
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn vertex_size(&self) -> u64 {
        self.vertex_size
    }

    pub fn index_size(&self) -> u64 {
        self.index_size
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendBuffer {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn crate::backend::BackendBuffer {
        self.backend.as_mut()
    }
}

/// Uniform (per-frame host-mapped ring) or storage (single buffer)
/// creation parameters.
#[derive(Clone, Debug)]
pub struct UniformBufferCreateInfo<'a> {
    pub buffer_type: BufferTypeFlags,
    pub binding: u32,
    pub size: u64,
    /// Written into every frame slot (or the storage buffer) at creation.
    pub initial_data: Option<&'a [u8]>,
}

impl<'a> Default for UniformBufferCreateInfo<'a> {
    fn default() -> Self {
        UniformBufferCreateInfo {
            buffer_type: BufferTypeFlags::UNIFORM,
            binding: 0,
            size: 0,
            initial_data: None,
        }
    }
}

/// Pooled uniform/storage buffer object.
#[derive(Debug)]
pub struct UniformBuffer {
    pub(crate) buffer_type: BufferTypeFlags,
    pub(crate) binding: u32,
    pub(crate) size: u64,
    pub(crate) backend: Box<dyn crate::backend::BackendUniformBuffer>,
}

impl UniformBuffer {
    pub fn buffer_type(&self) -> BufferTypeFlags {
        self.buffer_type
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendUniformBuffer {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn crate::backend::BackendUniformBuffer {
        self.backend.as_mut()
    }
}
