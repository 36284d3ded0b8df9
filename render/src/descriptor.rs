//! Descriptor layouts, sets and update records.

use crate::buffer::UniformBuffer;
use crate::memory::Handle;
use crate::texture::Texture;

bitflags::bitflags! {
    #[derive(Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const ALL = Self::VERTEX.bits | Self::FRAGMENT.bits;
    }
}

/// Kinds of resources a descriptor binding can hold. A set's bound data
/// must structurally match the kind declared in its layout.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    CombinedImageSampler,
    SampledImage,
    Sampler,
}

impl DescriptorType {
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            DescriptorType::UniformBuffer | DescriptorType::StorageBuffer
        )
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            DescriptorType::CombinedImageSampler | DescriptorType::SampledImage
        )
    }
}

/// One binding slot in a descriptor layout.
#[derive(Copy, Clone, Debug)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    /// Array length of the binding (more than 1 for bindless image arrays).
    pub descriptor_count: u32,
    /// How many sets allocated from the layout may reference this binding.
    pub max_allocations: u32,
    pub shader_stage: ShaderStageFlags,
}

#[derive(Clone, Debug)]
pub struct DescriptorLayoutCreateInfo<'a> {
    pub bindings: &'a [DescriptorBinding],
    /// Sizes the layout's internal descriptor pool.
    pub max_sets: u32,
}

/// Data written into a descriptor set binding.
#[derive(Clone, Debug)]
pub enum DescriptorData {
    Buffer {
        buffer: Handle<UniformBuffer>,
        offset: u64,
        range: u64,
    },
    /// One or more textures; more than one only for array bindings.
    Textures(Vec<Handle<Texture>>),
}

/// One binding update passed to `update_descriptor_set_data`.
#[derive(Clone, Debug)]
pub struct DescriptorUpdateInfo {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub data: DescriptorData,
}

//--------------------------------------------------------------------------------------------------

/// Pooled descriptor layout object. Immutable; owns the backend-side
/// descriptor pool its sets are allocated from.
#[derive(Debug)]
pub struct DescriptorLayout {
    pub(crate) bindings: Vec<DescriptorBinding>,
    pub(crate) max_sets: u32,
    pub(crate) backend: Box<dyn crate::backend::BackendDescriptorLayout>,
}

impl DescriptorLayout {
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendDescriptorLayout {
        self.backend.as_ref()
    }
}

/// Pooled descriptor set object; allocated from a layout and updated
/// freely between frames.
#[derive(Debug)]
pub struct DescriptorSet {
    pub(crate) layout: Handle<DescriptorLayout>,
    /// Copy of the layout's binding kinds for structural validation.
    pub(crate) binding_types: Vec<(u32, DescriptorType)>,
    pub(crate) backend: Box<dyn crate::backend::BackendDescriptorSet>,
}

impl DescriptorSet {
    pub fn layout(&self) -> Handle<DescriptorLayout> {
        self.layout
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendDescriptorSet {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn crate::backend::BackendDescriptorSet {
        self.backend.as_mut()
    }

    pub(crate) fn binding_type(&self, binding: u32) -> Option<DescriptorType> {
        self.binding_types
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, t)| *t)
    }
}
