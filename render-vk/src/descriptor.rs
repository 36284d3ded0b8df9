//! Descriptor layouts, pools and per-frame descriptor sets.
//!
//! Each layout owns a descriptor pool sized by its `max_sets`. A
//! descriptor set is one `vk::DescriptorSet` per frame in flight, so
//! per-frame uniform ring slots can be bound without rewriting between
//! frames: slot _i_ of a ring backs set _i_.

use ash::vk;
use levikno_render::backend::{
    BackendDescriptorLayout, BackendDescriptorSet, DescriptorWrite, ResolvedDescriptorUpdate,
};
use levikno_render::descriptor::{DescriptorLayout, DescriptorLayoutCreateInfo};
use levikno_render::error::{Error, Result};
use smallvec::SmallVec;

use crate::buffer::VkUniformBuffer;
use crate::device::DeviceState;
use crate::image::VkTexture;
use crate::translate::*;

#[derive(Debug)]
pub struct VkDescriptorLayout {
    pub layout: vk::DescriptorSetLayout,
    pub pool: vk::DescriptorPool,
}

impl BackendDescriptorLayout for VkDescriptorLayout {}

impl VkDescriptorLayout {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            // frees every set allocated from the pool
            device.destroy_descriptor_pool(self.pool, None);
            device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

pub(crate) fn create_descriptor_layout(
    state: &DeviceState,
    info: &DescriptorLayoutCreateInfo,
    max_frames_in_flight: u32,
) -> Result<VkDescriptorLayout> {
    let device = &state.device;
    let frames = max_frames_in_flight.max(1);

    let bindings: SmallVec<[vk::DescriptorSetLayoutBinding; 8]> = info
        .bindings
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding.binding)
                .descriptor_type(descriptor_type_to_vk(binding.descriptor_type))
                .descriptor_count(binding.descriptor_count.max(1))
                .stage_flags(shader_stage_to_vk(binding.shader_stage))
                .build()
        })
        .collect();

    let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
    let layout = unsafe {
        device
            .create_descriptor_set_layout(&layout_info, None)
            .map_err(|err| {
                Error::Failure(format!("descriptor set layout creation failed: {}", err))
            })?
    };

    // pool sized for max_sets logical sets, each expanded per frame
    let mut pool_sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in info.bindings {
        let ty = descriptor_type_to_vk(binding.descriptor_type);
        let count =
            binding.descriptor_count.max(1) * binding.max_allocations.max(1) * frames;
        match pool_sizes.iter_mut().find(|size| size.ty == ty) {
            Some(size) => size.descriptor_count += count,
            None => pool_sizes.push(vk::DescriptorPoolSize {
                ty,
                descriptor_count: count,
            }),
        }
    }

    let pool_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(info.max_sets.max(1) * frames)
        .pool_sizes(&pool_sizes);
    let pool = unsafe {
        device.create_descriptor_pool(&pool_info, None).map_err(|err| {
            device.destroy_descriptor_set_layout(layout, None);
            Error::Failure(format!("descriptor pool creation failed: {}", err))
        })?
    };

    Ok(VkDescriptorLayout { layout, pool })
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct VkDescriptorSet {
    /// One native set per frame in flight.
    pub sets: Vec<vk::DescriptorSet>,
}

impl BackendDescriptorSet for VkDescriptorSet {}

impl VkDescriptorSet {
    pub(crate) fn set_for_frame(&self, frame: usize) -> vk::DescriptorSet {
        self.sets[frame % self.sets.len()]
    }
}

pub(crate) fn allocate_descriptor_set(
    state: &DeviceState,
    layout: &DescriptorLayout,
    max_frames_in_flight: u32,
) -> Result<VkDescriptorSet> {
    let payload = layout
        .backend()
        .downcast_ref::<VkDescriptorLayout>()
        .expect("descriptor layout payload does not belong to the Vulkan backend");
    let frames = max_frames_in_flight.max(1) as usize;
    let layouts = vec![payload.layout; frames];
    let alloc_info = vk::DescriptorSetAllocateInfo::builder()
        .descriptor_pool(payload.pool)
        .set_layouts(&layouts);
    let sets = unsafe {
        state
            .device
            .allocate_descriptor_sets(&alloc_info)
            .map_err(|err| {
                Error::Failure(format!(
                    "descriptor set allocation failed (pool exhausted?): {}",
                    err
                ))
            })?
    };
    Ok(VkDescriptorSet { sets })
}

/// Applies updates to every frame's native set. Uniform-ring buffers bind
/// frame _i_'s slot into set _i_.
pub(crate) fn update_descriptor_sets(
    state: &DeviceState,
    payload: &VkDescriptorSet,
    updates: &[ResolvedDescriptorUpdate],
) -> Result<()> {
    for (frame, &set) in payload.sets.iter().enumerate() {
        // the write structs point into these arrays; pre-size them so
        // pushes never reallocate and move the data
        let mut buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> =
            Vec::with_capacity(updates.len());
        let mut image_infos: Vec<Vec<vk::DescriptorImageInfo>> = Vec::with_capacity(updates.len());
        let mut writes: Vec<vk::WriteDescriptorSet> = Vec::with_capacity(updates.len());

        for update in updates {
            match &update.write {
                DescriptorWrite::Buffer {
                    buffer,
                    offset,
                    range,
                } => {
                    let ring = buffer
                        .backend()
                        .downcast_ref::<VkUniformBuffer>()
                        .expect("uniform buffer payload does not belong to the Vulkan backend");
                    let range = if *range == 0 {
                        ring.aligned_size
                    } else {
                        *range
                    };
                    buffer_infos.push([vk::DescriptorBufferInfo {
                        buffer: ring.allocation.buffer,
                        offset: ring.slot_offset(frame as u32) + offset,
                        range,
                    }]);
                    writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(set)
                            .dst_binding(update.binding)
                            .descriptor_type(descriptor_type_to_vk(update.descriptor_type))
                            .buffer_info(buffer_infos.last().unwrap())
                            .build(),
                    );
                }
                DescriptorWrite::Textures(textures) => {
                    let infos: Vec<vk::DescriptorImageInfo> = textures
                        .iter()
                        .map(|texture| {
                            let payload = texture
                                .backend()
                                .downcast_ref::<VkTexture>()
                                .expect("texture payload does not belong to the Vulkan backend");
                            let (view, sampler) = payload.descriptor_image();
                            vk::DescriptorImageInfo {
                                sampler,
                                image_view: view,
                                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                            }
                        })
                        .collect();
                    if infos.is_empty() {
                        continue;
                    }
                    image_infos.push(infos);
                    writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(set)
                            .dst_binding(update.binding)
                            .descriptor_type(descriptor_type_to_vk(update.descriptor_type))
                            .image_info(image_infos.last().unwrap())
                            .build(),
                    );
                }
            }
        }

        if !writes.is_empty() {
            unsafe {
                state.device.update_descriptor_sets(&writes, &[]);
            }
        }
    }
    Ok(())
}
