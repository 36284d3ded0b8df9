//! Device memory and upload helpers.
//!
//! Buffers and images get dedicated allocations; uploads stage through a
//! transient host-visible buffer and a one-time command buffer on the
//! graphics queue.

use ash::vk;
use levikno_render::error::{Error, Result};

use crate::device::DeviceState;

pub(crate) fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Result<u32> {
    for index in 0..properties.memory_type_count {
        let supported = type_bits & (1 << index) != 0;
        let matches = properties.memory_types[index as usize]
            .property_flags
            .contains(flags);
        if supported && matches {
            return Ok(index);
        }
    }
    Err(Error::MemAllocFailure(format!(
        "no memory type matches bits {:#x} with flags {:?}",
        type_bits, flags
    )))
}

#[derive(Debug)]
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl AllocatedBuffer {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_buffer(self.buffer, None);
            device.free_memory(self.memory, None);
        }
    }
}

pub(crate) fn create_buffer(
    state: &DeviceState,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_flags: vk::MemoryPropertyFlags,
) -> Result<AllocatedBuffer> {
    let device = &state.device;
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size.max(1))
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);
    let buffer = unsafe {
        device
            .create_buffer(&buffer_info, None)
            .map_err(|err| Error::MemAllocFailure(format!("buffer creation failed: {}", err)))?
    };

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let memory_type = find_memory_type(
        &state.memory_properties,
        requirements.memory_type_bits,
        memory_flags,
    )?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory = unsafe {
        device.allocate_memory(&alloc_info, None).map_err(|err| {
            device.destroy_buffer(buffer, None);
            Error::MemAllocFailure(format!("buffer memory allocation failed: {}", err))
        })?
    };
    unsafe {
        device
            .bind_buffer_memory(buffer, memory, 0)
            .map_err(|err| Error::MemAllocFailure(format!("bind_buffer_memory failed: {}", err)))?;
    }

    Ok(AllocatedBuffer {
        buffer,
        memory,
        size: size.max(1),
    })
}

#[derive(Debug)]
pub struct AllocatedImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
}

impl AllocatedImage {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

pub(crate) fn create_image(
    state: &DeviceState,
    width: u32,
    height: u32,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    samples: vk::SampleCountFlags,
    array_layers: u32,
    cube_compatible: bool,
) -> Result<AllocatedImage> {
    let device = &state.device;
    let flags = if cube_compatible {
        vk::ImageCreateFlags::CUBE_COMPATIBLE
    } else {
        vk::ImageCreateFlags::empty()
    };
    let image_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width,
            height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(array_layers)
        .format(format)
        .tiling(vk::ImageTiling::OPTIMAL)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(usage)
        .samples(samples)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .flags(flags);
    let image = unsafe {
        device
            .create_image(&image_info, None)
            .map_err(|err| Error::MemAllocFailure(format!("image creation failed: {}", err)))?
    };

    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let memory_type = find_memory_type(
        &state.memory_properties,
        requirements.memory_type_bits,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type);
    let memory = unsafe {
        device.allocate_memory(&alloc_info, None).map_err(|err| {
            device.destroy_image(image, None);
            Error::MemAllocFailure(format!("image memory allocation failed: {}", err))
        })?
    };
    unsafe {
        device
            .bind_image_memory(image, memory, 0)
            .map_err(|err| Error::MemAllocFailure(format!("bind_image_memory failed: {}", err)))?;
    }

    Ok(AllocatedImage { image, memory })
}

//--------------------------------------------------------------------------------------------------

pub(crate) fn begin_single_time_commands(state: &DeviceState) -> Result<vk::CommandBuffer> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(state.upload_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);
    let command_buffer = unsafe {
        state
            .device
            .allocate_command_buffers(&alloc_info)
            .map_err(|err| Error::Failure(format!("command buffer allocation failed: {}", err)))?
            [0]
    };
    let begin_info =
        vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
    unsafe {
        state
            .device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|err| Error::Failure(format!("begin_command_buffer failed: {}", err)))?;
    }
    Ok(command_buffer)
}

pub(crate) fn end_single_time_commands(
    state: &DeviceState,
    command_buffer: vk::CommandBuffer,
) -> Result<()> {
    unsafe {
        state
            .device
            .end_command_buffer(command_buffer)
            .map_err(|err| Error::Failure(format!("end_command_buffer failed: {}", err)))?;
        let buffers = [command_buffer];
        let submit = vk::SubmitInfo::builder().command_buffers(&buffers).build();
        state
            .device
            .queue_submit(state.graphics_queue, &[submit], vk::Fence::null())
            .map_err(|err| Error::Failure(format!("upload submit failed: {}", err)))?;
        state
            .device
            .queue_wait_idle(state.graphics_queue)
            .map_err(|err| Error::Failure(format!("queue_wait_idle failed: {}", err)))?;
        state
            .device
            .free_command_buffers(state.upload_pool, &buffers);
    }
    Ok(())
}

/// Writes `data` into a device-local buffer through a staging buffer.
pub(crate) fn upload_to_buffer(
    state: &DeviceState,
    target: vk::Buffer,
    offset: vk::DeviceSize,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let staging = create_buffer(
        state,
        data.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    unsafe {
        let mapped = state
            .device
            .map_memory(staging.memory, 0, data.len() as u64, vk::MemoryMapFlags::empty())
            .map_err(|err| Error::MemAllocFailure(format!("map_memory failed: {}", err)))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
        state.device.unmap_memory(staging.memory);
    }

    let command_buffer = begin_single_time_commands(state)?;
    unsafe {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: offset,
            size: data.len() as vk::DeviceSize,
        };
        state
            .device
            .cmd_copy_buffer(command_buffer, staging.buffer, target, &[region]);
    }
    end_single_time_commands(state, command_buffer)?;
    staging.destroy(&state.device);
    Ok(())
}

pub(crate) fn transition_image_layout(
    state: &DeviceState,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    layer_count: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let (src_access, src_stage) = match old_layout {
        vk::ImageLayout::UNDEFINED => (
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        ),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        _ => (
            vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    };
    let (dst_access, dst_stage) = match new_layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        ),
        _ => (
            vk::AccessFlags::MEMORY_READ,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    };

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build();

    unsafe {
        state.device.cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

/// Uploads tightly packed pixel rows into `layer_count` layers of an
/// image and leaves it in `SHADER_READ_ONLY_OPTIMAL`.
pub(crate) fn upload_to_image(
    state: &DeviceState,
    image: vk::Image,
    width: u32,
    height: u32,
    layer_count: u32,
    data: &[u8],
) -> Result<()> {
    let staging = create_buffer(
        state,
        data.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    unsafe {
        let mapped = state
            .device
            .map_memory(staging.memory, 0, data.len() as u64, vk::MemoryMapFlags::empty())
            .map_err(|err| Error::MemAllocFailure(format!("map_memory failed: {}", err)))?;
        std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
        state.device.unmap_memory(staging.memory);
    }

    let command_buffer = begin_single_time_commands(state)?;
    transition_image_layout(
        state,
        command_buffer,
        image,
        vk::ImageAspectFlags::COLOR,
        layer_count,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );
    let region = vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D {
            width,
            height,
            depth: 1,
        },
    };
    unsafe {
        state.device.cmd_copy_buffer_to_image(
            command_buffer,
            staging.buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
    }
    transition_image_layout(
        state,
        command_buffer,
        image,
        vk::ImageAspectFlags::COLOR,
        layer_count,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );
    end_single_time_commands(state, command_buffer)?;
    staging.destroy(&state.device);
    Ok(())
}

/// Rounds `size` up to the device's uniform-buffer offset alignment.
pub(crate) fn align_uniform_size(limits: &vk::PhysicalDeviceLimits, size: u64) -> u64 {
    let alignment = limits.min_uniform_buffer_offset_alignment.max(1);
    (size + alignment - 1) & !(alignment - 1)
}
