//! Vulkan geometry buffers and per-frame uniform rings.

use ash::vk;
use levikno_render::backend::{BackendBuffer, BackendUniformBuffer};
use levikno_render::buffer::{BufferCreateInfo, BufferTypeFlags, UniformBufferCreateInfo};
use levikno_render::error::{Error, Result};

use crate::device::DeviceState;
use crate::memory::{self, AllocatedBuffer};

/// Vertex and index data in separate device-local buffers; updates stage
/// through a transfer.
#[derive(Debug)]
pub struct VkBuffer {
    pub vertex: AllocatedBuffer,
    pub index: Option<AllocatedBuffer>,
}

impl BackendBuffer for VkBuffer {}

impl VkBuffer {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        self.vertex.destroy(device);
        if let Some(index) = &self.index {
            index.destroy(device);
        }
    }
}

pub(crate) fn create_buffer(state: &DeviceState, info: &BufferCreateInfo) -> Result<VkBuffer> {
    let vertex_size = info
        .vertex_data
        .map(|d| d.len() as u64)
        .unwrap_or(info.vertex_buffer_size);
    let vertex = memory::create_buffer(
        state,
        vertex_size,
        vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    if let Some(data) = info.vertex_data {
        memory::upload_to_buffer(state, vertex.buffer, 0, data)?;
    }

    let index = if info.buffer_type.contains(BufferTypeFlags::INDEX) {
        let index_size = info
            .index_data
            .map(|d| (d.len() * 4) as u64)
            .unwrap_or(info.index_buffer_size);
        let index = memory::create_buffer(
            state,
            index_size,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        if let Some(indices) = info.index_data {
            let bytes = unsafe {
                std::slice::from_raw_parts(indices.as_ptr() as *const u8, indices.len() * 4)
            };
            memory::upload_to_buffer(state, index.buffer, 0, bytes)?;
        }
        Some(index)
    } else {
        None
    };

    Ok(VkBuffer { vertex, index })
}

/// Recreates one of the buffer's allocations at a new size; contents are
/// not carried over.
pub(crate) fn resize_allocation(
    state: &DeviceState,
    allocation: &mut AllocatedBuffer,
    usage: vk::BufferUsageFlags,
    size: u64,
) -> Result<()> {
    unsafe {
        // in-flight frames may still reference the old buffer
        let _ = state.device.device_wait_idle();
    }
    allocation.destroy(&state.device);
    *allocation = memory::create_buffer(
        state,
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------

/// Host-coherent mapped ring with one aligned slot per frame in flight
/// (a single slot for storage buffers).
pub struct VkUniformBuffer {
    pub allocation: AllocatedBuffer,
    pub mapped: *mut u8,
    pub aligned_size: u64,
    pub slots: u32,
    pub descriptor_type: vk::DescriptorType,
}

impl std::fmt::Debug for VkUniformBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("VkUniformBuffer")
            .field("aligned_size", &self.aligned_size)
            .field("slots", &self.slots)
            .finish()
    }
}

impl BackendUniformBuffer for VkUniformBuffer {}

impl VkUniformBuffer {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.unmap_memory(self.allocation.memory);
        }
        self.allocation.destroy(device);
    }

    /// Byte offset of one frame's slot.
    pub(crate) fn slot_offset(&self, frame: u32) -> u64 {
        (frame % self.slots) as u64 * self.aligned_size
    }
}

pub(crate) fn create_uniform_buffer(
    state: &DeviceState,
    info: &UniformBufferCreateInfo,
    max_frames_in_flight: u32,
) -> Result<VkUniformBuffer> {
    let storage = info.buffer_type.contains(BufferTypeFlags::STORAGE);
    let (usage, descriptor_type, slots) = if storage {
        (
            vk::BufferUsageFlags::STORAGE_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER,
            1,
        )
    } else {
        (
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::DescriptorType::UNIFORM_BUFFER,
            max_frames_in_flight.max(1),
        )
    };

    let aligned_size = memory::align_uniform_size(&state.limits, info.size);
    let total = aligned_size * slots as u64;
    let allocation = memory::create_buffer(
        state,
        total,
        usage,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;

    let mapped = unsafe {
        state
            .device
            .map_memory(allocation.memory, 0, total, vk::MemoryMapFlags::empty())
            .map_err(|err| Error::MemAllocFailure(format!("map_memory failed: {}", err)))?
            as *mut u8
    };

    let buffer = VkUniformBuffer {
        allocation,
        mapped,
        aligned_size,
        slots,
        descriptor_type,
    };

    if let Some(data) = info.initial_data {
        let len = data.len().min(info.size as usize);
        for slot in 0..slots {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    buffer.mapped.add(buffer.slot_offset(slot) as usize),
                    len,
                );
            }
        }
    }

    Ok(buffer)
}
