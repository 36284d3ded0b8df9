//! Per-window surface, swapchain, default renderpass and frame sync.

use ash::vk;
use levikno_render::backend::BackendWindow;
use levikno_render::error::{Error, Result};
use levikno_render::window::NativeWindow;

use crate::device::DeviceState;
use crate::memory::{self, AllocatedImage};
use crate::image::create_image_view;

/// Sync state for one frame in flight.
#[derive(Debug)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
    pub command_buffer: vk::CommandBuffer,
}

#[derive(Debug)]
pub struct VkWindowData {
    pub surface: vk::SurfaceKHR,
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub image_views: Vec<vk::ImageView>,
    pub depth_format: vk::Format,
    pub depth: Option<(AllocatedImage, vk::ImageView)>,
    /// The window's default renderpass (swapchain color + depth).
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub command_pool: vk::CommandPool,
    pub frames: Vec<FrameSync>,
    pub current_frame: usize,
    pub image_index: u32,
    pub swapchain_dirty: bool,
    /// Set when the current frame was skipped because the swapchain had
    /// to be rebuilt.
    pub frame_skipped: bool,
    pub vsync: bool,
    pub clear_color: [f32; 4],
    pub in_render_pass: bool,
    /// Extent of the active render target, for resolving "-1 means match
    /// the target" viewports at pipeline bind.
    pub target_extent: vk::Extent2D,
}

impl BackendWindow for VkWindowData {}

fn pick_surface_format(formats: &[vk::SurfaceFormatKHR], srgb: bool) -> vk::SurfaceFormatKHR {
    let wanted = if srgb {
        vk::Format::B8G8R8A8_SRGB
    } else {
        vk::Format::B8G8R8A8_UNORM
    };
    formats
        .iter()
        .copied()
        .find(|f| f.format == wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first().copied())
        .unwrap_or(vk::SurfaceFormatKHR {
            format: wanted,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        })
}

fn pick_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        // FIFO is always available
        vk::PresentModeKHR::FIFO
    } else if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else if modes.contains(&vk::PresentModeKHR::IMMEDIATE) {
        vk::PresentModeKHR::IMMEDIATE
    } else {
        vk::PresentModeKHR::FIFO
    }
}

fn create_window_render_pass(
    state: &DeviceState,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build(),
        vk::AttachmentDescription::builder()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build(),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)
        .build()];

    let dependencies = [vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }];

    let info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    unsafe {
        state
            .device
            .create_render_pass(&info, None)
            .map_err(|err| Error::Failure(format!("window renderpass creation failed: {}", err)))
    }
}

fn surface_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    native: &dyn NativeWindow,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let (width, height) = native.framebuffer_dimensions();
    vk::Extent2D {
        width: (width.max(0) as u32).clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: (height.max(0) as u32).clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Builds (or rebuilds) the swapchain, its image views, the shared depth
/// buffer and the per-image framebuffers.
pub(crate) fn build_swapchain(
    instance_surface: &ash::extensions::khr::Surface,
    state: &DeviceState,
    data: &mut VkWindowData,
    native: &dyn NativeWindow,
) -> Result<()> {
    let capabilities = unsafe {
        instance_surface
            .get_physical_device_surface_capabilities(state.physical_device, data.surface)
            .map_err(|err| Error::Failure(format!("surface capabilities query failed: {}", err)))?
    };
    let present_modes = unsafe {
        instance_surface
            .get_physical_device_surface_present_modes(state.physical_device, data.surface)
            .unwrap_or_default()
    };

    let extent = surface_extent(&capabilities, native);
    if extent.width == 0 || extent.height == 0 {
        data.swapchain_dirty = true;
        return Ok(());
    }

    let mut image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count = image_count.min(capabilities.max_image_count);
    }

    let old_swapchain = data.swapchain;
    let swapchain_info = vk::SwapchainCreateInfoKHR::builder()
        .surface(data.surface)
        .min_image_count(image_count)
        .image_format(data.format)
        .image_color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(pick_present_mode(&present_modes, data.vsync))
        .clipped(true)
        .old_swapchain(old_swapchain);

    let swapchain = unsafe {
        state
            .swapchain_loader
            .create_swapchain(&swapchain_info, None)
            .map_err(|err| Error::Failure(format!("swapchain creation failed: {}", err)))?
    };

    destroy_swapchain_resources(state, data);
    if old_swapchain != vk::SwapchainKHR::null() {
        unsafe {
            state.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
    }
    data.swapchain = swapchain;
    data.extent = extent;

    let images = unsafe {
        state
            .swapchain_loader
            .get_swapchain_images(swapchain)
            .map_err(|err| Error::Failure(format!("swapchain image query failed: {}", err)))?
    };
    for image in &images {
        data.image_views.push(create_image_view(
            &state.device,
            *image,
            data.format,
            vk::ImageAspectFlags::COLOR,
            vk::ImageViewType::TYPE_2D,
            1,
        )?);
    }

    let depth_aspect = if data.depth_format == vk::Format::D24_UNORM_S8_UINT
        || data.depth_format == vk::Format::D32_SFLOAT_S8_UINT
    {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else {
        vk::ImageAspectFlags::DEPTH
    };
    let depth_image = memory::create_image(
        state,
        extent.width,
        extent.height,
        data.depth_format,
        vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        vk::SampleCountFlags::TYPE_1,
        1,
        false,
    )?;
    let depth_view = create_image_view(
        &state.device,
        depth_image.image,
        data.depth_format,
        depth_aspect,
        vk::ImageViewType::TYPE_2D,
        1,
    )?;
    data.depth = Some((depth_image, depth_view));

    for view in &data.image_views {
        let attachments = [*view, depth_view];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(data.render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = unsafe {
            state
                .device
                .create_framebuffer(&framebuffer_info, None)
                .map_err(|err| {
                    Error::Failure(format!("swapchain framebuffer creation failed: {}", err))
                })?
        };
        data.framebuffers.push(framebuffer);
    }

    data.swapchain_dirty = false;
    Ok(())
}

fn destroy_swapchain_resources(state: &DeviceState, data: &mut VkWindowData) {
    unsafe {
        for framebuffer in data.framebuffers.drain(..) {
            state.device.destroy_framebuffer(framebuffer, None);
        }
        for view in data.image_views.drain(..) {
            state.device.destroy_image_view(view, None);
        }
        if let Some((image, view)) = data.depth.take() {
            state.device.destroy_image_view(view, None);
            image.destroy(&state.device);
        }
    }
}

pub(crate) fn create_window_data(
    surface_loader: &ash::extensions::khr::Surface,
    state: &DeviceState,
    surface: vk::SurfaceKHR,
    native: &dyn NativeWindow,
    vsync: bool,
    srgb: bool,
    max_frames_in_flight: u32,
) -> Result<VkWindowData> {
    let present_supported = unsafe {
        surface_loader
            .get_physical_device_surface_support(
                state.physical_device,
                state.graphics_family,
                surface,
            )
            .unwrap_or(false)
    };
    if !present_supported {
        return Err(Error::validation(
            "the graphics queue family cannot present to this surface",
        ));
    }

    let formats = unsafe {
        surface_loader
            .get_physical_device_surface_formats(state.physical_device, surface)
            .unwrap_or_default()
    };
    let surface_format = pick_surface_format(&formats, srgb);

    let depth_format = crate::backend::probe_depth_format(
        state,
        &[
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ],
    )
    .unwrap_or(vk::Format::D32_SFLOAT);

    let render_pass = create_window_render_pass(state, surface_format.format, depth_format)?;

    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(state.graphics_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    let command_pool = unsafe {
        state
            .device
            .create_command_pool(&pool_info, None)
            .map_err(|err| Error::Failure(format!("command pool creation failed: {}", err)))?
    };

    let frame_count = max_frames_in_flight.max(1);
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(command_pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(frame_count);
    let command_buffers = unsafe {
        state
            .device
            .allocate_command_buffers(&alloc_info)
            .map_err(|err| Error::Failure(format!("command buffer allocation failed: {}", err)))?
    };

    let mut frames = Vec::with_capacity(frame_count as usize);
    for command_buffer in command_buffers {
        unsafe {
            let semaphore_info = vk::SemaphoreCreateInfo::builder();
            let fence_info =
                vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
            frames.push(FrameSync {
                image_available: state
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|err| Error::Failure(format!("semaphore creation failed: {}", err)))?,
                render_finished: state
                    .device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|err| Error::Failure(format!("semaphore creation failed: {}", err)))?,
                in_flight: state
                    .device
                    .create_fence(&fence_info, None)
                    .map_err(|err| Error::Failure(format!("fence creation failed: {}", err)))?,
                command_buffer,
            });
        }
    }

    let mut data = VkWindowData {
        surface,
        swapchain: vk::SwapchainKHR::null(),
        format: surface_format.format,
        extent: vk::Extent2D::default(),
        image_views: Vec::new(),
        depth_format,
        depth: None,
        render_pass,
        framebuffers: Vec::new(),
        command_pool,
        frames,
        current_frame: 0,
        image_index: 0,
        swapchain_dirty: false,
        frame_skipped: false,
        vsync,
        clear_color: [0.0, 0.0, 0.0, 1.0],
        in_render_pass: false,
        target_extent: vk::Extent2D::default(),
    };
    build_swapchain(surface_loader, state, &mut data, native)?;
    Ok(data)
}

pub(crate) fn destroy_window_data(
    surface_loader: &ash::extensions::khr::Surface,
    state: &DeviceState,
    data: &mut VkWindowData,
) {
    unsafe {
        let _ = state.device.device_wait_idle();
    }
    destroy_swapchain_resources(state, data);
    unsafe {
        if data.swapchain != vk::SwapchainKHR::null() {
            state.swapchain_loader.destroy_swapchain(data.swapchain, None);
        }
        for frame in data.frames.drain(..) {
            state.device.destroy_semaphore(frame.image_available, None);
            state.device.destroy_semaphore(frame.render_finished, None);
            state.device.destroy_fence(frame.in_flight, None);
        }
        state.device.destroy_command_pool(data.command_pool, None);
        state.device.destroy_render_pass(data.render_pass, None);
        surface_loader.destroy_surface(data.surface, None);
    }
}
