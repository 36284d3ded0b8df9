//! Offscreen framebuffers: renderpass, attachments, optional MSAA
//! resolve, and the shared state attachment textures sample from.

use std::sync::{Arc, Mutex};

use ash::vk;
use levikno_render::backend::{BackendFrameBuffer, BackendTexture, FrameBufferParts};
use levikno_render::error::{Error, Result};
use levikno_render::framebuffer::FrameBufferCreateInfo;
use levikno_render::texture::SamplerCreateInfo;
use smallvec::SmallVec;

use crate::device::DeviceState;
use crate::image::{create_image_view, create_vk_sampler, VkTexture};
use crate::memory::{self, AllocatedImage};
use crate::translate::*;

#[derive(Debug)]
pub struct VkFrameBufferData {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub samples: vk::SampleCountFlags,
    pub color_formats: Vec<vk::Format>,
    pub depth_format: Option<vk::Format>,
    pub clear_colors: Vec<[f32; 4]>,
    pub sampler: vk::Sampler,
    /// Sampleable per-attachment images (the resolve targets when
    /// multisampling).
    pub color_images: Vec<AllocatedImage>,
    pub color_views: Vec<vk::ImageView>,
    pub msaa_images: Vec<AllocatedImage>,
    pub msaa_views: Vec<vk::ImageView>,
    pub depth_image: Option<(AllocatedImage, vk::ImageView)>,
}

impl VkFrameBufferData {
    pub(crate) fn multisampled(&self) -> bool {
        self.samples != vk::SampleCountFlags::TYPE_1
    }

    pub(crate) fn descriptor_image(&self, index: usize) -> (vk::ImageView, vk::Sampler) {
        (
            self.color_views.get(index).copied().unwrap_or_default(),
            self.sampler,
        )
    }

    /// Clear values in framebuffer attachment order.
    pub(crate) fn clear_values(&self) -> SmallVec<[vk::ClearValue; 8]> {
        let mut values = SmallVec::new();
        for clear in &self.clear_colors {
            values.push(vk::ClearValue {
                color: vk::ClearColorValue { float32: *clear },
            });
        }
        if self.depth_format.is_some() {
            values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            });
        }
        if self.multisampled() {
            // resolve attachments follow; their load op is DONT_CARE but
            // the array must cover them
            for _ in &self.clear_colors {
                values.push(vk::ClearValue {
                    color: vk::ClearColorValue { float32: [0.0; 4] },
                });
            }
        }
        values
    }
}

fn create_render_pass(
    state: &DeviceState,
    color_formats: &[vk::Format],
    depth_format: Option<vk::Format>,
    samples: vk::SampleCountFlags,
) -> Result<vk::RenderPass> {
    let multisampled = samples != vk::SampleCountFlags::TYPE_1;
    let mut attachments: Vec<vk::AttachmentDescription> = Vec::new();
    let mut color_refs: Vec<vk::AttachmentReference> = Vec::new();
    let mut resolve_refs: Vec<vk::AttachmentReference> = Vec::new();

    // rendered color attachments (multisampled when requested)
    for &format in color_formats {
        color_refs.push(vk::AttachmentReference {
            attachment: attachments.len() as u32,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        });
        attachments.push(
            vk::AttachmentDescription::builder()
                .format(format)
                .samples(samples)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(if multisampled {
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
                } else {
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                })
                .build(),
        );
    }

    let depth_ref = depth_format.map(|format| {
        let reference = vk::AttachmentReference {
            attachment: attachments.len() as u32,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        attachments.push(
            vk::AttachmentDescription::builder()
                .format(format)
                .samples(samples)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .build(),
        );
        reference
    });

    if multisampled {
        for &format in color_formats {
            resolve_refs.push(vk::AttachmentReference {
                attachment: attachments.len() as u32,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            });
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .build(),
            );
        }
    }

    let mut subpass = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if multisampled {
        subpass = subpass.resolve_attachments(&resolve_refs);
    }
    if let Some(depth_ref) = &depth_ref {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }
    let subpasses = [subpass.build()];

    let dependencies = [vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::SHADER_READ,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }];

    let render_pass_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    unsafe {
        state
            .device
            .create_render_pass(&render_pass_info, None)
            .map_err(|err| Error::Failure(format!("renderpass creation failed: {}", err)))
    }
}

fn create_attachments(state: &DeviceState, data: &mut VkFrameBufferData) -> Result<()> {
    let (width, height) = (data.extent.width, data.extent.height);

    for &format in &data.color_formats {
        let image = memory::create_image(
            state,
            width,
            height,
            format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC,
            vk::SampleCountFlags::TYPE_1,
            1,
            false,
        )?;
        let view = create_image_view(
            &state.device,
            image.image,
            format,
            vk::ImageAspectFlags::COLOR,
            vk::ImageViewType::TYPE_2D,
            1,
        )?;
        data.color_images.push(image);
        data.color_views.push(view);
    }

    if data.multisampled() {
        for &format in &data.color_formats {
            let image = memory::create_image(
                state,
                width,
                height,
                format,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
                data.samples,
                1,
                false,
            )?;
            let view = create_image_view(
                &state.device,
                image.image,
                format,
                vk::ImageAspectFlags::COLOR,
                vk::ImageViewType::TYPE_2D,
                1,
            )?;
            data.msaa_images.push(image);
            data.msaa_views.push(view);
        }
    }

    if let Some(format) = data.depth_format {
        let aspect = if format == vk::Format::D24_UNORM_S8_UINT
            || format == vk::Format::D32_SFLOAT_S8_UINT
        {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        };
        let image = memory::create_image(
            state,
            width,
            height,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            data.samples,
            1,
            false,
        )?;
        let view = create_image_view(
            &state.device,
            image.image,
            format,
            aspect,
            vk::ImageViewType::TYPE_2D,
            1,
        )?;
        data.depth_image = Some((image, view));
    }

    // framebuffer attachment order mirrors the renderpass: rendered
    // colors, depth, then resolves
    let mut views: Vec<vk::ImageView> = if data.multisampled() {
        data.msaa_views.clone()
    } else {
        data.color_views.clone()
    };
    if let Some((_, depth_view)) = &data.depth_image {
        views.push(*depth_view);
    }
    if data.multisampled() {
        views.extend_from_slice(&data.color_views);
    }

    let framebuffer_info = vk::FramebufferCreateInfo::builder()
        .render_pass(data.render_pass)
        .attachments(&views)
        .width(width)
        .height(height)
        .layers(1);
    data.framebuffer = unsafe {
        state
            .device
            .create_framebuffer(&framebuffer_info, None)
            .map_err(|err| Error::Failure(format!("framebuffer creation failed: {}", err)))?
    };
    Ok(())
}

fn destroy_attachments(state: &DeviceState, data: &mut VkFrameBufferData) {
    let device = &state.device;
    unsafe {
        if data.framebuffer != vk::Framebuffer::null() {
            device.destroy_framebuffer(data.framebuffer, None);
            data.framebuffer = vk::Framebuffer::null();
        }
        for view in data.color_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        for view in data.msaa_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        if let Some((image, view)) = data.depth_image.take() {
            device.destroy_image_view(view, None);
            image.destroy(device);
        }
    }
    for image in data.color_images.drain(..) {
        image.destroy(device);
    }
    for image in data.msaa_images.drain(..) {
        image.destroy(device);
    }
}

#[derive(Debug)]
pub struct VkFrameBuffer {
    pub data: Arc<Mutex<VkFrameBufferData>>,
}

impl BackendFrameBuffer for VkFrameBuffer {}

pub(crate) fn create_frame_buffer(
    state: &DeviceState,
    info: &FrameBufferCreateInfo,
) -> Result<FrameBufferParts> {
    let color_formats: Vec<vk::Format> = info
        .color_attachments
        .iter()
        .map(|a| color_format_to_vk(a.format))
        .collect();
    let depth_format = info.depth_attachment.map(|d| depth_format_to_vk(d.format));
    let samples = sample_count_to_vk(info.sample_count);

    let render_pass = create_render_pass(state, &color_formats, depth_format, samples)?;
    let sampler = create_vk_sampler(
        &state.device,
        &SamplerCreateInfo {
            min_filter: info.texture_filter,
            mag_filter: info.texture_filter,
            wrap_s: info.texture_mode,
            wrap_t: info.texture_mode,
            wrap_r: info.texture_mode,
        },
    )?;

    let mut data = VkFrameBufferData {
        render_pass,
        framebuffer: vk::Framebuffer::null(),
        extent: vk::Extent2D {
            width: info.width,
            height: info.height,
        },
        samples,
        color_formats,
        depth_format,
        clear_colors: vec![[0.0; 4]; info.color_attachments.len()],
        sampler,
        color_images: Vec::new(),
        color_views: Vec::new(),
        msaa_images: Vec::new(),
        msaa_views: Vec::new(),
        depth_image: None,
    };
    create_attachments(state, &mut data)?;

    let data = Arc::new(Mutex::new(data));
    let attachment_textures = (0..info.color_attachments.len())
        .map(|index| {
            Box::new(VkTexture::Attachment {
                data: data.clone(),
                index,
            }) as Box<dyn BackendTexture>
        })
        .collect();

    Ok(FrameBufferParts {
        framebuffer: Box::new(VkFrameBuffer { data }),
        attachment_textures,
    })
}

/// Recreates attachments at the new size; the renderpass stays (formats
/// and sample count are unchanged, so it remains compatible).
pub(crate) fn resize(state: &DeviceState, data: &mut VkFrameBufferData, width: u32, height: u32) {
    unsafe {
        let _ = state.device.device_wait_idle();
    }
    destroy_attachments(state, data);
    data.extent = vk::Extent2D { width, height };
    if let Err(err) = create_attachments(state, data) {
        log::error!(target: "levikno", "framebuffer resize failed: {}", err);
    }
}

pub(crate) fn destroy(state: &DeviceState, data: &mut VkFrameBufferData) {
    unsafe {
        let _ = state.device.device_wait_idle();
    }
    destroy_attachments(state, data);
    unsafe {
        state.device.destroy_sampler(data.sampler, None);
        state.device.destroy_render_pass(data.render_pass, None);
    }
}
