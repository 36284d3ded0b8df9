//! Vulkan textures, samplers and cubemaps.

use std::sync::{Arc, Mutex};

use ash::vk;
use levikno_render::backend::{BackendCubemap, BackendSampler, BackendTexture};
use levikno_render::error::Result;
use levikno_render::format::ImageData;
use levikno_render::texture::{CubemapCreateInfo, SamplerCreateInfo, TextureCreateInfo};

use crate::device::DeviceState;
use crate::framebuffer::VkFrameBufferData;
use crate::memory::{self, AllocatedImage};
use crate::translate::*;

/// Upload data is expanded to four channels; the storage formats are all
/// RGBA variants.
pub(crate) fn expand_to_rgba(image: &ImageData) -> Vec<u8> {
    let texel_count = (image.width * image.height) as usize;
    let channels = image.channels as usize;
    if channels == 4 {
        return image.pixels.clone();
    }
    let mut rgba = Vec::with_capacity(texel_count * 4);
    for texel in 0..texel_count {
        let base = texel * channels;
        match channels {
            1 => {
                let v = image.pixels[base];
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
            2 => {
                let v = image.pixels[base];
                let a = image.pixels[base + 1];
                rgba.extend_from_slice(&[v, v, v, a]);
            }
            _ => {
                rgba.extend_from_slice(&image.pixels[base..base + 3]);
                rgba.push(255);
            }
        }
    }
    rgba
}

pub(crate) fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    view_type: vk::ImageViewType,
    layer_count: u32,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count,
        });
    unsafe {
        device.create_image_view(&view_info, None).map_err(|err| {
            levikno_render::error::Error::Failure(format!("image view creation failed: {}", err))
        })
    }
}

pub(crate) fn create_vk_sampler(
    device: &ash::Device,
    info: &SamplerCreateInfo,
) -> Result<vk::Sampler> {
    let sampler_info = vk::SamplerCreateInfo::builder()
        .min_filter(filter_to_vk(info.min_filter))
        .mag_filter(filter_to_vk(info.mag_filter))
        .address_mode_u(wrap_to_vk(info.wrap_s))
        .address_mode_v(wrap_to_vk(info.wrap_t))
        .address_mode_w(wrap_to_vk(info.wrap_r))
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .max_lod(vk::LOD_CLAMP_NONE);
    unsafe {
        device.create_sampler(&sampler_info, None).map_err(|err| {
            levikno_render::error::Error::Failure(format!("sampler creation failed: {}", err))
        })
    }
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub enum VkTexture {
    Image {
        image: AllocatedImage,
        view: vk::ImageView,
        sampler: vk::Sampler,
        /// Samplers referenced from a standalone `Sampler` object are not
        /// owned by the texture.
        owns_sampler: bool,
    },
    /// Color attachment of a framebuffer; the view and sampler live in
    /// the shared framebuffer state so resizes stay transparent.
    Attachment {
        data: Arc<Mutex<VkFrameBufferData>>,
        index: usize,
    },
}

impl BackendTexture for VkTexture {}

impl VkTexture {
    /// (view, sampler) to put into a descriptor write right now.
    pub(crate) fn descriptor_image(&self) -> (vk::ImageView, vk::Sampler) {
        match self {
            VkTexture::Image { view, sampler, .. } => (*view, *sampler),
            VkTexture::Attachment { data, index } => {
                let data = data.lock().unwrap();
                data.descriptor_image(*index)
            }
        }
    }

    pub(crate) fn destroy(&self, device: &ash::Device) {
        if let VkTexture::Image {
            image,
            view,
            sampler,
            owns_sampler,
        } = self
        {
            unsafe {
                device.destroy_image_view(*view, None);
                if *owns_sampler {
                    device.destroy_sampler(*sampler, None);
                }
            }
            image.destroy(device);
        }
    }
}

pub(crate) fn create_texture(state: &DeviceState, info: &TextureCreateInfo) -> Result<VkTexture> {
    let format = color_format_to_vk(info.format);
    let image = memory::create_image(
        state,
        info.image.width,
        info.image.height,
        format,
        vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        vk::SampleCountFlags::TYPE_1,
        1,
        false,
    )?;
    let pixels = expand_to_rgba(&info.image);
    memory::upload_to_image(
        state,
        image.image,
        info.image.width,
        info.image.height,
        1,
        &pixels,
    )?;

    let view = create_image_view(
        &state.device,
        image.image,
        format,
        vk::ImageAspectFlags::COLOR,
        vk::ImageViewType::TYPE_2D,
        1,
    )?;
    let sampler = create_vk_sampler(
        &state.device,
        &SamplerCreateInfo {
            min_filter: info.min_filter,
            mag_filter: info.mag_filter,
            wrap_s: info.wrap_s,
            wrap_t: info.wrap_t,
            wrap_r: info.wrap_t,
        },
    )?;

    Ok(VkTexture::Image {
        image,
        view,
        sampler,
        owns_sampler: true,
    })
}

pub(crate) fn create_texture_with_sampler(
    state: &DeviceState,
    image_data: &ImageData,
    format: levikno_render::format::ColorImageFormat,
    sampler: vk::Sampler,
) -> Result<VkTexture> {
    let format = color_format_to_vk(format);
    let image = memory::create_image(
        state,
        image_data.width,
        image_data.height,
        format,
        vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        vk::SampleCountFlags::TYPE_1,
        1,
        false,
    )?;
    let pixels = expand_to_rgba(image_data);
    memory::upload_to_image(state, image.image, image_data.width, image_data.height, 1, &pixels)?;
    let view = create_image_view(
        &state.device,
        image.image,
        format,
        vk::ImageAspectFlags::COLOR,
        vk::ImageViewType::TYPE_2D,
        1,
    )?;
    Ok(VkTexture::Image {
        image,
        view,
        sampler,
        owns_sampler: false,
    })
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct VkSampler {
    pub sampler: vk::Sampler,
}

impl BackendSampler for VkSampler {}

#[derive(Debug)]
pub struct VkCubemap {
    pub image: AllocatedImage,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
}

impl BackendCubemap for VkCubemap {}

impl VkCubemap {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_sampler(self.sampler, None);
        }
        self.image.destroy(device);
    }
}

pub(crate) fn create_cubemap(state: &DeviceState, info: &CubemapCreateInfo) -> Result<VkCubemap> {
    let format = vk::Format::R8G8B8A8_UNORM;
    let (width, height) = (info.pos_x.width, info.pos_x.height);
    let image = memory::create_image(
        state,
        width,
        height,
        format,
        vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        vk::SampleCountFlags::TYPE_1,
        6,
        true,
    )?;

    // +x, -x, +y, -y, +z, -z layer order
    let mut pixels = Vec::new();
    for face in [
        &info.pos_x,
        &info.neg_x,
        &info.pos_y,
        &info.neg_y,
        &info.pos_z,
        &info.neg_z,
    ] {
        pixels.extend(expand_to_rgba(face));
    }
    memory::upload_to_image(state, image.image, width, height, 6, &pixels)?;

    let view = create_image_view(
        &state.device,
        image.image,
        format,
        vk::ImageAspectFlags::COLOR,
        vk::ImageViewType::CUBE,
        6,
    )?;
    let sampler = create_vk_sampler(&state.device, &SamplerCreateInfo::default())?;
    Ok(VkCubemap {
        image,
        view,
        sampler,
    })
}
