//! `RenderBackend` implementation over `ash`.

use ash::extensions::{ext, khr};
use ash::vk;
use levikno_render::backend::*;
use levikno_render::buffer::{Buffer, BufferCreateInfo, UniformBuffer, UniformBufferCreateInfo};
use levikno_render::descriptor::{DescriptorLayout, DescriptorLayoutCreateInfo, DescriptorSet};
use levikno_render::error::{Error, Result};
use levikno_render::format::{ColorImageFormat, DepthImageFormat};
use levikno_render::framebuffer::{FrameBuffer, FrameBufferCreateInfo};
use levikno_render::pipeline::Pipeline;
use levikno_render::shader::{Shader, ShaderCreateInfo};
use levikno_render::texture::{
    Cubemap, CubemapCreateInfo, Sampler, SamplerCreateInfo, Texture, TextureCreateInfo,
    TextureSamplerCreateInfo,
};
use levikno_render::window::{NativeWindow, Window, WindowCreateInfo};

use crate::buffer::{self, VkBuffer, VkUniformBuffer};
use crate::descriptor::{self, VkDescriptorLayout, VkDescriptorSet};
use crate::device::{self, DeviceState};
use crate::framebuffer::{self, VkFrameBuffer};
use crate::image::{self, VkCubemap, VkSampler, VkTexture};
use crate::instance;
use crate::memory;
use crate::pipeline::{self, VkPipeline, VkShader};
use crate::swapchain::{self, VkWindowData};
use crate::translate::*;

/// Backend construction parameters; the context later supplies the
/// device choice and frames-in-flight through `render_init`.
#[derive(Clone, Debug)]
pub struct VulkanConfig {
    pub app_name: String,
    pub enable_validation_layers: bool,
    /// Preferred swapchain color format (linear or sRGB).
    pub frame_buffer_color_format: ColorImageFormat,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        VulkanConfig {
            app_name: String::from("levikno app"),
            enable_validation_layers: false,
            frame_buffer_color_format: ColorImageFormat::Rgba8,
        }
    }
}

pub struct VulkanInstance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
    surface_loader: khr::Surface,
    physical_devices: Vec<vk::PhysicalDevice>,
    device: Option<DeviceState>,
    max_frames_in_flight: u32,
    srgb_swapchain: bool,
}

impl std::fmt::Debug for VulkanInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("VulkanInstance")
            .field("devices", &self.physical_devices.len())
            .field("initialized", &self.device.is_some())
            .finish()
    }
}

impl VulkanInstance {
    pub fn new(config: &VulkanConfig) -> Result<VulkanInstance> {
        let entry = unsafe {
            ash::Entry::load()
                .map_err(|err| Error::Failure(format!("failed to load Vulkan: {}", err)))?
        };
        let parts =
            instance::create_instance(&entry, &config.app_name, config.enable_validation_layers)?;
        let surface_loader = khr::Surface::new(&entry, &parts.instance);

        let mut physical_devices = unsafe {
            parts.instance.enumerate_physical_devices().map_err(|err| {
                Error::Failure(format!("physical device enumeration failed: {}", err))
            })?
        };
        // best device first
        physical_devices
            .sort_by_key(|device| std::cmp::Reverse(device::score_device(&parts.instance, *device)));

        if physical_devices.is_empty() {
            return Err(Error::Failure(String::from(
                "no Vulkan physical devices available",
            )));
        }

        Ok(VulkanInstance {
            entry,
            instance: parts.instance,
            debug: parts.debug,
            surface_loader,
            physical_devices,
            device: None,
            max_frames_in_flight: 1,
            srgb_swapchain: config.frame_buffer_color_format.is_srgb(),
        })
    }

    fn state(&self) -> &DeviceState {
        self.device
            .as_ref()
            .expect("render_init must run before graphics objects are created")
    }

    fn window_data<'a>(&self, window: &'a mut Window) -> &'a mut VkWindowData {
        window
            .backend_mut()
            .downcast_mut::<VkWindowData>()
            .expect("window payload does not belong to the Vulkan backend")
    }

    fn rebuild_swapchain(&self, window: &mut Window) -> Result<()> {
        let state = self.state();
        unsafe {
            let _ = state.device.device_wait_idle();
        }
        let (native, backend) = window.native_and_backend_mut();
        let data = backend
            .downcast_mut::<VkWindowData>()
            .expect("window payload does not belong to the Vulkan backend");
        swapchain::build_swapchain(&self.surface_loader, state, data, native)
    }
}

/// Returns the first candidate usable as a depth/stencil attachment with
/// optimal tiling.
pub(crate) fn probe_depth_format(
    state: &DeviceState,
    candidates: &[vk::Format],
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let properties = unsafe {
            state
                .instance
                .get_physical_device_format_properties(state.physical_device, format)
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

impl RenderBackend for VulkanInstance {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn physical_devices(&self) -> Vec<PhysicalDevice> {
        self.physical_devices
            .iter()
            .enumerate()
            .map(|(index, device)| device::describe_device(&self.instance, *device, index as u64))
            .collect()
    }

    fn check_physical_device_support(&self, device: &PhysicalDevice) -> Result<()> {
        let handle = self
            .physical_devices
            .get(device.id as usize)
            .ok_or_else(|| Error::validation("unknown physical device id"))?;
        device::check_device_support(&self.instance, *handle)
    }

    fn render_init(&mut self, info: &RenderInitInfo) -> Result<()> {
        let handle = self
            .physical_devices
            .get(info.physical_device.id as usize)
            .ok_or_else(|| Error::validation("unknown physical device id"))?;
        let state = DeviceState::create(&self.instance, *handle)?;
        log::debug!(
            target: "levikno",
            "logical device created on \"{}\" (graphics family {}, bindless: {})",
            info.physical_device.info.name,
            state.graphics_family,
            state.bindless_supported
        );
        self.device = Some(state);
        self.max_frames_in_flight = info.max_frames_in_flight.max(1);
        if info.gamma_correction {
            self.srgb_swapchain = true;
        }
        Ok(())
    }

    fn max_frames_in_flight(&self) -> u32 {
        self.max_frames_in_flight
    }

    fn find_supported_depth_image_format(
        &self,
        candidates: &[DepthImageFormat],
    ) -> Result<DepthImageFormat> {
        let state = self.state();
        candidates
            .iter()
            .copied()
            .find(|&format| probe_depth_format(state, &[depth_format_to_vk(format)]).is_some())
            .ok_or_else(|| Error::validation("no candidate depth image format is supported"))
    }

    //----------------------------------------------------------------------------------------------

    fn create_window(
        &self,
        info: &WindowCreateInfo,
        native: &dyn NativeWindow,
    ) -> Result<Box<dyn BackendWindow>> {
        let state = self.state();
        let surface = unsafe {
            ash_window::create_surface(
                &self.entry,
                &self.instance,
                native.raw_display_handle(),
                native.raw_window_handle(),
                None,
            )
            .map_err(|err| Error::Failure(format!("surface creation failed: {}", err)))?
        };
        let data = swapchain::create_window_data(
            &self.surface_loader,
            state,
            surface,
            native,
            info.vsync,
            self.srgb_swapchain,
            self.max_frames_in_flight,
        )?;
        Ok(Box::new(data))
    }

    fn destroy_window(&self, mut window: Window) {
        let state = self.state();
        let data = self.window_data(&mut window);
        swapchain::destroy_window_data(&self.surface_loader, state, data);
    }

    fn create_shader_from_src(&self, info: &ShaderCreateInfo) -> Result<Box<dyn BackendShader>> {
        Ok(Box::new(VkShader {
            vertex_spv: pipeline::parse_spirv(info.vertex_src.as_bytes(), "vertex")?,
            fragment_spv: pipeline::parse_spirv(info.fragment_src.as_bytes(), "fragment")?,
        }))
    }

    fn create_shader_from_file_src(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>> {
        // the Vulkan backend accepts SPIR-V only; source files go through
        // the same validation as binary files
        self.create_shader_from_file_bin(info)
    }

    fn create_shader_from_file_bin(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>> {
        let vertex = std::fs::read(&info.vertex_src).map_err(|err| {
            Error::validation(format!("cannot read vertex shader {}: {}", info.vertex_src, err))
        })?;
        let fragment = std::fs::read(&info.fragment_src).map_err(|err| {
            Error::validation(format!(
                "cannot read fragment shader {}: {}",
                info.fragment_src, err
            ))
        })?;
        Ok(Box::new(VkShader {
            vertex_spv: pipeline::parse_spirv(&vertex, "vertex")?,
            fragment_spv: pipeline::parse_spirv(&fragment, "fragment")?,
        }))
    }

    fn destroy_shader(&self, _shader: Shader) {
        // only SPIR-V words; native modules live and die inside
        // create_pipeline
    }

    fn create_descriptor_layout(
        &self,
        info: &DescriptorLayoutCreateInfo,
    ) -> Result<Box<dyn BackendDescriptorLayout>> {
        Ok(Box::new(descriptor::create_descriptor_layout(
            self.state(),
            info,
            self.max_frames_in_flight,
        )?))
    }

    fn destroy_descriptor_layout(&self, layout: DescriptorLayout) {
        if let Some(payload) = layout.backend().downcast_ref::<VkDescriptorLayout>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
            }
            payload.destroy(&state.device);
        }
    }

    fn create_descriptor_set(
        &self,
        layout: &DescriptorLayout,
    ) -> Result<Box<dyn BackendDescriptorSet>> {
        Ok(Box::new(descriptor::allocate_descriptor_set(
            self.state(),
            layout,
            self.max_frames_in_flight,
        )?))
    }

    fn destroy_descriptor_set(&self, _set: DescriptorSet) {
        // sets return to their pool when the layout is destroyed
    }

    fn create_pipeline(&self, info: &PipelineBackendCreateInfo) -> Result<Box<dyn BackendPipeline>> {
        let state = self.state();
        let (render_pass, color_count) = match &info.render_pass {
            RenderPassTarget::Window(window) => {
                let data = window
                    .backend()
                    .downcast_ref::<VkWindowData>()
                    .expect("window payload does not belong to the Vulkan backend");
                (data.render_pass, 1)
            }
            RenderPassTarget::FrameBuffer(framebuffer) => {
                let payload = framebuffer
                    .backend()
                    .downcast_ref::<VkFrameBuffer>()
                    .expect("framebuffer payload does not belong to the Vulkan backend");
                let data = payload.data.lock().unwrap();
                (data.render_pass, data.color_formats.len())
            }
        };
        Ok(Box::new(pipeline::create_pipeline(
            state,
            info,
            render_pass,
            color_count,
        )?))
    }

    fn destroy_pipeline(&self, pipeline: Pipeline) {
        if let Some(payload) = pipeline.backend().downcast_ref::<VkPipeline>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
            }
            payload.destroy(&state.device);
        }
    }

    fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Box<dyn BackendBuffer>> {
        Ok(Box::new(buffer::create_buffer(self.state(), info)?))
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        if let Some(payload) = buffer.backend().downcast_ref::<VkBuffer>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
            }
            payload.destroy(&state.device);
        }
    }

    fn create_uniform_buffer(
        &self,
        info: &UniformBufferCreateInfo,
    ) -> Result<Box<dyn BackendUniformBuffer>> {
        Ok(Box::new(buffer::create_uniform_buffer(
            self.state(),
            info,
            self.max_frames_in_flight,
        )?))
    }

    fn destroy_uniform_buffer(&self, buffer: UniformBuffer) {
        if let Some(payload) = buffer.backend().downcast_ref::<VkUniformBuffer>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
            }
            payload.destroy(&state.device);
        }
    }

    fn create_texture(&self, info: &TextureCreateInfo) -> Result<Box<dyn BackendTexture>> {
        Ok(Box::new(image::create_texture(self.state(), info)?))
    }

    fn create_texture_sampler(
        &self,
        info: &TextureSamplerCreateInfo,
        sampler: &Sampler,
    ) -> Result<Box<dyn BackendTexture>> {
        let vk_sampler = sampler
            .backend()
            .downcast_ref::<VkSampler>()
            .map(|s| s.sampler)
            .unwrap_or_default();
        Ok(Box::new(image::create_texture_with_sampler(
            self.state(),
            &info.image,
            info.format,
            vk_sampler,
        )?))
    }

    fn destroy_texture(&self, texture: Texture) {
        if let Some(payload) = texture.backend().downcast_ref::<VkTexture>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
            }
            payload.destroy(&state.device);
        }
    }

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Box<dyn BackendSampler>> {
        Ok(Box::new(VkSampler {
            sampler: image::create_vk_sampler(&self.state().device, info)?,
        }))
    }

    fn destroy_sampler(&self, sampler: Sampler) {
        if let Some(payload) = sampler.backend().downcast_ref::<VkSampler>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
                state.device.destroy_sampler(payload.sampler, None);
            }
        }
    }

    fn create_cubemap(&self, info: &CubemapCreateInfo) -> Result<Box<dyn BackendCubemap>> {
        Ok(Box::new(image::create_cubemap(self.state(), info)?))
    }

    fn destroy_cubemap(&self, cubemap: Cubemap) {
        if let Some(payload) = cubemap.backend().downcast_ref::<VkCubemap>() {
            let state = self.state();
            unsafe {
                let _ = state.device.device_wait_idle();
            }
            payload.destroy(&state.device);
        }
    }

    fn create_frame_buffer(&self, info: &FrameBufferCreateInfo) -> Result<FrameBufferParts> {
        framebuffer::create_frame_buffer(self.state(), info)
    }

    fn destroy_frame_buffer(&self, framebuffer: FrameBuffer) {
        if let Some(payload) = framebuffer.backend().downcast_ref::<VkFrameBuffer>() {
            let mut data = payload.data.lock().unwrap();
            framebuffer::destroy(self.state(), &mut data);
        }
    }

    //----------------------------------------------------------------------------------------------

    fn render_begin_next_frame(&self, window: &mut Window) -> Result<()> {
        let state = self.state();

        if self.window_data(window).swapchain_dirty {
            self.rebuild_swapchain(window)?;
            let data = self.window_data(window);
            data.frame_skipped = true;
            log::trace!(target: "levikno", "swapchain rebuilt, frame skipped");
            return Ok(());
        }

        let data = self.window_data(window);
        let frame = &data.frames[data.current_frame];
        unsafe {
            state
                .device
                .wait_for_fences(&[frame.in_flight], true, u64::MAX)
                .map_err(|err| Error::Failure(format!("fence wait failed: {}", err)))?;
        }

        let acquire = unsafe {
            state.swapchain_loader.acquire_next_image(
                data.swapchain,
                u64::MAX,
                frame.image_available,
                vk::Fence::null(),
            )
        };
        match acquire {
            Ok((index, suboptimal)) => {
                data.image_index = index;
                if suboptimal {
                    data.swapchain_dirty = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.rebuild_swapchain(window)?;
                self.window_data(window).frame_skipped = true;
                log::trace!(target: "levikno", "swapchain out of date, frame skipped");
                return Ok(());
            }
            Err(err) => {
                return Err(Error::Failure(format!("image acquire failed: {}", err)));
            }
        }

        let frame = &data.frames[data.current_frame];
        unsafe {
            state
                .device
                .reset_fences(&[frame.in_flight])
                .map_err(|err| Error::Failure(format!("fence reset failed: {}", err)))?;
            state
                .device
                .reset_command_buffer(frame.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|err| Error::Failure(format!("command buffer reset failed: {}", err)))?;
        }
        data.frame_skipped = false;
        Ok(())
    }

    fn render_draw_submit(&self, window: &mut Window) -> Result<()> {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            data.frame_skipped = false;
            return Ok(());
        }

        let frame = &data.frames[data.current_frame];
        let wait_semaphores = [frame.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.render_finished];
        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        unsafe {
            state
                .device
                .queue_submit(state.graphics_queue, &[submit], frame.in_flight)
                .map_err(|err| Error::Failure(format!("queue submit failed: {}", err)))?;
        }

        let swapchains = [data.swapchain];
        let image_indices = [data.image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let present = unsafe {
            state
                .swapchain_loader
                .queue_present(state.graphics_queue, &present_info)
        };
        match present {
            Ok(suboptimal) => {
                if suboptimal {
                    data.swapchain_dirty = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                data.swapchain_dirty = true;
            }
            Err(err) => {
                return Err(Error::Failure(format!("present failed: {}", err)));
            }
        }

        data.current_frame = (data.current_frame + 1) % data.frames.len();
        Ok(())
    }

    fn render_begin_command_recording(&self, window: &mut Window) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            if let Err(err) = state
                .device
                .begin_command_buffer(data.frames[data.current_frame].command_buffer, &begin_info)
            {
                log::error!(target: "levikno", "begin_command_buffer failed: {}", err);
            }
        }
    }

    fn render_end_command_recording(&self, window: &mut Window) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            if let Err(err) = state
                .device
                .end_command_buffer(data.frames[data.current_frame].command_buffer)
            {
                log::error!(target: "levikno", "end_command_buffer failed: {}", err);
            }
        }
    }

    fn render_clear_color(&self, window: &mut Window, r: f32, g: f32, b: f32, a: f32) {
        let state = self.state();
        let data = self.window_data(window);
        data.clear_color = [r, g, b, a];
        if data.frame_skipped || !data.in_render_pass {
            return;
        }
        // already inside a pass: clear the color attachment in place
        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [r, g, b, a],
                },
            },
        };
        let rect = vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: data.target_extent,
            },
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            state.device.cmd_clear_attachments(
                data.frames[data.current_frame].command_buffer,
                &[attachment],
                &[rect],
            );
        }
    }

    fn render_cmd_begin_render_pass(&self, window: &mut Window) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: data.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(data.render_pass)
            .framebuffer(data.framebuffers[data.image_index as usize])
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: data.extent,
            })
            .clear_values(&clear_values);
        unsafe {
            state.device.cmd_begin_render_pass(
                data.frames[data.current_frame].command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        data.in_render_pass = true;
        data.target_extent = data.extent;
    }

    fn render_cmd_end_render_pass(&self, window: &mut Window) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state
                .device
                .cmd_end_render_pass(data.frames[data.current_frame].command_buffer);
        }
        data.in_render_pass = false;
    }

    fn render_cmd_bind_pipeline(&self, window: &mut Window, pipeline: &Pipeline) {
        let state = self.state();
        let payload = pipeline
            .backend()
            .downcast_ref::<VkPipeline>()
            .expect("pipeline payload does not belong to the Vulkan backend");
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        let command_buffer = data.frames[data.current_frame].command_buffer;
        unsafe {
            state.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                payload.pipeline,
            );
        }

        // resolve "-1 means match the render target"
        let target = data.target_extent;
        let viewport = vk::Viewport {
            x: payload.viewport.x,
            y: payload.viewport.y,
            width: if payload.viewport.width < 0.0 {
                target.width as f32
            } else {
                payload.viewport.width
            },
            height: if payload.viewport.height < 0.0 {
                target.height as f32
            } else {
                payload.viewport.height
            },
            min_depth: payload.viewport.min_depth,
            max_depth: payload.viewport.max_depth,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: payload.scissor.x,
                y: payload.scissor.y,
            },
            extent: vk::Extent2D {
                width: if payload.scissor.width < 0 {
                    target.width
                } else {
                    payload.scissor.width as u32
                },
                height: if payload.scissor.height < 0 {
                    target.height
                } else {
                    payload.scissor.height as u32
                },
            },
        };
        unsafe {
            state
                .device
                .cmd_set_viewport(command_buffer, 0, &[viewport]);
            state.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
        }
    }

    fn render_cmd_bind_vertex_buffer(&self, window: &mut Window, buffer: &Buffer) {
        let state = self.state();
        let payload = buffer
            .backend()
            .downcast_ref::<VkBuffer>()
            .expect("buffer payload does not belong to the Vulkan backend");
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state.device.cmd_bind_vertex_buffers(
                data.frames[data.current_frame].command_buffer,
                0,
                &[payload.vertex.buffer],
                &[0],
            );
        }
    }

    fn render_cmd_bind_index_buffer(&self, window: &mut Window, buffer: &Buffer) {
        let state = self.state();
        let payload = buffer
            .backend()
            .downcast_ref::<VkBuffer>()
            .expect("buffer payload does not belong to the Vulkan backend");
        let Some(index) = &payload.index else {
            log::error!(target: "levikno", "bind_index_buffer on a buffer without index storage");
            return;
        };
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state.device.cmd_bind_index_buffer(
                data.frames[data.current_frame].command_buffer,
                index.buffer,
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    fn render_cmd_bind_descriptor_sets(
        &self,
        window: &mut Window,
        pipeline: &Pipeline,
        first_set: u32,
        sets: &[&DescriptorSet],
    ) {
        let state = self.state();
        let layout = pipeline
            .backend()
            .downcast_ref::<VkPipeline>()
            .expect("pipeline payload does not belong to the Vulkan backend")
            .layout;
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        let frame = data.current_frame;
        let native_sets: Vec<vk::DescriptorSet> = sets
            .iter()
            .map(|set| {
                set.backend()
                    .downcast_ref::<VkDescriptorSet>()
                    .expect("descriptor set payload does not belong to the Vulkan backend")
                    .set_for_frame(frame)
            })
            .collect();
        unsafe {
            state.device.cmd_bind_descriptor_sets(
                data.frames[frame].command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                &native_sets,
                &[],
            );
        }
    }

    fn render_cmd_draw(&self, window: &mut Window, vertex_count: u32) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state
                .device
                .cmd_draw(data.frames[data.current_frame].command_buffer, vertex_count, 1, 0, 0);
        }
    }

    fn render_cmd_draw_indexed(&self, window: &mut Window, index_count: u32) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state.device.cmd_draw_indexed(
                data.frames[data.current_frame].command_buffer,
                index_count,
                1,
                0,
                0,
                0,
            );
        }
    }

    fn render_cmd_draw_instanced(
        &self,
        window: &mut Window,
        vertex_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state.device.cmd_draw(
                data.frames[data.current_frame].command_buffer,
                vertex_count,
                instance_count,
                0,
                first_instance,
            );
        }
    }

    fn render_cmd_draw_indexed_instanced(
        &self,
        window: &mut Window,
        index_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state.device.cmd_draw_indexed(
                data.frames[data.current_frame].command_buffer,
                index_count,
                instance_count,
                0,
                0,
                first_instance,
            );
        }
    }

    fn render_cmd_set_stencil_reference(&self, _window: &mut Window, _reference: u32) {
        // stencil state is baked into pipelines on this backend
    }

    fn render_cmd_set_stencil_mask(
        &self,
        _window: &mut Window,
        _compare_mask: u32,
        _write_mask: u32,
    ) {
    }

    fn render_cmd_begin_frame_buffer(&self, window: &mut Window, framebuffer: &FrameBuffer) {
        let state = self.state();
        let payload = framebuffer
            .backend()
            .downcast_ref::<VkFrameBuffer>()
            .expect("framebuffer payload does not belong to the Vulkan backend");
        let fb = payload.data.lock().unwrap();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        let clear_values = fb.clear_values();
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(fb.render_pass)
            .framebuffer(fb.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: fb.extent,
            })
            .clear_values(&clear_values);
        unsafe {
            state.device.cmd_begin_render_pass(
                data.frames[data.current_frame].command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        data.in_render_pass = true;
        data.target_extent = fb.extent;
    }

    fn render_cmd_end_frame_buffer(&self, window: &mut Window, _framebuffer: &FrameBuffer) {
        let state = self.state();
        let data = self.window_data(window);
        if data.frame_skipped {
            return;
        }
        unsafe {
            state
                .device
                .cmd_end_render_pass(data.frames[data.current_frame].command_buffer);
        }
        data.in_render_pass = false;
        data.target_extent = data.extent;
    }

    //----------------------------------------------------------------------------------------------

    fn buffer_update_vertex_data(&self, buffer: &mut Buffer, data: &[u8], offset: u64) {
        let state = self.state();
        let payload = buffer
            .backend()
            .downcast_ref::<VkBuffer>()
            .expect("buffer payload does not belong to the Vulkan backend");
        if let Err(err) = memory::upload_to_buffer(state, payload.vertex.buffer, offset, data) {
            log::error!(target: "levikno", "vertex buffer update failed: {}", err);
        }
    }

    fn buffer_update_index_data(&self, buffer: &mut Buffer, indices: &[u32], offset: u64) {
        let state = self.state();
        let payload = buffer
            .backend()
            .downcast_ref::<VkBuffer>()
            .expect("buffer payload does not belong to the Vulkan backend");
        let Some(index) = &payload.index else {
            log::error!(target: "levikno", "index update on a buffer without index storage");
            return;
        };
        let bytes =
            unsafe { std::slice::from_raw_parts(indices.as_ptr() as *const u8, indices.len() * 4) };
        if let Err(err) = memory::upload_to_buffer(state, index.buffer, offset, bytes) {
            log::error!(target: "levikno", "index buffer update failed: {}", err);
        }
    }

    fn buffer_resize_vertex_buffer(&self, buffer: &mut Buffer, size: u64) {
        let state = self.state();
        let payload = buffer
            .backend_mut()
            .downcast_mut::<VkBuffer>()
            .expect("buffer payload does not belong to the Vulkan backend");
        if let Err(err) = buffer::resize_allocation(
            state,
            &mut payload.vertex,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            size,
        ) {
            log::error!(target: "levikno", "vertex buffer resize failed: {}", err);
        }
    }

    fn buffer_resize_index_buffer(&self, buffer: &mut Buffer, size: u64) {
        let state = self.state();
        let payload = buffer
            .backend_mut()
            .downcast_mut::<VkBuffer>()
            .expect("buffer payload does not belong to the Vulkan backend");
        let Some(index) = payload.index.as_mut() else {
            log::error!(target: "levikno", "index resize on a buffer without index storage");
            return;
        };
        if let Err(err) =
            buffer::resize_allocation(state, index, vk::BufferUsageFlags::INDEX_BUFFER, size)
        {
            log::error!(target: "levikno", "index buffer resize failed: {}", err);
        }
    }

    fn update_uniform_buffer_data(&self, window: &Window, buffer: &mut UniformBuffer, data: &[u8]) {
        let frame = window
            .backend()
            .downcast_ref::<VkWindowData>()
            .map(|w| w.current_frame as u32)
            .unwrap_or(0);
        let payload = buffer
            .backend()
            .downcast_ref::<VkUniformBuffer>()
            .expect("uniform buffer payload does not belong to the Vulkan backend");
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                payload.mapped.add(payload.slot_offset(frame) as usize),
                data.len(),
            );
        }
    }

    fn update_descriptor_set_data(
        &self,
        set: &mut DescriptorSet,
        updates: &[ResolvedDescriptorUpdate],
    ) -> Result<()> {
        let payload = set
            .backend()
            .downcast_ref::<VkDescriptorSet>()
            .expect("descriptor set payload does not belong to the Vulkan backend");
        descriptor::update_descriptor_sets(self.state(), payload, updates)
    }

    fn frame_buffer_resize(&self, framebuffer: &mut FrameBuffer, width: u32, height: u32) {
        let payload = framebuffer
            .backend()
            .downcast_ref::<VkFrameBuffer>()
            .expect("framebuffer payload does not belong to the Vulkan backend");
        let mut data = payload.data.lock().unwrap();
        framebuffer::resize(self.state(), &mut data, width, height);
    }

    fn frame_buffer_set_clear_color(
        &self,
        framebuffer: &mut FrameBuffer,
        attachment_index: u32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) {
        let payload = framebuffer
            .backend()
            .downcast_ref::<VkFrameBuffer>()
            .expect("framebuffer payload does not belong to the Vulkan backend");
        let mut data = payload.data.lock().unwrap();
        if let Some(slot) = data.clear_colors.get_mut(attachment_index as usize) {
            *slot = [r, g, b, a];
        }
    }

    fn window_framebuffer_resized(&self, window: &mut Window, _width: u32, _height: u32) {
        self.window_data(window).swapchain_dirty = true;
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(state) = self.device.take() {
                let _ = state.device.device_wait_idle();
                state.device.destroy_command_pool(state.upload_pool, None);
                state.device.destroy_device(None);
            }
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
