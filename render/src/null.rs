//! Headless null backend.
//!
//! Implements the full backend contract without touching a GPU: buffer
//! and texture contents live in host memory and every recorded command is
//! kept as data. That makes it a readback-capable backend for tests,
//! headless tools and CI, where submitted frames can be inspected instead
//! of presented.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::{Arc, Mutex};

use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};

use crate::backend::*;
use crate::buffer::{Buffer, BufferCreateInfo, BufferTypeFlags, UniformBuffer, UniformBufferCreateInfo};
use crate::descriptor::{DescriptorLayout, DescriptorLayoutCreateInfo, DescriptorSet};
use crate::error::{Error, Result};
use crate::format::DepthImageFormat;
use crate::framebuffer::{FrameBuffer, FrameBufferCreateInfo};
use crate::pipeline::Pipeline;
use crate::shader::{Shader, ShaderCreateInfo};
use crate::texture::{
    Cubemap, CubemapCreateInfo, Sampler, SamplerCreateInfo, Texture, TextureCreateInfo,
    TextureSamplerCreateInfo,
};
use crate::window::{Event, NativeWindow, Window, WindowCreateInfo};

/// Commands recorded by the null backend, one per `render_cmd_*` call.
#[derive(Clone, Debug, PartialEq)]
pub enum NullCommand {
    BeginRenderPass,
    EndRenderPass,
    ClearColor([f32; 4]),
    BindPipeline,
    BindVertexBuffer,
    BindIndexBuffer,
    BindDescriptorSets { first_set: u32, count: u32 },
    Draw { vertex_count: u32 },
    DrawIndexed { index_count: u32 },
    DrawInstanced { vertex_count: u32, instance_count: u32, first_instance: u32 },
    DrawIndexedInstanced { index_count: u32, instance_count: u32, first_instance: u32 },
    SetStencilReference(u32),
    SetStencilMask { compare_mask: u32, write_mask: u32 },
    BeginFrameBuffer,
    EndFrameBuffer,
}

#[derive(Debug)]
pub struct NullWindow {
    pub frame_index: u32,
    pub frames_submitted: u64,
    pub swapchain_dirty: bool,
    pub recording: Vec<NullCommand>,
    /// Command streams of every submitted frame, in submission order.
    pub submitted: Vec<Vec<NullCommand>>,
}

impl BackendWindow for NullWindow {}

#[derive(Debug)]
pub struct NullShader {
    pub vertex_src: String,
    pub fragment_src: String,
}

impl BackendShader for NullShader {}

#[derive(Debug)]
pub struct NullDescriptorLayout;
impl BackendDescriptorLayout for NullDescriptorLayout {}

#[derive(Debug, Default)]
pub struct NullDescriptorSet {
    /// (binding, debug description) of the latest applied update per slot.
    pub writes: Vec<(u32, String)>,
}
impl BackendDescriptorSet for NullDescriptorSet {}

#[derive(Debug)]
pub struct NullPipeline;
impl BackendPipeline for NullPipeline {}

#[derive(Debug, Default)]
pub struct NullBuffer {
    pub vertex: Vec<u8>,
    pub index: Vec<u32>,
}

impl BackendBuffer for NullBuffer {}

#[derive(Debug)]
pub struct NullUniformBuffer {
    /// One slot per frame in flight (a single slot for storage buffers).
    pub slots: Vec<Vec<u8>>,
}

impl BackendUniformBuffer for NullUniformBuffer {}

#[derive(Debug)]
pub struct NullFrameBufferData {
    pub width: u32,
    pub height: u32,
    pub clear_colors: Vec<[f32; 4]>,
}

#[derive(Debug)]
pub enum NullTexture {
    Image {
        pixels: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// Color attachment of a framebuffer; dimensions track resizes.
    Attachment {
        data: Arc<Mutex<NullFrameBufferData>>,
        index: usize,
    },
}

impl BackendTexture for NullTexture {}

#[derive(Debug)]
pub struct NullSampler;
impl BackendSampler for NullSampler {}

#[derive(Debug)]
pub struct NullCubemap {
    pub face_size: (u32, u32),
}
impl BackendCubemap for NullCubemap {}

#[derive(Debug)]
pub struct NullFrameBuffer {
    pub data: Arc<Mutex<NullFrameBufferData>>,
}

impl BackendFrameBuffer for NullFrameBuffer {}

//--------------------------------------------------------------------------------------------------

/// The null backend instance.
#[derive(Debug)]
pub struct NullBackend {
    max_frames_in_flight: u32,
    supported_depth_formats: Vec<DepthImageFormat>,
}

impl NullBackend {
    pub fn new() -> NullBackend {
        NullBackend {
            max_frames_in_flight: 1,
            supported_depth_formats: vec![
                DepthImageFormat::Depth32,
                DepthImageFormat::Depth24Stencil8,
            ],
        }
    }

    /// Overrides which depth formats the synthetic device reports as
    /// supported.
    pub fn with_supported_depth_formats(mut self, formats: Vec<DepthImageFormat>) -> NullBackend {
        self.supported_depth_formats = formats;
        self
    }

    fn window_data<'a>(&self, window: &'a mut Window) -> &'a mut NullWindow {
        window
            .backend
            .downcast_mut::<NullWindow>()
            .expect("window payload does not belong to the null backend")
    }

    fn record(&self, window: &mut Window, command: NullCommand) {
        self.window_data(window).recording.push(command);
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        NullBackend::new()
    }
}

impl RenderBackend for NullBackend {
    fn api(&self) -> GraphicsApi {
        // reports as Vulkan for clip-region purposes; there is no GPU
        GraphicsApi::Vulkan
    }

    fn physical_devices(&self) -> Vec<PhysicalDevice> {
        vec![PhysicalDevice {
            info: PhysicalDeviceInfo {
                name: String::from("null device"),
                device_type: PhysicalDeviceType::Other,
                vendor_id: 0,
                driver_version: 0,
                api_version: 0,
            },
            id: 0,
        }]
    }

    fn check_physical_device_support(&self, _device: &PhysicalDevice) -> Result<()> {
        Ok(())
    }

    fn render_init(&mut self, info: &RenderInitInfo) -> Result<()> {
        self.max_frames_in_flight = info.max_frames_in_flight.max(1);
        Ok(())
    }

    fn max_frames_in_flight(&self) -> u32 {
        self.max_frames_in_flight
    }

    fn find_supported_depth_image_format(
        &self,
        candidates: &[DepthImageFormat],
    ) -> Result<DepthImageFormat> {
        candidates
            .iter()
            .copied()
            .find(|f| self.supported_depth_formats.contains(f))
            .ok_or_else(|| Error::validation("no candidate depth image format is supported"))
    }

    //----------------------------------------------------------------------------------------------

    fn create_window(
        &self,
        _info: &WindowCreateInfo,
        _native: &dyn NativeWindow,
    ) -> Result<Box<dyn BackendWindow>> {
        Ok(Box::new(NullWindow {
            frame_index: 0,
            frames_submitted: 0,
            swapchain_dirty: false,
            recording: Vec::new(),
            submitted: Vec::new(),
        }))
    }

    fn destroy_window(&self, _window: Window) {}

    fn create_shader_from_src(&self, info: &ShaderCreateInfo) -> Result<Box<dyn BackendShader>> {
        Ok(Box::new(NullShader {
            vertex_src: info.vertex_src.clone(),
            fragment_src: info.fragment_src.clone(),
        }))
    }

    fn create_shader_from_file_src(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>> {
        self.create_shader_from_src(info)
    }

    fn create_shader_from_file_bin(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>> {
        self.create_shader_from_src(info)
    }

    fn destroy_shader(&self, _shader: Shader) {}

    fn create_descriptor_layout(
        &self,
        _info: &DescriptorLayoutCreateInfo,
    ) -> Result<Box<dyn BackendDescriptorLayout>> {
        Ok(Box::new(NullDescriptorLayout))
    }

    fn destroy_descriptor_layout(&self, _layout: DescriptorLayout) {}

    fn create_descriptor_set(
        &self,
        _layout: &DescriptorLayout,
    ) -> Result<Box<dyn BackendDescriptorSet>> {
        Ok(Box::new(NullDescriptorSet::default()))
    }

    fn destroy_descriptor_set(&self, _set: DescriptorSet) {}

    fn create_pipeline(
        &self,
        _info: &PipelineBackendCreateInfo,
    ) -> Result<Box<dyn BackendPipeline>> {
        Ok(Box::new(NullPipeline))
    }

    fn destroy_pipeline(&self, _pipeline: Pipeline) {}

    fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Box<dyn BackendBuffer>> {
        let mut buffer = NullBuffer::default();
        if let Some(data) = info.vertex_data {
            buffer.vertex = data.to_vec();
        } else {
            buffer.vertex = vec![0; info.vertex_buffer_size as usize];
        }
        if info.buffer_type.contains(BufferTypeFlags::INDEX) {
            if let Some(indices) = info.index_data {
                buffer.index = indices.to_vec();
            } else {
                buffer.index = vec![0; (info.index_buffer_size / 4) as usize];
            }
        }
        Ok(Box::new(buffer))
    }

    fn destroy_buffer(&self, _buffer: Buffer) {}

    fn create_uniform_buffer(
        &self,
        info: &UniformBufferCreateInfo,
    ) -> Result<Box<dyn BackendUniformBuffer>> {
        let slot_count = if info.buffer_type.contains(BufferTypeFlags::STORAGE) {
            1
        } else {
            self.max_frames_in_flight as usize
        };
        let slot = match info.initial_data {
            Some(data) => {
                let mut bytes = data.to_vec();
                bytes.resize(info.size as usize, 0);
                bytes
            }
            None => vec![0; info.size as usize],
        };
        Ok(Box::new(NullUniformBuffer {
            slots: vec![slot; slot_count],
        }))
    }

    fn destroy_uniform_buffer(&self, _buffer: UniformBuffer) {}

    fn create_texture(&self, info: &TextureCreateInfo) -> Result<Box<dyn BackendTexture>> {
        Ok(Box::new(NullTexture::Image {
            pixels: info.image.pixels.clone(),
            width: info.image.width,
            height: info.image.height,
        }))
    }

    fn create_texture_sampler(
        &self,
        info: &TextureSamplerCreateInfo,
        _sampler: &Sampler,
    ) -> Result<Box<dyn BackendTexture>> {
        Ok(Box::new(NullTexture::Image {
            pixels: info.image.pixels.clone(),
            width: info.image.width,
            height: info.image.height,
        }))
    }

    fn destroy_texture(&self, _texture: Texture) {}

    fn create_sampler(&self, _info: &SamplerCreateInfo) -> Result<Box<dyn BackendSampler>> {
        Ok(Box::new(NullSampler))
    }

    fn destroy_sampler(&self, _sampler: Sampler) {}

    fn create_cubemap(&self, info: &CubemapCreateInfo) -> Result<Box<dyn BackendCubemap>> {
        Ok(Box::new(NullCubemap {
            face_size: (info.pos_x.width, info.pos_x.height),
        }))
    }

    fn destroy_cubemap(&self, _cubemap: Cubemap) {}

    fn create_frame_buffer(&self, info: &FrameBufferCreateInfo) -> Result<FrameBufferParts> {
        let data = Arc::new(Mutex::new(NullFrameBufferData {
            width: info.width,
            height: info.height,
            clear_colors: vec![[0.0; 4]; info.color_attachments.len()],
        }));
        let attachment_textures = (0..info.color_attachments.len())
            .map(|index| {
                Box::new(NullTexture::Attachment {
                    data: data.clone(),
                    index,
                }) as Box<dyn BackendTexture>
            })
            .collect();
        Ok(FrameBufferParts {
            framebuffer: Box::new(NullFrameBuffer { data }),
            attachment_textures,
        })
    }

    fn destroy_frame_buffer(&self, _framebuffer: FrameBuffer) {}

    //----------------------------------------------------------------------------------------------

    fn render_begin_next_frame(&self, window: &mut Window) -> Result<()> {
        let frames = self.max_frames_in_flight;
        let data = self.window_data(window);
        if data.swapchain_dirty {
            // a real backend would rebuild the swapchain and skip the frame
            data.swapchain_dirty = false;
        }
        data.frame_index = (data.frame_index + 1) % frames.max(1);
        Ok(())
    }

    fn render_draw_submit(&self, window: &mut Window) -> Result<()> {
        let data = self.window_data(window);
        let commands = std::mem::take(&mut data.recording);
        data.submitted.push(commands);
        data.frames_submitted += 1;
        Ok(())
    }

    fn render_begin_command_recording(&self, window: &mut Window) {
        self.window_data(window).recording.clear();
    }

    fn render_end_command_recording(&self, _window: &mut Window) {}

    fn render_clear_color(&self, window: &mut Window, r: f32, g: f32, b: f32, a: f32) {
        self.record(window, NullCommand::ClearColor([r, g, b, a]));
    }

    fn render_cmd_begin_render_pass(&self, window: &mut Window) {
        self.record(window, NullCommand::BeginRenderPass);
    }

    fn render_cmd_end_render_pass(&self, window: &mut Window) {
        self.record(window, NullCommand::EndRenderPass);
    }

    fn render_cmd_bind_pipeline(&self, window: &mut Window, _pipeline: &Pipeline) {
        self.record(window, NullCommand::BindPipeline);
    }

    fn render_cmd_bind_vertex_buffer(&self, window: &mut Window, _buffer: &Buffer) {
        self.record(window, NullCommand::BindVertexBuffer);
    }

    fn render_cmd_bind_index_buffer(&self, window: &mut Window, _buffer: &Buffer) {
        self.record(window, NullCommand::BindIndexBuffer);
    }

    fn render_cmd_bind_descriptor_sets(
        &self,
        window: &mut Window,
        _pipeline: &Pipeline,
        first_set: u32,
        sets: &[&DescriptorSet],
    ) {
        self.record(
            window,
            NullCommand::BindDescriptorSets {
                first_set,
                count: sets.len() as u32,
            },
        );
    }

    fn render_cmd_draw(&self, window: &mut Window, vertex_count: u32) {
        self.record(window, NullCommand::Draw { vertex_count });
    }

    fn render_cmd_draw_indexed(&self, window: &mut Window, index_count: u32) {
        self.record(window, NullCommand::DrawIndexed { index_count });
    }

    fn render_cmd_draw_instanced(
        &self,
        window: &mut Window,
        vertex_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) {
        self.record(
            window,
            NullCommand::DrawInstanced {
                vertex_count,
                instance_count,
                first_instance,
            },
        );
    }

    fn render_cmd_draw_indexed_instanced(
        &self,
        window: &mut Window,
        index_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) {
        self.record(
            window,
            NullCommand::DrawIndexedInstanced {
                index_count,
                instance_count,
                first_instance,
            },
        );
    }

    fn render_cmd_set_stencil_reference(&self, window: &mut Window, reference: u32) {
        self.record(window, NullCommand::SetStencilReference(reference));
    }

    fn render_cmd_set_stencil_mask(&self, window: &mut Window, compare_mask: u32, write_mask: u32) {
        self.record(
            window,
            NullCommand::SetStencilMask {
                compare_mask,
                write_mask,
            },
        );
    }

    fn render_cmd_begin_frame_buffer(&self, window: &mut Window, _framebuffer: &FrameBuffer) {
        self.record(window, NullCommand::BeginFrameBuffer);
    }

    fn render_cmd_end_frame_buffer(&self, window: &mut Window, _framebuffer: &FrameBuffer) {
        self.record(window, NullCommand::EndFrameBuffer);
    }

    //----------------------------------------------------------------------------------------------

    fn buffer_update_vertex_data(&self, buffer: &mut Buffer, data: &[u8], offset: u64) {
        let payload = buffer
            .backend
            .downcast_mut::<NullBuffer>()
            .expect("buffer payload does not belong to the null backend");
        let offset = offset as usize;
        let end = offset + data.len();
        if payload.vertex.len() < end {
            payload.vertex.resize(end, 0);
        }
        payload.vertex[offset..end].copy_from_slice(data);
    }

    fn buffer_update_index_data(&self, buffer: &mut Buffer, indices: &[u32], offset: u64) {
        let payload = buffer
            .backend
            .downcast_mut::<NullBuffer>()
            .expect("buffer payload does not belong to the null backend");
        let offset = offset as usize;
        let end = offset + indices.len();
        if payload.index.len() < end {
            payload.index.resize(end, 0);
        }
        payload.index[offset..end].copy_from_slice(indices);
    }

    fn buffer_resize_vertex_buffer(&self, buffer: &mut Buffer, size: u64) {
        let payload = buffer
            .backend
            .downcast_mut::<NullBuffer>()
            .expect("buffer payload does not belong to the null backend");
        payload.vertex.resize(size as usize, 0);
    }

    fn buffer_resize_index_buffer(&self, buffer: &mut Buffer, size: u64) {
        let payload = buffer
            .backend
            .downcast_mut::<NullBuffer>()
            .expect("buffer payload does not belong to the null backend");
        payload.index.resize((size / 4) as usize, 0);
    }

    fn update_uniform_buffer_data(&self, window: &Window, buffer: &mut UniformBuffer, data: &[u8]) {
        let frame = window
            .backend
            .downcast_ref::<NullWindow>()
            .map(|w| w.frame_index as usize)
            .unwrap_or(0);
        let payload = buffer
            .backend
            .downcast_mut::<NullUniformBuffer>()
            .expect("uniform buffer payload does not belong to the null backend");
        let slot_count = payload.slots.len();
        let slot = &mut payload.slots[frame % slot_count];
        slot[..data.len()].copy_from_slice(data);
    }

    fn update_descriptor_set_data(
        &self,
        set: &mut DescriptorSet,
        updates: &[ResolvedDescriptorUpdate],
    ) -> Result<()> {
        let payload = set
            .backend
            .downcast_mut::<NullDescriptorSet>()
            .expect("descriptor set payload does not belong to the null backend");
        for update in updates {
            let description = match &update.write {
                DescriptorWrite::Buffer { offset, range, .. } => {
                    format!("buffer offset={} range={}", offset, range)
                }
                DescriptorWrite::Textures(textures) => format!("textures x{}", textures.len()),
            };
            payload.writes.retain(|(binding, _)| *binding != update.binding);
            payload.writes.push((update.binding, description));
        }
        Ok(())
    }

    fn frame_buffer_resize(&self, framebuffer: &mut FrameBuffer, width: u32, height: u32) {
        let payload = framebuffer
            .backend
            .downcast_ref::<NullFrameBuffer>()
            .expect("framebuffer payload does not belong to the null backend");
        let mut data = payload.data.lock().unwrap();
        data.width = width;
        data.height = height;
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
            .backend
            .downcast_ref::<NullFrameBuffer>()
            .expect("framebuffer payload does not belong to the null backend");
        let mut data = payload.data.lock().unwrap();
        if let Some(slot) = data.clear_colors.get_mut(attachment_index as usize) {
            *slot = [r, g, b, a];
        }
    }

    fn window_framebuffer_resized(&self, window: &mut Window, _width: u32, _height: u32) {
        self.window_data(window).swapchain_dirty = true;
    }
}

//--------------------------------------------------------------------------------------------------

/// Window adapter with no OS window behind it; pairs with [`NullBackend`]
/// for headless runs.
pub struct HeadlessWindow {
    width: Cell<i32>,
    height: Cell<i32>,
    open: Cell<bool>,
    vsync: Cell<bool>,
    queued_events: RefCell<Vec<Event>>,
}

impl fmt::Debug for HeadlessWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HeadlessWindow")
            .field("width", &self.width.get())
            .field("height", &self.height.get())
            .finish()
    }
}

impl HeadlessWindow {
    pub fn new(width: i32, height: i32) -> HeadlessWindow {
        HeadlessWindow {
            width: Cell::new(width),
            height: Cell::new(height),
            open: Cell::new(true),
            vsync: Cell::new(true),
            queued_events: RefCell::new(Vec::new()),
        }
    }

    /// Queues an event for the next `poll_events` pump.
    pub fn push_event(&self, event: Event) {
        if let Event::FramebufferResize { width, height } = event {
            self.width.set(width);
            self.height.set(height);
        }
        if event == Event::WindowClose {
            self.open.set(false);
        }
        self.queued_events.borrow_mut().push(event);
    }
}

impl NativeWindow for HeadlessWindow {
    fn dimensions(&self) -> (i32, i32) {
        (self.width.get(), self.height.get())
    }

    fn framebuffer_dimensions(&self) -> (i32, i32) {
        (self.width.get(), self.height.get())
    }

    fn open(&self) -> bool {
        self.open.get()
    }

    fn poll_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.queued_events.borrow_mut())
    }

    fn set_vsync(&self, enabled: bool) {
        self.vsync.set(enabled);
    }

    fn vsync(&self) -> bool {
        self.vsync.get()
    }

    fn key_pressed(&self, _key: i32) -> bool {
        false
    }

    fn key_released(&self, _key: i32) -> bool {
        false
    }

    fn mouse_button_pressed(&self, _button: i32) -> bool {
        false
    }

    fn mouse_pos(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Xlib(XlibDisplayHandle::empty())
    }

    fn raw_window_handle(&self) -> RawWindowHandle {
        RawWindowHandle::Xlib(XlibWindowHandle::empty())
    }
}
