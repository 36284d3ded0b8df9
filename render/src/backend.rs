//! The backend seam.
//!
//! [`RenderBackend`] is the dispatch table the context binds once at
//! creation and never swaps thereafter. Each engine object carries a
//! backend payload behind one of the `Backend*` object traits; backends
//! downcast those payloads to their concrete types — the context
//! guarantees payloads are only ever handed back to the backend that
//! created them.

use std::fmt;

use downcast_rs::{impl_downcast, Downcast};
use smallvec::SmallVec;

use crate::buffer::{Buffer, BufferCreateInfo, UniformBuffer, UniformBufferCreateInfo};
use crate::descriptor::{
    DescriptorLayout, DescriptorLayoutCreateInfo, DescriptorSet, DescriptorType,
};
use crate::error::Result;
use crate::format::{ColorImageFormat, DepthImageFormat};
use crate::framebuffer::{FrameBuffer, FrameBufferCreateInfo};
use crate::pipeline::{Pipeline, PipelineSpecification};
use crate::shader::{Shader, ShaderCreateInfo};
use crate::texture::{
    Cubemap, CubemapCreateInfo, Sampler, SamplerCreateInfo, Texture, TextureCreateInfo,
    TextureSamplerCreateInfo,
};
use crate::vertex::{VertexAttribute, VertexBindingDescription};
use crate::window::{NativeWindow, Window, WindowCreateInfo};

/// Graphics APIs a backend can implement.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GraphicsApi {
    Vulkan,
    OpenGl,
}

impl GraphicsApi {
    pub fn name(self) -> &'static str {
        match self {
            GraphicsApi::Vulkan => "vulkan",
            GraphicsApi::OpenGl => "opengl",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PhysicalDeviceType {
    Other,
    IntegratedGpu,
    DiscreteGpu,
    VirtualGpu,
    Cpu,
}

#[derive(Clone, Debug)]
pub struct PhysicalDeviceInfo {
    pub name: String,
    pub device_type: PhysicalDeviceType,
    pub vendor_id: u32,
    pub driver_version: u32,
    pub api_version: u32,
}

/// One enumerable adapter. `id` is backend-defined (the OpenGL backend
/// reports a single synthetic device).
#[derive(Clone, Debug)]
pub struct PhysicalDevice {
    pub info: PhysicalDeviceInfo,
    pub id: u64,
}

/// Parameters for `render_init`, after the caller has picked a physical
/// device.
#[derive(Clone, Debug)]
pub struct RenderInitInfo {
    pub physical_device: PhysicalDevice,
    /// How many CPU-submitted frames may overlap on the GPU (typically
    /// 1–3).
    pub max_frames_in_flight: u32,
    pub gamma_correction: bool,
}

//--------------------------------------------------------------------------------------------------
// Backend object payload traits.

pub trait BackendWindow: Downcast + fmt::Debug {}
pub trait BackendShader: Downcast + fmt::Debug {}
pub trait BackendDescriptorLayout: Downcast + fmt::Debug {}
pub trait BackendDescriptorSet: Downcast + fmt::Debug {}
pub trait BackendPipeline: Downcast + fmt::Debug {}
pub trait BackendBuffer: Downcast + fmt::Debug {}
pub trait BackendUniformBuffer: Downcast + fmt::Debug {}
pub trait BackendTexture: Downcast + fmt::Debug {}
pub trait BackendSampler: Downcast + fmt::Debug {}
pub trait BackendCubemap: Downcast + fmt::Debug {}
pub trait BackendFrameBuffer: Downcast + fmt::Debug {}

// unchecked downcasts are fine here: payloads only ever return to the
// backend that created them
impl_downcast!(BackendWindow);
impl_downcast!(BackendShader);
impl_downcast!(BackendDescriptorLayout);
impl_downcast!(BackendDescriptorSet);
impl_downcast!(BackendPipeline);
impl_downcast!(BackendBuffer);
impl_downcast!(BackendUniformBuffer);
impl_downcast!(BackendTexture);
impl_downcast!(BackendSampler);
impl_downcast!(BackendCubemap);
impl_downcast!(BackendFrameBuffer);

//--------------------------------------------------------------------------------------------------

/// The renderpass target a pipeline is created against, resolved to object
/// references for the backend.
pub enum RenderPassTarget<'a> {
    Window(&'a Window),
    FrameBuffer(&'a FrameBuffer),
}

/// Pipeline creation parameters with every handle resolved.
pub struct PipelineBackendCreateInfo<'a> {
    pub specification: &'a PipelineSpecification,
    pub vertex_attributes: &'a [VertexAttribute],
    pub vertex_binding_descriptions: &'a [VertexBindingDescription],
    pub shader: &'a Shader,
    pub descriptor_layouts: SmallVec<[&'a DescriptorLayout; 4]>,
    pub render_pass: RenderPassTarget<'a>,
}

/// Data for one descriptor binding, resolved from handles.
pub enum DescriptorWrite<'a> {
    Buffer {
        buffer: &'a UniformBuffer,
        offset: u64,
        range: u64,
    },
    Textures(SmallVec<[&'a Texture; 4]>),
}

pub struct ResolvedDescriptorUpdate<'a> {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub write: DescriptorWrite<'a>,
}

/// Result of framebuffer creation: the framebuffer payload plus one
/// texture payload per color attachment (exposed as pooled `Texture`
/// objects owned by the framebuffer).
pub struct FrameBufferParts {
    pub framebuffer: Box<dyn BackendFrameBuffer>,
    pub attachment_textures: Vec<Box<dyn BackendTexture>>,
}

//--------------------------------------------------------------------------------------------------

/// Dispatch table implemented by each graphics backend. Populated once at
/// context creation; the context routes every GAL call through it.
///
/// Creation methods return the object's backend payload; destruction
/// methods receive the whole object back and release its native
/// resources. Command-recording methods receive `&mut Window` because the
/// per-window recording state lives in the window payload.
pub trait RenderBackend: fmt::Debug {
    fn api(&self) -> GraphicsApi;

    //----------------------------------------------------------------------------------------------
    // device setup

    fn physical_devices(&self) -> Vec<PhysicalDevice>;
    fn check_physical_device_support(&self, device: &PhysicalDevice) -> Result<()>;
    /// Selects the device, builds queues/shared resources and fixes the
    /// frames-in-flight count.
    fn render_init(&mut self, info: &RenderInitInfo) -> Result<()>;
    fn max_frames_in_flight(&self) -> u32;

    fn find_supported_depth_image_format(
        &self,
        candidates: &[DepthImageFormat],
    ) -> Result<DepthImageFormat>;

    //----------------------------------------------------------------------------------------------
    // object creation / destruction

    fn create_window(
        &self,
        info: &WindowCreateInfo,
        native: &dyn NativeWindow,
    ) -> Result<Box<dyn BackendWindow>>;
    fn destroy_window(&self, window: Window);

    fn create_shader_from_src(&self, info: &ShaderCreateInfo) -> Result<Box<dyn BackendShader>>;
    fn create_shader_from_file_src(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>>;
    fn create_shader_from_file_bin(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>>;
    fn destroy_shader(&self, shader: Shader);

    fn create_descriptor_layout(
        &self,
        info: &DescriptorLayoutCreateInfo,
    ) -> Result<Box<dyn BackendDescriptorLayout>>;
    fn destroy_descriptor_layout(&self, layout: DescriptorLayout);

    fn create_descriptor_set(
        &self,
        layout: &DescriptorLayout,
    ) -> Result<Box<dyn BackendDescriptorSet>>;
    fn destroy_descriptor_set(&self, set: DescriptorSet);

    fn create_pipeline(&self, info: &PipelineBackendCreateInfo) -> Result<Box<dyn BackendPipeline>>;
    fn destroy_pipeline(&self, pipeline: Pipeline);

    fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Box<dyn BackendBuffer>>;
    fn destroy_buffer(&self, buffer: Buffer);

    fn create_uniform_buffer(
        &self,
        info: &UniformBufferCreateInfo,
    ) -> Result<Box<dyn BackendUniformBuffer>>;
    fn destroy_uniform_buffer(&self, buffer: UniformBuffer);

    fn create_texture(&self, info: &TextureCreateInfo) -> Result<Box<dyn BackendTexture>>;
    fn create_texture_sampler(
        &self,
        info: &TextureSamplerCreateInfo,
        sampler: &Sampler,
    ) -> Result<Box<dyn BackendTexture>>;
    fn destroy_texture(&self, texture: Texture);

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Box<dyn BackendSampler>>;
    fn destroy_sampler(&self, sampler: Sampler);

    fn create_cubemap(&self, info: &CubemapCreateInfo) -> Result<Box<dyn BackendCubemap>>;
    fn destroy_cubemap(&self, cubemap: Cubemap);

    fn create_frame_buffer(&self, info: &FrameBufferCreateInfo) -> Result<FrameBufferParts>;
    fn destroy_frame_buffer(&self, framebuffer: FrameBuffer);

    //----------------------------------------------------------------------------------------------
    // frame lifecycle

    /// Acquires the next swapchain image, waits on the frame's fence and
    /// advances the frame index. Rebuilds the swapchain and skips the
    /// frame when it is out of date.
    fn render_begin_next_frame(&self, window: &mut Window) -> Result<()>;
    /// Submits the recorded work and presents.
    fn render_draw_submit(&self, window: &mut Window) -> Result<()>;
    fn render_begin_command_recording(&self, window: &mut Window);
    fn render_end_command_recording(&self, window: &mut Window);
    fn render_clear_color(&self, window: &mut Window, r: f32, g: f32, b: f32, a: f32);

    //----------------------------------------------------------------------------------------------
    // command recording

    fn render_cmd_begin_render_pass(&self, window: &mut Window);
    fn render_cmd_end_render_pass(&self, window: &mut Window);
    fn render_cmd_bind_pipeline(&self, window: &mut Window, pipeline: &Pipeline);
    fn render_cmd_bind_vertex_buffer(&self, window: &mut Window, buffer: &Buffer);
    fn render_cmd_bind_index_buffer(&self, window: &mut Window, buffer: &Buffer);
    fn render_cmd_bind_descriptor_sets(
        &self,
        window: &mut Window,
        pipeline: &Pipeline,
        first_set: u32,
        sets: &[&DescriptorSet],
    );
    fn render_cmd_draw(&self, window: &mut Window, vertex_count: u32);
    fn render_cmd_draw_indexed(&self, window: &mut Window, index_count: u32);
    fn render_cmd_draw_instanced(
        &self,
        window: &mut Window,
        vertex_count: u32,
        instance_count: u32,
        first_instance: u32,
    );
    fn render_cmd_draw_indexed_instanced(
        &self,
        window: &mut Window,
        index_count: u32,
        instance_count: u32,
        first_instance: u32,
    );
    fn render_cmd_set_stencil_reference(&self, window: &mut Window, reference: u32);
    fn render_cmd_set_stencil_mask(&self, window: &mut Window, compare_mask: u32, write_mask: u32);
    fn render_cmd_begin_frame_buffer(&self, window: &mut Window, framebuffer: &FrameBuffer);
    fn render_cmd_end_frame_buffer(&self, window: &mut Window, framebuffer: &FrameBuffer);

    //----------------------------------------------------------------------------------------------
    // resource updates

    fn buffer_update_vertex_data(&self, buffer: &mut Buffer, data: &[u8], offset: u64);
    fn buffer_update_index_data(&self, buffer: &mut Buffer, indices: &[u32], offset: u64);
    fn buffer_resize_vertex_buffer(&self, buffer: &mut Buffer, size: u64);
    fn buffer_resize_index_buffer(&self, buffer: &mut Buffer, size: u64);

    /// Writes into the ring slot of the frame most recently acquired by
    /// `render_begin_next_frame` on `window`.
    fn update_uniform_buffer_data(
        &self,
        window: &Window,
        buffer: &mut UniformBuffer,
        data: &[u8],
    );

    fn update_descriptor_set_data(
        &self,
        set: &mut DescriptorSet,
        updates: &[ResolvedDescriptorUpdate],
    ) -> Result<()>;

    fn frame_buffer_resize(&self, framebuffer: &mut FrameBuffer, width: u32, height: u32);
    fn frame_buffer_set_clear_color(
        &self,
        framebuffer: &mut FrameBuffer,
        attachment_index: u32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    );

    /// Marks the window's swapchain dirty after a framebuffer-resize
    /// event.
    fn window_framebuffer_resized(&self, window: &mut Window, width: u32, height: u32);
}
