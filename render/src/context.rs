//! Process-wide context: init/teardown, the typed object pool, and the
//! namespaced API surface dispatching through the backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use smallvec::SmallVec;

use crate::audio::{AudioEngine, SoundBoard};
use crate::backend::{
    DescriptorWrite, FrameBufferParts, GraphicsApi, PhysicalDevice, PipelineBackendCreateInfo,
    RenderBackend, RenderInitInfo, RenderPassTarget, ResolvedDescriptorUpdate,
};
use crate::buffer::{
    Buffer, BufferCreateInfo, BufferTypeFlags, BufferUsage, UniformBuffer, UniformBufferCreateInfo,
};
use crate::descriptor::{
    DescriptorData, DescriptorLayout, DescriptorLayoutCreateInfo, DescriptorSet,
    DescriptorUpdateInfo,
};
use crate::error::{Error, Result};
use crate::format::{ColorImageFormat, DepthImageFormat};
use crate::framebuffer::{FrameBuffer, FrameBufferCreateInfo};
use crate::logging::{log_init, LoggingInfo, CORE_LOG_TARGET};
use crate::memory::{Handle, MemoryBinding, MemoryPoolInfo, StructureType};
use crate::pipeline::{Pipeline, PipelineCreateInfo, PipelineSpecification, RenderPass};
use crate::shader::{Shader, ShaderCreateInfo};
use crate::texture::{
    Cubemap, CubemapCreateInfo, Sampler, SamplerCreateInfo, Texture, TextureCreateInfo,
    TextureSamplerCreateInfo,
};
use crate::vertex::VertexDataType;
use crate::window::{Event, EventCallback, NativeWindow, Window, WindowCreateInfo};

/// Matrix clip-region conventions for the four projection variants;
/// `ApiSpecific` resolves at context creation to the convention native to
/// the chosen backend.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum ClipRegion {
    #[default]
    ApiSpecific,
    LeftHandedZeroToOne,
    LeftHandedNegOneToOne,
    RightHandedZeroToOne,
    RightHandedNegOneToOne,
}

/// Context creation parameters.
pub struct ContextCreateInfo {
    pub application_name: String,
    pub logging: LoggingInfo,
    /// Color format used for window swapchains (linear or sRGB).
    pub frame_buffer_color_format: ColorImageFormat,
    pub matrix_clip_region: ClipRegion,
    pub memory_info: MemoryPoolInfo,
    /// Optional external audio engine facade.
    pub audio_engine: Option<Box<dyn AudioEngine>>,
}

impl Default for ContextCreateInfo {
    fn default() -> Self {
        ContextCreateInfo {
            application_name: String::from("levikno app"),
            logging: LoggingInfo::default(),
            frame_buffer_color_format: ColorImageFormat::Rgba8,
            matrix_clip_region: ClipRegion::ApiSpecific,
            memory_info: MemoryPoolInfo::default(),
            audio_engine: None,
        }
    }
}

/// One pool binding per engine object type.
pub(crate) struct MemoryPool {
    pub windows: MemoryBinding<Window>,
    pub shaders: MemoryBinding<Shader>,
    pub descriptor_layouts: MemoryBinding<DescriptorLayout>,
    pub descriptor_sets: MemoryBinding<DescriptorSet>,
    pub pipelines: MemoryBinding<Pipeline>,
    pub frame_buffers: MemoryBinding<FrameBuffer>,
    pub buffers: MemoryBinding<Buffer>,
    pub uniform_buffers: MemoryBinding<UniformBuffer>,
    pub textures: MemoryBinding<Texture>,
    pub samplers: MemoryBinding<Sampler>,
    pub cubemaps: MemoryBinding<Cubemap>,
}

impl MemoryPool {
    fn new(info: &MemoryPoolInfo) -> MemoryPool {
        fn binding<T>(info: &MemoryPoolInfo, stype: StructureType) -> MemoryBinding<T> {
            MemoryBinding::new(info.count_for(stype), info.block_count_for(stype))
        }
        MemoryPool {
            windows: binding(info, StructureType::Window),
            shaders: binding(info, StructureType::Shader),
            descriptor_layouts: binding(info, StructureType::DescriptorLayout),
            descriptor_sets: binding(info, StructureType::DescriptorSet),
            pipelines: binding(info, StructureType::Pipeline),
            frame_buffers: binding(info, StructureType::FrameBuffer),
            buffers: binding(info, StructureType::Buffer),
            uniform_buffers: binding(info, StructureType::UniformBuffer),
            textures: binding(info, StructureType::Texture),
            samplers: binding(info, StructureType::Sampler),
            cubemaps: binding(info, StructureType::Cubemap),
        }
    }

    fn live_count(&self, stype: StructureType) -> usize {
        match stype {
            StructureType::Window => self.windows.live(),
            StructureType::Shader => self.shaders.live(),
            StructureType::DescriptorLayout => self.descriptor_layouts.live(),
            StructureType::DescriptorSet => self.descriptor_sets.live(),
            StructureType::Pipeline => self.pipelines.live(),
            StructureType::FrameBuffer => self.frame_buffers.live(),
            StructureType::Buffer => self.buffers.live(),
            StructureType::UniformBuffer => self.uniform_buffers.live(),
            StructureType::Texture => self.textures.live(),
            StructureType::Sampler => self.samplers.live(),
            StructureType::Cubemap => self.cubemaps.live(),
        }
    }
}

fn resolve<'a, T>(
    binding: &'a MemoryBinding<T>,
    handle: Handle<T>,
    what: &str,
) -> Result<&'a T> {
    binding
        .get(handle)
        .ok_or_else(|| Error::validation(format!("stale or invalid {} handle: {:?}", what, handle)))
}

fn resolve_mut<'a, T>(
    binding: &'a mut MemoryBinding<T>,
    handle: Handle<T>,
    what: &str,
) -> Result<&'a mut T> {
    binding
        .get_mut(handle)
        .ok_or_else(|| Error::validation(format!("stale or invalid {} handle: {:?}", what, handle)))
}

// at most one live context per process
static CONTEXT_LIVE: AtomicBool = AtomicBool::new(false);

/// The process-wide engine context. Created at most once at a time; the
/// value itself is the handle every API call goes through.
pub struct Context {
    app_name: String,
    backend: Box<dyn RenderBackend>,
    pool: MemoryPool,
    clip_region: ClipRegion,
    frame_buffer_color_format: ColorImageFormat,
    default_pipeline_spec: PipelineSpecification,
    audio: Option<Box<dyn AudioEngine>>,
    sound_board: SoundBoard,
    created_at: Instant,
    render_initialized: bool,
    terminated: bool,
}

impl Context {
    /// Initializes the context: logger, memory pool, backend wiring and
    /// the clip-region convention. Fails with `AlreadyCalled` while a
    /// previous context is still alive; leaves no partial state on
    /// failure.
    pub fn create(info: ContextCreateInfo, backend: Box<dyn RenderBackend>) -> Result<Context> {
        if CONTEXT_LIVE.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyCalled("Context::create"));
        }

        if info.logging.enable_logging {
            log_init(&info.logging);
        }

        let clip_region = match info.matrix_clip_region {
            ClipRegion::ApiSpecific => match backend.api() {
                GraphicsApi::OpenGl => ClipRegion::RightHandedNegOneToOne,
                GraphicsApi::Vulkan => ClipRegion::LeftHandedZeroToOne,
            },
            explicit => explicit,
        };

        log::trace!(
            target: CORE_LOG_TARGET,
            "context created: app \"{}\", graphics api: {}, clip region: {:?}",
            info.application_name,
            backend.api().name(),
            clip_region
        );

        Ok(Context {
            app_name: info.application_name,
            backend,
            pool: MemoryPool::new(&info.memory_info),
            clip_region,
            frame_buffer_color_format: info.frame_buffer_color_format,
            default_pipeline_spec: PipelineSpecification::default(),
            audio: info.audio_engine,
            sound_board: SoundBoard::default(),
            created_at: Instant::now(),
            render_initialized: false,
            terminated: false,
        })
    }

    /// Tears the context down, reporting any object that was never
    /// destroyed. Dropping the context does the same.
    pub fn terminate(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        for stype in StructureType::ALL {
            let count = self.pool.live_count(stype);
            if count > 0 {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "not all objects of type {} have been destroyed, objects remaining: {}",
                    stype.name(),
                    count
                );
            }
        }
        if !self.sound_board.is_empty() {
            log::warn!(
                target: CORE_LOG_TARGET,
                "not all sounds have been removed from the sound board, sounds remaining: {}",
                self.sound_board.len()
            );
        }

        log::trace!(target: CORE_LOG_TARGET, "context terminated");
        CONTEXT_LIVE.store(false, Ordering::SeqCst);
    }

    //----------------------------------------------------------------------------------------------
    // context queries

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn graphics_api(&self) -> GraphicsApi {
        self.backend.api()
    }

    pub fn clip_region(&self) -> ClipRegion {
        self.clip_region
    }

    pub fn frame_buffer_color_format(&self) -> ColorImageFormat {
        self.frame_buffer_color_format
    }

    /// Time elapsed since context creation.
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Live objects of the given type (zero for all types after a clean
    /// teardown).
    pub fn object_count(&self, stype: StructureType) -> usize {
        self.pool.live_count(stype)
    }

    pub fn pipeline_spec_default(&self) -> PipelineSpecification {
        self.default_pipeline_spec.clone()
    }

    pub fn set_pipeline_spec_default(&mut self, spec: PipelineSpecification) {
        self.default_pipeline_spec = spec;
    }

    //----------------------------------------------------------------------------------------------
    // device setup

    pub fn physical_devices(&self) -> Vec<PhysicalDevice> {
        self.backend.physical_devices()
    }

    pub fn check_physical_device_support(&self, device: &PhysicalDevice) -> Result<()> {
        self.backend.check_physical_device_support(device)
    }

    /// Binds the chosen physical device and fixes the frames-in-flight
    /// count. Must run once before any graphics object is created.
    pub fn render_init(&mut self, info: &RenderInitInfo) -> Result<()> {
        if self.render_initialized {
            return Err(Error::AlreadyCalled("Context::render_init"));
        }
        self.backend.render_init(info)?;
        self.render_initialized = true;
        log::trace!(
            target: CORE_LOG_TARGET,
            "render initialized on device \"{}\", max frames in flight: {}",
            info.physical_device.info.name,
            info.max_frames_in_flight
        );
        Ok(())
    }

    pub fn max_frames_in_flight(&self) -> u32 {
        self.backend.max_frames_in_flight()
    }

    /// Returns the first candidate the device supports, honoring the
    /// candidate order.
    pub fn find_supported_depth_image_format(
        &self,
        candidates: &[DepthImageFormat],
    ) -> Result<DepthImageFormat> {
        self.backend.find_supported_depth_image_format(candidates)
    }

    fn require_render_init(&self, what: &str) -> Result<()> {
        if !self.render_initialized {
            return Err(Error::validation(format!(
                "{} called before render_init",
                what
            )));
        }
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // windows

    pub fn create_window(
        &mut self,
        info: WindowCreateInfo,
        native: Box<dyn NativeWindow>,
    ) -> Result<Handle<Window>> {
        self.require_render_init("create_window")?;
        if info.width < 0 || info.height < 0 {
            return Err(Error::validation(format!(
                "create_window | cannot create window with negative dimensions (w:{},h:{})",
                info.width, info.height
            )));
        }

        let backend = self.backend.create_window(&info, native.as_ref())?;
        let window = Window {
            native,
            title: info.title.clone(),
            vsync: info.vsync,
            event_callback: None,
            record: Default::default(),
            backend,
        };
        let handle = self.pool.windows.take_next(window);
        log::trace!(
            target: CORE_LOG_TARGET,
            "created window: {:?}, \"{}\" (w:{},h:{})",
            handle,
            info.title,
            info.width,
            info.height
        );
        Ok(handle)
    }

    pub fn destroy_window(&mut self, handle: Handle<Window>) -> Result<()> {
        let window = self
            .pool
            .windows
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_window | stale window handle"))?;
        self.backend.destroy_window(window);
        Ok(())
    }

    pub fn window(&self, handle: Handle<Window>) -> Result<&Window> {
        resolve(&self.pool.windows, handle, "window")
    }

    /// Pumps the adapter's events, dispatches them to the window's
    /// callback and reacts to framebuffer resizes.
    pub fn window_update(&mut self, handle: Handle<Window>) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let window = resolve_mut(&mut pool.windows, handle, "window")?;
        let events = window.native.poll_events();
        for event in &events {
            if let Event::FramebufferResize { width, height } = *event {
                backend.window_framebuffer_resized(window, width.max(0) as u32, height.max(0) as u32);
            }
            if let Some(callback) = window.event_callback.as_mut() {
                callback(event);
            }
        }
        Ok(())
    }

    pub fn window_open(&self, handle: Handle<Window>) -> Result<bool> {
        Ok(self.window(handle)?.native().open())
    }

    pub fn window_set_event_callback(
        &mut self,
        handle: Handle<Window>,
        callback: EventCallback,
    ) -> Result<()> {
        resolve_mut(&mut self.pool.windows, handle, "window")?.event_callback = Some(callback);
        Ok(())
    }

    pub fn window_set_vsync(&mut self, handle: Handle<Window>, enabled: bool) -> Result<()> {
        let window = resolve_mut(&mut self.pool.windows, handle, "window")?;
        window.native.set_vsync(enabled);
        window.vsync = enabled;
        Ok(())
    }

    /// The window's default renderpass; pipelines rendering to the window
    /// swapchain must be created against it.
    pub fn window_get_render_pass(&self, handle: Handle<Window>) -> Result<RenderPass> {
        resolve(&self.pool.windows, handle, "window")?;
        Ok(RenderPass::Window(handle))
    }

    //----------------------------------------------------------------------------------------------
    // shaders

    fn validate_shader_info(info: &ShaderCreateInfo, caller: &str) -> Result<()> {
        if info.vertex_src.is_empty() {
            return Err(Error::validation(format!(
                "{} | vertex source is empty, cannot create shader without the vertex stage",
                caller
            )));
        }
        if info.fragment_src.is_empty() {
            return Err(Error::validation(format!(
                "{} | fragment source is empty, cannot create shader without the fragment stage",
                caller
            )));
        }
        Ok(())
    }

    pub fn create_shader_from_src(&mut self, info: &ShaderCreateInfo) -> Result<Handle<Shader>> {
        self.require_render_init("create_shader_from_src")?;
        Self::validate_shader_info(info, "create_shader_from_src")?;
        let backend = self.backend.create_shader_from_src(info)?;
        let handle = self.pool.shaders.take_next(Shader { backend });
        log::trace!(target: CORE_LOG_TARGET, "created shader (from source): {:?}", handle);
        Ok(handle)
    }

    pub fn create_shader_from_file_src(
        &mut self,
        info: &ShaderCreateInfo,
    ) -> Result<Handle<Shader>> {
        self.require_render_init("create_shader_from_file_src")?;
        Self::validate_shader_info(info, "create_shader_from_file_src")?;
        let backend = self.backend.create_shader_from_file_src(info)?;
        let handle = self.pool.shaders.take_next(Shader { backend });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created shader (from source file): {:?}, vertex file: {}, fragment file: {}",
            handle,
            info.vertex_src,
            info.fragment_src
        );
        Ok(handle)
    }

    pub fn create_shader_from_file_bin(
        &mut self,
        info: &ShaderCreateInfo,
    ) -> Result<Handle<Shader>> {
        self.require_render_init("create_shader_from_file_bin")?;
        Self::validate_shader_info(info, "create_shader_from_file_bin")?;
        let backend = self.backend.create_shader_from_file_bin(info)?;
        let handle = self.pool.shaders.take_next(Shader { backend });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created shader (from binary file): {:?}, vertex file: {}, fragment file: {}",
            handle,
            info.vertex_src,
            info.fragment_src
        );
        Ok(handle)
    }

    pub fn destroy_shader(&mut self, handle: Handle<Shader>) -> Result<()> {
        let shader = self
            .pool
            .shaders
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_shader | stale shader handle"))?;
        self.backend.destroy_shader(shader);
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // descriptors

    pub fn create_descriptor_layout(
        &mut self,
        info: &DescriptorLayoutCreateInfo,
    ) -> Result<Handle<DescriptorLayout>> {
        self.require_render_init("create_descriptor_layout")?;
        if info.bindings.is_empty() {
            return Err(Error::validation(
                "create_descriptor_layout | binding list is empty, cannot create descriptor layout without bindings",
            ));
        }
        let backend = self.backend.create_descriptor_layout(info)?;
        let handle = self.pool.descriptor_layouts.take_next(DescriptorLayout {
            bindings: info.bindings.to_vec(),
            max_sets: info.max_sets,
            backend,
        });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created descriptor layout: {:?}, binding count: {}",
            handle,
            info.bindings.len()
        );
        Ok(handle)
    }

    pub fn destroy_descriptor_layout(&mut self, handle: Handle<DescriptorLayout>) -> Result<()> {
        let layout = self.pool.descriptor_layouts.push_back(handle).ok_or_else(|| {
            Error::validation("destroy_descriptor_layout | stale descriptor layout handle")
        })?;
        self.backend.destroy_descriptor_layout(layout);
        Ok(())
    }

    pub fn create_descriptor_set(
        &mut self,
        layout: Handle<DescriptorLayout>,
    ) -> Result<Handle<DescriptorSet>> {
        self.require_render_init("create_descriptor_set")?;
        let layout_ref = resolve(&self.pool.descriptor_layouts, layout, "descriptor layout")?;
        let binding_types = layout_ref
            .bindings
            .iter()
            .map(|b| (b.binding, b.descriptor_type))
            .collect();
        let backend = self.backend.create_descriptor_set(layout_ref)?;
        let handle = self.pool.descriptor_sets.take_next(DescriptorSet {
            layout,
            binding_types,
            backend,
        });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created descriptor set: {:?} from layout: {:?}",
            handle,
            layout
        );
        Ok(handle)
    }

    pub fn destroy_descriptor_set(&mut self, handle: Handle<DescriptorSet>) -> Result<()> {
        let set = self
            .pool
            .descriptor_sets
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_descriptor_set | stale descriptor set handle"))?;
        self.backend.destroy_descriptor_set(set);
        Ok(())
    }

    /// Applies binding updates to a set. Updates whose kind does not
    /// structurally match the set's layout (or whose handles are stale)
    /// are logged and skipped; draws continue with the stale bindings.
    pub fn update_descriptor_set_data(
        &mut self,
        handle: Handle<DescriptorSet>,
        updates: &[DescriptorUpdateInfo],
    ) {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            descriptor_sets,
            uniform_buffers,
            textures,
            ..
        } = pool;

        let set = match resolve_mut(descriptor_sets, handle, "descriptor set") {
            Ok(set) => set,
            Err(_) => return,
        };

        let mut resolved: Vec<ResolvedDescriptorUpdate> = Vec::with_capacity(updates.len());
        for update in updates {
            let Some(expected) = set.binding_type(update.binding) else {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "update_descriptor_set_data | set {:?} has no binding {}, update skipped",
                    handle,
                    update.binding
                );
                continue;
            };
            if expected != update.descriptor_type {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "update_descriptor_set_data | binding {} of set {:?} is {:?} but the update carries {:?}, update skipped",
                    update.binding,
                    handle,
                    expected,
                    update.descriptor_type
                );
                continue;
            }

            let write = match &update.data {
                DescriptorData::Buffer {
                    buffer,
                    offset,
                    range,
                } => {
                    if !update.descriptor_type.is_buffer() {
                        log::error!(
                            target: CORE_LOG_TARGET,
                            "update_descriptor_set_data | binding {} expects image data, update skipped",
                            update.binding
                        );
                        continue;
                    }
                    match uniform_buffers.get(*buffer) {
                        Some(buffer) => DescriptorWrite::Buffer {
                            buffer,
                            offset: *offset,
                            range: *range,
                        },
                        None => {
                            log::error!(
                                target: CORE_LOG_TARGET,
                                "update_descriptor_set_data | stale uniform buffer handle in binding {}, update skipped",
                                update.binding
                            );
                            continue;
                        }
                    }
                }
                DescriptorData::Textures(handles) => {
                    if !update.descriptor_type.is_image() {
                        log::error!(
                            target: CORE_LOG_TARGET,
                            "update_descriptor_set_data | binding {} expects buffer data, update skipped",
                            update.binding
                        );
                        continue;
                    }
                    let mut refs = SmallVec::new();
                    let mut stale = false;
                    for texture in handles {
                        match textures.get(*texture) {
                            Some(texture) => refs.push(texture),
                            None => {
                                stale = true;
                                break;
                            }
                        }
                    }
                    if stale {
                        log::error!(
                            target: CORE_LOG_TARGET,
                            "update_descriptor_set_data | stale texture handle in binding {}, update skipped",
                            update.binding
                        );
                        continue;
                    }
                    DescriptorWrite::Textures(refs)
                }
            };

            resolved.push(ResolvedDescriptorUpdate {
                binding: update.binding,
                descriptor_type: update.descriptor_type,
                write,
            });
        }

        if let Err(err) = backend.update_descriptor_set_data(set, &resolved) {
            log::error!(
                target: CORE_LOG_TARGET,
                "update_descriptor_set_data | backend rejected the update: {}",
                err
            );
        }
    }

    //----------------------------------------------------------------------------------------------
    // pipelines

    pub fn create_pipeline(&mut self, info: &PipelineCreateInfo) -> Result<Handle<Pipeline>> {
        self.require_render_init("create_pipeline")?;
        let shader = resolve(&self.pool.shaders, info.shader, "shader")?;

        let mut layouts = SmallVec::new();
        for layout in &info.descriptor_layouts {
            layouts.push(resolve(
                &self.pool.descriptor_layouts,
                *layout,
                "descriptor layout",
            )?);
        }

        let render_pass = match info.render_pass {
            RenderPass::Window(handle) => {
                RenderPassTarget::Window(resolve(&self.pool.windows, handle, "window")?)
            }
            RenderPass::FrameBuffer(handle) => RenderPassTarget::FrameBuffer(resolve(
                &self.pool.frame_buffers,
                handle,
                "framebuffer",
            )?),
        };

        let backend_info = PipelineBackendCreateInfo {
            specification: &info.specification,
            vertex_attributes: &info.vertex_attributes,
            vertex_binding_descriptions: &info.vertex_binding_descriptions,
            shader,
            descriptor_layouts: layouts,
            render_pass,
        };
        let backend = self.backend.create_pipeline(&backend_info)?;

        let handle = self.pool.pipelines.take_next(Pipeline {
            render_pass: info.render_pass,
            backend,
        });
        log::trace!(target: CORE_LOG_TARGET, "created pipeline: {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_pipeline(&mut self, handle: Handle<Pipeline>) -> Result<()> {
        let pipeline = self
            .pool
            .pipelines
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_pipeline | stale pipeline handle"))?;
        self.backend.destroy_pipeline(pipeline);
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // buffers

    pub fn create_buffer(&mut self, info: &BufferCreateInfo) -> Result<Handle<Buffer>> {
        self.require_render_init("create_buffer")?;

        if info.buffer_type & (BufferTypeFlags::VERTEX | BufferTypeFlags::INDEX)
            == BufferTypeFlags::empty()
        {
            return Err(Error::validation(
                "create_buffer | buffer type has no vertex or index bit, cannot create buffer without knowing its usage",
            ));
        }
        if info
            .buffer_type
            .intersects(BufferTypeFlags::UNIFORM | BufferTypeFlags::STORAGE)
        {
            return Err(Error::validation(
                "create_buffer | buffer type has uniform/storage bits, uniform buffers are created with create_uniform_buffer",
            ));
        }
        if info.vertex_binding_descriptions.is_empty() {
            return Err(Error::validation(
                "create_buffer | vertex binding descriptions are empty, cannot create buffer without them",
            ));
        }
        if info.vertex_attributes.is_empty() {
            return Err(Error::validation(
                "create_buffer | vertex attributes are empty, cannot create buffer without them",
            ));
        }
        for (i, attribute) in info.vertex_attributes.iter().enumerate() {
            if attribute.data_type == VertexDataType::None {
                return Err(Error::validation(format!(
                    "create_buffer | vertex attribute [{}] has data type None",
                    i
                )));
            }
        }
        if info.vertex_data.is_none() && !info.usage.writable() {
            return Err(Error::validation(
                "create_buffer | no vertex data and static usage, the buffer contents could never be set",
            ));
        }

        let backend = self.backend.create_buffer(info)?;
        let vertex_size = info
            .vertex_data
            .map(|d| d.len() as u64)
            .unwrap_or(info.vertex_buffer_size);
        let index_size = info
            .index_data
            .map(|d| (d.len() * 4) as u64)
            .unwrap_or(info.index_buffer_size);
        let handle = self.pool.buffers.take_next(Buffer {
            buffer_type: info.buffer_type,
            usage: info.usage,
            vertex_size,
            index_size,
            backend,
        });
        log::trace!(target: CORE_LOG_TARGET, "created buffer: {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_buffer(&mut self, handle: Handle<Buffer>) -> Result<()> {
        let buffer = self
            .pool
            .buffers
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_buffer | stale buffer handle"))?;
        self.backend.destroy_buffer(buffer);
        Ok(())
    }

    pub fn buffer_update_vertex_data(
        &mut self,
        handle: Handle<Buffer>,
        data: &[u8],
        offset: u64,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let buffer = resolve_mut(&mut pool.buffers, handle, "buffer")?;
        if !buffer.usage.writable() {
            return Err(Error::validation(
                "buffer_update_vertex_data | buffer usage is static, writes after creation require dynamic or resize usage",
            ));
        }
        backend.buffer_update_vertex_data(buffer, data, offset);
        Ok(())
    }

    pub fn buffer_update_index_data(
        &mut self,
        handle: Handle<Buffer>,
        indices: &[u32],
        offset: u64,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let buffer = resolve_mut(&mut pool.buffers, handle, "buffer")?;
        if !buffer.usage.writable() {
            return Err(Error::validation(
                "buffer_update_index_data | buffer usage is static, writes after creation require dynamic or resize usage",
            ));
        }
        backend.buffer_update_index_data(buffer, indices, offset);
        Ok(())
    }

    pub fn buffer_resize_vertex_buffer(&mut self, handle: Handle<Buffer>, size: u64) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let buffer = resolve_mut(&mut pool.buffers, handle, "buffer")?;
        if buffer.usage != BufferUsage::Resize {
            return Err(Error::validation(
                "buffer_resize_vertex_buffer | buffer was not created with resize usage",
            ));
        }
        backend.buffer_resize_vertex_buffer(buffer, size);
        buffer.vertex_size = size;
        Ok(())
    }

    pub fn buffer_resize_index_buffer(&mut self, handle: Handle<Buffer>, size: u64) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let buffer = resolve_mut(&mut pool.buffers, handle, "buffer")?;
        if buffer.usage != BufferUsage::Resize {
            return Err(Error::validation(
                "buffer_resize_index_buffer | buffer was not created with resize usage",
            ));
        }
        backend.buffer_resize_index_buffer(buffer, size);
        buffer.index_size = size;
        Ok(())
    }

    pub fn buffer(&self, handle: Handle<Buffer>) -> Result<&Buffer> {
        resolve(&self.pool.buffers, handle, "buffer")
    }

    pub fn uniform_buffer(&self, handle: Handle<UniformBuffer>) -> Result<&UniformBuffer> {
        resolve(&self.pool.uniform_buffers, handle, "uniform buffer")
    }

    pub fn shader(&self, handle: Handle<Shader>) -> Result<&Shader> {
        resolve(&self.pool.shaders, handle, "shader")
    }

    pub fn pipeline(&self, handle: Handle<Pipeline>) -> Result<&Pipeline> {
        resolve(&self.pool.pipelines, handle, "pipeline")
    }

    pub fn descriptor_layout(&self, handle: Handle<DescriptorLayout>) -> Result<&DescriptorLayout> {
        resolve(&self.pool.descriptor_layouts, handle, "descriptor layout")
    }

    pub fn descriptor_set(&self, handle: Handle<DescriptorSet>) -> Result<&DescriptorSet> {
        resolve(&self.pool.descriptor_sets, handle, "descriptor set")
    }

    pub fn sampler(&self, handle: Handle<Sampler>) -> Result<&Sampler> {
        resolve(&self.pool.samplers, handle, "sampler")
    }

    pub fn cubemap(&self, handle: Handle<Cubemap>) -> Result<&Cubemap> {
        resolve(&self.pool.cubemaps, handle, "cubemap")
    }

    //----------------------------------------------------------------------------------------------
    // uniform buffers

    pub fn create_uniform_buffer(
        &mut self,
        info: &UniformBufferCreateInfo,
    ) -> Result<Handle<UniformBuffer>> {
        self.require_render_init("create_uniform_buffer")?;
        if info.buffer_type & (BufferTypeFlags::UNIFORM | BufferTypeFlags::STORAGE)
            == BufferTypeFlags::empty()
        {
            return Err(Error::validation(
                "create_uniform_buffer | buffer type has no uniform or storage bit",
            ));
        }
        if info
            .buffer_type
            .intersects(BufferTypeFlags::VERTEX | BufferTypeFlags::INDEX)
        {
            return Err(Error::validation(
                "create_uniform_buffer | buffer type has vertex/index bits, geometry buffers are created with create_buffer",
            ));
        }
        if info.size == 0 {
            return Err(Error::validation(
                "create_uniform_buffer | buffer size is zero",
            ));
        }

        let backend = self.backend.create_uniform_buffer(info)?;
        let handle = self.pool.uniform_buffers.take_next(UniformBuffer {
            buffer_type: info.buffer_type,
            binding: info.binding,
            size: info.size,
            backend,
        });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created uniform buffer: {:?}, binding: {}, size: {} bytes",
            handle,
            info.binding,
            info.size
        );
        Ok(handle)
    }

    pub fn destroy_uniform_buffer(&mut self, handle: Handle<UniformBuffer>) -> Result<()> {
        let buffer = self
            .pool
            .uniform_buffers
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_uniform_buffer | stale uniform buffer handle"))?;
        self.backend.destroy_uniform_buffer(buffer);
        Ok(())
    }

    /// Writes into the ring slot of the frame most recently acquired by
    /// `render_begin_next_frame` on `window`.
    pub fn update_uniform_buffer_data(
        &mut self,
        window: Handle<Window>,
        handle: Handle<UniformBuffer>,
        data: &[u8],
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows,
            uniform_buffers,
            ..
        } = pool;
        let window = resolve(windows, window, "window")?;
        let buffer = resolve_mut(uniform_buffers, handle, "uniform buffer")?;
        if data.len() as u64 > buffer.size {
            return Err(Error::validation(format!(
                "update_uniform_buffer_data | data size ({}) exceeds buffer size ({})",
                data.len(),
                buffer.size
            )));
        }
        backend.update_uniform_buffer_data(window, buffer, data);
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // textures

    pub fn create_texture(&mut self, info: &TextureCreateInfo) -> Result<Handle<Texture>> {
        self.require_render_init("create_texture")?;
        Self::validate_image(&info.image, "create_texture")?;
        let backend = self.backend.create_texture(info)?;
        let handle = self.pool.textures.take_next(Texture {
            width: info.image.width,
            height: info.image.height,
            framebuffer_owned: false,
            backend,
        });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created texture: {:?} (w:{},h:{},ch:{}), {} bytes",
            handle,
            info.image.width,
            info.image.height,
            info.image.channels,
            info.image.size_bytes()
        );
        Ok(handle)
    }

    pub fn create_texture_sampler(
        &mut self,
        info: &TextureSamplerCreateInfo,
    ) -> Result<Handle<Texture>> {
        self.require_render_init("create_texture_sampler")?;
        Self::validate_image(&info.image, "create_texture_sampler")?;
        let sampler = resolve(&self.pool.samplers, info.sampler, "sampler")?;
        let backend = self.backend.create_texture_sampler(info, sampler)?;
        let handle = self.pool.textures.take_next(Texture {
            width: info.image.width,
            height: info.image.height,
            framebuffer_owned: false,
            backend,
        });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created texture (external sampler): {:?} (w:{},h:{})",
            handle,
            info.image.width,
            info.image.height
        );
        Ok(handle)
    }

    fn validate_image(image: &crate::format::ImageData, caller: &str) -> Result<()> {
        if image.width == 0 || image.height == 0 {
            return Err(Error::validation(format!(
                "{} | image dimensions are zero (w:{},h:{})",
                caller, image.width, image.height
            )));
        }
        if !(1..=4).contains(&image.channels) {
            return Err(Error::validation(format!(
                "{} | image channel count {} is outside 1..=4",
                caller, image.channels
            )));
        }
        Ok(())
    }

    pub fn destroy_texture(&mut self, handle: Handle<Texture>) -> Result<()> {
        let framebuffer_owned = resolve(&self.pool.textures, handle, "texture")?.framebuffer_owned;
        if framebuffer_owned {
            return Err(Error::validation(
                "destroy_texture | texture is owned by a framebuffer and dies with it",
            ));
        }
        let texture = self
            .pool
            .textures
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_texture | stale texture handle"))?;
        self.backend.destroy_texture(texture);
        Ok(())
    }

    pub fn texture(&self, handle: Handle<Texture>) -> Result<&Texture> {
        resolve(&self.pool.textures, handle, "texture")
    }

    pub fn create_sampler(&mut self, info: &SamplerCreateInfo) -> Result<Handle<Sampler>> {
        self.require_render_init("create_sampler")?;
        let backend = self.backend.create_sampler(info)?;
        let handle = self.pool.samplers.take_next(Sampler {
            info: *info,
            backend,
        });
        log::trace!(target: CORE_LOG_TARGET, "created sampler: {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_sampler(&mut self, handle: Handle<Sampler>) -> Result<()> {
        let sampler = self
            .pool
            .samplers
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_sampler | stale sampler handle"))?;
        self.backend.destroy_sampler(sampler);
        Ok(())
    }

    pub fn create_cubemap(&mut self, info: &CubemapCreateInfo) -> Result<Handle<Cubemap>> {
        self.require_render_init("create_cubemap")?;
        let (width, height) = (info.pos_x.width, info.pos_x.height);
        for (face, image) in info.faces() {
            if image.pixels.is_empty() {
                return Err(Error::validation(format!(
                    "create_cubemap | face {} has no pixel data",
                    face
                )));
            }
            if image.width != width || image.height != height {
                return Err(Error::validation(format!(
                    "create_cubemap | face {} is {}x{} but all faces must share the same dimensions ({}x{})",
                    face, image.width, image.height, width, height
                )));
            }
        }

        let backend = self.backend.create_cubemap(info)?;
        let handle = self.pool.cubemaps.take_next(Cubemap {
            width,
            height,
            backend,
        });
        log::trace!(target: CORE_LOG_TARGET, "created cubemap: {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_cubemap(&mut self, handle: Handle<Cubemap>) -> Result<()> {
        let cubemap = self
            .pool
            .cubemaps
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_cubemap | stale cubemap handle"))?;
        self.backend.destroy_cubemap(cubemap);
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // framebuffers

    pub fn create_frame_buffer(
        &mut self,
        info: &FrameBufferCreateInfo,
    ) -> Result<Handle<FrameBuffer>> {
        self.require_render_init("create_frame_buffer")?;
        if info.color_attachments.is_empty() {
            return Err(Error::validation(
                "create_frame_buffer | at least one color attachment is required",
            ));
        }

        let total =
            info.color_attachments.len() as u32 + if info.depth_attachment.is_some() { 1 } else { 0 };
        let mut seen = SmallVec::<[u32; 8]>::new();
        for (i, attachment) in info.color_attachments.iter().enumerate() {
            if attachment.index >= total {
                return Err(Error::validation(format!(
                    "create_frame_buffer | color attachment [{}] index {} is not below the total attachment count {}",
                    i, attachment.index, total
                )));
            }
            if seen.contains(&attachment.index) {
                return Err(Error::validation(format!(
                    "create_frame_buffer | color attachment index {} appears more than once",
                    attachment.index
                )));
            }
            seen.push(attachment.index);
        }
        if let Some(depth) = &info.depth_attachment {
            if depth.index >= total {
                return Err(Error::validation(format!(
                    "create_frame_buffer | depth attachment index {} is not below the total attachment count {}",
                    depth.index, total
                )));
            }
            if seen.contains(&depth.index) {
                return Err(Error::validation(format!(
                    "create_frame_buffer | depth attachment index {} collides with a color attachment",
                    depth.index
                )));
            }
        }

        let FrameBufferParts {
            framebuffer,
            attachment_textures,
        } = self.backend.create_frame_buffer(info)?;

        let mut texture_handles = SmallVec::new();
        for backend_texture in attachment_textures {
            texture_handles.push(self.pool.textures.take_next(Texture {
                width: info.width,
                height: info.height,
                framebuffer_owned: true,
                backend: backend_texture,
            }));
        }

        let handle = self.pool.frame_buffers.take_next(FrameBuffer {
            width: info.width,
            height: info.height,
            sample_count: info.sample_count,
            color_formats: info.color_attachments.iter().map(|a| a.format).collect(),
            depth_format: info.depth_attachment.map(|d| d.format),
            attachment_textures: texture_handles,
            backend: framebuffer,
        });
        log::trace!(
            target: CORE_LOG_TARGET,
            "created framebuffer: {:?} (w:{},h:{})",
            handle,
            info.width,
            info.height
        );
        Ok(handle)
    }

    pub fn destroy_frame_buffer(&mut self, handle: Handle<FrameBuffer>) -> Result<()> {
        let framebuffer = self
            .pool
            .frame_buffers
            .push_back(handle)
            .ok_or_else(|| Error::validation("destroy_frame_buffer | stale framebuffer handle"))?;
        // attachment textures die with their framebuffer
        for texture in &framebuffer.attachment_textures {
            self.pool.textures.push_back(*texture);
        }
        self.backend.destroy_frame_buffer(framebuffer);
        Ok(())
    }

    pub fn frame_buffer(&self, handle: Handle<FrameBuffer>) -> Result<&FrameBuffer> {
        resolve(&self.pool.frame_buffers, handle, "framebuffer")
    }

    /// The sampleable texture for one color attachment; owned by the
    /// framebuffer and invalidated by its destruction.
    pub fn frame_buffer_get_image(
        &self,
        handle: Handle<FrameBuffer>,
        attachment_index: u32,
    ) -> Result<Handle<Texture>> {
        let framebuffer = resolve(&self.pool.frame_buffers, handle, "framebuffer")?;
        framebuffer
            .attachment_textures
            .get(attachment_index as usize)
            .copied()
            .ok_or_else(|| {
                Error::validation(format!(
                    "frame_buffer_get_image | attachment index {} out of range ({} color attachments)",
                    attachment_index,
                    framebuffer.attachment_textures.len()
                ))
            })
    }

    /// The framebuffer's renderpass; pipelines rendering into it must be
    /// created against this.
    pub fn frame_buffer_get_render_pass(&self, handle: Handle<FrameBuffer>) -> Result<RenderPass> {
        resolve(&self.pool.frame_buffers, handle, "framebuffer")?;
        Ok(RenderPass::FrameBuffer(handle))
    }

    /// Recreates the attachments at the new size; formats, attachment
    /// count and sample count are preserved.
    pub fn frame_buffer_resize(
        &mut self,
        handle: Handle<FrameBuffer>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            frame_buffers,
            textures,
            ..
        } = pool;
        let framebuffer = resolve_mut(frame_buffers, handle, "framebuffer")?;
        backend.frame_buffer_resize(framebuffer, width, height);
        framebuffer.width = width;
        framebuffer.height = height;
        for texture in &framebuffer.attachment_textures {
            if let Some(texture) = textures.get_mut(*texture) {
                texture.width = width;
                texture.height = height;
            }
        }
        Ok(())
    }

    pub fn frame_buffer_set_clear_color(
        &mut self,
        handle: Handle<FrameBuffer>,
        attachment_index: u32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let framebuffer = resolve_mut(&mut pool.frame_buffers, handle, "framebuffer")?;
        backend.frame_buffer_set_clear_color(framebuffer, attachment_index, r, g, b, a);
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    // frame lifecycle and command recording
    //
    // every entry point is a no-op while the window is minimized (zero
    // framebuffer area)

    fn with_window<F>(&mut self, handle: Handle<Window>, what: &str, f: F) -> Result<()>
    where
        F: FnOnce(&dyn RenderBackend, &mut Window),
    {
        let Context { backend, pool, .. } = self;
        let window = resolve_mut(&mut pool.windows, handle, what)?;
        if window.minimized() {
            return Ok(());
        }
        f(backend.as_ref(), window);
        Ok(())
    }

    pub fn render_begin_next_frame(&mut self, handle: Handle<Window>) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let window = resolve_mut(&mut pool.windows, handle, "window")?;
        if window.minimized() {
            return Ok(());
        }
        backend.render_begin_next_frame(window)
    }

    pub fn render_draw_submit(&mut self, handle: Handle<Window>) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let window = resolve_mut(&mut pool.windows, handle, "window")?;
        if window.minimized() {
            return Ok(());
        }
        backend.render_draw_submit(window)
    }

    pub fn render_begin_command_recording(&mut self, handle: Handle<Window>) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            if window.record.recording {
                log::warn!(
                    target: CORE_LOG_TARGET,
                    "render_begin_command_recording | recording already active on this window"
                );
            }
            window.record.recording = true;
            window.record.active_target = None;
            backend.render_begin_command_recording(window);
        })
    }

    pub fn render_end_command_recording(&mut self, handle: Handle<Window>) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            if let Some(target) = window.record.active_target {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "render_end_command_recording | render target {:?} is still active, missing end call",
                    target
                );
            }
            window.record.recording = false;
            backend.render_end_command_recording(window);
        })
    }

    pub fn render_clear_color(
        &mut self,
        handle: Handle<Window>,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend.render_clear_color(window, r, g, b, a);
        })
    }

    pub fn render_cmd_begin_render_pass(&mut self, handle: Handle<Window>) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            if !window.record.recording {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "render_cmd_begin_render_pass | no command recording is active"
                );
            }
            if let Some(target) = window.record.active_target {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "render_cmd_begin_render_pass | render target {:?} is already active, render targets do not nest",
                    target
                );
            }
            window.record.active_target = Some(RenderPass::Window(handle));
            backend.render_cmd_begin_render_pass(window);
        })
    }

    pub fn render_cmd_end_render_pass(&mut self, handle: Handle<Window>) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            match window.record.active_target {
                Some(RenderPass::Window(_)) => {}
                other => {
                    log::error!(
                        target: CORE_LOG_TARGET,
                        "render_cmd_end_render_pass | active target is {:?}, not the window renderpass",
                        other
                    );
                }
            }
            window.record.active_target = None;
            backend.render_cmd_end_render_pass(window);
        })
    }

    pub fn render_cmd_begin_frame_buffer(
        &mut self,
        window: Handle<Window>,
        framebuffer: Handle<FrameBuffer>,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows,
            frame_buffers,
            ..
        } = pool;
        let window_ref = resolve_mut(windows, window, "window")?;
        let framebuffer_ref = resolve(frame_buffers, framebuffer, "framebuffer")?;
        if window_ref.minimized() {
            return Ok(());
        }
        if let Some(target) = window_ref.record.active_target {
            log::error!(
                target: CORE_LOG_TARGET,
                "render_cmd_begin_frame_buffer | render target {:?} is already active, render targets do not nest",
                target
            );
        }
        window_ref.record.active_target = Some(RenderPass::FrameBuffer(framebuffer));
        backend.render_cmd_begin_frame_buffer(window_ref, framebuffer_ref);
        Ok(())
    }

    pub fn render_cmd_end_frame_buffer(
        &mut self,
        window: Handle<Window>,
        framebuffer: Handle<FrameBuffer>,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows,
            frame_buffers,
            ..
        } = pool;
        let window_ref = resolve_mut(windows, window, "window")?;
        let framebuffer_ref = resolve(frame_buffers, framebuffer, "framebuffer")?;
        if window_ref.minimized() {
            return Ok(());
        }
        match window_ref.record.active_target {
            Some(RenderPass::FrameBuffer(active)) if active == framebuffer => {}
            other => {
                log::error!(
                    target: CORE_LOG_TARGET,
                    "render_cmd_end_frame_buffer | active target is {:?}, not framebuffer {:?}",
                    other,
                    framebuffer
                );
            }
        }
        window_ref.record.active_target = None;
        backend.render_cmd_end_frame_buffer(window_ref, framebuffer_ref);
        Ok(())
    }

    pub fn render_cmd_bind_pipeline(
        &mut self,
        window: Handle<Window>,
        pipeline: Handle<Pipeline>,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows, pipelines, ..
        } = pool;
        let window_ref = resolve_mut(windows, window, "window")?;
        let pipeline_ref = resolve(pipelines, pipeline, "pipeline")?;
        if window_ref.minimized() {
            return Ok(());
        }
        // a pipeline may only be bound inside the renderpass it was
        // created against
        if window_ref.record.active_target != Some(pipeline_ref.render_pass) {
            log::error!(
                target: CORE_LOG_TARGET,
                "render_cmd_bind_pipeline | pipeline {:?} was created against {:?} but the active render target is {:?}",
                pipeline,
                pipeline_ref.render_pass,
                window_ref.record.active_target
            );
        }
        backend.render_cmd_bind_pipeline(window_ref, pipeline_ref);
        Ok(())
    }

    pub fn render_cmd_bind_vertex_buffer(
        &mut self,
        window: Handle<Window>,
        buffer: Handle<Buffer>,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows, buffers, ..
        } = pool;
        let window_ref = resolve_mut(windows, window, "window")?;
        let buffer_ref = resolve(buffers, buffer, "buffer")?;
        if window_ref.minimized() {
            return Ok(());
        }
        if !buffer_ref.buffer_type.contains(BufferTypeFlags::VERTEX) {
            return Err(Error::validation(
                "render_cmd_bind_vertex_buffer | buffer has no vertex type bit",
            ));
        }
        backend.render_cmd_bind_vertex_buffer(window_ref, buffer_ref);
        Ok(())
    }

    pub fn render_cmd_bind_index_buffer(
        &mut self,
        window: Handle<Window>,
        buffer: Handle<Buffer>,
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows, buffers, ..
        } = pool;
        let window_ref = resolve_mut(windows, window, "window")?;
        let buffer_ref = resolve(buffers, buffer, "buffer")?;
        if window_ref.minimized() {
            return Ok(());
        }
        if !buffer_ref.buffer_type.contains(BufferTypeFlags::INDEX) {
            return Err(Error::validation(
                "render_cmd_bind_index_buffer | buffer has no index type bit",
            ));
        }
        backend.render_cmd_bind_index_buffer(window_ref, buffer_ref);
        Ok(())
    }

    pub fn render_cmd_bind_descriptor_sets(
        &mut self,
        window: Handle<Window>,
        pipeline: Handle<Pipeline>,
        first_set: u32,
        sets: &[Handle<DescriptorSet>],
    ) -> Result<()> {
        let Context { backend, pool, .. } = self;
        let MemoryPool {
            windows,
            pipelines,
            descriptor_sets,
            ..
        } = pool;
        let window_ref = resolve_mut(windows, window, "window")?;
        let pipeline_ref = resolve(pipelines, pipeline, "pipeline")?;
        if window_ref.minimized() {
            return Ok(());
        }
        let mut set_refs = SmallVec::<[&DescriptorSet; 4]>::new();
        for set in sets {
            set_refs.push(resolve(descriptor_sets, *set, "descriptor set")?);
        }
        backend.render_cmd_bind_descriptor_sets(window_ref, pipeline_ref, first_set, &set_refs);
        Ok(())
    }

    pub fn render_cmd_draw(&mut self, handle: Handle<Window>, vertex_count: u32) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend.render_cmd_draw(window, vertex_count);
        })
    }

    pub fn render_cmd_draw_indexed(
        &mut self,
        handle: Handle<Window>,
        index_count: u32,
    ) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend.render_cmd_draw_indexed(window, index_count);
        })
    }

    pub fn render_cmd_draw_instanced(
        &mut self,
        handle: Handle<Window>,
        vertex_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend.render_cmd_draw_instanced(window, vertex_count, instance_count, first_instance);
        })
    }

    pub fn render_cmd_draw_indexed_instanced(
        &mut self,
        handle: Handle<Window>,
        index_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend
                .render_cmd_draw_indexed_instanced(window, index_count, instance_count, first_instance);
        })
    }

    pub fn render_cmd_set_stencil_reference(
        &mut self,
        handle: Handle<Window>,
        reference: u32,
    ) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend.render_cmd_set_stencil_reference(window, reference);
        })
    }

    pub fn render_cmd_set_stencil_mask(
        &mut self,
        handle: Handle<Window>,
        compare_mask: u32,
        write_mask: u32,
    ) -> Result<()> {
        self.with_window(handle, "window", |backend, window| {
            backend.render_cmd_set_stencil_mask(window, compare_mask, write_mask);
        })
    }

    //----------------------------------------------------------------------------------------------
    // audio

    pub fn audio_engine(&self) -> Option<&dyn AudioEngine> {
        self.audio.as_deref()
    }

    pub fn audio_engine_mut(&mut self) -> Option<&mut (dyn AudioEngine + 'static)> {
        self.audio.as_deref_mut()
    }

    pub fn sound_board(&self) -> &SoundBoard {
        &self.sound_board
    }

    pub fn sound_board_mut(&mut self) -> &mut SoundBoard {
        &mut self.sound_board
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}
