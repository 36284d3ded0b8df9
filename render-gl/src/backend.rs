//! `RenderBackend` implementation over OpenGL 4.6.

use std::ffi::CStr;
use std::os::raw::c_void;
use std::ptr;
use std::sync::Mutex;

use levikno_render::backend::*;
use levikno_render::buffer::{Buffer, BufferCreateInfo, UniformBufferCreateInfo};
use levikno_render::descriptor::{DescriptorLayout, DescriptorLayoutCreateInfo, DescriptorSet};
use levikno_render::error::{Error, Result};
use levikno_render::format::DepthImageFormat;
use levikno_render::framebuffer::{FrameBuffer, FrameBufferCreateInfo};
use levikno_render::pipeline::Pipeline;
use levikno_render::shader::{Shader, ShaderCreateInfo};
use levikno_render::texture::{
    Cubemap, CubemapCreateInfo, Sampler, SamplerCreateInfo, TextureCreateInfo,
    TextureSamplerCreateInfo,
};
use levikno_render::window::{NativeWindow, Window, WindowCreateInfo};
use levikno_render::UniformBuffer;

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use crate::buffer::{GlBuffer, GlUniformBuffer};
use crate::command::{execute, GlCommand, GlExecState, GlWindowData};
use crate::descriptor::{GlDescriptorLayout, GlDescriptorSet, GlSetBinds};
use crate::framebuffer::{self, GlFrameBuffer};
use crate::image::{self, GlCubemap, GlSampler, GlTexture};
use crate::pipeline::{self, GlPipeline, GlShader};
use crate::state::StateCache;
use crate::{ExecutionMode, ImplementationParameters};

extern "system" fn debug_callback(
    _source: GLenum,
    _ty: GLenum,
    _id: GLuint,
    severity: GLenum,
    length: GLsizei,
    message: *const GLchar,
    _user_param: *mut c_void,
) {
    let text = unsafe {
        std::str::from_utf8(std::slice::from_raw_parts(
            message as *const u8,
            length as usize,
        ))
        .unwrap_or("<invalid utf-8 in GL debug message>")
    };
    let level = match severity {
        gl::DEBUG_SEVERITY_HIGH => log::Level::Error,
        gl::DEBUG_SEVERITY_MEDIUM => log::Level::Warn,
        gl::DEBUG_SEVERITY_LOW => log::Level::Info,
        _ => log::Level::Debug,
    };
    log::log!(target: "levikno", level, "(GL) {}", text);
}

/// OpenGL backend instance. Holds the function pointers loaded from the
/// bootstrap window's context; that hidden context is only made current
/// at init, per-window contexts take over afterwards.
pub struct OpenGlInstance {
    gl: Gl,
    mode: ExecutionMode,
    device_name: String,
    version: (GLint, GLint),
    params: ImplementationParameters,
    max_frames_in_flight: u32,
    state_cache: Mutex<StateCache>,
}

impl std::fmt::Debug for OpenGlInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("OpenGlInstance")
            .field("device_name", &self.device_name)
            .field("version", &self.version)
            .field("mode", &self.mode)
            .finish()
    }
}

impl OpenGlInstance {
    /// Loads GL through the bootstrap window's context. The context must
    /// expose at least GL 4.6 core.
    pub fn new(bootstrap: &dyn NativeWindow, mode: ExecutionMode) -> Result<OpenGlInstance> {
        bootstrap.make_context_current();
        let gl = Gl::load_with(|symbol| bootstrap.get_proc_address(symbol) as *const _);

        let mut major: GLint = 0;
        let mut minor: GLint = 0;
        unsafe {
            gl.GetIntegerv(gl::MAJOR_VERSION, &mut major);
            gl.GetIntegerv(gl::MINOR_VERSION, &mut minor);
        }
        if (major, minor) < (4, 6) {
            return Err(Error::validation(format!(
                "OpenGL 4.6 required, context exposes {}.{}",
                major, minor
            )));
        }

        let device_name = unsafe {
            let renderer = gl.GetString(gl::RENDERER);
            if renderer.is_null() {
                String::from("unknown GL renderer")
            } else {
                CStr::from_ptr(renderer as *const _)
                    .to_string_lossy()
                    .into_owned()
            }
        };

        unsafe {
            gl.Enable(gl::DEBUG_OUTPUT);
            gl.Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
            gl.DebugMessageCallback(Some(debug_callback), ptr::null());
        }

        let params = ImplementationParameters::populate(&gl);
        log::debug!(
            target: "levikno",
            "OpenGL {}.{} on {:?} (max color attachments: {}, ubo alignment: {})",
            major,
            minor,
            device_name,
            params.max_color_attachments,
            params.uniform_buffer_alignment
        );

        Ok(OpenGlInstance {
            gl,
            mode,
            device_name,
            version: (major, minor),
            params,
            max_frames_in_flight: 1,
            state_cache: Mutex::new(StateCache::new()),
        })
    }

    pub fn implementation_parameters(&self) -> &ImplementationParameters {
        &self.params
    }

    fn window_data<'a>(&self, window: &'a mut Window) -> &'a mut GlWindowData {
        window
            .backend_mut()
            .downcast_mut::<GlWindowData>()
            .expect("window payload does not belong to the OpenGL backend")
    }

    /// Immediate mode executes the command on the spot; deferred mode
    /// appends it to the window's stream.
    fn dispatch(&self, window: &mut Window, command: GlCommand) {
        let data = self.window_data(window);
        if data.deferred {
            data.commands.push(command);
        } else {
            let mut cache = self.state_cache.lock().unwrap();
            execute(&self.gl, &mut cache, &mut data.exec, &command);
        }
    }
}

impl RenderBackend for OpenGlInstance {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::OpenGl
    }

    fn physical_devices(&self) -> Vec<PhysicalDevice> {
        // GL exposes whatever device the context was created on
        vec![PhysicalDevice {
            info: PhysicalDeviceInfo {
                name: self.device_name.clone(),
                device_type: PhysicalDeviceType::Other,
                vendor_id: 0,
                driver_version: 0,
                api_version: ((self.version.0 as u32) << 22) | ((self.version.1 as u32) << 12),
            },
            id: 0,
        }]
    }

    fn check_physical_device_support(&self, _device: &PhysicalDevice) -> Result<()> {
        Ok(())
    }

    fn render_init(&mut self, info: &RenderInitInfo) -> Result<()> {
        self.max_frames_in_flight = info.max_frames_in_flight.max(1);
        if info.gamma_correction {
            unsafe { self.gl.Enable(gl::FRAMEBUFFER_SRGB) };
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
        // GL 4.6 core mandates all of them
        candidates
            .first()
            .copied()
            .ok_or_else(|| Error::validation("no depth image format candidates given"))
    }

    //----------------------------------------------------------------------------------------------

    fn create_window(
        &self,
        info: &WindowCreateInfo,
        native: &dyn NativeWindow,
    ) -> Result<Box<dyn BackendWindow>> {
        native.make_context_current();
        native.set_vsync(info.vsync);
        Ok(Box::new(GlWindowData {
            deferred: self.mode == ExecutionMode::Deferred,
            commands: Vec::new(),
            exec: GlExecState::default(),
        }))
    }

    fn destroy_window(&self, _window: Window) {}

    fn create_shader_from_src(&self, info: &ShaderCreateInfo) -> Result<Box<dyn BackendShader>> {
        Ok(Box::new(pipeline::create_shader_from_src(&self.gl, info)?))
    }

    fn create_shader_from_file_src(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>> {
        Ok(Box::new(pipeline::create_shader_from_files(&self.gl, info)?))
    }

    fn create_shader_from_file_bin(
        &self,
        info: &ShaderCreateInfo,
    ) -> Result<Box<dyn BackendShader>> {
        Ok(Box::new(pipeline::create_shader_from_files(&self.gl, info)?))
    }

    fn destroy_shader(&self, shader: Shader) {
        if let Some(payload) = shader.backend().downcast_ref::<GlShader>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_descriptor_layout(
        &self,
        _info: &DescriptorLayoutCreateInfo,
    ) -> Result<Box<dyn BackendDescriptorLayout>> {
        // descriptor sets are emulated; the layout carries no GL object
        Ok(Box::new(GlDescriptorLayout))
    }

    fn destroy_descriptor_layout(&self, _layout: DescriptorLayout) {}

    fn create_descriptor_set(
        &self,
        layout: &DescriptorLayout,
    ) -> Result<Box<dyn BackendDescriptorSet>> {
        Ok(Box::new(GlDescriptorSet::new(layout)))
    }

    fn destroy_descriptor_set(&self, set: DescriptorSet) {
        if let Some(payload) = set.backend().downcast_ref::<GlDescriptorSet>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_pipeline(&self, info: &PipelineBackendCreateInfo) -> Result<Box<dyn BackendPipeline>> {
        Ok(Box::new(pipeline::create_pipeline(&self.gl, info)?))
    }

    fn destroy_pipeline(&self, pipeline: Pipeline) {
        if let Some(payload) = pipeline.backend().downcast_ref::<GlPipeline>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Box<dyn BackendBuffer>> {
        Ok(Box::new(GlBuffer::new(&self.gl, info)))
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        if let Some(payload) = buffer.backend().downcast_ref::<GlBuffer>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_uniform_buffer(
        &self,
        info: &UniformBufferCreateInfo,
    ) -> Result<Box<dyn BackendUniformBuffer>> {
        Ok(Box::new(GlUniformBuffer::new(&self.gl, info)))
    }

    fn destroy_uniform_buffer(&self, buffer: UniformBuffer) {
        if let Some(payload) = buffer.backend().downcast_ref::<GlUniformBuffer>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_texture(&self, info: &TextureCreateInfo) -> Result<Box<dyn BackendTexture>> {
        Ok(Box::new(image::create_texture(&self.gl, info)))
    }

    fn create_texture_sampler(
        &self,
        info: &TextureSamplerCreateInfo,
        sampler: &Sampler,
    ) -> Result<Box<dyn BackendTexture>> {
        let sampler_id = sampler
            .backend()
            .downcast_ref::<GlSampler>()
            .map(|s| s.id)
            .unwrap_or(0);
        Ok(Box::new(image::create_texture_with_sampler(
            &self.gl,
            &info.image,
            info.format,
            sampler_id,
        )))
    }

    fn destroy_texture(&self, texture: levikno_render::texture::Texture) {
        if let Some(payload) = texture.backend().downcast_ref::<GlTexture>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Box<dyn BackendSampler>> {
        Ok(Box::new(GlSampler::new(&self.gl, info)))
    }

    fn destroy_sampler(&self, sampler: Sampler) {
        if let Some(payload) = sampler.backend().downcast_ref::<GlSampler>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_cubemap(&self, info: &CubemapCreateInfo) -> Result<Box<dyn BackendCubemap>> {
        Ok(Box::new(GlCubemap::new(&self.gl, info)))
    }

    fn destroy_cubemap(&self, cubemap: Cubemap) {
        if let Some(payload) = cubemap.backend().downcast_ref::<GlCubemap>() {
            payload.destroy(&self.gl);
        }
    }

    fn create_frame_buffer(&self, info: &FrameBufferCreateInfo) -> Result<FrameBufferParts> {
        Ok(framebuffer::create_frame_buffer(&self.gl, info))
    }

    fn destroy_frame_buffer(&self, framebuffer: FrameBuffer) {
        if let Some(payload) = framebuffer.backend().downcast_ref::<GlFrameBuffer>() {
            let mut data = payload.data.lock().unwrap();
            framebuffer::destroy_attachments(&self.gl, &mut data);
        }
    }

    //----------------------------------------------------------------------------------------------

    fn render_begin_next_frame(&self, window: &mut Window) -> Result<()> {
        // GL presents through the window system; there is no swapchain
        // image to acquire
        window.native().make_context_current();
        Ok(())
    }

    fn render_draw_submit(&self, window: &mut Window) -> Result<()> {
        window.native().swap_buffers();
        Ok(())
    }

    fn render_begin_command_recording(&self, window: &mut Window) {
        // objects deleted since the last stream may have unbound things
        // behind the cache's back
        self.state_cache.lock().unwrap().invalidate();
        let data = self.window_data(window);
        data.commands.clear();
    }

    fn render_end_command_recording(&self, window: &mut Window) {
        let data = self.window_data(window);
        if !data.deferred {
            return;
        }
        let commands = std::mem::take(&mut data.commands);
        let mut cache = self.state_cache.lock().unwrap();
        for command in &commands {
            execute(&self.gl, &mut cache, &mut data.exec, command);
        }
    }

    fn render_clear_color(&self, window: &mut Window, r: f32, g: f32, b: f32, a: f32) {
        self.dispatch(window, GlCommand::ClearColor([r, g, b, a]));
    }

    fn render_cmd_begin_render_pass(&self, window: &mut Window) {
        let (width, height) = window.native().framebuffer_dimensions();
        self.dispatch(window, GlCommand::BeginRenderPass { width, height });
    }

    fn render_cmd_end_render_pass(&self, window: &mut Window) {
        self.dispatch(window, GlCommand::EndRenderPass);
    }

    fn render_cmd_bind_pipeline(&self, window: &mut Window, pipeline: &Pipeline) {
        let payload = pipeline
            .backend()
            .downcast_ref::<GlPipeline>()
            .expect("pipeline payload does not belong to the OpenGL backend");
        self.dispatch(
            window,
            GlCommand::BindPipeline {
                program: payload.program,
                vao: payload.vao,
                state: payload.state,
                strides: payload.binding_strides.clone(),
            },
        );
    }

    fn render_cmd_bind_vertex_buffer(&self, window: &mut Window, buffer: &Buffer) {
        let payload = buffer
            .backend()
            .downcast_ref::<GlBuffer>()
            .expect("buffer payload does not belong to the OpenGL backend");
        self.dispatch(window, GlCommand::BindVertexBuffer { vbo: payload.vbo });
    }

    fn render_cmd_bind_index_buffer(&self, window: &mut Window, buffer: &Buffer) {
        let payload = buffer
            .backend()
            .downcast_ref::<GlBuffer>()
            .expect("buffer payload does not belong to the OpenGL backend");
        self.dispatch(window, GlCommand::BindIndexBuffer { ibo: payload.ibo });
    }

    fn render_cmd_bind_descriptor_sets(
        &self,
        window: &mut Window,
        _pipeline: &Pipeline,
        _first_set: u32,
        sets: &[&DescriptorSet],
    ) {
        let binds = GlSetBinds::gather(sets);
        self.dispatch(window, GlCommand::BindDescriptorSets(binds));
    }

    fn render_cmd_draw(&self, window: &mut Window, vertex_count: u32) {
        self.dispatch(window, GlCommand::Draw { vertices: vertex_count });
    }

    fn render_cmd_draw_indexed(&self, window: &mut Window, index_count: u32) {
        self.dispatch(window, GlCommand::DrawIndexed { indices: index_count });
    }

    fn render_cmd_draw_instanced(
        &self,
        window: &mut Window,
        vertex_count: u32,
        instance_count: u32,
        first_instance: u32,
    ) {
        self.dispatch(
            window,
            GlCommand::DrawInstanced {
                vertices: vertex_count,
                instances: instance_count,
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
        self.dispatch(
            window,
            GlCommand::DrawIndexedInstanced {
                indices: index_count,
                instances: instance_count,
                first_instance,
            },
        );
    }

    fn render_cmd_set_stencil_reference(&self, window: &mut Window, reference: u32) {
        self.dispatch(window, GlCommand::SetStencilReference(reference));
    }

    fn render_cmd_set_stencil_mask(&self, window: &mut Window, compare_mask: u32, write_mask: u32) {
        self.dispatch(
            window,
            GlCommand::SetStencilMask {
                compare_mask,
                write_mask,
            },
        );
    }

    fn render_cmd_begin_frame_buffer(&self, window: &mut Window, framebuffer: &FrameBuffer) {
        let payload = framebuffer
            .backend()
            .downcast_ref::<GlFrameBuffer>()
            .expect("framebuffer payload does not belong to the OpenGL backend");
        self.dispatch(window, GlCommand::BeginFrameBuffer(payload.data.clone()));
    }

    fn render_cmd_end_frame_buffer(&self, window: &mut Window, framebuffer: &FrameBuffer) {
        let payload = framebuffer
            .backend()
            .downcast_ref::<GlFrameBuffer>()
            .expect("framebuffer payload does not belong to the OpenGL backend");
        self.dispatch(window, GlCommand::EndFrameBuffer(payload.data.clone()));
    }

    //----------------------------------------------------------------------------------------------

    fn buffer_update_vertex_data(&self, buffer: &mut Buffer, data: &[u8], offset: u64) {
        let payload = buffer
            .backend()
            .downcast_ref::<GlBuffer>()
            .expect("buffer payload does not belong to the OpenGL backend");
        unsafe {
            self.gl.NamedBufferSubData(
                payload.vbo,
                offset as GLintptr,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const _,
            );
        }
    }

    fn buffer_update_index_data(&self, buffer: &mut Buffer, indices: &[u32], offset: u64) {
        let payload = buffer
            .backend()
            .downcast_ref::<GlBuffer>()
            .expect("buffer payload does not belong to the OpenGL backend");
        unsafe {
            self.gl.NamedBufferSubData(
                payload.ibo,
                offset as GLintptr,
                (indices.len() * 4) as GLsizeiptr,
                indices.as_ptr() as *const _,
            );
        }
    }

    fn buffer_resize_vertex_buffer(&self, buffer: &mut Buffer, size: u64) {
        let payload = buffer
            .backend()
            .downcast_ref::<GlBuffer>()
            .expect("buffer payload does not belong to the OpenGL backend");
        unsafe {
            self.gl.NamedBufferData(
                payload.vbo,
                size as GLsizeiptr,
                std::ptr::null(),
                gl::DYNAMIC_DRAW,
            );
        }
    }

    fn buffer_resize_index_buffer(&self, buffer: &mut Buffer, size: u64) {
        let payload = buffer
            .backend()
            .downcast_ref::<GlBuffer>()
            .expect("buffer payload does not belong to the OpenGL backend");
        unsafe {
            self.gl.NamedBufferData(
                payload.ibo,
                size as GLsizeiptr,
                std::ptr::null(),
                gl::DYNAMIC_DRAW,
            );
        }
    }

    fn update_uniform_buffer_data(&self, _window: &Window, buffer: &mut UniformBuffer, data: &[u8]) {
        // single buffer object on GL; no per-frame ring to select
        let payload = buffer
            .backend()
            .downcast_ref::<GlUniformBuffer>()
            .expect("uniform buffer payload does not belong to the OpenGL backend");
        unsafe {
            self.gl.NamedBufferSubData(
                payload.ubo,
                0,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const _,
            );
        }
    }

    fn update_descriptor_set_data(
        &self,
        set: &mut DescriptorSet,
        updates: &[ResolvedDescriptorUpdate],
    ) -> Result<()> {
        let payload = set
            .backend_mut()
            .downcast_mut::<GlDescriptorSet>()
            .expect("descriptor set payload does not belong to the OpenGL backend");
        payload.apply_updates(&self.gl, updates);
        Ok(())
    }

    fn frame_buffer_resize(&self, fb: &mut FrameBuffer, width: u32, height: u32) {
        let payload = fb
            .backend()
            .downcast_ref::<GlFrameBuffer>()
            .expect("framebuffer payload does not belong to the OpenGL backend");
        let mut data = payload.data.lock().unwrap();
        framebuffer::resize(&self.gl, &mut data, width, height);
    }

    fn frame_buffer_set_clear_color(
        &self,
        fb: &mut FrameBuffer,
        attachment_index: u32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
    ) {
        let payload = fb
            .backend()
            .downcast_ref::<GlFrameBuffer>()
            .expect("framebuffer payload does not belong to the OpenGL backend");
        let mut data = payload.data.lock().unwrap();
        if let Some(slot) = data.clear_colors.get_mut(attachment_index as usize) {
            *slot = [r, g, b, a];
        }
    }

    fn window_framebuffer_resized(&self, _window: &mut Window, _width: u32, _height: u32) {
        // the window system resizes the default framebuffer; nothing to
        // rebuild on GL
    }
}
