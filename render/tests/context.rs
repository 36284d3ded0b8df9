//! Context lifecycle, pool accounting, validation and frame-flow behavior
//! against the headless null backend.

use std::sync::{Mutex, MutexGuard, OnceLock};

use levikno_render::backend::RenderInitInfo;
use levikno_render::null::{
    HeadlessWindow, NullBackend, NullBuffer, NullCommand, NullDescriptorSet, NullUniformBuffer,
    NullWindow,
};
use levikno_render::*;

// contexts are process-wide singletons, so tests touching one serialize
fn context_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn create_context(backend: NullBackend, memory_info: MemoryPoolInfo) -> Context {
    let info = ContextCreateInfo {
        application_name: String::from("levikno tests"),
        memory_info,
        ..Default::default()
    };
    let mut ctx = Context::create(info, Box::new(backend)).expect("context creation failed");
    let device = ctx.physical_devices().remove(0);
    ctx.render_init(&RenderInitInfo {
        physical_device: device,
        max_frames_in_flight: 2,
        gamma_correction: true,
    })
    .expect("render_init failed");
    ctx
}

fn open_window(ctx: &mut Context, width: i32, height: i32) -> Handle<Window> {
    ctx.create_window(
        WindowCreateInfo {
            width,
            height,
            title: String::from("test window"),
            vsync: true,
        },
        Box::new(HeadlessWindow::new(width, height)),
    )
    .expect("window creation failed")
}

fn quad_buffer(ctx: &mut Context) -> Handle<Buffer> {
    let attributes = [VertexAttribute {
        binding: 0,
        layout: 0,
        data_type: VertexDataType::Vec2,
        offset: 0,
    }];
    let bindings = [VertexBindingDescription {
        binding: 0,
        stride: 8,
    }];
    let vertices: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
    let indices: [u32; 6] = [0, 1, 2, 2, 3, 0];
    ctx.create_buffer(&BufferCreateInfo {
        buffer_type: BufferTypeFlags::VERTEX | BufferTypeFlags::INDEX,
        usage: BufferUsage::Static,
        vertex_attributes: &attributes,
        vertex_binding_descriptions: &bindings,
        vertex_data: Some(float_bytes(&vertices)),
        vertex_buffer_size: 0,
        index_data: Some(&indices),
        index_buffer_size: 0,
    })
    .expect("buffer creation failed")
}

fn float_bytes(values: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 4) }
}

//--------------------------------------------------------------------------------------------------

#[test]
fn second_context_is_rejected_while_the_first_lives() {
    let _guard = context_lock();
    let ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let err = Context::create(ContextCreateInfo::default(), Box::new(NullBackend::new()))
        .err()
        .expect("second context should be rejected");
    assert!(matches!(err, Error::AlreadyCalled(_)));
    drop(ctx);

    // after teardown a fresh context may be created again
    let ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    drop(ctx);
}

#[test]
fn object_counts_return_to_zero_after_matched_destroys() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());

    let window = open_window(&mut ctx, 800, 600);
    let buffer = quad_buffer(&mut ctx);
    let shader = ctx
        .create_shader_from_src(&ShaderCreateInfo {
            vertex_src: String::from("void main() {}"),
            fragment_src: String::from("void main() {}"),
        })
        .unwrap();
    let layout = ctx
        .create_descriptor_layout(&DescriptorLayoutCreateInfo {
            bindings: &[DescriptorBinding {
                binding: 0,
                descriptor_type: DescriptorType::UniformBuffer,
                descriptor_count: 1,
                max_allocations: 4,
                shader_stage: ShaderStageFlags::VERTEX,
            }],
            max_sets: 4,
        })
        .unwrap();
    let set = ctx.create_descriptor_set(layout).unwrap();

    assert_eq!(ctx.object_count(StructureType::Window), 1);
    assert_eq!(ctx.object_count(StructureType::Buffer), 1);
    assert_eq!(ctx.object_count(StructureType::Shader), 1);
    assert_eq!(ctx.object_count(StructureType::DescriptorLayout), 1);
    assert_eq!(ctx.object_count(StructureType::DescriptorSet), 1);

    ctx.destroy_descriptor_set(set).unwrap();
    ctx.destroy_descriptor_layout(layout).unwrap();
    ctx.destroy_shader(shader).unwrap();
    ctx.destroy_buffer(buffer).unwrap();
    ctx.destroy_window(window).unwrap();

    for stype in StructureType::ALL {
        assert_eq!(ctx.object_count(stype), 0, "type {} leaked", stype.name());
    }
}

#[test]
fn destroying_twice_reports_a_stale_handle() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let buffer = quad_buffer(&mut ctx);
    ctx.destroy_buffer(buffer).unwrap();
    assert!(ctx.destroy_buffer(buffer).is_err());
}

#[test]
fn pool_overflow_keeps_allocating() {
    // four pooled slots, ten live buffers: overflow blocks must chain
    let _guard = context_lock();
    let memory_info = MemoryPoolInfo {
        mode: MemAllocMode::Pooled,
        bindings: vec![MemoryBindingInfo {
            structure_type: StructureType::Buffer,
            count: 4,
        }],
        block_bindings: vec![MemoryBindingInfo {
            structure_type: StructureType::Buffer,
            count: 4,
        }],
    };
    let mut ctx = create_context(NullBackend::new(), memory_info);

    let buffers: Vec<_> = (0..10).map(|_| quad_buffer(&mut ctx)).collect();
    assert_eq!(ctx.object_count(StructureType::Buffer), 10);
    for buffer in buffers {
        ctx.destroy_buffer(buffer).expect("destroy after overflow");
    }
    assert_eq!(ctx.object_count(StructureType::Buffer), 0);
}

#[test]
fn clear_color_frame_records_the_expected_stream() {
    // the canonical clear-color frame, checked as a command stream
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let window = open_window(&mut ctx, 800, 600);

    ctx.render_begin_next_frame(window).unwrap();
    ctx.render_begin_command_recording(window).unwrap();
    ctx.render_cmd_begin_render_pass(window).unwrap();
    ctx.render_clear_color(window, 0.1, 0.2, 0.3, 1.0).unwrap();
    ctx.render_cmd_end_render_pass(window).unwrap();
    ctx.render_end_command_recording(window).unwrap();
    ctx.render_draw_submit(window).unwrap();

    let submitted = {
        let window = ctx.window(window).unwrap();
        let data = window.backend().downcast_ref::<NullWindow>().unwrap();
        data.submitted.clone()
    };
    assert_eq!(
        submitted,
        vec![vec![
            NullCommand::BeginRenderPass,
            NullCommand::ClearColor([0.1, 0.2, 0.3, 1.0]),
            NullCommand::EndRenderPass,
        ]]
    );

    ctx.destroy_window(window).unwrap();
}

#[test]
fn draw_frame_records_binds_in_order() {
    // textured-quad style frame: pipeline, geometry and descriptor binds
    // land in the submitted stream in recording order
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let window = open_window(&mut ctx, 800, 600);
    let buffer = quad_buffer(&mut ctx);

    let shader = ctx
        .create_shader_from_src(&ShaderCreateInfo {
            vertex_src: String::from("void main() {}"),
            fragment_src: String::from("void main() {}"),
        })
        .unwrap();
    let layout = ctx
        .create_descriptor_layout(&DescriptorLayoutCreateInfo {
            bindings: &[DescriptorBinding {
                binding: 0,
                descriptor_type: DescriptorType::CombinedImageSampler,
                descriptor_count: 1,
                max_allocations: 1,
                shader_stage: ShaderStageFlags::FRAGMENT,
            }],
            max_sets: 1,
        })
        .unwrap();
    let set = ctx.create_descriptor_set(layout).unwrap();
    let pipeline = ctx
        .create_pipeline(&PipelineCreateInfo {
            specification: ctx.pipeline_spec_default(),
            vertex_attributes: vec![VertexAttribute {
                binding: 0,
                layout: 0,
                data_type: VertexDataType::Vec2,
                offset: 0,
            }],
            vertex_binding_descriptions: vec![VertexBindingDescription {
                binding: 0,
                stride: 8,
            }],
            shader,
            descriptor_layouts: vec![layout],
            render_pass: ctx.window_get_render_pass(window).unwrap(),
        })
        .unwrap();
    // pipelines take the compiled modules by value; the shader object can
    // go right away
    ctx.destroy_shader(shader).unwrap();

    ctx.render_begin_next_frame(window).unwrap();
    ctx.render_begin_command_recording(window).unwrap();
    ctx.render_cmd_begin_render_pass(window).unwrap();
    ctx.render_cmd_bind_pipeline(window, pipeline).unwrap();
    ctx.render_cmd_bind_vertex_buffer(window, buffer).unwrap();
    ctx.render_cmd_bind_index_buffer(window, buffer).unwrap();
    ctx.render_cmd_bind_descriptor_sets(window, pipeline, 0, &[set])
        .unwrap();
    ctx.render_cmd_draw_indexed(window, 6).unwrap();
    ctx.render_cmd_end_render_pass(window).unwrap();
    ctx.render_end_command_recording(window).unwrap();
    ctx.render_draw_submit(window).unwrap();

    {
        let window_ref = ctx.window(window).unwrap();
        let data = window_ref.backend().downcast_ref::<NullWindow>().unwrap();
        assert_eq!(
            data.submitted[0],
            vec![
                NullCommand::BeginRenderPass,
                NullCommand::BindPipeline,
                NullCommand::BindVertexBuffer,
                NullCommand::BindIndexBuffer,
                NullCommand::BindDescriptorSets { first_set: 0, count: 1 },
                NullCommand::DrawIndexed { index_count: 6 },
                NullCommand::EndRenderPass,
            ]
        );
    }

    ctx.destroy_pipeline(pipeline).unwrap();
    ctx.destroy_descriptor_set(set).unwrap();
    ctx.destroy_descriptor_layout(layout).unwrap();
    ctx.destroy_buffer(buffer).unwrap();
    ctx.destroy_window(window).unwrap();
}

#[test]
fn minimized_windows_turn_render_calls_into_noops() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let window = open_window(&mut ctx, 0, 0);

    ctx.render_begin_next_frame(window).unwrap();
    ctx.render_begin_command_recording(window).unwrap();
    ctx.render_cmd_begin_render_pass(window).unwrap();
    ctx.render_cmd_draw(window, 3).unwrap();
    ctx.render_draw_submit(window).unwrap();

    let window_ref = ctx.window(window).unwrap();
    let data = window_ref.backend().downcast_ref::<NullWindow>().unwrap();
    assert!(data.recording.is_empty());
    assert!(data.submitted.is_empty());

    ctx.destroy_window(window).unwrap();
}

#[test]
fn uniform_updates_target_the_current_frame_slot() {
    // the slot written is the one acquired by the latest
    // render_begin_next_frame, and it reads back verbatim
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let window = open_window(&mut ctx, 640, 480);
    let ubo = ctx
        .create_uniform_buffer(&UniformBufferCreateInfo {
            buffer_type: BufferTypeFlags::UNIFORM,
            binding: 0,
            size: 16,
            initial_data: None,
        })
        .unwrap();

    ctx.render_begin_next_frame(window).unwrap();
    let frame_a = {
        let w = ctx.window(window).unwrap();
        w.backend().downcast_ref::<NullWindow>().unwrap().frame_index as usize
    };
    ctx.update_uniform_buffer_data(window, ubo, &[1u8; 16]).unwrap();

    ctx.render_begin_next_frame(window).unwrap();
    let frame_b = {
        let w = ctx.window(window).unwrap();
        w.backend().downcast_ref::<NullWindow>().unwrap().frame_index as usize
    };
    ctx.update_uniform_buffer_data(window, ubo, &[2u8; 16]).unwrap();

    assert_ne!(frame_a, frame_b);
    let ubo_ref = ctx
        .buffer_payload(ubo)
        .unwrap();
    assert_eq!(ubo_ref.slots[frame_a], vec![1u8; 16]);
    assert_eq!(ubo_ref.slots[frame_b], vec![2u8; 16]);

    ctx.destroy_uniform_buffer(ubo).unwrap();
    ctx.destroy_window(window).unwrap();
}

#[test]
fn resized_buffers_accept_updates_of_the_new_size() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let attributes = [VertexAttribute {
        binding: 0,
        layout: 0,
        data_type: VertexDataType::Vec4,
        offset: 0,
    }];
    let bindings = [VertexBindingDescription {
        binding: 0,
        stride: 16,
    }];
    let buffer = ctx
        .create_buffer(&BufferCreateInfo {
            buffer_type: BufferTypeFlags::VERTEX,
            usage: BufferUsage::Resize,
            vertex_attributes: &attributes,
            vertex_binding_descriptions: &bindings,
            vertex_data: None,
            vertex_buffer_size: 16,
            index_data: None,
            index_buffer_size: 0,
        })
        .unwrap();

    let data: Vec<u8> = (0..64u8).collect();
    ctx.buffer_resize_vertex_buffer(buffer, 64).unwrap();
    ctx.buffer_update_vertex_data(buffer, &data, 0).unwrap();

    let payload = ctx.buffer(buffer).unwrap();
    let payload = payload.backend().downcast_ref::<NullBuffer>().unwrap();
    assert_eq!(&payload.vertex[..64], &data[..]);

    ctx.destroy_buffer(buffer).unwrap();
}

#[test]
fn static_buffers_reject_writes() {
    // writes after creation require dynamic or resize usage
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let buffer = quad_buffer(&mut ctx);
    assert!(ctx.buffer_update_vertex_data(buffer, &[0; 4], 0).is_err());
    assert!(ctx.buffer_resize_vertex_buffer(buffer, 128).is_err());
    ctx.destroy_buffer(buffer).unwrap();
}

#[test]
fn framebuffer_resize_preserves_shape() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let framebuffer = ctx
        .create_frame_buffer(&FrameBufferCreateInfo {
            width: 64,
            height: 64,
            sample_count: SampleCount::X4,
            color_attachments: &[
                FrameBufferColorAttachment {
                    index: 0,
                    format: ColorImageFormat::Rgba8,
                },
                FrameBufferColorAttachment {
                    index: 1,
                    format: ColorImageFormat::Rgba16F,
                },
            ],
            depth_attachment: Some(FrameBufferDepthAttachment {
                index: 2,
                format: DepthImageFormat::Depth32,
            }),
            texture_filter: TextureFilter::Linear,
            texture_mode: TextureMode::ClampToEdge,
        })
        .unwrap();

    ctx.frame_buffer_resize(framebuffer, 128, 256).unwrap();

    let fb = ctx.frame_buffer(framebuffer).unwrap();
    assert_eq!((fb.width(), fb.height()), (128, 256));
    assert_eq!(fb.color_attachment_count(), 2);
    assert_eq!(
        fb.color_formats(),
        &[ColorImageFormat::Rgba8, ColorImageFormat::Rgba16F]
    );
    assert_eq!(fb.sample_count(), SampleCount::X4);
    assert_eq!(fb.depth_format(), Some(DepthImageFormat::Depth32));

    let attachment = ctx.frame_buffer_get_image(framebuffer, 1).unwrap();
    let texture = ctx.texture(attachment).unwrap();
    assert_eq!((texture.width(), texture.height()), (128, 256));

    // attachment textures are framebuffer-owned
    assert!(ctx.destroy_texture(attachment).is_err());

    ctx.destroy_frame_buffer(framebuffer).unwrap();
    assert_eq!(ctx.object_count(StructureType::Texture), 0);
}

#[test]
fn framebuffer_attachment_indices_are_validated() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());

    // duplicate color index
    let result = ctx.create_frame_buffer(&FrameBufferCreateInfo {
        width: 32,
        height: 32,
        sample_count: SampleCount::X1,
        color_attachments: &[
            FrameBufferColorAttachment {
                index: 0,
                format: ColorImageFormat::Rgba8,
            },
            FrameBufferColorAttachment {
                index: 0,
                format: ColorImageFormat::Rgba8,
            },
        ],
        depth_attachment: None,
        texture_filter: TextureFilter::Nearest,
        texture_mode: TextureMode::Repeat,
    });
    assert!(result.is_err());

    // depth index colliding with a color index
    let result = ctx.create_frame_buffer(&FrameBufferCreateInfo {
        width: 32,
        height: 32,
        sample_count: SampleCount::X1,
        color_attachments: &[FrameBufferColorAttachment {
            index: 0,
            format: ColorImageFormat::Rgba8,
        }],
        depth_attachment: Some(FrameBufferDepthAttachment {
            index: 0,
            format: DepthImageFormat::Depth16,
        }),
        texture_filter: TextureFilter::Nearest,
        texture_mode: TextureMode::Repeat,
    });
    assert!(result.is_err());
    assert_eq!(ctx.object_count(StructureType::FrameBuffer), 0);
}

#[test]
fn depth_format_probe_honors_candidate_order() {
    let _guard = context_lock();
    let backend = NullBackend::new().with_supported_depth_formats(vec![
        DepthImageFormat::Depth24Stencil8,
        DepthImageFormat::Depth16,
    ]);
    let ctx = create_context(backend, MemoryPoolInfo::default());

    let candidates = [
        DepthImageFormat::Depth32,
        DepthImageFormat::Depth16,
        DepthImageFormat::Depth24Stencil8,
    ];
    let first = ctx.find_supported_depth_image_format(&candidates).unwrap();
    let second = ctx.find_supported_depth_image_format(&candidates).unwrap();
    assert_eq!(first, DepthImageFormat::Depth16);
    assert_eq!(first, second);

    assert!(ctx
        .find_supported_depth_image_format(&[DepthImageFormat::Depth32])
        .is_err());
}

#[test]
fn descriptor_updates_must_match_the_layout() {
    // structurally mismatched updates are skipped, draws keep the
    // stale bindings
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let layout = ctx
        .create_descriptor_layout(&DescriptorLayoutCreateInfo {
            bindings: &[DescriptorBinding {
                binding: 0,
                descriptor_type: DescriptorType::CombinedImageSampler,
                descriptor_count: 1,
                max_allocations: 1,
                shader_stage: ShaderStageFlags::FRAGMENT,
            }],
            max_sets: 1,
        })
        .unwrap();
    let set = ctx.create_descriptor_set(layout).unwrap();
    let ubo = ctx
        .create_uniform_buffer(&UniformBufferCreateInfo {
            buffer_type: BufferTypeFlags::UNIFORM,
            binding: 0,
            size: 64,
            initial_data: None,
        })
        .unwrap();

    // buffer data into an image-sampler binding: skipped
    ctx.update_descriptor_set_data(
        set,
        &[DescriptorUpdateInfo {
            binding: 0,
            descriptor_type: DescriptorType::UniformBuffer,
            data: DescriptorData::Buffer {
                buffer: ubo,
                offset: 0,
                range: 64,
            },
        }],
    );
    {
        let set_ref = ctx.descriptor_set_payload(set).unwrap();
        assert!(set_ref.writes.is_empty());
    }

    // matching image update is applied
    let texture = ctx
        .create_texture(&TextureCreateInfo {
            image: ImageData::new(vec![255; 4], 1, 1, 4),
            ..Default::default()
        })
        .unwrap();
    ctx.update_descriptor_set_data(
        set,
        &[DescriptorUpdateInfo {
            binding: 0,
            descriptor_type: DescriptorType::CombinedImageSampler,
            data: DescriptorData::Textures(vec![texture]),
        }],
    );
    {
        let set_ref = ctx.descriptor_set_payload(set).unwrap();
        assert_eq!(set_ref.writes.len(), 1);
    }

    ctx.destroy_texture(texture).unwrap();
    ctx.destroy_uniform_buffer(ubo).unwrap();
    ctx.destroy_descriptor_set(set).unwrap();
    ctx.destroy_descriptor_layout(layout).unwrap();
}

#[test]
fn shader_sources_must_be_complete() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let result = ctx.create_shader_from_src(&ShaderCreateInfo {
        vertex_src: String::from("void main() {}"),
        fragment_src: String::new(),
    });
    assert!(result.is_err());
    assert_eq!(ctx.object_count(StructureType::Shader), 0);
}

#[test]
fn cubemap_faces_must_share_dimensions() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());
    let face = ImageData::new(vec![0; 16], 2, 2, 4);
    let small = ImageData::new(vec![0; 4], 1, 1, 4);
    let result = ctx.create_cubemap(&CubemapCreateInfo {
        pos_x: face.clone(),
        neg_x: face.clone(),
        pos_y: face.clone(),
        neg_y: small,
        pos_z: face.clone(),
        neg_z: face,
    });
    assert!(result.is_err());
}

#[test]
fn window_events_reach_the_callback() {
    let _guard = context_lock();
    let mut ctx = create_context(NullBackend::new(), MemoryPoolInfo::default());

    let native = Box::new(HeadlessWindow::new(320, 240));
    native.push_event(Event::KeyPressed { key: 32, repeat: false });
    native.push_event(Event::WindowClose);
    let window = ctx
        .create_window(WindowCreateInfo::default(), native)
        .unwrap();

    let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.window_set_event_callback(
        window,
        Box::new(move |event| sink.lock().unwrap().push(*event)),
    )
    .unwrap();

    ctx.window_update(window).unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Event::KeyPressed { key: 32, repeat: false }, Event::WindowClose]
    );
    assert!(!ctx.window_open(window).unwrap());

    ctx.destroy_window(window).unwrap();
}

#[test]
fn graphics_objects_require_render_init() {
    let _guard = context_lock();
    let mut ctx = Context::create(
        ContextCreateInfo::default(),
        Box::new(NullBackend::new()),
    )
    .unwrap();
    let result = ctx.create_window(
        WindowCreateInfo::default(),
        Box::new(HeadlessWindow::new(100, 100)),
    );
    assert!(result.is_err());
}

//--------------------------------------------------------------------------------------------------
// readback helpers over the public payload accessors

trait PayloadAccess {
    fn buffer_payload(&self, handle: Handle<UniformBuffer>) -> Option<&NullUniformBuffer>;
    fn descriptor_set_payload(&self, handle: Handle<DescriptorSet>) -> Option<&NullDescriptorSet>;
}

impl PayloadAccess for Context {
    fn buffer_payload(&self, handle: Handle<UniformBuffer>) -> Option<&NullUniformBuffer> {
        self.uniform_buffer(handle)
            .ok()?
            .backend()
            .downcast_ref::<NullUniformBuffer>()
    }

    fn descriptor_set_payload(&self, handle: Handle<DescriptorSet>) -> Option<&NullDescriptorSet> {
        self.descriptor_set(handle)
            .ok()?
            .backend()
            .downcast_ref::<NullDescriptorSet>()
    }
}
