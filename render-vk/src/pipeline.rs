//! Shader modules and graphics pipelines.

use std::io::Cursor;

use ash::util::read_spv;
use ash::vk;
use levikno_render::backend::{BackendPipeline, BackendShader, PipelineBackendCreateInfo};
use levikno_render::error::{Error, Result};
use levikno_render::pipeline::{Scissor, Viewport};
use smallvec::SmallVec;

use crate::device::DeviceState;
use crate::translate::*;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// The Vulkan backend consumes SPIR-V; sources are kept as words until
/// pipeline creation builds (and immediately releases) the native
/// modules, so a `Shader` can be destroyed right after the pipeline is
/// created.
#[derive(Debug)]
pub struct VkShader {
    pub vertex_spv: Vec<u32>,
    pub fragment_spv: Vec<u32>,
}

impl BackendShader for VkShader {}

pub(crate) fn parse_spirv(bytes: &[u8], stage: &str) -> Result<Vec<u32>> {
    if bytes.len() < 4
        || u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) != SPIRV_MAGIC
    {
        return Err(Error::validation(format!(
            "{} shader is not SPIR-V; the Vulkan backend expects SPIR-V bytecode",
            stage
        )));
    }
    read_spv(&mut Cursor::new(bytes))
        .map_err(|err| Error::validation(format!("invalid {} SPIR-V module: {}", stage, err)))
}

//--------------------------------------------------------------------------------------------------

#[derive(Debug)]
pub struct VkPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    /// Static viewport/scissor requests; `-1` dimensions resolve against
    /// the active render target when the pipeline is bound.
    pub viewport: Viewport,
    pub scissor: Scissor,
}

impl BackendPipeline for VkPipeline {}

impl VkPipeline {
    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

pub(crate) fn create_pipeline(
    state: &DeviceState,
    info: &PipelineBackendCreateInfo,
    render_pass: vk::RenderPass,
    color_attachment_count: usize,
) -> Result<VkPipeline> {
    let device = &state.device;
    let shader = info
        .shader
        .backend()
        .downcast_ref::<VkShader>()
        .expect("shader payload does not belong to the Vulkan backend");

    let module_info = vk::ShaderModuleCreateInfo::builder().code(&shader.vertex_spv);
    let vertex_module = unsafe {
        device
            .create_shader_module(&module_info, None)
            .map_err(|err| Error::Failure(format!("vertex module creation failed: {}", err)))?
    };
    let module_info = vk::ShaderModuleCreateInfo::builder().code(&shader.fragment_spv);
    let fragment_module = unsafe {
        match device.create_shader_module(&module_info, None) {
            Ok(module) => module,
            Err(err) => {
                device.destroy_shader_module(vertex_module, None);
                return Err(Error::Failure(format!(
                    "fragment module creation failed: {}",
                    err
                )));
            }
        }
    };

    let entry = unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(b"main\0") };
    let stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(entry)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_module)
            .name(entry)
            .build(),
    ];

    let spec = info.specification;

    let bindings: SmallVec<[vk::VertexInputBindingDescription; 4]> = info
        .vertex_binding_descriptions
        .iter()
        .map(|b| vk::VertexInputBindingDescription {
            binding: b.binding,
            stride: b.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let attributes: SmallVec<[vk::VertexInputAttributeDescription; 8]> = info
        .vertex_attributes
        .iter()
        .map(|a| vk::VertexInputAttributeDescription {
            location: a.layout,
            binding: a.binding,
            format: vertex_data_type_to_vk(a.data_type),
            offset: a.offset,
        })
        .collect();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(topology_to_vk(spec.input_assembly.topology))
        .primitive_restart_enable(spec.input_assembly.primitive_restart_enable);

    // viewport and scissor stay dynamic so "-1 means match the target"
    // can resolve at bind time
    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);
    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(spec.rasterizer.depth_clamp_enable)
        .rasterizer_discard_enable(spec.rasterizer.rasterizer_discard_enable)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(spec.rasterizer.line_width.into_inner())
        .cull_mode(cull_mode_to_vk(spec.rasterizer.cull_mode))
        .front_face(front_face_to_vk(spec.rasterizer.front_face))
        .depth_bias_enable(spec.rasterizer.depth_bias_enable)
        .depth_bias_constant_factor(spec.rasterizer.depth_bias_constant.into_inner())
        .depth_bias_clamp(spec.rasterizer.depth_bias_clamp.into_inner())
        .depth_bias_slope_factor(spec.rasterizer.depth_bias_slope.into_inner());

    let sample_mask = [spec.multisampling.sample_mask.unwrap_or(u32::MAX)];
    let mut multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .rasterization_samples(sample_count_to_vk(spec.multisampling.rasterization_samples))
        .min_sample_shading(spec.multisampling.min_sample_shading)
        .alpha_to_coverage_enable(spec.multisampling.alpha_to_coverage_enable)
        .alpha_to_one_enable(spec.multisampling.alpha_to_one_enable);
    if spec.multisampling.sample_mask.is_some() {
        multisampling = multisampling.sample_mask(&sample_mask);
    }

    let stencil_state = |s: &levikno_render::pipeline::StencilAttachment| vk::StencilOpState {
        fail_op: stencil_op_to_vk(s.fail_op),
        pass_op: stencil_op_to_vk(s.pass_op),
        depth_fail_op: stencil_op_to_vk(s.depth_fail_op),
        compare_op: compare_op_to_vk(s.compare_op),
        compare_mask: s.compare_mask,
        write_mask: s.write_mask,
        reference: s.reference,
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(spec.depth_stencil.enable_depth)
        .depth_write_enable(spec.depth_stencil.enable_depth)
        .depth_compare_op(compare_op_to_vk(spec.depth_stencil.depth_op_compare))
        .stencil_test_enable(spec.depth_stencil.enable_stencil)
        .front(stencil_state(&spec.depth_stencil.stencil_front))
        .back(stencil_state(&spec.depth_stencil.stencil_back));

    let default_attachment = levikno_render::pipeline::ColorBlendAttachment::default();
    let blend_attachments: SmallVec<[vk::PipelineColorBlendAttachmentState; 4]> = (0
        ..color_attachment_count.max(1))
        .map(|index| {
            let blend = spec
                .color_blend
                .attachments
                .get(index)
                .or_else(|| spec.color_blend.attachments.first())
                .unwrap_or(&default_attachment);
            vk::PipelineColorBlendAttachmentState {
                blend_enable: blend.blend_enable as vk::Bool32,
                src_color_blend_factor: blend_factor_to_vk(blend.src_color_blend_factor),
                dst_color_blend_factor: blend_factor_to_vk(blend.dst_color_blend_factor),
                color_blend_op: blend_op_to_vk(blend.color_blend_op),
                src_alpha_blend_factor: blend_factor_to_vk(blend.src_alpha_blend_factor),
                dst_alpha_blend_factor: blend_factor_to_vk(blend.dst_alpha_blend_factor),
                alpha_blend_op: blend_op_to_vk(blend.alpha_blend_op),
                color_write_mask: vk::ColorComponentFlags::from_raw(
                    blend.color_write_mask.bits(),
                ),
            }
        })
        .collect();
    let blend_constants = [
        spec.color_blend.blend_constants[0].into_inner(),
        spec.color_blend.blend_constants[1].into_inner(),
        spec.color_blend.blend_constants[2].into_inner(),
        spec.color_blend.blend_constants[3].into_inner(),
    ];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(spec.color_blend.logic_op_enable)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&blend_attachments)
        .blend_constants(blend_constants);

    // pipeline layout = concatenated set layouts in declaration order
    let set_layouts: SmallVec<[vk::DescriptorSetLayout; 4]> = info
        .descriptor_layouts
        .iter()
        .map(|layout| {
            layout
                .backend()
                .downcast_ref::<crate::descriptor::VkDescriptorLayout>()
                .expect("descriptor layout payload does not belong to the Vulkan backend")
                .layout
        })
        .collect();
    let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
    let layout = unsafe {
        device
            .create_pipeline_layout(&layout_info, None)
            .map_err(|err| Error::Failure(format!("pipeline layout creation failed: {}", err)))?
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)
        .build();

    let pipeline = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
            .map_err(|(_, err)| Error::Failure(format!("pipeline creation failed: {}", err)))?[0]
    };

    unsafe {
        device.destroy_shader_module(vertex_module, None);
        device.destroy_shader_module(fragment_module, None);
    }

    Ok(VkPipeline {
        pipeline,
        layout,
        viewport: spec.viewport,
        scissor: spec.scissor,
    })
}
