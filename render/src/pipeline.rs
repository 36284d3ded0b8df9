//! Graphics pipeline specification.
//!
//! A [`PipelineSpecification`] is an immutable snapshot of fixed-function
//! state captured when a pipeline is created. The context keeps a default
//! specification that callers can read, tweak and pass back.

use ordered_float::NotNan;

use crate::descriptor::DescriptorLayout;
use crate::framebuffer::FrameBuffer;
use crate::memory::Handle;
use crate::shader::Shader;
use crate::vertex::{VertexAttribute, VertexBindingDescription};
use crate::window::Window;
use crate::format::SampleCount;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum TopologyType {
    Point,
    Line,
    LineStrip,
    #[default]
    Triangle,
    TriangleStrip,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct InputAssembly {
    pub topology: TopologyType,
    pub primitive_restart_enable: bool,
}

/// Viewport rectangle; `width`/`height` of `-1.0` mean "match the render
/// target" and are resolved by the backend when the pipeline is bound.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: -1.0,
            height: -1.0,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle; a `width`/`height` of `-1` means "match the render
/// target".
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Scissor {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Scissor {
    fn default() -> Self {
        Scissor {
            x: 0,
            y: 0,
            width: -1,
            height: -1,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum CullMode {
    #[default]
    Disable,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum FrontFace {
    Clockwise,
    #[default]
    CounterClockwise,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Rasterizer {
    pub depth_clamp_enable: bool,
    pub rasterizer_discard_enable: bool,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: NotNan<f32>,
    pub depth_bias_enable: bool,
    pub depth_bias_constant: NotNan<f32>,
    pub depth_bias_clamp: NotNan<f32>,
    pub depth_bias_slope: NotNan<f32>,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Rasterizer {
            depth_clamp_enable: false,
            rasterizer_discard_enable: false,
            cull_mode: CullMode::Disable,
            front_face: FrontFace::CounterClockwise,
            line_width: NotNan::new(1.0).unwrap(),
            depth_bias_enable: false,
            depth_bias_constant: NotNan::new(0.0).unwrap(),
            depth_bias_clamp: NotNan::new(0.0).unwrap(),
            depth_bias_slope: NotNan::new(0.0).unwrap(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MultiSampling {
    pub rasterization_samples: SampleCount,
    pub min_sample_shading: f32,
    pub sample_mask: Option<u32>,
    pub alpha_to_coverage_enable: bool,
    pub alpha_to_one_enable: bool,
}

impl Default for MultiSampling {
    fn default() -> Self {
        MultiSampling {
            rasterization_samples: SampleCount::X1,
            min_sample_shading: 1.0,
            sample_mask: None,
            alpha_to_coverage_enable: false,
            alpha_to_one_enable: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum LogicOp {
    Clear,
    And,
    AndReverse,
    #[default]
    Copy,
    AndInverted,
    NoOp,
    Xor,
    Or,
    Nor,
    Equivalent,
    Invert,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

bitflags::bitflags! {
    #[derive(Default)]
    pub struct ColorComponentFlags: u32 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
        const ALL = Self::R.bits | Self::G.bits | Self::B.bits | Self::A.bits;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color_blend_factor: BlendFactor,
    pub dst_color_blend_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_blend_factor: BlendFactor,
    pub dst_alpha_blend_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorComponentFlags,
}

impl ColorBlendAttachment {
    /// Standard premultiplied-style alpha blending.
    pub const ALPHA_BLENDING: ColorBlendAttachment = ColorBlendAttachment {
        blend_enable: true,
        src_color_blend_factor: BlendFactor::SrcAlpha,
        dst_color_blend_factor: BlendFactor::OneMinusSrcAlpha,
        color_blend_op: BlendOp::Add,
        src_alpha_blend_factor: BlendFactor::One,
        dst_alpha_blend_factor: BlendFactor::OneMinusSrcAlpha,
        alpha_blend_op: BlendOp::Add,
        color_write_mask: ColorComponentFlags::ALL,
    };
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        ColorBlendAttachment {
            blend_enable: false,
            src_color_blend_factor: BlendFactor::One,
            dst_color_blend_factor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_blend_factor: BlendFactor::One,
            dst_alpha_blend_factor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorComponentFlags::ALL,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColorBlend {
    pub logic_op_enable: bool,
    pub logic_op: LogicOp,
    /// One entry per color attachment; empty means "default blending for
    /// every attachment".
    pub attachments: Vec<ColorBlendAttachment>,
    pub blend_constants: [NotNan<f32>; 4],
}

impl Default for ColorBlend {
    fn default() -> Self {
        let zero = NotNan::new(0.0).unwrap();
        ColorBlend {
            logic_op_enable: false,
            logic_op: LogicOp::Copy,
            attachments: Vec::new(),
            blend_constants: [zero; 4],
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct StencilAttachment {
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
    pub compare_op: CompareOp,
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct DepthStencil {
    pub enable_depth: bool,
    pub depth_write_enable: bool,
    pub depth_op_compare: CompareOp,
    pub enable_stencil: bool,
    pub stencil_front: StencilAttachment,
    pub stencil_back: StencilAttachment,
}

/// Immutable fixed-function state snapshot captured at pipeline creation.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PipelineSpecification {
    pub input_assembly: InputAssembly,
    pub viewport: Viewport,
    pub scissor: Scissor,
    pub rasterizer: Rasterizer,
    pub multisampling: MultiSampling,
    pub color_blend: ColorBlend,
    pub depth_stencil: DepthStencil,
}

//--------------------------------------------------------------------------------------------------

/// Identifies the renderpass a pipeline is created against: a window's
/// default renderpass or a framebuffer's own renderpass. A pipeline may
/// only be bound while that renderpass is active.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RenderPass {
    Window(Handle<Window>),
    FrameBuffer(Handle<FrameBuffer>),
}

/// Everything needed to create a graphics pipeline. The shader's compiled
/// modules are consumed by value: the `Shader` object is not retained past
/// creation and may be destroyed immediately afterwards.
#[derive(Clone, Debug)]
pub struct PipelineCreateInfo {
    pub specification: PipelineSpecification,
    pub vertex_attributes: Vec<VertexAttribute>,
    pub vertex_binding_descriptions: Vec<VertexBindingDescription>,
    pub shader: Handle<Shader>,
    pub descriptor_layouts: Vec<Handle<DescriptorLayout>>,
    pub render_pass: RenderPass,
}

/// Pooled pipeline object.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) render_pass: RenderPass,
    pub(crate) backend: Box<dyn crate::backend::BackendPipeline>,
}

impl Pipeline {
    pub fn render_pass(&self) -> RenderPass {
        self.render_pass
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendPipeline {
        self.backend.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_specification_matches_documented_defaults() {
        let spec = PipelineSpecification::default();
        assert_eq!(spec.input_assembly.topology, TopologyType::Triangle);
        assert_eq!(spec.rasterizer.cull_mode, CullMode::Disable);
        assert_eq!(spec.rasterizer.line_width.into_inner(), 1.0);
        assert_eq!(spec.viewport.width, -1.0);
        assert_eq!(spec.scissor.height, -1);
        assert!(!spec.depth_stencil.enable_depth);
        assert_eq!(spec.multisampling.rasterization_samples.samples(), 1);
    }

    #[test]
    fn alpha_blending_preset() {
        let blend = ColorBlendAttachment::ALPHA_BLENDING;
        assert!(blend.blend_enable);
        assert_eq!(blend.src_color_blend_factor, BlendFactor::SrcAlpha);
        assert_eq!(blend.dst_color_blend_factor, BlendFactor::OneMinusSrcAlpha);
    }
}
