//! Translation from the GAL enums to `ash::vk` enums.

use ash::vk;
use levikno_render::descriptor::{DescriptorType, ShaderStageFlags};
use levikno_render::format::{ColorImageFormat, DepthImageFormat, SampleCount, TextureFilter, TextureMode};
use levikno_render::pipeline::{
    BlendFactor, BlendOp, CompareOp, CullMode, FrontFace, StencilOp, TopologyType,
};
use levikno_render::vertex::VertexDataType;

pub(crate) fn topology_to_vk(topology: TopologyType) -> vk::PrimitiveTopology {
    match topology {
        TopologyType::Point => vk::PrimitiveTopology::POINT_LIST,
        TopologyType::Line => vk::PrimitiveTopology::LINE_LIST,
        TopologyType::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        TopologyType::Triangle => vk::PrimitiveTopology::TRIANGLE_LIST,
        TopologyType::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub(crate) fn compare_op_to_vk(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

pub(crate) fn stencil_op_to_vk(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub(crate) fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::ConstantColor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::OneMinusConstantColor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::ConstantAlpha => vk::BlendFactor::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => vk::BlendFactor::ONE_MINUS_CONSTANT_ALPHA,
        BlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
    }
}

pub(crate) fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub(crate) fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::Disable => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub(crate) fn front_face_to_vk(front: FrontFace) -> vk::FrontFace {
    match front {
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

pub(crate) fn sample_count_to_vk(count: SampleCount) -> vk::SampleCountFlags {
    match count {
        SampleCount::X1 => vk::SampleCountFlags::TYPE_1,
        SampleCount::X2 => vk::SampleCountFlags::TYPE_2,
        SampleCount::X4 => vk::SampleCountFlags::TYPE_4,
        SampleCount::X8 => vk::SampleCountFlags::TYPE_8,
        SampleCount::X16 => vk::SampleCountFlags::TYPE_16,
        SampleCount::X32 => vk::SampleCountFlags::TYPE_32,
        SampleCount::X64 => vk::SampleCountFlags::TYPE_64,
    }
}

pub(crate) fn filter_to_vk(filter: TextureFilter) -> vk::Filter {
    match filter {
        TextureFilter::Linear => vk::Filter::LINEAR,
        TextureFilter::Nearest => vk::Filter::NEAREST,
    }
}

pub(crate) fn wrap_to_vk(mode: TextureMode) -> vk::SamplerAddressMode {
    match mode {
        TextureMode::Repeat => vk::SamplerAddressMode::REPEAT,
        TextureMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        TextureMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

/// The storage format a texture or attachment is created with. Three
/// channel uploads are expanded to RGBA before upload, so `Rgb` maps to
/// an RGBA storage format too.
pub(crate) fn color_format_to_vk(format: ColorImageFormat) -> vk::Format {
    match format {
        ColorImageFormat::Rgb | ColorImageFormat::Rgba | ColorImageFormat::Rgba8 => {
            vk::Format::R8G8B8A8_UNORM
        }
        ColorImageFormat::Rgba16F => vk::Format::R16G16B16A16_SFLOAT,
        ColorImageFormat::Rgba32F => vk::Format::R32G32B32A32_SFLOAT,
        ColorImageFormat::Srgb | ColorImageFormat::Srgba | ColorImageFormat::Srgba8 => {
            vk::Format::R8G8B8A8_SRGB
        }
        ColorImageFormat::RedInt => vk::Format::R32_SINT,
    }
}

pub(crate) fn depth_format_to_vk(format: DepthImageFormat) -> vk::Format {
    match format {
        DepthImageFormat::Depth16 => vk::Format::D16_UNORM,
        DepthImageFormat::Depth32 => vk::Format::D32_SFLOAT,
        DepthImageFormat::Depth24Stencil8 => vk::Format::D24_UNORM_S8_UINT,
        DepthImageFormat::Depth32Stencil8 => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

pub(crate) fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
    }
}

pub(crate) fn shader_stage_to_vk(stage: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stage.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stage.contains(ShaderStageFlags::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

pub(crate) fn vertex_data_type_to_vk(data_type: VertexDataType) -> vk::Format {
    use VertexDataType::*;
    match data_type {
        None => vk::Format::UNDEFINED,
        Float => vk::Format::R32_SFLOAT,
        Double => vk::Format::R64_SFLOAT,
        Int => vk::Format::R32_SINT,
        UnsignedInt => vk::Format::R32_UINT,
        Byte => vk::Format::R8_SINT,
        UnsignedByte => vk::Format::R8_UINT,
        Vec2 => vk::Format::R32G32_SFLOAT,
        Vec3 => vk::Format::R32G32B32_SFLOAT,
        Vec4 => vk::Format::R32G32B32A32_SFLOAT,
        Vec2d => vk::Format::R64G64_SFLOAT,
        Vec3d => vk::Format::R64G64B64_SFLOAT,
        Vec4d => vk::Format::R64G64B64A64_SFLOAT,
        Vec2i => vk::Format::R32G32_SINT,
        Vec3i => vk::Format::R32G32B32_SINT,
        Vec4i => vk::Format::R32G32B32A32_SINT,
        Vec2ui => vk::Format::R32G32_UINT,
        Vec3ui => vk::Format::R32G32B32_UINT,
        Vec4ui => vk::Format::R32G32B32A32_UINT,
        Vec2b => vk::Format::R8G8_SINT,
        Vec3b => vk::Format::R8G8B8_SINT,
        Vec4b => vk::Format::R8G8B8A8_SINT,
        Vec2ub => vk::Format::R8G8_UINT,
        Vec3ub => vk::Format::R8G8B8_UINT,
        Vec4ub => vk::Format::R8G8B8A8_UINT,
        Vec2n => vk::Format::R8G8_SNORM,
        Vec3n => vk::Format::R8G8B8_SNORM,
        Vec4n => vk::Format::R8G8B8A8_SNORM,
        Vec2un => vk::Format::R8G8_UNORM,
        Vec3un => vk::Format::R8G8B8_UNORM,
        Vec4un => vk::Format::R8G8B8A8_UNORM,
        Int2_10_10_10 => vk::Format::A2B10G10R10_SNORM_PACK32,
        UnsignedInt2_10_10_10 => vk::Format::A2B10G10R10_UNORM_PACK32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats() {
        assert_eq!(
            depth_format_to_vk(DepthImageFormat::Depth24Stencil8),
            vk::Format::D24_UNORM_S8_UINT
        );
    }

    #[test]
    fn vertex_formats() {
        assert_eq!(
            vertex_data_type_to_vk(VertexDataType::Vec3),
            vk::Format::R32G32B32_SFLOAT
        );
        assert_eq!(
            vertex_data_type_to_vk(VertexDataType::Vec4un),
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn srgb_color_formats() {
        assert_eq!(
            color_format_to_vk(ColorImageFormat::Srgba8),
            vk::Format::R8G8B8A8_SRGB
        );
    }
}
