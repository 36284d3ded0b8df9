//! Translation from the GAL enums to GL enums.

use levikno_render::format::{ColorImageFormat, DepthImageFormat, TextureFilter, TextureMode};
use levikno_render::pipeline::{
    BlendFactor, BlendOp, CompareOp, CullMode, FrontFace, StencilOp, TopologyType,
};
use levikno_render::vertex::VertexDataType;

use crate::api as gl;
use crate::api::types::GLenum;

pub(crate) fn topology_to_gl(topology: TopologyType) -> GLenum {
    match topology {
        TopologyType::Point => gl::POINTS,
        TopologyType::Line => gl::LINES,
        TopologyType::LineStrip => gl::LINE_STRIP,
        TopologyType::Triangle => gl::TRIANGLES,
        TopologyType::TriangleStrip => gl::TRIANGLE_STRIP,
    }
}

pub(crate) fn compare_op_to_gl(op: CompareOp) -> GLenum {
    match op {
        CompareOp::Never => gl::NEVER,
        CompareOp::Less => gl::LESS,
        CompareOp::Equal => gl::EQUAL,
        CompareOp::LessOrEqual => gl::LEQUAL,
        CompareOp::Greater => gl::GREATER,
        CompareOp::NotEqual => gl::NOTEQUAL,
        CompareOp::GreaterOrEqual => gl::GEQUAL,
        CompareOp::Always => gl::ALWAYS,
    }
}

pub(crate) fn stencil_op_to_gl(op: StencilOp) -> GLenum {
    match op {
        StencilOp::Keep => gl::KEEP,
        StencilOp::Zero => gl::ZERO,
        StencilOp::Replace => gl::REPLACE,
        StencilOp::IncrementAndClamp => gl::INCR,
        StencilOp::DecrementAndClamp => gl::DECR,
        StencilOp::Invert => gl::INVERT,
        StencilOp::IncrementAndWrap => gl::INCR_WRAP,
        StencilOp::DecrementAndWrap => gl::DECR_WRAP,
    }
}

pub(crate) fn blend_factor_to_gl(factor: BlendFactor) -> GLenum {
    match factor {
        BlendFactor::Zero => gl::ZERO,
        BlendFactor::One => gl::ONE,
        BlendFactor::SrcColor => gl::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => gl::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => gl::DST_COLOR,
        BlendFactor::OneMinusDstColor => gl::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => gl::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => gl::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => gl::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => gl::ONE_MINUS_DST_ALPHA,
        BlendFactor::ConstantColor => gl::CONSTANT_COLOR,
        BlendFactor::OneMinusConstantColor => gl::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::ConstantAlpha => gl::CONSTANT_ALPHA,
        BlendFactor::OneMinusConstantAlpha => gl::ONE_MINUS_CONSTANT_ALPHA,
        BlendFactor::SrcAlphaSaturate => gl::SRC_ALPHA_SATURATE,
    }
}

pub(crate) fn blend_op_to_gl(op: BlendOp) -> GLenum {
    match op {
        BlendOp::Add => gl::FUNC_ADD,
        BlendOp::Subtract => gl::FUNC_SUBTRACT,
        BlendOp::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
        BlendOp::Min => gl::MIN,
        BlendOp::Max => gl::MAX,
    }
}

/// Returns `None` for `CullMode::Disable`.
pub(crate) fn cull_mode_to_gl(mode: CullMode) -> Option<GLenum> {
    match mode {
        CullMode::Disable => None,
        CullMode::Front => Some(gl::FRONT),
        CullMode::Back => Some(gl::BACK),
        CullMode::FrontAndBack => Some(gl::FRONT_AND_BACK),
    }
}

pub(crate) fn front_face_to_gl(front: FrontFace) -> GLenum {
    match front {
        FrontFace::Clockwise => gl::CW,
        FrontFace::CounterClockwise => gl::CCW,
    }
}

pub(crate) fn filter_to_gl(filter: TextureFilter) -> GLenum {
    match filter {
        TextureFilter::Linear => gl::LINEAR,
        TextureFilter::Nearest => gl::NEAREST,
    }
}

pub(crate) fn min_filter_to_gl(filter: TextureFilter) -> GLenum {
    // minification goes through the mip chain
    match filter {
        TextureFilter::Linear => gl::LINEAR_MIPMAP_LINEAR,
        TextureFilter::Nearest => gl::NEAREST_MIPMAP_NEAREST,
    }
}

pub(crate) fn wrap_to_gl(mode: TextureMode) -> GLenum {
    match mode {
        TextureMode::Repeat => gl::REPEAT,
        TextureMode::MirrorRepeat => gl::MIRRORED_REPEAT,
        TextureMode::ClampToEdge => gl::CLAMP_TO_EDGE,
        TextureMode::ClampToBorder => gl::CLAMP_TO_BORDER,
    }
}

/// (internal format, upload format) for a texture of `channels` channels.
pub(crate) fn color_format_to_gl(format: ColorImageFormat, channels: u32) -> (GLenum, GLenum) {
    let upload = match channels {
        1 => gl::RED,
        2 => gl::RG,
        3 => gl::RGB,
        _ => gl::RGBA,
    };
    let internal = match format {
        ColorImageFormat::Rgb => gl::RGB8,
        ColorImageFormat::Rgba | ColorImageFormat::Rgba8 => gl::RGBA8,
        ColorImageFormat::Rgba16F => gl::RGBA16F,
        ColorImageFormat::Rgba32F => gl::RGBA32F,
        ColorImageFormat::Srgb => gl::SRGB8,
        ColorImageFormat::Srgba | ColorImageFormat::Srgba8 => gl::SRGB8_ALPHA8,
        ColorImageFormat::RedInt => gl::R32I,
    };
    (internal, upload)
}

pub(crate) fn depth_format_to_gl(format: DepthImageFormat) -> GLenum {
    match format {
        DepthImageFormat::Depth16 => gl::DEPTH_COMPONENT16,
        DepthImageFormat::Depth32 => gl::DEPTH_COMPONENT32F,
        DepthImageFormat::Depth24Stencil8 => gl::DEPTH24_STENCIL8,
        DepthImageFormat::Depth32Stencil8 => gl::DEPTH32F_STENCIL8,
    }
}

pub(crate) fn depth_attachment_point(format: DepthImageFormat) -> GLenum {
    if format.has_stencil() {
        gl::DEPTH_STENCIL_ATTACHMENT
    } else {
        gl::DEPTH_ATTACHMENT
    }
}

/// (GL component type, component count, normalized) for a vertex attribute.
pub(crate) fn vertex_data_type_to_gl(data_type: VertexDataType) -> (GLenum, i32, bool) {
    use VertexDataType::*;
    let gl_type = match data_type {
        None => gl::FLOAT,
        Float | Vec2 | Vec3 | Vec4 => gl::FLOAT,
        Double | Vec2d | Vec3d | Vec4d => gl::DOUBLE,
        Int | Vec2i | Vec3i | Vec4i => gl::INT,
        UnsignedInt | Vec2ui | Vec3ui | Vec4ui => gl::UNSIGNED_INT,
        Byte | Vec2b | Vec3b | Vec4b | Vec2n | Vec3n | Vec4n => gl::BYTE,
        UnsignedByte | Vec2ub | Vec3ub | Vec4ub | Vec2un | Vec3un | Vec4un => gl::UNSIGNED_BYTE,
        Int2_10_10_10 => gl::INT_2_10_10_10_REV,
        UnsignedInt2_10_10_10 => gl::UNSIGNED_INT_2_10_10_10_REV,
    };
    (
        gl_type,
        data_type.components() as i32,
        data_type.normalized(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_translation() {
        assert_eq!(topology_to_gl(TopologyType::Triangle), gl::TRIANGLES);
        assert_eq!(topology_to_gl(TopologyType::LineStrip), gl::LINE_STRIP);
    }

    #[test]
    fn cull_disable_maps_to_none() {
        assert_eq!(cull_mode_to_gl(CullMode::Disable), None);
        assert_eq!(cull_mode_to_gl(CullMode::Back), Some(gl::BACK));
    }

    #[test]
    fn vertex_types_carry_normalization() {
        let (ty, comps, normalized) = vertex_data_type_to_gl(VertexDataType::Vec4un);
        assert_eq!(ty, gl::UNSIGNED_BYTE);
        assert_eq!(comps, 4);
        assert!(normalized);

        let (ty, comps, normalized) = vertex_data_type_to_gl(VertexDataType::Vec3);
        assert_eq!(ty, gl::FLOAT);
        assert_eq!(comps, 3);
        assert!(!normalized);
    }

    #[test]
    fn srgb_formats_pick_srgb_storage() {
        let (internal, upload) = color_format_to_gl(ColorImageFormat::Srgba8, 4);
        assert_eq!(internal, gl::SRGB8_ALPHA8);
        assert_eq!(upload, gl::RGBA);
    }
}
