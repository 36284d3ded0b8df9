//! Vertex input layout descriptions.

/// Closed set of vertex attribute formats. Backends translate these to
/// their native enums; [`VertexDataType::components`] and
/// [`VertexDataType::normalized`] expose the properties the translation
/// needs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum VertexDataType {
    #[default]
    None,
    Float,
    Double,
    Int,
    UnsignedInt,
    Byte,
    UnsignedByte,
    Vec2,
    Vec3,
    Vec4,
    Vec2d,
    Vec3d,
    Vec4d,
    Vec2i,
    Vec3i,
    Vec4i,
    Vec2ui,
    Vec3ui,
    Vec4ui,
    Vec2b,
    Vec3b,
    Vec4b,
    Vec2ub,
    Vec3ub,
    Vec4ub,
    /// Normalized signed bytes in [-1, 1].
    Vec2n,
    Vec3n,
    Vec4n,
    /// Normalized unsigned bytes in [0, 1].
    Vec2un,
    Vec3un,
    Vec4un,
    /// Packed 2-10-10-10 signed, normalized.
    Int2_10_10_10,
    /// Packed 2-10-10-10 unsigned, normalized.
    UnsignedInt2_10_10_10,
}

impl VertexDataType {
    /// Number of components the attribute expands to in the shader.
    pub fn components(self) -> u32 {
        use VertexDataType::*;
        match self {
            None => 0,
            Float | Double | Int | UnsignedInt | Byte | UnsignedByte => 1,
            Vec2 | Vec2d | Vec2i | Vec2ui | Vec2b | Vec2ub | Vec2n | Vec2un => 2,
            Vec3 | Vec3d | Vec3i | Vec3ui | Vec3b | Vec3ub | Vec3n | Vec3un => 3,
            Vec4 | Vec4d | Vec4i | Vec4ui | Vec4b | Vec4ub | Vec4n | Vec4un => 4,
            Int2_10_10_10 | UnsignedInt2_10_10_10 => 4,
        }
    }

    /// True when integer source data is converted to floats in [0, 1] or
    /// [-1, 1] instead of being passed through.
    pub fn normalized(self) -> bool {
        use VertexDataType::*;
        matches!(
            self,
            Vec2n
                | Vec3n
                | Vec4n
                | Vec2un
                | Vec3un
                | Vec4un
                | Int2_10_10_10
                | UnsignedInt2_10_10_10
        )
    }

    /// Byte size of one attribute element.
    pub fn size(self) -> u32 {
        use VertexDataType::*;
        match self {
            None => 0,
            Float | Int | UnsignedInt => 4,
            Double => 8,
            Byte | UnsignedByte => 1,
            Vec2 | Vec2i | Vec2ui => 8,
            Vec3 | Vec3i | Vec3ui => 12,
            Vec4 | Vec4i | Vec4ui => 16,
            Vec2d => 16,
            Vec3d => 24,
            Vec4d => 32,
            Vec2b | Vec2ub | Vec2n | Vec2un => 2,
            Vec3b | Vec3ub | Vec3n | Vec3un => 3,
            Vec4b | Vec4ub | Vec4n | Vec4un => 4,
            Int2_10_10_10 | UnsignedInt2_10_10_10 => 4,
        }
    }
}

/// One attribute inside a vertex buffer binding.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    pub binding: u32,
    /// Shader input location.
    pub layout: u32,
    pub data_type: VertexDataType,
    /// Byte offset from the start of the vertex.
    pub offset: u32,
}

/// Stride description for one vertex buffer binding slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VertexBindingDescription {
    pub binding: u32,
    pub stride: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_counts() {
        assert_eq!(VertexDataType::Float.components(), 1);
        assert_eq!(VertexDataType::Vec3.components(), 3);
        assert_eq!(VertexDataType::Vec4ub.components(), 4);
        assert_eq!(VertexDataType::Int2_10_10_10.components(), 4);
        assert_eq!(VertexDataType::None.components(), 0);
    }

    #[test]
    fn normalization_flags() {
        assert!(VertexDataType::Vec4n.normalized());
        assert!(VertexDataType::Vec2un.normalized());
        assert!(VertexDataType::UnsignedInt2_10_10_10.normalized());
        assert!(!VertexDataType::Vec4ub.normalized());
        assert!(!VertexDataType::Vec3.normalized());
    }

    #[test]
    fn element_sizes() {
        assert_eq!(VertexDataType::Vec3.size(), 12);
        assert_eq!(VertexDataType::Vec4d.size(), 32);
        assert_eq!(VertexDataType::Vec4un.size(), 4);
    }
}
