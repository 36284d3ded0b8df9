//! Mesh primitive assembly.
//!
//! POSITION is required; every other attribute is synthesized when
//! missing. Tangents fall back to MikkTSpace generation when the
//! primitive is triangle-topology and positions, normals and texcoords
//! are all available.

use levikno_render::buffer::{BufferCreateInfo, BufferTypeFlags, BufferUsage};
use levikno_render::pipeline::TopologyType;
use levikno_render::vertex::{VertexAttribute, VertexBindingDescription, VertexDataType};
use levikno_render::Context;
use nalgebra_glm as glm;

use crate::gltf::accessor::{read_floats, read_indices};
use crate::gltf::document::{Document, Primitive as DocPrimitive};
use crate::model::{Material, MeshVertex, Primitive};
use crate::ModelError;

pub(crate) fn topology_from_mode(mode: i32) -> TopologyType {
    match mode {
        0 => TopologyType::Point,
        1 => TopologyType::Line,
        2 | 3 => TopologyType::LineStrip,
        5 => TopologyType::TriangleStrip,
        _ => TopologyType::Triangle,
    }
}

/// The interleaved layout every primitive buffer uses: pos, color4, uv,
/// normal, tangent, bitangent, joints4, weights4.
pub(crate) fn vertex_attributes() -> [VertexAttribute; 8] {
    let vec2 = VertexDataType::Vec2;
    let vec3 = VertexDataType::Vec3;
    let vec4 = VertexDataType::Vec4;
    [
        VertexAttribute { binding: 0, layout: 0, data_type: vec3, offset: 0 },
        VertexAttribute { binding: 0, layout: 1, data_type: vec4, offset: 12 },
        VertexAttribute { binding: 0, layout: 2, data_type: vec2, offset: 28 },
        VertexAttribute { binding: 0, layout: 3, data_type: vec3, offset: 36 },
        VertexAttribute { binding: 0, layout: 4, data_type: vec3, offset: 48 },
        VertexAttribute { binding: 0, layout: 5, data_type: vec3, offset: 60 },
        VertexAttribute { binding: 0, layout: 6, data_type: vec4, offset: 72 },
        VertexAttribute { binding: 0, layout: 7, data_type: vec4, offset: 88 },
    ]
}

fn chunk3(values: &[f32]) -> Vec<[f32; 3]> {
    values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
}

fn chunk2(values: &[f32]) -> Vec<[f32; 2]> {
    values.chunks_exact(2).map(|c| [c[0], c[1]]).collect()
}

fn chunk4(values: &[f32]) -> Vec<[f32; 4]> {
    values
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect()
}

struct TangentMesh<'a> {
    positions: &'a [[f32; 3]],
    normals: &'a [[f32; 3]],
    uvs: &'a [[f32; 2]],
    indices: &'a [u32],
    tangents: Vec<[f32; 4]>,
}

impl<'a> TangentMesh<'a> {
    fn vertex(&self, face: usize, vert: usize) -> usize {
        self.indices[face * 3 + vert] as usize
    }
}

impl<'a> mikktspace::Geometry for TangentMesh<'a> {
    fn num_faces(&self) -> usize {
        self.indices.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.positions[self.vertex(face, vert)]
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.normals[self.vertex(face, vert)]
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.uvs[self.vertex(face, vert)]
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        let index = self.vertex(face, vert);
        self.tangents[index] = tangent;
    }
}

fn calculate_tangents(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    indices: &[u32],
) -> Vec<[f32; 4]> {
    let sequential: Vec<u32>;
    let indices = if indices.is_empty() {
        sequential = (0..positions.len() as u32).collect();
        &sequential
    } else {
        indices
    };

    let mut mesh = TangentMesh {
        positions,
        normals,
        uvs,
        indices,
        tangents: vec![[0.0; 4]; positions.len()],
    };
    if !mikktspace::generate_tangents(&mut mesh) {
        log::warn!(target: "levikno", "tangent generation failed, leaving tangents at zero");
    }
    mesh.tangents
}

fn calculate_bitangents(normals: &[[f32; 3]], tangents: &[[f32; 4]]) -> Vec<[f32; 3]> {
    normals
        .iter()
        .zip(tangents)
        .map(|(normal, tangent)| {
            let n = glm::vec3(normal[0], normal[1], normal[2]);
            let t = glm::vec3(tangent[0], tangent[1], tangent[2]);
            let cross = glm::cross(&n, &t);
            if cross.norm() <= f32::EPSILON {
                [0.0; 3]
            } else {
                let b = cross.normalize() * tangent[3];
                [b.x, b.y, b.z]
            }
        })
        .collect()
}

pub(crate) struct AssembledPrimitive {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub topology: TopologyType,
    pub material_index: Option<usize>,
}

/// Reads one primitive's attributes and synthesizes whatever is missing.
pub(crate) fn assemble_primitive(
    document: &Document,
    buffers: &[Vec<u8>],
    primitive: &DocPrimitive,
    base_color: [f32; 4],
) -> Result<AssembledPrimitive, ModelError> {
    let position_accessor = *primitive
        .attributes
        .get("POSITION")
        .ok_or(ModelError::InvalidDocument("primitive without POSITION"))?;
    let positions = chunk3(&read_floats(document, buffers, position_accessor)?);
    let vertex_count = positions.len();

    let indices = match primitive.indices {
        Some(accessor) => read_indices(document, buffers, accessor)?,
        None => Vec::new(),
    };

    let colors: Vec<[f32; 4]> = match primitive.attributes.get("COLOR_0") {
        Some(&accessor) => {
            let floats = read_floats(document, buffers, accessor)?;
            if floats.len() == vertex_count * 3 {
                floats
                    .chunks_exact(3)
                    .map(|c| [c[0], c[1], c[2], 1.0])
                    .collect()
            } else {
                chunk4(&floats)
            }
        }
        None => vec![base_color; vertex_count],
    };

    let uvs: Vec<[f32; 2]> = match primitive.attributes.get("TEXCOORD_0") {
        Some(&accessor) => chunk2(&read_floats(document, buffers, accessor)?),
        None => vec![[0.0; 2]; vertex_count],
    };

    let has_normals = primitive.attributes.contains_key("NORMAL");
    let normals: Vec<[f32; 3]> = match primitive.attributes.get("NORMAL") {
        Some(&accessor) => chunk3(&read_floats(document, buffers, accessor)?),
        None => vec![[0.0; 3]; vertex_count],
    };

    let has_uvs = primitive.attributes.contains_key("TEXCOORD_0");
    let tangents: Vec<[f32; 4]> = match primitive.attributes.get("TANGENT") {
        Some(&accessor) => chunk4(&read_floats(document, buffers, accessor)?),
        None if primitive.mode >= 4 && has_normals && has_uvs => {
            calculate_tangents(&positions, &normals, &uvs, &indices)
        }
        None => vec![[0.0; 4]; vertex_count],
    };

    let bitangents = if has_normals {
        calculate_bitangents(&normals, &tangents)
    } else {
        vec![[0.0; 3]; vertex_count]
    };

    let joints: Vec<[f32; 4]> = match primitive.attributes.get("JOINTS_0") {
        Some(&accessor) => chunk4(&read_floats(document, buffers, accessor)?),
        None => vec![[0.0; 4]; vertex_count],
    };
    let weights: Vec<[f32; 4]> = match primitive.attributes.get("WEIGHTS_0") {
        Some(&accessor) => chunk4(&read_floats(document, buffers, accessor)?),
        None => vec![[0.0; 4]; vertex_count],
    };

    let vertices = (0..vertex_count)
        .map(|i| MeshVertex {
            position: positions[i],
            color: colors.get(i).copied().unwrap_or(base_color),
            uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
            normal: normals.get(i).copied().unwrap_or([0.0; 3]),
            tangent: {
                let t = tangents.get(i).copied().unwrap_or([0.0; 4]);
                [t[0], t[1], t[2]]
            },
            bitangent: bitangents.get(i).copied().unwrap_or([0.0; 3]),
            joints: joints.get(i).copied().unwrap_or([0.0; 4]),
            weights: weights.get(i).copied().unwrap_or([0.0; 4]),
        })
        .collect();

    Ok(AssembledPrimitive {
        vertices,
        indices,
        topology: topology_from_mode(primitive.mode),
        material_index: primitive.material,
    })
}

/// Creates the interleaved GPU buffer for an assembled primitive.
pub(crate) fn create_primitive_buffer(
    ctx: &mut Context,
    assembled: &AssembledPrimitive,
    material: Material,
) -> Result<Primitive, ModelError> {
    let attributes = vertex_attributes();
    let bindings = [VertexBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<MeshVertex>() as u32,
    }];

    let mut buffer_type = BufferTypeFlags::VERTEX;
    if !assembled.indices.is_empty() {
        buffer_type |= BufferTypeFlags::INDEX;
    }

    let buffer = ctx.create_buffer(&BufferCreateInfo {
        buffer_type,
        usage: BufferUsage::Static,
        vertex_attributes: &attributes,
        vertex_binding_descriptions: &bindings,
        vertex_data: Some(bytemuck::cast_slice(&assembled.vertices)),
        vertex_buffer_size: 0,
        index_data: if assembled.indices.is_empty() {
            None
        } else {
            Some(&assembled.indices)
        },
        index_buffer_size: 0,
    })?;

    Ok(Primitive {
        buffer,
        vertex_count: assembled.vertices.len() as u32,
        index_count: assembled.indices.len() as u32,
        material,
        topology: assembled.topology,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_mapping() {
        assert_eq!(topology_from_mode(4), TopologyType::Triangle);
        assert_eq!(topology_from_mode(0), TopologyType::Point);
        assert_eq!(topology_from_mode(5), TopologyType::TriangleStrip);
    }

    #[test]
    fn vertex_layout_matches_struct() {
        let attributes = vertex_attributes();
        let stride: u32 = std::mem::size_of::<MeshVertex>() as u32;
        assert_eq!(stride, 104);
        assert_eq!(attributes.last().unwrap().offset, 88);
        // attributes tile the struct exactly
        let mut end = 0;
        for attribute in &attributes {
            assert_eq!(attribute.offset, end);
            end += attribute.data_type.size();
        }
        assert_eq!(end, stride);
    }

    #[test]
    fn bitangent_is_cross_of_normal_and_tangent() {
        let normals = [[0.0, 0.0, 1.0]];
        let tangents = [[1.0, 0.0, 0.0, 1.0]];
        let bitangents = calculate_bitangents(&normals, &tangents);
        assert_eq!(bitangents[0], [0.0, 1.0, 0.0]);

        // handedness flips with w
        let tangents = [[1.0, 0.0, 0.0, -1.0]];
        let bitangents = calculate_bitangents(&normals, &tangents);
        assert_eq!(bitangents[0], [0.0, -1.0, 0.0]);
    }
}
