//! Loaded model data.
//!
//! Nodes form a tree (children references only), stored in a flat arena
//! indexed by [`NodeId`] — the same indices the GLTF document uses, so
//! animation channels and skin joints resolve without fixups.

use levikno_render::buffer::{Buffer, UniformBuffer};
use levikno_render::memory::Handle;
use levikno_render::pipeline::TopologyType;
use levikno_render::texture::{Sampler, Texture};
use nalgebra_glm as glm;

pub type NodeId = usize;

/// Interleaved vertex layout every primitive buffer uses.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub joints: [f32; 4],
    pub weights: [f32; 4],
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: glm::Vec3,
    /// (w, x, y, z) order.
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            translation: glm::vec3(0.0, 0.0, 0.0),
            rotation: glm::Quat::new(1.0, 0.0, 0.0, 0.0),
            scale: glm::vec3(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> glm::Mat4 {
        let translation = glm::translate(&glm::Mat4::identity(), &self.translation);
        let rotation = glm::quat_to_mat4(&self.rotation);
        let scale = glm::scale(&glm::Mat4::identity(), &self.scale);
        translation * rotation * scale
    }
}

#[derive(Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    /// Composed from the TRS (or the explicit matrix) of this node alone.
    pub local_matrix: glm::Mat4,
    /// Parent world matrix times the local matrix.
    pub world_matrix: glm::Mat4,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// PBR metallic-roughness material; missing textures are backed by 1x1
/// defaults so shaders can sample unconditionally.
#[derive(Clone, Debug)]
pub struct Material {
    pub albedo: Handle<Texture>,
    pub metallic_roughness_occlusion: Handle<Texture>,
    pub normal: Handle<Texture>,
    pub emissive: Handle<Texture>,
    pub base_color_factor: glm::Vec4,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: glm::Vec3,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
}

/// One drawable piece of a mesh: an interleaved vertex buffer (plus
/// indices when present) and its material.
#[derive(Clone, Debug)]
pub struct Primitive {
    pub buffer: Handle<Buffer>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub material: Material,
    pub topology: TopologyType,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Interpolation {
    Step,
    #[default]
    Linear,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AnimationPath {
    Translation,
    Rotation,
    Scale,
}

#[derive(Clone, Debug)]
pub struct AnimationChannel {
    pub node: NodeId,
    pub path: AnimationPath,
    pub interpolation: Interpolation,
    pub key_frames: Vec<f32>,
    /// vec3 outputs are stored in xyz with w = 0; rotations fill all four
    /// lanes.
    pub outputs: Vec<[f32; 4]>,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub channels: Vec<AnimationChannel>,
    /// Min over all channel keyframes.
    pub start: f32,
    /// Max over all channel keyframes.
    pub end: f32,
    pub current_time: f32,
}

#[derive(Clone, Debug)]
pub struct Skin {
    pub joints: Vec<NodeId>,
    pub inverse_bind_matrices: Vec<glm::Mat4>,
    /// Dynamic storage buffer sized `joints x 16 x sizeof(f32)`, seeded
    /// with the inverse-bind matrices.
    pub joint_matrix_buffer: Handle<UniformBuffer>,
}

/// A loaded model and the GPU resources it created. The caller owns the
/// handles and destroys them through the context when done.
#[derive(Debug)]
pub struct Model {
    pub nodes: Vec<Node>,
    pub root_nodes: Vec<NodeId>,
    pub meshes: Vec<Mesh>,
    pub animations: Vec<Animation>,
    pub skins: Vec<Skin>,
    pub buffers: Vec<Handle<Buffer>>,
    pub textures: Vec<Handle<Texture>>,
    pub samplers: Vec<Handle<Sampler>>,
    pub matrix: glm::Mat4,
}

impl Default for Model {
    fn default() -> Self {
        Model {
            nodes: Vec::new(),
            root_nodes: Vec::new(),
            meshes: Vec::new(),
            animations: Vec::new(),
            skins: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
            matrix: glm::Mat4::identity(),
        }
    }
}

impl Model {
    /// Destroys every GPU resource this model created. A failure here
    /// means a handle was already destroyed behind the model's back.
    pub fn destroy(self, ctx: &mut levikno_render::Context) -> levikno_render::Result<()> {
        for skin in &self.skins {
            ctx.destroy_uniform_buffer(skin.joint_matrix_buffer)?;
        }
        for buffer in &self.buffers {
            ctx.destroy_buffer(*buffer)?;
        }
        for texture in &self.textures {
            ctx.destroy_texture(*texture)?;
        }
        for sampler in &self.samplers {
            ctx.destroy_sampler(*sampler)?;
        }
        Ok(())
    }
}

impl Default for Node {
    fn default() -> Self {
        Node {
            parent: None,
            children: Vec::new(),
            transform: Transform::default(),
            local_matrix: glm::Mat4::identity(),
            world_matrix: glm::Mat4::identity(),
            mesh: None,
            skin: None,
        }
    }
}
