//! GLTF 2.0 loading: document parse, buffer resolution, node traversal
//! and GPU resource creation through the context.

pub(crate) mod accessor;
pub(crate) mod animation;
pub(crate) mod document;
pub mod glb;
pub(crate) mod mesh;
pub(crate) mod texture;

use std::path::Path;

use levikno_render::format::ImageData;
use levikno_render::memory::Handle;
use levikno_render::texture::Sampler;
use levikno_render::Context;
use nalgebra_glm as glm;

use crate::model::{AlphaMode, Material, Mesh, Model, Node, Transform};
use crate::ModelError;
use document::Document;
use texture::TextureTable;

/// Resolves every document buffer to bytes: GLB binary chunks first, then
/// URIs (files or data URIs).
pub(crate) fn resolve_buffers(
    document: &Document,
    mut binary_chunks: Vec<Vec<u8>>,
    base_dir: Option<&Path>,
) -> Result<Vec<Vec<u8>>, ModelError> {
    let mut buffers = Vec::with_capacity(document.buffers.len());
    let mut chunks = binary_chunks.drain(..);
    for buffer in &document.buffers {
        let bytes = match &buffer.uri {
            Some(uri) => texture::resolve_uri(uri, base_dir)?,
            None => chunks
                .next()
                .ok_or(ModelError::InvalidDocument("buffer without uri or BIN chunk"))?,
        };
        if bytes.len() < buffer.byte_length {
            return Err(ModelError::InvalidDocument(
                "buffer is shorter than its declared byte length",
            ));
        }
        buffers.push(bytes);
    }
    Ok(buffers)
}

fn decode_images(
    document: &Document,
    buffers: &[Vec<u8>],
    base_dir: Option<&Path>,
) -> Result<Vec<ImageData>, ModelError> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..document.images.len())
            .into_par_iter()
            .map(|index| texture::load_image(document, buffers, index, base_dir))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..document.images.len())
            .map(|index| texture::load_image(document, buffers, index, base_dir))
            .collect()
    }
}

fn alpha_mode_from_str(mode: Option<&str>) -> AlphaMode {
    match mode {
        Some("MASK") => AlphaMode::Mask,
        Some("BLEND") => AlphaMode::Blend,
        _ => AlphaMode::Opaque,
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_material(
    ctx: &mut Context,
    document: &Document,
    textures: &mut TextureTable,
    images: &[ImageData],
    samplers: &[Handle<Sampler>],
    default_sampler: Handle<Sampler>,
    material_index: Option<usize>,
) -> Result<Material, ModelError> {
    let doc_material = material_index
        .and_then(|index| document.materials.get(index))
        .cloned()
        .unwrap_or_default();

    let mut texture_for = |textures: &mut TextureTable,
                           ctx: &mut Context,
                           reference: &Option<document::TextureRef>|
     -> Result<Option<Handle<levikno_render::texture::Texture>>, ModelError> {
        match reference {
            Some(reference) if reference.index >= 0 => Ok(Some(textures.get_or_create(
                ctx,
                document,
                images,
                samplers,
                default_sampler,
                reference.index as usize,
            )?)),
            _ => Ok(None),
        }
    };

    let pbr = &doc_material.pbr_metallic_roughness;
    let albedo = match texture_for(textures, ctx, &pbr.base_color_texture)? {
        Some(handle) => handle,
        None => textures.albedo_default(ctx, default_sampler)?,
    };
    let metallic_roughness_occlusion =
        match texture_for(textures, ctx, &pbr.metallic_roughness_texture)? {
            Some(handle) => handle,
            None => textures.mro_default(ctx, default_sampler)?,
        };
    let normal = match texture_for(textures, ctx, &doc_material.normal_texture)? {
        Some(handle) => handle,
        None => textures.normal_default(ctx, default_sampler)?,
    };
    let emissive = match texture_for(textures, ctx, &doc_material.emissive_texture)? {
        Some(handle) => handle,
        None => textures.emissive_default(ctx, default_sampler)?,
    };

    Ok(Material {
        albedo,
        metallic_roughness_occlusion,
        normal,
        emissive,
        base_color_factor: glm::vec4(
            pbr.base_color_factor[0],
            pbr.base_color_factor[1],
            pbr.base_color_factor[2],
            pbr.base_color_factor[3],
        ),
        metallic_factor: pbr.metallic_factor,
        roughness_factor: pbr.roughness_factor,
        emissive_factor: glm::vec3(
            doc_material.emissive_factor[0],
            doc_material.emissive_factor[1],
            doc_material.emissive_factor[2],
        ),
        alpha_mode: alpha_mode_from_str(doc_material.alpha_mode.as_deref()),
        alpha_cutoff: doc_material.alpha_cutoff,
        double_sided: doc_material.double_sided,
    })
}

/// Recursive traversal from a scene root: composes each node's transform
/// and links children. Nodes land in the arena at their document index,
/// so animations and skins resolve targets directly.
fn traverse_node(
    document: &Document,
    nodes: &mut [Node],
    node_index: usize,
    parent: Option<usize>,
    parent_world: glm::Mat4,
) -> Result<(), ModelError> {
    let doc_node = document
        .nodes
        .get(node_index)
        .ok_or(ModelError::InvalidDocument("node index out of range"))?;

    let mut transform = Transform::default();
    if let Some(t) = doc_node.translation {
        transform.translation = glm::vec3(t[0], t[1], t[2]);
    }
    if let Some(r) = doc_node.rotation {
        // document order is (x, y, z, w)
        transform.rotation = glm::Quat::new(r[3], r[0], r[1], r[2]);
    }
    if let Some(s) = doc_node.scale {
        transform.scale = glm::vec3(s[0], s[1], s[2]);
    }
    let explicit = doc_node
        .matrix
        .map(|m| glm::make_mat4(&m))
        .unwrap_or_else(glm::Mat4::identity);

    let local_matrix = explicit * transform.matrix();
    let world_matrix = parent_world * local_matrix;

    {
        let node = &mut nodes[node_index];
        node.parent = parent;
        node.children = doc_node.children.clone();
        node.transform = transform;
        node.local_matrix = local_matrix;
        node.world_matrix = world_matrix;
        node.mesh = doc_node.mesh;
        node.skin = doc_node.skin;
    }

    for &child in &doc_node.children {
        traverse_node(document, nodes, child, Some(node_index), world_matrix)?;
    }
    Ok(())
}

/// Builds the full model: decoded images, samplers, materials, meshes,
/// the node tree, animations and skins.
pub(crate) fn build_model(
    ctx: &mut Context,
    document: Document,
    buffers: Vec<Vec<u8>>,
    base_dir: Option<&Path>,
) -> Result<Model, ModelError> {
    if document.scenes.len() > 1 {
        log::warn!(
            target: "levikno",
            "gltf model has more than one scene, loading mesh data from the first scene"
        );
    }

    let images = decode_images(&document, &buffers, base_dir)?;

    // samplers declared by the document plus one default
    let mut samplers = Vec::with_capacity(document.samplers.len());
    for doc_sampler in &document.samplers {
        samplers.push(ctx.create_sampler(&texture::sampler_info_from_gltf(Some(doc_sampler)))?);
    }
    let default_sampler = ctx.create_sampler(&texture::sampler_info_from_gltf(None))?;

    let mut textures = TextureTable::new(document.textures.len());

    // meshes
    let mut meshes = Vec::with_capacity(document.meshes.len());
    let mut buffers_out = Vec::new();
    for doc_mesh in &document.meshes {
        let mut mesh = Mesh::default();
        for doc_primitive in &doc_mesh.primitives {
            let base_color = doc_primitive
                .material
                .and_then(|index| document.materials.get(index))
                .map(|m| m.pbr_metallic_roughness.base_color_factor)
                .unwrap_or([1.0, 1.0, 1.0, 1.0]);
            let assembled =
                mesh::assemble_primitive(&document, &buffers, doc_primitive, base_color)?;
            let material = resolve_material(
                ctx,
                &document,
                &mut textures,
                &images,
                &samplers,
                default_sampler,
                assembled.material_index,
            )?;
            let primitive = mesh::create_primitive_buffer(ctx, &assembled, material)?;
            buffers_out.push(primitive.buffer);
            mesh.primitives.push(primitive);
        }
        meshes.push(mesh);
    }

    // node tree from the scene roots
    let mut nodes: Vec<Node> = (0..document.nodes.len()).map(|_| Node::default()).collect();
    let scene_index = document.scene.unwrap_or(0);
    let root_nodes = document
        .scenes
        .get(scene_index)
        .map(|scene| scene.nodes.clone())
        .unwrap_or_default();
    for &root in &root_nodes {
        traverse_node(&document, &mut nodes, root, None, glm::Mat4::identity())?;
    }

    let animations = animation::bind_animations(&document, &buffers)?;
    let skins = animation::bind_skins(ctx, &document, &buffers)?;

    let mut all_samplers = samplers;
    all_samplers.push(default_sampler);

    Ok(Model {
        nodes,
        root_nodes,
        meshes,
        animations,
        skins,
        buffers: buffers_out,
        textures: textures.created,
        samplers: all_samplers,
        matrix: glm::Mat4::identity(),
    })
}
