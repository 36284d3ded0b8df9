//! GLTF/GLB model loading for the levikno graphics abstraction layer.
//!
//! Both the separate `.gltf` + buffers + images form and the single-file
//! `.glb` container load into the same [`Model`]: one interleaved vertex
//! buffer per primitive, PBR materials with 1x1 defaults for missing
//! textures, animations with per-channel keyframe arrays, and skins with
//! a joint-matrix storage buffer. GPU resources are created through the
//! caller's context; the returned model owns their handles.

mod gltf;
pub mod model;

use std::path::Path;

use levikno_render::Context;
use thiserror::Error;

pub use crate::gltf::glb;
pub use crate::model::{
    AlphaMode, Animation, AnimationChannel, AnimationPath, Interpolation, Material, Mesh,
    MeshVertex, Model, Node, NodeId, Primitive, Skin, Transform,
};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("i/o error: {0}")]
    Io(String),
    #[error("invalid GLB container: {0}")]
    InvalidGlb(&'static str),
    #[error("invalid gltf document: {0}")]
    InvalidDocument(&'static str),
    #[error("gltf JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image decode error: {0}")]
    ImageDecode(String),
    #[error(transparent)]
    Render(#[from] levikno_render::Error),
}

/// Loads a `.gltf` text model; external buffers and images resolve
/// relative to the file.
pub fn load_gltf_model(ctx: &mut Context, path: impl AsRef<Path>) -> Result<Model, ModelError> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).map_err(|err| ModelError::Io(format!("{}: {}", path.display(), err)))?;
    load_gltf_from_slice(ctx, &bytes, path.parent())
}

/// Loads a `.glb` container.
pub fn load_glb_model(ctx: &mut Context, path: impl AsRef<Path>) -> Result<Model, ModelError> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).map_err(|err| ModelError::Io(format!("{}: {}", path.display(), err)))?;
    load_glb_from_slice(ctx, &bytes, path.parent())
}

/// Loads a GLTF JSON document already in memory.
pub fn load_gltf_from_slice(
    ctx: &mut Context,
    json: &[u8],
    base_dir: Option<&Path>,
) -> Result<Model, ModelError> {
    let document: gltf::document::Document = serde_json::from_slice(json)?;
    let buffers = gltf::resolve_buffers(&document, Vec::new(), base_dir)?;
    gltf::build_model(ctx, document, buffers, base_dir)
}

/// Loads a GLB container already in memory.
pub fn load_glb_from_slice(
    ctx: &mut Context,
    bytes: &[u8],
    base_dir: Option<&Path>,
) -> Result<Model, ModelError> {
    let parts = glb::parse(bytes)?;
    let document: gltf::document::Document = serde_json::from_slice(&parts.json)?;
    let buffers = gltf::resolve_buffers(&document, parts.binary_chunks, base_dir)?;
    gltf::build_model(ctx, document, buffers, base_dir)
}
