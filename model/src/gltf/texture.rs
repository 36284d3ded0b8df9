//! Image decode and texture/sampler creation.

use std::path::Path;

use base64::Engine;
use levikno_render::format::{ColorImageFormat, ImageData, TextureFilter, TextureMode};
use levikno_render::memory::Handle;
use levikno_render::texture::{SamplerCreateInfo, Texture, TextureSamplerCreateInfo};
use levikno_render::Context;

use crate::gltf::document::Document;
use crate::ModelError;

// GL sampler enums as they appear in GLTF documents
const FILTER_NEAREST: i32 = 9728;
const FILTER_NEAREST_MIPMAP_NEAREST: i32 = 9984;
const FILTER_NEAREST_MIPMAP_LINEAR: i32 = 9986;
const WRAP_CLAMP_TO_EDGE: i32 = 33071;
const WRAP_MIRRORED_REPEAT: i32 = 33648;

pub(crate) fn filter_from_gltf(filter: Option<i32>) -> TextureFilter {
    match filter {
        Some(FILTER_NEAREST) | Some(FILTER_NEAREST_MIPMAP_NEAREST)
        | Some(FILTER_NEAREST_MIPMAP_LINEAR) => TextureFilter::Nearest,
        _ => TextureFilter::Linear,
    }
}

pub(crate) fn wrap_from_gltf(wrap: Option<i32>) -> TextureMode {
    match wrap {
        Some(WRAP_CLAMP_TO_EDGE) => TextureMode::ClampToEdge,
        Some(WRAP_MIRRORED_REPEAT) => TextureMode::MirrorRepeat,
        _ => TextureMode::Repeat,
    }
}

pub(crate) fn sampler_info_from_gltf(
    sampler: Option<&crate::gltf::document::Sampler>,
) -> SamplerCreateInfo {
    match sampler {
        Some(sampler) => SamplerCreateInfo {
            min_filter: filter_from_gltf(sampler.min_filter),
            mag_filter: filter_from_gltf(sampler.mag_filter),
            wrap_s: wrap_from_gltf(sampler.wrap_s),
            wrap_t: wrap_from_gltf(sampler.wrap_t),
            wrap_r: wrap_from_gltf(sampler.wrap_t),
        },
        None => SamplerCreateInfo::default(),
    }
}

fn decode_pixels(bytes: &[u8]) -> Result<ImageData, ModelError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| ModelError::ImageDecode(err.to_string()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(ImageData::new(decoded.into_raw(), width, height, 4))
}

/// Resolves a buffer `uri`: data URIs decode inline, anything else reads
/// relative to the model file.
pub(crate) fn resolve_uri(uri: &str, base_dir: Option<&Path>) -> Result<Vec<u8>, ModelError> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let payload = rest
            .split_once("base64,")
            .map(|(_, data)| data)
            .ok_or(ModelError::InvalidDocument("unsupported data URI encoding"))?;
        return base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| ModelError::InvalidDocument("invalid base64 in data URI"));
    }

    let path = match base_dir {
        Some(base) => base.join(uri),
        None => Path::new(uri).to_path_buf(),
    };
    std::fs::read(&path).map_err(|err| ModelError::Io(format!("{}: {}", path.display(), err)))
}

/// Decodes one document image from its URI or buffer-view blob.
pub(crate) fn load_image(
    document: &Document,
    buffers: &[Vec<u8>],
    image_index: usize,
    base_dir: Option<&Path>,
) -> Result<ImageData, ModelError> {
    let image = document
        .images
        .get(image_index)
        .ok_or(ModelError::InvalidDocument("image index out of range"))?;

    if let Some(uri) = &image.uri {
        let bytes = resolve_uri(uri, base_dir)?;
        return decode_pixels(&bytes);
    }
    if let Some(view_index) = image.buffer_view {
        let view = document
            .buffer_views
            .get(view_index)
            .ok_or(ModelError::InvalidDocument("image buffer view out of range"))?;
        let buffer = buffers
            .get(view.buffer)
            .ok_or(ModelError::InvalidDocument("image buffer out of range"))?;
        let end = view.byte_offset + view.byte_length;
        if end > buffer.len() {
            return Err(ModelError::InvalidDocument(
                "image buffer view reads past the end of its buffer",
            ));
        }
        return decode_pixels(&buffer[view.byte_offset..end]);
    }
    Err(ModelError::InvalidDocument(
        "image has neither uri nor buffer view",
    ))
}

/// Lazily created per-model texture table plus the 1x1 defaults used for
/// missing material slots.
pub(crate) struct TextureTable {
    /// One slot per document texture, filled on first reference.
    pub slots: Vec<Option<Handle<Texture>>>,
    pub default_albedo: Option<Handle<Texture>>,
    pub default_mro: Option<Handle<Texture>>,
    pub default_normal: Option<Handle<Texture>>,
    pub default_emissive: Option<Handle<Texture>>,
    /// All handles created through this table, in creation order.
    pub created: Vec<Handle<Texture>>,
}

impl TextureTable {
    pub fn new(texture_count: usize) -> TextureTable {
        TextureTable {
            slots: vec![None; texture_count],
            default_albedo: None,
            default_mro: None,
            default_normal: None,
            default_emissive: None,
            created: Vec::new(),
        }
    }

    /// The texture for a document texture index, created on first use
    /// from the pre-decoded images.
    pub fn get_or_create(
        &mut self,
        ctx: &mut Context,
        document: &Document,
        images: &[ImageData],
        samplers: &[Handle<levikno_render::texture::Sampler>],
        default_sampler: Handle<levikno_render::texture::Sampler>,
        texture_index: usize,
    ) -> Result<Handle<Texture>, ModelError> {
        if let Some(Some(existing)) = self.slots.get(texture_index) {
            return Ok(*existing);
        }
        let texture = document
            .textures
            .get(texture_index)
            .ok_or(ModelError::InvalidDocument("texture index out of range"))?;
        let source = texture
            .source
            .ok_or(ModelError::InvalidDocument("texture without image source"))?;
        let image = images
            .get(source)
            .ok_or(ModelError::InvalidDocument("texture image out of range"))?;
        let sampler = texture
            .sampler
            .and_then(|index| samplers.get(index).copied())
            .unwrap_or(default_sampler);

        let handle = ctx.create_texture_sampler(&TextureSamplerCreateInfo {
            image: image.clone(),
            format: ColorImageFormat::Srgba8,
            sampler,
        })?;
        self.slots[texture_index] = Some(handle);
        self.created.push(handle);
        Ok(handle)
    }

    fn default_texture(
        ctx: &mut Context,
        slot: &mut Option<Handle<Texture>>,
        created: &mut Vec<Handle<Texture>>,
        sampler: Handle<levikno_render::texture::Sampler>,
        texel: [u8; 4],
    ) -> Result<Handle<Texture>, ModelError> {
        if let Some(handle) = slot {
            return Ok(*handle);
        }
        let handle = ctx.create_texture_sampler(&TextureSamplerCreateInfo {
            image: ImageData::new(texel.to_vec(), 1, 1, 4),
            format: ColorImageFormat::Srgba8,
            sampler,
        })?;
        *slot = Some(handle);
        created.push(handle);
        Ok(handle)
    }

    pub fn albedo_default(
        &mut self,
        ctx: &mut Context,
        sampler: Handle<levikno_render::texture::Sampler>,
    ) -> Result<Handle<Texture>, ModelError> {
        Self::default_texture(
            ctx,
            &mut self.default_albedo,
            &mut self.created,
            sampler,
            [0xff, 0xff, 0xff, 0xff],
        )
    }

    pub fn mro_default(
        &mut self,
        ctx: &mut Context,
        sampler: Handle<levikno_render::texture::Sampler>,
    ) -> Result<Handle<Texture>, ModelError> {
        Self::default_texture(
            ctx,
            &mut self.default_mro,
            &mut self.created,
            sampler,
            [0x00, 0xff, 0x00, 0xff],
        )
    }

    pub fn normal_default(
        &mut self,
        ctx: &mut Context,
        sampler: Handle<levikno_render::texture::Sampler>,
    ) -> Result<Handle<Texture>, ModelError> {
        Self::default_texture(
            ctx,
            &mut self.default_normal,
            &mut self.created,
            sampler,
            [0x80, 0x80, 0xff, 0xff],
        )
    }

    pub fn emissive_default(
        &mut self,
        ctx: &mut Context,
        sampler: Handle<levikno_render::texture::Sampler>,
    ) -> Result<Handle<Texture>, ModelError> {
        Self::default_texture(
            ctx,
            &mut self.default_emissive,
            &mut self.created,
            sampler,
            [0x00, 0x00, 0x00, 0x00],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_enum_mapping() {
        assert_eq!(filter_from_gltf(Some(FILTER_NEAREST)), TextureFilter::Nearest);
        assert_eq!(filter_from_gltf(Some(9729)), TextureFilter::Linear);
        assert_eq!(filter_from_gltf(None), TextureFilter::Linear);
        assert_eq!(wrap_from_gltf(Some(WRAP_CLAMP_TO_EDGE)), TextureMode::ClampToEdge);
        assert_eq!(wrap_from_gltf(None), TextureMode::Repeat);
    }

    #[test]
    fn data_uris_decode() {
        let bytes = resolve_uri("data:application/octet-stream;base64,AAECAw==", None).unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
    }
}
