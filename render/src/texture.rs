//! Textures, samplers and cubemaps.

use crate::format::{ColorImageFormat, ImageData, TextureFilter, TextureMode};
use crate::memory::Handle;

#[derive(Clone, Debug, Default)]
pub struct TextureCreateInfo {
    pub image: ImageData,
    pub format: ColorImageFormat,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureMode,
    pub wrap_t: TextureMode,
}

/// Standalone sampler, shareable across textures.
#[derive(Copy, Clone, Debug, Default)]
pub struct SamplerCreateInfo {
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureMode,
    pub wrap_t: TextureMode,
    pub wrap_r: TextureMode,
}

/// Texture that references an external [`Sampler`](crate::texture::Sampler)
/// instead of owning its own.
#[derive(Clone, Debug)]
pub struct TextureSamplerCreateInfo {
    pub image: ImageData,
    pub format: ColorImageFormat,
    pub sampler: Handle<Sampler>,
}

/// Six face images; all faces must share the same dimensions.
#[derive(Clone, Debug, Default)]
pub struct CubemapCreateInfo {
    pub pos_x: ImageData,
    pub neg_x: ImageData,
    pub pos_y: ImageData,
    pub neg_y: ImageData,
    pub pos_z: ImageData,
    pub neg_z: ImageData,
}

impl CubemapCreateInfo {
    pub(crate) fn faces(&self) -> [(&'static str, &ImageData); 6] {
        [
            ("posx", &self.pos_x),
            ("negx", &self.neg_x),
            ("posy", &self.pos_y),
            ("negy", &self.neg_y),
            ("posz", &self.pos_z),
            ("negz", &self.neg_z),
        ]
    }
}

//--------------------------------------------------------------------------------------------------

/// Pooled texture object: image + view + sampler on the backend side.
/// Content is immutable after creation. Framebuffer color attachments are
/// also exposed as textures; those are owned by their framebuffer and die
/// with it.
#[derive(Debug)]
pub struct Texture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// True for framebuffer attachment textures, which must not be
    /// destroyed individually.
    pub(crate) framebuffer_owned: bool,
    pub(crate) backend: Box<dyn crate::backend::BackendTexture>,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendTexture {
        self.backend.as_ref()
    }
}

#[derive(Debug)]
pub struct Sampler {
    pub(crate) info: SamplerCreateInfo,
    pub(crate) backend: Box<dyn crate::backend::BackendSampler>,
}

impl Sampler {
    pub fn info(&self) -> &SamplerCreateInfo {
        &self.info
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendSampler {
        self.backend.as_ref()
    }
}

#[derive(Debug)]
pub struct Cubemap {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) backend: Box<dyn crate::backend::BackendCubemap>,
}

impl Cubemap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendCubemap {
        self.backend.as_ref()
    }
}
