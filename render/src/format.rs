//! Image formats and sampler enums shared by both backends.

/// Color image formats for textures, cubemaps and framebuffer color
/// attachments. The `Srgb*` variants request sRGB-encoded storage; whether
/// the default framebuffer is linear or sRGB is chosen at context creation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum ColorImageFormat {
    #[default]
    Rgb,
    Rgba,
    Rgba8,
    Rgba16F,
    Rgba32F,
    Srgb,
    Srgba,
    Srgba8,
    RedInt,
}

impl ColorImageFormat {
    /// True when the format stores sRGB-encoded values.
    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            ColorImageFormat::Srgb | ColorImageFormat::Srgba | ColorImageFormat::Srgba8
        )
    }
}

/// Depth/stencil attachment formats, ordered the way callers typically
/// probe them with `find_supported_depth_image_format`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DepthImageFormat {
    Depth16,
    Depth32,
    Depth24Stencil8,
    Depth32Stencil8,
}

impl DepthImageFormat {
    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            DepthImageFormat::Depth24Stencil8 | DepthImageFormat::Depth32Stencil8
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

/// Texture coordinate wrap modes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum TextureMode {
    #[default]
    Repeat,
    MirrorRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Multisample counts accepted by pipelines and framebuffers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub enum SampleCount {
    #[default]
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
}

impl SampleCount {
    pub fn samples(self) -> u32 {
        match self {
            SampleCount::X1 => 1,
            SampleCount::X2 => 2,
            SampleCount::X4 => 4,
            SampleCount::X8 => 8,
            SampleCount::X16 => 16,
            SampleCount::X32 => 32,
            SampleCount::X64 => 64,
        }
    }
}

/// Decoded image data handed to texture and cubemap creation: tightly
/// packed rows, `channels` bytes per texel component group.
#[derive(Clone, Debug, Default)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl ImageData {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u32) -> ImageData {
        ImageData {
            pixels,
            width,
            height,
            channels,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_detection() {
        assert!(ColorImageFormat::Srgba8.is_srgb());
        assert!(!ColorImageFormat::Rgba8.is_srgb());
    }

    #[test]
    fn sample_counts_are_powers_of_two() {
        for count in [
            SampleCount::X1,
            SampleCount::X2,
            SampleCount::X4,
            SampleCount::X8,
            SampleCount::X16,
            SampleCount::X32,
            SampleCount::X64,
        ] {
            assert!(count.samples().is_power_of_two());
        }
    }
}
