//! Offscreen framebuffers.
//!
//! A framebuffer owns its color (and optional depth) attachments plus a
//! renderpass compatible with them. Each color attachment is exposed as a
//! sampleable [`Texture`](crate::texture::Texture) handle owned by the
//! framebuffer; resizing recreates the attachments in place, destroying
//! the framebuffer invalidates them.

use smallvec::SmallVec;

use crate::format::{ColorImageFormat, DepthImageFormat, SampleCount, TextureFilter, TextureMode};
use crate::memory::Handle;
use crate::texture::Texture;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameBufferColorAttachment {
    /// Attachment slot; unique across color + depth attachments.
    pub index: u32,
    pub format: ColorImageFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameBufferDepthAttachment {
    pub index: u32,
    pub format: DepthImageFormat,
}

#[derive(Clone, Debug)]
pub struct FrameBufferCreateInfo<'a> {
    pub width: u32,
    pub height: u32,
    pub sample_count: SampleCount,
    pub color_attachments: &'a [FrameBufferColorAttachment],
    pub depth_attachment: Option<FrameBufferDepthAttachment>,
    pub texture_filter: TextureFilter,
    pub texture_mode: TextureMode,
}

/// Pooled framebuffer object.
#[derive(Debug)]
pub struct FrameBuffer {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) sample_count: SampleCount,
    pub(crate) color_formats: SmallVec<[ColorImageFormat; 4]>,
    pub(crate) depth_format: Option<DepthImageFormat>,
    /// One sampleable texture handle per color attachment, owned by this
    /// framebuffer.
    pub(crate) attachment_textures: SmallVec<[Handle<Texture>; 4]>,
    pub(crate) backend: Box<dyn crate::backend::BackendFrameBuffer>,
}

impl FrameBuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sample_count(&self) -> SampleCount {
        self.sample_count
    }

    pub fn color_attachment_count(&self) -> usize {
        self.color_formats.len()
    }

    pub fn color_formats(&self) -> &[ColorImageFormat] {
        &self.color_formats
    }

    pub fn depth_format(&self) -> Option<DepthImageFormat> {
        self.depth_format
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendFrameBuffer {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn crate::backend::BackendFrameBuffer {
        self.backend.as_mut()
    }
}
