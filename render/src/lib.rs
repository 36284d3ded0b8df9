//! Levikno render core.
//!
//! A backend-agnostic graphics abstraction layer: a process-wide
//! [`Context`] owning a typed object pool, opaque generational handles for
//! every engine object, and a dispatch seam ([`backend::RenderBackend`])
//! bound once at context creation to either the Vulkan or the OpenGL
//! backend crate.
//!
//! A frame looks like:
//!
//! ```text
//! render_begin_next_frame
//!   render_begin_command_recording
//!     render_cmd_begin_render_pass
//!       { bind*, draw* }
//!     render_cmd_end_render_pass
//!   render_end_command_recording
//! render_draw_submit
//! ```
//!
//! Submitted frames are pipelined up to the `max_frames_in_flight` chosen
//! at `render_init`.

pub mod audio;
pub mod backend;
pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod framebuffer;
pub mod logging;
pub mod memory;
pub mod net;
pub mod null;
pub mod pipeline;
pub mod shader;
pub mod texture;
pub mod vertex;
pub mod window;

pub use crate::backend::{GraphicsApi, PhysicalDevice, PhysicalDeviceInfo, RenderInitInfo};
pub use crate::buffer::{
    Buffer, BufferCreateInfo, BufferTypeFlags, BufferUsage, UniformBuffer, UniformBufferCreateInfo,
};
pub use crate::context::{ClipRegion, Context, ContextCreateInfo};
pub use crate::descriptor::{
    DescriptorBinding, DescriptorData, DescriptorLayout, DescriptorLayoutCreateInfo, DescriptorSet,
    DescriptorType, DescriptorUpdateInfo, ShaderStageFlags,
};
pub use crate::error::{Error, Result};
pub use crate::format::{
    ColorImageFormat, DepthImageFormat, ImageData, SampleCount, TextureFilter, TextureMode,
};
pub use crate::framebuffer::{
    FrameBuffer, FrameBufferColorAttachment, FrameBufferCreateInfo, FrameBufferDepthAttachment,
};
pub use crate::logging::LoggingInfo;
pub use crate::memory::{Handle, MemAllocMode, MemoryBindingInfo, MemoryPoolInfo, StructureType};
pub use crate::pipeline::{
    Pipeline, PipelineCreateInfo, PipelineSpecification, RenderPass, TopologyType,
};
pub use crate::shader::{Shader, ShaderCreateInfo};
pub use crate::texture::{
    Cubemap, CubemapCreateInfo, Sampler, SamplerCreateInfo, Texture, TextureCreateInfo,
    TextureSamplerCreateInfo,
};
pub use crate::vertex::{VertexAttribute, VertexBindingDescription, VertexDataType};
pub use crate::window::{Event, NativeWindow, Window, WindowCreateInfo};
