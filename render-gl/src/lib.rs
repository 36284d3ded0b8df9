//! OpenGL 4.6 backend for the levikno graphics abstraction layer.
//!
//! The backend bootstraps from a caller-supplied window adapter (a hidden
//! window is enough) whose context provides the function pointers, then
//! implements the full backend contract: descriptor-set emulation over
//! `glBindBufferRange`/`glBindTextureUnit`, bindless image arrays through
//! `GL_ARB_bindless_texture`, MSAA framebuffers with a resolve blit, and
//! a command pathway that runs either immediately or through a typed,
//! replayable per-window command stream.

mod api;
pub mod backend;
pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod framebuffer;
pub mod image;
pub mod pipeline;
pub mod state;
mod translate;

pub use crate::backend::OpenGlInstance;
pub use crate::command::{GlCommand, GlWindowData};

use crate::api as gl;
use crate::api::Gl;

/// How `render_cmd_*` calls execute on this backend.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ExecutionMode {
    /// Each command issues its GL calls at once.
    #[default]
    Immediate,
    /// Commands append to a per-window stream interpreted sequentially at
    /// `render_end_command_recording`.
    Deferred,
}

/// Limits queried from the implementation at startup.
#[derive(Copy, Clone, Debug)]
pub struct ImplementationParameters {
    pub uniform_buffer_alignment: usize,
    pub max_draw_buffers: u32,
    pub max_color_attachments: u32,
    pub max_texture_units: u32,
}

impl ImplementationParameters {
    pub(crate) fn populate(gl: &Gl) -> ImplementationParameters {
        let getint = |param| {
            let mut value = 0;
            unsafe { gl.GetIntegerv(param, &mut value) };
            value
        };

        ImplementationParameters {
            uniform_buffer_alignment: getint(gl::UNIFORM_BUFFER_OFFSET_ALIGNMENT) as usize,
            max_draw_buffers: getint(gl::MAX_DRAW_BUFFERS) as u32,
            max_color_attachments: getint(gl::MAX_COLOR_ATTACHMENTS) as u32,
            max_texture_units: getint(gl::MAX_COMBINED_TEXTURE_IMAGE_UNITS) as u32,
        }
    }
}
