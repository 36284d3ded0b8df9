//! Shader objects.
//!
//! The GAL treats shader sources as opaque bytes: the Vulkan backend
//! expects SPIR-V, the OpenGL backend GLSL 4.60 or SPIR-V. The three
//! creation paths differ only in how the create-info strings are
//! interpreted (in-memory source, source file path, compiled binary path).

/// Vertex + fragment stage sources or file paths, depending on which
/// `create_shader_*` entry point consumes the info.
#[derive(Clone, Debug, Default)]
pub struct ShaderCreateInfo {
    pub vertex_src: String,
    pub fragment_src: String,
}

/// Pooled shader object. Holds the backend's compiled modules until it is
/// either consumed by pipeline creation or destroyed; pipelines take the
/// modules by value, so destroying a shader right after `create_pipeline`
/// is legal.
#[derive(Debug)]
pub struct Shader {
    pub(crate) backend: Box<dyn crate::backend::BackendShader>,
}

impl Shader {
    pub fn backend(&self) -> &dyn crate::backend::BackendShader {
        self.backend.as_ref()
    }
}
