//! Vulkan backend for the levikno graphics abstraction layer.
//!
//! Built over `ash`: instance with optional validation layers routed to
//! the logger, scored physical-device selection, per-window swapchains
//! with frames-in-flight synchronization and out-of-date recovery,
//! host-coherent per-frame uniform rings, and per-frame descriptor sets
//! allocated from layout-owned pools.

pub mod backend;
pub mod buffer;
pub mod descriptor;
mod device;
pub mod framebuffer;
pub mod image;
mod instance;
pub mod memory;
pub mod pipeline;
pub mod swapchain;
mod translate;

pub use crate::backend::{VulkanConfig, VulkanInstance};
