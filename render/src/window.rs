//! Windows and the windowing-adapter interface.
//!
//! Windowing and input are external collaborators: the engine consumes a
//! [`NativeWindow`] adapter (an open OS window with an event pump, input
//! state queries and native handle accessors) and attaches a swapchain and
//! per-frame state to it. Any windowing implementation works as long as it
//! can hand out raw display/window handles; the OpenGL backend additionally
//! needs the context operations (`make_context_current`, `swap_buffers`,
//! `get_proc_address`).

use std::fmt;
use std::os::raw::c_void;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::pipeline::RenderPass;

/// Key and mouse button codes are adapter-defined integers; the engine
/// only forwards them.
pub type KeyCode = i32;
pub type MouseButtonCode = i32;

/// Events delivered by the adapter's event pump and dispatched to the
/// window's event callback.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Event {
    WindowClose,
    WindowResize { width: i32, height: i32 },
    /// Pixel-size change of the drawable surface; marks the swapchain
    /// dirty.
    FramebufferResize { width: i32, height: i32 },
    WindowFocus(bool),
    WindowMoved { x: i32, y: i32 },
    KeyPressed { key: KeyCode, repeat: bool },
    KeyReleased { key: KeyCode },
    KeyTyped { character: char },
    MouseButtonPressed { button: MouseButtonCode },
    MouseButtonReleased { button: MouseButtonCode },
    MouseMoved { x: f64, y: f64 },
    MouseScrolled { x: f64, y: f64 },
}

/// Abstract open OS window, implemented by the windowing collaborator.
pub trait NativeWindow: fmt::Debug {
    /// Logical window size.
    fn dimensions(&self) -> (i32, i32);

    /// Drawable surface size in pixels; `(0, 0)` while minimized.
    fn framebuffer_dimensions(&self) -> (i32, i32);

    fn open(&self) -> bool;

    /// Drains pending events since the last pump.
    fn poll_events(&self) -> Vec<Event>;

    fn set_vsync(&self, enabled: bool);
    fn vsync(&self) -> bool;

    fn key_pressed(&self, key: KeyCode) -> bool;
    fn key_released(&self, key: KeyCode) -> bool;
    fn mouse_button_pressed(&self, button: MouseButtonCode) -> bool;
    fn mouse_pos(&self) -> (f32, f32);

    fn raw_display_handle(&self) -> RawDisplayHandle;
    fn raw_window_handle(&self) -> RawWindowHandle;

    /// OpenGL context operations; unused by other backends.
    fn make_context_current(&self) {}
    fn swap_buffers(&self) {}
    fn get_proc_address(&self, _symbol: &str) -> *const c_void {
        std::ptr::null()
    }
}

/// Window creation parameters; the adapter is expected to already match
/// the requested size and title.
#[derive(Clone, Debug)]
pub struct WindowCreateInfo {
    pub width: i32,
    pub height: i32,
    pub title: String,
    pub vsync: bool,
}

impl Default for WindowCreateInfo {
    fn default() -> Self {
        WindowCreateInfo {
            width: 800,
            height: 600,
            title: String::from("levikno window"),
            vsync: true,
        }
    }
}

pub type EventCallback = Box<dyn FnMut(&Event)>;

/// Command-recording phase tracking; one render target at most is active
/// per command stream and pipelines may only be bound inside the
/// renderpass they were created against.
#[derive(Default)]
pub(crate) struct RecordState {
    pub recording: bool,
    pub active_target: Option<RenderPass>,
}

/// Pooled window object: the native adapter plus the backend's swapchain
/// and per-frame state.
pub struct Window {
    pub(crate) native: Box<dyn NativeWindow>,
    pub(crate) title: String,
    pub(crate) vsync: bool,
    pub(crate) event_callback: Option<EventCallback>,
    pub(crate) record: RecordState,
    pub(crate) backend: Box<dyn crate::backend::BackendWindow>,
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.title)
            .field("vsync", &self.vsync)
            .field("backend", &self.backend)
            .finish()
    }
}

impl Window {
    pub fn native(&self) -> &dyn NativeWindow {
        self.native.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn dimensions(&self) -> (i32, i32) {
        self.native.dimensions()
    }

    pub fn framebuffer_dimensions(&self) -> (i32, i32) {
        self.native.framebuffer_dimensions()
    }

    /// True while the drawable surface has zero area; every render command
    /// is a no-op in that state.
    pub(crate) fn minimized(&self) -> bool {
        let (w, h) = self.native.framebuffer_dimensions();
        w * h <= 0
    }

    pub fn backend(&self) -> &dyn crate::backend::BackendWindow {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn crate::backend::BackendWindow {
        self.backend.as_mut()
    }

    /// Split borrow for backends that need the adapter and their payload
    /// at the same time (swapchain rebuilds query the adapter's size).
    pub fn native_and_backend_mut(
        &mut self,
    ) -> (&dyn NativeWindow, &mut dyn crate::backend::BackendWindow) {
        (self.native.as_ref(), self.backend.as_mut())
    }
}
