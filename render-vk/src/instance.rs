//! Vulkan instance creation, validation layers and the debug messenger.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;

use ash::extensions::{ext, khr};
use ash::vk;
use levikno_render::error::{Error, Result};

const VALIDATION_LAYER: &[u8] = b"VK_LAYER_KHRONOS_validation\0";

#[cfg(all(unix, not(target_os = "macos")))]
fn surface_extension_names() -> Vec<*const c_char> {
    vec![
        khr::Surface::name().as_ptr(),
        khr::XlibSurface::name().as_ptr(),
        khr::WaylandSurface::name().as_ptr(),
    ]
}

#[cfg(windows)]
fn surface_extension_names() -> Vec<*const c_char> {
    vec![
        khr::Surface::name().as_ptr(),
        khr::Win32Surface::name().as_ptr(),
    ]
}

#[cfg(target_os = "macos")]
fn surface_extension_names() -> Vec<*const c_char> {
    vec![
        khr::Surface::name().as_ptr(),
        ext::MetalSurface::name().as_ptr(),
    ]
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    let message = if callback_data.is_null() || (*callback_data).p_message.is_null() {
        "<empty validation message>".into()
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };
    let level = match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Info,
        _ => log::Level::Trace,
    };
    log::log!(target: "levikno", level, "(vulkan) {}", message);
    vk::FALSE
}

fn validation_layer_available(entry: &ash::Entry) -> bool {
    let layers = match entry.enumerate_instance_layer_properties() {
        Ok(layers) => layers,
        Err(_) => return false,
    };
    let wanted = unsafe { CStr::from_bytes_with_nul_unchecked(VALIDATION_LAYER) };
    layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == wanted
    })
}

pub(crate) struct InstanceParts {
    pub instance: ash::Instance,
    pub debug: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

pub(crate) fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    enable_validation: bool,
) -> Result<InstanceParts> {
    let app_name = CString::new(app_name).unwrap_or_default();
    let engine_name = CString::new("levikno").unwrap();
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(&engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_2);

    let mut extensions = surface_extension_names();
    let validation = enable_validation && validation_layer_available(entry);
    if enable_validation && !validation {
        log::warn!(
            target: "levikno",
            "validation layers requested but VK_LAYER_KHRONOS_validation is not available"
        );
    }
    if validation {
        extensions.push(ext::DebugUtils::name().as_ptr());
    }

    let layer_names: Vec<*const c_char> = if validation {
        vec![VALIDATION_LAYER.as_ptr() as *const c_char]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe {
        entry
            .create_instance(&create_info, None)
            .map_err(|err| Error::Failure(format!("failed to create Vulkan instance: {}", err)))?
    };

    let debug = if validation {
        let loader = ext::DebugUtils::new(entry, &instance);
        let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));
        let messenger = unsafe {
            loader
                .create_debug_utils_messenger(&messenger_info, None)
                .map_err(|err| {
                    Error::Failure(format!("failed to create debug messenger: {}", err))
                })?
        };
        Some((loader, messenger))
    } else {
        None
    };

    Ok(InstanceParts { instance, debug })
}
