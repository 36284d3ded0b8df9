//! Physical-device scoring and logical-device creation.

use std::ffi::CStr;
use std::os::raw::c_char;

use ash::extensions::khr;
use ash::vk;
use levikno_render::backend::{PhysicalDevice, PhysicalDeviceInfo, PhysicalDeviceType};
use levikno_render::error::{Error, Result};

fn device_type_from_vk(ty: vk::PhysicalDeviceType) -> PhysicalDeviceType {
    match ty {
        vk::PhysicalDeviceType::DISCRETE_GPU => PhysicalDeviceType::DiscreteGpu,
        vk::PhysicalDeviceType::INTEGRATED_GPU => PhysicalDeviceType::IntegratedGpu,
        vk::PhysicalDeviceType::VIRTUAL_GPU => PhysicalDeviceType::VirtualGpu,
        vk::PhysicalDeviceType::CPU => PhysicalDeviceType::Cpu,
        _ => PhysicalDeviceType::Other,
    }
}

pub(crate) fn describe_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    id: u64,
) -> PhysicalDevice {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    PhysicalDevice {
        info: PhysicalDeviceInfo {
            name,
            device_type: device_type_from_vk(properties.device_type),
            vendor_id: properties.vendor_id,
            driver_version: properties.driver_version,
            api_version: properties.api_version,
        },
        id,
    }
}

fn graphics_queue_family(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Option<u32> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

fn supports_extensions(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    required: &[&CStr],
) -> bool {
    let available = match unsafe { instance.enumerate_device_extension_properties(device) } {
        Ok(extensions) => extensions,
        Err(_) => return false,
    };
    required.iter().all(|wanted| {
        available.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == *wanted
        })
    })
}

/// Checks the hard requirements: a graphics queue and the swapchain
/// extension.
pub(crate) fn check_device_support(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> Result<()> {
    if graphics_queue_family(instance, device).is_none() {
        return Err(Error::validation(
            "physical device has no graphics-capable queue family",
        ));
    }
    if !supports_extensions(instance, device, &[khr::Swapchain::name()]) {
        return Err(Error::validation(
            "physical device does not support the swapchain extension",
        ));
    }
    Ok(())
}

/// Scoring used to order the enumeration: discrete first, then
/// integrated, then everything else. Unusable devices score zero.
pub(crate) fn score_device(instance: &ash::Instance, device: vk::PhysicalDevice) -> u32 {
    if check_device_support(instance, device).is_err() {
        return 0;
    }
    let properties = unsafe { instance.get_physical_device_properties(device) };
    match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 500,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 250,
        _ => 100,
    }
}

/// Everything bound at `render_init`: the logical device, its graphics
/// queue, the swapchain loader, an upload command pool and the memory
/// properties resource creation needs.
pub(crate) struct DeviceState {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_family: u32,
    pub swapchain_loader: khr::Swapchain,
    pub upload_pool: vk::CommandPool,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub limits: vk::PhysicalDeviceLimits,
    pub bindless_supported: bool,
}

impl DeviceState {
    pub(crate) fn create(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<DeviceState> {
        check_device_support(instance, physical_device)?;
        let graphics_family = graphics_queue_family(instance, physical_device)
            .expect("checked by check_device_support");

        let bindless_supported = supports_extensions(
            instance,
            physical_device,
            &[vk::ExtDescriptorIndexingFn::name()],
        );

        let mut extensions: Vec<*const c_char> = vec![khr::Swapchain::name().as_ptr()];
        if bindless_supported {
            extensions.push(vk::ExtDescriptorIndexingFn::name().as_ptr());
        }

        let queue_priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_family)
            .queue_priorities(&queue_priorities)
            .build()];

        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(false)
            .fill_mode_non_solid(false);

        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::builder()
            .runtime_descriptor_array(true)
            .shader_sampled_image_array_non_uniform_indexing(true)
            .descriptor_binding_partially_bound(true);

        let mut create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);
        if bindless_supported {
            create_info = create_info.push_next(&mut indexing);
        }

        let device = unsafe {
            instance
                .create_device(physical_device, &create_info, None)
                .map_err(|err| {
                    Error::Failure(format!("failed to create logical device: {}", err))
                })?
        };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let swapchain_loader = khr::Swapchain::new(instance, &device);

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let upload_pool = unsafe {
            device.create_command_pool(&pool_info, None).map_err(|err| {
                Error::Failure(format!("failed to create upload command pool: {}", err))
            })?
        };

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        Ok(DeviceState {
            instance: instance.clone(),
            physical_device,
            device,
            graphics_queue,
            graphics_family,
            swapchain_loader,
            upload_pool,
            memory_properties,
            limits: properties.limits,
            bindless_supported,
        })
    }
}
