use crate::core::{DebugLayer, Instance, QueueFamilyIndexSet, Surface};
use ash::{version::InstanceV1_0, vk};
use snafu::{OptionExt, ResultExt, Snafu};
use std::ffi::CStr;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create the debug layer: {}", source))]
    DebugLayerCreation {
        source: crate::core::debug_layer::Error,
    },

    #[snafu(display("Failed to enumerate physical devices: {}", source))]
    PhysicalDeviceEnumeration { source: vk::Result },

    #[snafu(display("Failed to find a suitable physical device"))]
    NoSuitablePhysicalDevice,
}

// The order of the struct fields
// here matter because it determines drop order
pub struct PhysicalDevice {
    _debug_layer: Option<DebugLayer>,
    queue_family_index_set: QueueFamilyIndexSet,
    physical_device_memory_properties: ash::vk::PhysicalDeviceMemoryProperties,
    features: vk::PhysicalDeviceFeatures,
    physical_device: ash::vk::PhysicalDevice,
}

impl PhysicalDevice {
    pub fn new(instance: &Instance, surface: &Surface) -> Result<Self> {
        let (physical_device, queue_family_index_set) =
            Self::pick_physical_device(instance.instance(), surface)?;
        let physical_device_memory_properties = unsafe {
            instance
                .instance()
                .get_physical_device_memory_properties(physical_device)
        };
        let features = unsafe {
            instance
                .instance()
                .get_physical_device_features(physical_device)
        };
        let debug_layer = DebugLayer::new(instance).context(DebugLayerCreation)?;

        Ok(PhysicalDevice {
            physical_device,
            physical_device_memory_properties,
            features,
            _debug_layer: debug_layer,
            queue_family_index_set,
        })
    }

    pub fn physical_device(&self) -> ash::vk::PhysicalDevice {
        self.physical_device
    }

    pub fn physical_device_memory_properties(&self) -> &ash::vk::PhysicalDeviceMemoryProperties {
        &self.physical_device_memory_properties
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn queue_family_index_set(&self) -> &QueueFamilyIndexSet {
        &self.queue_family_index_set
    }

    pub fn supports_extension(&self, instance: &Instance, extension_name: &CStr) -> bool {
        let extensions = unsafe {
            instance
                .instance()
                .enumerate_device_extension_properties(self.physical_device)
        };
        match extensions {
            Ok(extensions) => extensions.iter().any(|extension| {
                let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
                name == extension_name
            }),
            Err(error) => {
                log::warn!("Failed to enumerate device extensions: {}", error);
                false
            }
        }
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface: &Surface,
    ) -> Result<(ash::vk::PhysicalDevice, QueueFamilyIndexSet)> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .context(PhysicalDeviceEnumeration)?
        };

        let (physical_device, queue_family_index_set) = devices
            .into_iter()
            .find_map(|physical_device| {
                Self::suitable_queue_families(instance, physical_device, surface)
                    .map(|queue_family_index_set| (physical_device, queue_family_index_set))
            })
            .context(NoSuitablePhysicalDevice)?;

        let props = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!("Selected physical device: {:?}", unsafe {
            CStr::from_ptr(props.device_name.as_ptr())
        });

        Ok((physical_device, queue_family_index_set))
    }

    fn suitable_queue_families(
        instance: &ash::Instance,
        physical_device: ash::vk::PhysicalDevice,
        surface: &Surface,
    ) -> Option<QueueFamilyIndexSet> {
        let formats = unsafe {
            surface
                .surface()
                .get_physical_device_surface_formats(physical_device, surface.surface_khr())
                .unwrap_or_default()
        };

        let present_modes = unsafe {
            surface
                .surface()
                .get_physical_device_surface_present_modes(physical_device, surface.surface_khr())
                .unwrap_or_default()
        };

        if formats.is_empty() || present_modes.is_empty() {
            return None;
        }

        QueueFamilyIndexSet::new(instance, physical_device, surface)
    }
}
