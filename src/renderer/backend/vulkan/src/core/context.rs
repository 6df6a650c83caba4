use crate::core::{Instance, LogicalDevice, PhysicalDevice, Surface};
use ash::{
    extensions::khr::Swapchain,
    version::{DeviceV1_0, InstanceV1_0},
    vk,
};
use snafu::{OptionExt, ResultExt, Snafu};
use vk_mem::{Allocator, AllocatorCreateInfo};
use winit::window::Window;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create instance for context: {}", source))]
    InstanceCreation {
        source: crate::core::instance::Error,
    },

    #[snafu(display("Failed to create surface for context: {}", source))]
    SurfaceCreation { source: crate::core::surface::Error },

    #[snafu(display("Failed to create physical device for context: {}", source))]
    PhysicalDeviceCreation {
        source: crate::core::physical_device::Error,
    },

    #[snafu(display("Failed to create logical device for context: {}", source))]
    LogicalDeviceCreation {
        source: crate::core::logical_device::Error,
    },

    #[snafu(display("Failed to create memory allocator: {}", message))]
    AllocatorCreation { message: String },

    #[snafu(display("Failed to find a supported depth format"))]
    NoDepthFormat,
}

// The order the struct members here are declared in
// is important because it determines the order
// the fields are 'Drop'ped in
//
// The drop order should be:
// allocator -> logical device -> physical device -> surface -> instance
pub struct VulkanContext {
    allocator: vk_mem::Allocator,
    logical_device: LogicalDevice,
    physical_device: PhysicalDevice,
    surface: Surface,
    instance: Instance,
    conditional_rendering_supported: bool,
    wireframe_supported: bool,
}

impl VulkanContext {
    pub fn new(window: &Window) -> Result<Self> {
        let instance = Instance::new().context(InstanceCreation)?;
        let surface = Surface::new(&instance, window).context(SurfaceCreation)?;
        let physical_device =
            PhysicalDevice::new(&instance, &surface).context(PhysicalDeviceCreation)?;

        let conditional_rendering_supported = physical_device
            .supports_extension(&instance, vk::ExtConditionalRenderingFn::name());
        if !conditional_rendering_supported {
            log::warn!(
                "{:?} is not supported, node visibility will be resolved on the host",
                vk::ExtConditionalRenderingFn::name()
            );
        }

        let wireframe_supported = physical_device.features().fill_mode_non_solid == vk::TRUE;
        if !wireframe_supported {
            log::warn!("Non-solid fill modes are not supported, wireframe rendering is disabled");
        }

        let logical_device = Self::create_logical_device(
            &instance,
            &physical_device,
            conditional_rendering_supported,
            wireframe_supported,
        )?;

        let allocator_create_info = AllocatorCreateInfo {
            device: (*logical_device.logical_device()).clone(),
            instance: (*instance.instance()).clone(),
            physical_device: physical_device.physical_device(),
            ..Default::default()
        };

        let allocator =
            Allocator::new(&allocator_create_info).map_err(|error| Error::AllocatorCreation {
                message: error.to_string(),
            })?;

        Ok(VulkanContext {
            allocator,
            instance,
            physical_device,
            logical_device,
            surface,
            conditional_rendering_supported,
            wireframe_supported,
        })
    }

    fn create_logical_device(
        instance: &Instance,
        physical_device: &PhysicalDevice,
        conditional_rendering_supported: bool,
        wireframe_supported: bool,
    ) -> Result<LogicalDevice> {
        let mut device_extensions = vec![Swapchain::name().as_ptr()];
        if conditional_rendering_supported {
            device_extensions.push(vk::ExtConditionalRenderingFn::name().as_ptr());
        }

        let queue_priorities = [1.0];
        let queue_creation_info_list = physical_device
            .queue_family_index_set()
            .indices()
            .iter()
            .map(|index| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*index)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect::<Vec<_>>();

        let supported = physical_device.features();
        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sample_rate_shading(supported.sample_rate_shading == vk::TRUE)
            .fill_mode_non_solid(wireframe_supported)
            .build();

        let mut conditional_rendering_features =
            vk::PhysicalDeviceConditionalRenderingFeaturesEXT::builder()
                .conditional_rendering(true)
                .build();

        let layer_name_vec = instance.enabled_layers();
        let layer_name_pointers = layer_name_vec.layer_name_pointers();

        let mut device_create_info_builder = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_creation_info_list)
            .enabled_extension_names(&device_extensions)
            .enabled_features(&device_features)
            .enabled_layer_names(&layer_name_pointers);

        if conditional_rendering_supported {
            device_create_info_builder =
                device_create_info_builder.push_next(&mut conditional_rendering_features);
        }

        LogicalDevice::new(instance, physical_device, &device_create_info_builder)
            .context(LogicalDeviceCreation)
    }

    pub fn conditional_rendering_supported(&self) -> bool {
        self.conditional_rendering_supported
    }

    pub fn wireframe_supported(&self) -> bool {
        self.wireframe_supported
    }

    pub fn sample_rate_shading_supported(&self) -> bool {
        self.physical_device.features().sample_rate_shading == vk::TRUE
    }

    pub fn max_usable_samples(&self) -> vk::SampleCountFlags {
        let properties = self.physical_device_properties();
        let color_sample_counts = properties.limits.framebuffer_color_sample_counts;
        let depth_sample_counts = properties.limits.framebuffer_depth_sample_counts;
        let sample_counts = color_sample_counts & depth_sample_counts;

        [
            vk::SampleCountFlags::TYPE_8,
            vk::SampleCountFlags::TYPE_4,
            vk::SampleCountFlags::TYPE_2,
        ]
        .iter()
        .copied()
        .find(|count| sample_counts.contains(*count))
        .unwrap_or(vk::SampleCountFlags::TYPE_1)
    }

    pub fn determine_depth_format(
        &self,
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        let candidates = [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ];
        candidates
            .iter()
            .copied()
            .find(|candidate| {
                let properties = self.physical_device_format_properties(*candidate);

                let linear_tiling_feature_support = tiling == vk::ImageTiling::LINEAR
                    && properties.linear_tiling_features.contains(features);

                let optimal_tiling_feature_support = tiling == vk::ImageTiling::OPTIMAL
                    && properties.optimal_tiling_features.contains(features);

                linear_tiling_feature_support || optimal_tiling_feature_support
            })
            .context(NoDepthFormat)
    }

    pub fn physical_device_properties(&self) -> vk::PhysicalDeviceProperties {
        unsafe {
            self.instance()
                .get_physical_device_properties(self.physical_device())
        }
    }

    pub fn physical_device_format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance()
                .get_physical_device_format_properties(self.physical_device(), format)
        }
    }

    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    pub fn instance(&self) -> &ash::Instance {
        self.instance.instance()
    }

    pub fn physical_device(&self) -> ash::vk::PhysicalDevice {
        self.physical_device.physical_device()
    }

    pub fn surface(&self) -> &ash::extensions::khr::Surface {
        self.surface.surface()
    }

    pub fn surface_khr(&self) -> ash::vk::SurfaceKHR {
        self.surface.surface_khr()
    }

    pub fn physical_device_memory_properties(&self) -> &ash::vk::PhysicalDeviceMemoryProperties {
        self.physical_device.physical_device_memory_properties()
    }

    pub fn logical_device(&self) -> &LogicalDevice {
        &self.logical_device
    }

    pub fn graphics_queue_family_index(&self) -> u32 {
        self.physical_device
            .queue_family_index_set()
            .graphics_queue_family_index()
    }

    pub fn present_queue_family_index(&self) -> u32 {
        self.physical_device
            .queue_family_index_set()
            .present_queue_family_index()
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        unsafe {
            self.logical_device()
                .logical_device()
                .get_device_queue(self.graphics_queue_family_index(), 0)
        }
    }

    pub fn present_queue(&self) -> vk::Queue {
        unsafe {
            self.logical_device()
                .logical_device()
                .get_device_queue(self.present_queue_family_index(), 0)
        }
    }

    pub fn wait_idle(&self) {
        self.logical_device.wait_idle();
    }
}
