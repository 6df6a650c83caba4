use crate::core::{ImageView, VulkanContext};
use ash::{extensions::khr::Swapchain as AshSwapchain, vk};
use snafu::{OptionExt, ResultExt, Snafu};
use std::sync::Arc;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to query surface support: {}", source))]
    SurfaceQuery { source: vk::Result },

    #[snafu(display("The surface reports no formats"))]
    NoSurfaceFormat,

    #[snafu(display("Failed to create swapchain: {}", source))]
    SwapchainCreation { source: vk::Result },

    #[snafu(display("Failed to get swapchain images: {}", source))]
    SwapchainImages { source: vk::Result },

    #[snafu(display("Failed to create swapchain image view: {}", source))]
    SwapchainImageView {
        source: crate::core::image_view::Error,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct SwapchainProperties {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

impl SwapchainProperties {
    pub fn aspect_ratio(&self) -> f32 {
        let height = self.extent.height.max(1);
        self.extent.width as f32 / height as f32
    }
}

pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn new(context: &VulkanContext) -> Result<Self> {
        let capabilities = unsafe {
            context
                .surface()
                .get_physical_device_surface_capabilities(
                    context.physical_device(),
                    context.surface_khr(),
                )
                .context(SurfaceQuery)?
        };

        let formats = unsafe {
            context
                .surface()
                .get_physical_device_surface_formats(
                    context.physical_device(),
                    context.surface_khr(),
                )
                .context(SurfaceQuery)?
        };

        let present_modes = unsafe {
            context
                .surface()
                .get_physical_device_surface_present_modes(
                    context.physical_device(),
                    context.surface_khr(),
                )
                .context(SurfaceQuery)?
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    pub fn suitable_properties(
        &self,
        preferred_dimensions: [u32; 2],
    ) -> Result<SwapchainProperties> {
        let format = choose_surface_format(&self.formats).context(NoSurfaceFormat)?;
        let present_mode = choose_surface_present_mode(&self.present_modes);
        let extent = choose_swapchain_extent(self.capabilities, preferred_dimensions);
        Ok(SwapchainProperties {
            format,
            present_mode,
            extent,
        })
    }
}

fn choose_surface_format(
    available_formats: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    let (default_format, default_color_space) = (
        vk::Format::B8G8R8A8_UNORM,
        vk::ColorSpaceKHR::SRGB_NONLINEAR,
    );

    // A single undefined entry means the surface has no preference
    if available_formats.len() == 1 && available_formats[0].format == vk::Format::UNDEFINED {
        return Some(vk::SurfaceFormatKHR {
            format: default_format,
            color_space: default_color_space,
        });
    }

    available_formats
        .iter()
        .find(|format| format.format == default_format && format.color_space == default_color_space)
        .or_else(|| available_formats.first())
        .copied()
}

fn choose_surface_present_mode(
    available_present_modes: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    if available_present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is always available
        vk::PresentModeKHR::FIFO
    }
}

fn choose_swapchain_extent(
    capabilities: vk::SurfaceCapabilitiesKHR,
    preferred_dimensions: [u32; 2],
) -> vk::Extent2D {
    if capabilities.current_extent.width != std::u32::MAX {
        capabilities.current_extent
    } else {
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        let width = preferred_dimensions[0].min(max.width).max(min.width);
        let height = preferred_dimensions[1].min(max.height).max(min.height);
        vk::Extent2D { width, height }
    }
}

pub struct Swapchain {
    image_views: Vec<ImageView>,
    images: Vec<vk::Image>,
    swapchain_properties: SwapchainProperties,
    swapchain_khr: vk::SwapchainKHR,
    swapchain: AshSwapchain,
}

impl Swapchain {
    pub fn new(context: Arc<VulkanContext>, dimensions: [u32; 2]) -> Result<Swapchain> {
        let swapchain_support_details = SwapchainSupportDetails::new(&context)?;
        let capabilities = &swapchain_support_details.capabilities;

        let swapchain_properties = swapchain_support_details.suitable_properties(dimensions)?;
        let surface_format = swapchain_properties.format;
        let present_mode = swapchain_properties.present_mode;
        let extent = swapchain_properties.extent;

        let image_count = {
            let max = capabilities.max_image_count;
            let preferred = capabilities.min_image_count + 1;
            if max > 0 && preferred > max {
                max
            } else {
                preferred
            }
        };

        let queue_family_indices = [
            context.graphics_queue_family_index(),
            context.present_queue_family_index(),
        ];

        let mut builder = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface_khr())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT);

        builder = if queue_family_indices[0] != queue_family_indices[1] {
            builder
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&queue_family_indices)
        } else {
            builder.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain_create_info = builder
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .build();

        let swapchain = AshSwapchain::new(
            context.instance(),
            context.logical_device().logical_device(),
        );
        let swapchain_khr = unsafe {
            swapchain
                .create_swapchain(&swapchain_create_info, None)
                .context(SwapchainCreation)?
        };

        log::debug!(
            r#"
Creating swapchain.
    Format: {:?}
    ColorSpace: {:?}
    PresentMode: {:?}
    Extent: {:?}
    ImageCount: {}
"#,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            extent,
            image_count
        );

        let images = unsafe {
            swapchain
                .get_swapchain_images(swapchain_khr)
                .context(SwapchainImages)?
        };
        let image_views = images
            .iter()
            .map(|image| {
                ImageView::new_2d(
                    context.clone(),
                    *image,
                    surface_format.format,
                    vk::ImageAspectFlags::COLOR,
                )
                .context(SwapchainImageView)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Swapchain {
            swapchain,
            swapchain_khr,
            swapchain_properties,
            images,
            image_views,
        })
    }

    pub fn properties(&self) -> &SwapchainProperties {
        &self.swapchain_properties
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[ImageView] {
        &self.image_views
    }

    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> ash::prelude::VkResult<(u32, bool)> {
        unsafe {
            self.swapchain
                .acquire_next_image(self.swapchain_khr, std::u64::MAX, semaphore, fence)
        }
    }

    pub fn present_rendered_image(
        &self,
        wait_semaphores: &[vk::Semaphore],
        image_indices: &[u32],
        present_queue: vk::Queue,
    ) -> ash::prelude::VkResult<bool> {
        let swapchains = [self.swapchain_khr];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(image_indices)
            .build();

        unsafe { self.swapchain.queue_present(present_queue, &present_info) }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // Views go before the swapchain that owns their images
        self.image_views.clear();
        unsafe {
            self.swapchain.destroy_swapchain(self.swapchain_khr, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn undefined_surface_format_selects_default() {
        let chosen = choose_surface_format(&[surface_format(vk::Format::UNDEFINED)]).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn falls_back_to_first_surface_format() {
        let chosen = choose_surface_format(&[
            surface_format(vk::Format::R8G8B8A8_SRGB),
            surface_format(vk::Format::R16G16B16A16_SFLOAT),
        ])
        .unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_SRGB);
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn prefers_mailbox_then_fifo() {
        assert_eq!(
            choose_surface_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_surface_present_mode(&[vk::PresentModeKHR::IMMEDIATE]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_is_clamped_when_surface_has_no_current_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: std::u32::MAX,
                height: std::u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 16,
                height: 16,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        };
        let extent = choose_swapchain_extent(capabilities, [4096, 8]);
        assert_eq!(extent.width, 1024);
        assert_eq!(extent.height, 16);
    }

    #[test]
    fn aspect_ratio_tolerates_zero_height() {
        let properties = SwapchainProperties {
            format: surface_format(vk::Format::B8G8R8A8_UNORM),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D {
                width: 800,
                height: 0,
            },
        };
        assert_eq!(properties.aspect_ratio(), 800.0);
    }
}
