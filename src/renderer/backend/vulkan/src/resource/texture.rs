use crate::{
    core::VulkanContext,
    resource::{Buffer, CommandPool},
};
use ash::vk;
use snafu::{ResultExt, Snafu};
use std::sync::Arc;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to allocate an image: {}", message))]
    ImageAllocation { message: String },

    #[snafu(display("Failed to create the texture staging buffer: {}", source))]
    StagingBufferCreation {
        source: crate::resource::buffer::Error,
    },

    #[snafu(display("Failed to upload texture data: {}", source))]
    TextureUpload {
        source: crate::resource::command_pool::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

// These are parameters needed for
// *both* creating and uploading image data
pub struct TextureDescription {
    pub format: vk::Format,
    pub dimensions: Dimension,
    pub pixels: Vec<u8>,
}

impl TextureDescription {
    pub fn from_rgba(width: u32, height: u32, pixels: &[u8]) -> Self {
        TextureDescription {
            format: vk::Format::R8G8B8A8_UNORM,
            dimensions: Dimension { width, height },
            pixels: pixels.to_vec(),
        }
    }

    pub fn image_create_info(&self) -> vk::ImageCreateInfo {
        vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: self.dimensions.width,
                height: self.dimensions.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(self.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1)
            .build()
    }
}

// The order of the struct fields matters here
// because it determines drop order
pub struct Texture {
    image: vk::Image,
    allocation: vk_mem::Allocation,
    context: Arc<VulkanContext>,
}

impl Texture {
    pub fn new(
        context: Arc<VulkanContext>,
        allocation_create_info: &vk_mem::AllocationCreateInfo,
        image_create_info: &vk::ImageCreateInfo,
    ) -> Result<Self> {
        let (image, allocation, _) = context
            .allocator()
            .create_image(image_create_info, allocation_create_info)
            .map_err(|error| Error::ImageAllocation {
                message: error.to_string(),
            })?;

        Ok(Self {
            image,
            allocation,
            context,
        })
    }

    /// Device-local image sized and formatted after `description`, with the pixels uploaded
    /// and the layout left in `SHADER_READ_ONLY_OPTIMAL`.
    pub fn from_description(
        context: Arc<VulkanContext>,
        command_pool: &CommandPool,
        description: &TextureDescription,
    ) -> Result<Self> {
        let allocation_create_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::GpuOnly,
            ..Default::default()
        };
        let texture = Self::new(
            context,
            &allocation_create_info,
            &description.image_create_info(),
        )?;
        texture.upload_data(command_pool, description)?;
        Ok(texture)
    }

    pub fn upload_data(
        &self,
        command_pool: &CommandPool,
        description: &TextureDescription,
    ) -> Result<()> {
        let buffer = Buffer::new_mapped_basic(
            self.context.clone(),
            description.pixels.len() as _,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )
        .context(StagingBufferCreation)?;
        buffer.upload_to_buffer(&description.pixels, 0);

        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image())
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .build();

        command_pool
            .transition_image_layout(
                &[barrier],
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            )
            .context(TextureUpload)?;

        command_pool
            .copy_buffer_to_image(
                buffer.buffer(),
                self.image(),
                description.dimensions.width,
                description.dimensions.height,
            )
            .context(TextureUpload)?;

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image())
            .subresource_range(subresource_range)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .build();

        command_pool
            .transition_image_layout(
                &[barrier],
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            )
            .context(TextureUpload)
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Err(error) = self
            .context
            .allocator()
            .destroy_image(self.image, &self.allocation)
        {
            log::error!("Failed to destroy image: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_description_creates_a_sampled_image() {
        let pixels = vec![255_u8; 4 * 8 * 2];
        let description = TextureDescription::from_rgba(8, 2, &pixels);
        let info = description.image_create_info();

        assert_eq!(info.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(info.extent.width, 8);
        assert_eq!(info.extent.height, 2);
        assert!(info.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert_eq!(description.pixels.len(), pixels.len());
    }
}
