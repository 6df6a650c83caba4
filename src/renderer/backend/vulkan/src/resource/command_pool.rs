use crate::{core::VulkanContext, resource::Buffer};
use ash::{version::DeviceV1_0, vk};
use snafu::{ResultExt, Snafu};
use std::{mem, sync::Arc};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create command pool: {}", source))]
    CommandPoolCreation { source: vk::Result },

    #[snafu(display("Failed to allocate command buffers: {}", source))]
    CommandBufferAllocation { source: vk::Result },

    #[snafu(display("Failed to record a one-time command buffer: {}", source))]
    OneTimeCommandRecording { source: vk::Result },

    #[snafu(display("Failed to submit a one-time command buffer: {}", source))]
    OneTimeCommandSubmission { source: vk::Result },

    #[snafu(display("Failed to create a buffer for a transfer: {}", source))]
    TransferBufferCreation {
        source: crate::resource::buffer::Error,
    },
}

pub struct CommandPool {
    pool: vk::CommandPool,
    context: Arc<VulkanContext>,
}

impl CommandPool {
    pub fn new(context: Arc<VulkanContext>, flags: vk::CommandPoolCreateFlags) -> Result<Self> {
        let command_pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(context.graphics_queue_family_index())
            .flags(flags)
            .build();

        let pool = unsafe {
            context
                .logical_device()
                .logical_device()
                .create_command_pool(&command_pool_info, None)
                .context(CommandPoolCreation)?
        };

        Ok(CommandPool { pool, context })
    }

    pub fn allocate_command_buffers(
        &self,
        count: usize,
        level: vk::CommandBufferLevel,
    ) -> Result<Vec<vk::CommandBuffer>> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(level)
            .command_buffer_count(count as _)
            .build();

        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .allocate_command_buffers(&allocate_info)
                .context(CommandBufferAllocation)
        }
    }

    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        if command_buffers.is_empty() {
            return;
        }
        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .free_command_buffers(self.pool, command_buffers);
        }
    }

    /// Uploads `data` through a staging buffer into a new device-local buffer.
    pub fn create_device_local_buffer<T: Copy>(
        &self,
        usage_flags: vk::BufferUsageFlags,
        data: &[T],
    ) -> Result<Buffer> {
        let buffer_size = (data.len() * mem::size_of::<T>()).max(1) as vk::DeviceSize;

        let staging_buffer = Buffer::new_mapped_basic(
            self.context.clone(),
            buffer_size,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )
        .context(TransferBufferCreation)?;
        staging_buffer.upload_to_buffer(data, 0);

        let device_local_buffer = Buffer::new_device_local(
            self.context.clone(),
            buffer_size,
            vk::BufferUsageFlags::TRANSFER_DST | usage_flags,
        )
        .context(TransferBufferCreation)?;

        self.copy_buffer_to_buffer(
            staging_buffer.buffer(),
            device_local_buffer.buffer(),
            buffer_size,
        )?;

        Ok(device_local_buffer)
    }

    pub fn copy_buffer_to_buffer(
        &self,
        source: vk::Buffer,
        destination: vk::Buffer,
        size: vk::DeviceSize,
    ) -> Result<()> {
        self.execute_command_once(|command_buffer| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            let regions = [region];

            unsafe {
                self.context
                    .logical_device()
                    .logical_device()
                    .cmd_copy_buffer(command_buffer, source, destination, &regions)
            };
        })
    }

    pub fn copy_buffer_to_image(
        &self,
        buffer: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.execute_command_once(|command_buffer| {
            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                })
                .build();
            let regions = [region];
            unsafe {
                self.context
                    .logical_device()
                    .logical_device()
                    .cmd_copy_buffer_to_image(
                        command_buffer,
                        buffer,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &regions,
                    )
            }
        })
    }

    pub fn transition_image_layout(
        &self,
        barriers: &[vk::ImageMemoryBarrier],
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
    ) -> Result<()> {
        self.execute_command_once(|command_buffer| unsafe {
            self.context
                .logical_device()
                .logical_device()
                .cmd_pipeline_barrier(
                    command_buffer,
                    src_stage_mask,
                    dst_stage_mask,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    barriers,
                )
        })
    }

    /// Records `executor` into a fresh command buffer, submits it to the
    /// graphics queue and waits for the queue to drain.
    pub fn execute_command_once<F: FnOnce(vk::CommandBuffer)>(&self, executor: F) -> Result<()> {
        let command_buffer = self
            .allocate_command_buffers(1, vk::CommandBufferLevel::PRIMARY)?
            .remove(0);
        let command_buffers = [command_buffer];

        let result = self.submit_once(command_buffer, executor);
        self.free_command_buffers(&command_buffers);
        result
    }

    fn submit_once<F: FnOnce(vk::CommandBuffer)>(
        &self,
        command_buffer: vk::CommandBuffer,
        executor: F,
    ) -> Result<()> {
        let logical_device = self.context.logical_device().logical_device();
        let queue = self.context.graphics_queue();

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .build();

        unsafe {
            logical_device
                .begin_command_buffer(command_buffer, &begin_info)
                .context(OneTimeCommandRecording)?;
        }

        executor(command_buffer);

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .build();
        let submit_info_arr = [submit_info];

        unsafe {
            logical_device
                .end_command_buffer(command_buffer)
                .context(OneTimeCommandRecording)?;

            logical_device
                .queue_submit(queue, &submit_info_arr, vk::Fence::null())
                .context(OneTimeCommandSubmission)?;

            logical_device
                .queue_wait_idle(queue)
                .context(OneTimeCommandSubmission)?;
        }

        Ok(())
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Destroying the pool frees every buffer allocated from it
        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .destroy_command_pool(self.pool, None);
        }
    }
}
