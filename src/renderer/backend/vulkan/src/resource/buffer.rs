use crate::core::VulkanContext;
use ash::vk;
use snafu::Snafu;
use std::{mem, sync::Arc};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to allocate a buffer of {} bytes: {}", size, message))]
    BufferAllocation { size: vk::DeviceSize, message: String },
}

pub struct Buffer {
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    allocation_info: vk_mem::AllocationInfo,
    context: Arc<VulkanContext>,
}

impl Buffer {
    pub fn new(
        context: Arc<VulkanContext>,
        allocation_create_info: &vk_mem::AllocationCreateInfo,
        buffer_create_info: &vk::BufferCreateInfo,
    ) -> Result<Self> {
        let (buffer, allocation, allocation_info) = context
            .allocator()
            .create_buffer(buffer_create_info, allocation_create_info)
            .map_err(|error| Error::BufferAllocation {
                size: buffer_create_info.size,
                message: error.to_string(),
            })?;

        Ok(Self {
            buffer,
            allocation,
            allocation_info,
            context,
        })
    }

    /// A host-visible, coherent buffer that stays mapped for its whole lifetime.
    pub fn new_mapped_basic(
        context: Arc<VulkanContext>,
        size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let allocation_create_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::CpuToGpu,
            flags: vk_mem::AllocationCreateFlags::MAPPED,
            required_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        };

        let buffer_create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .build();

        Buffer::new(context, &allocation_create_info, &buffer_create_info)
    }

    pub fn new_device_local(
        context: Arc<VulkanContext>,
        size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
    ) -> Result<Self> {
        let allocation_create_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::GpuOnly,
            ..Default::default()
        };

        let buffer_create_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .build();

        Buffer::new(context, &allocation_create_info, &buffer_create_info)
    }

    /// Copies `data` into the persistently mapped allocation, `offset` bytes in.
    /// Only valid for buffers created with `new_mapped_basic`.
    pub fn upload_to_buffer<T: Copy>(&self, data: &[T], offset: usize) {
        let data_size = mem::size_of_val(data);
        if data_size == 0 {
            return;
        }
        let size = self.allocation_info.get_size();
        let data_pointer = self.allocation_info.get_mapped_data();
        if data_pointer.is_null() || offset + data_size > size {
            log::error!(
                "Attempted to upload {} bytes at offset {} to an unmapped or undersized buffer",
                data_size,
                offset
            );
            return;
        }
        unsafe {
            let mut align = ash::util::Align::new(
                data_pointer.add(offset) as _,
                mem::align_of::<T>() as _,
                data_size as _,
            );
            align.copy_from_slice(data);
        }
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.allocation_info.get_size() as _
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Err(error) = self
            .context
            .allocator()
            .destroy_buffer(self.buffer, &self.allocation)
        {
            log::error!("Failed to destroy buffer: {}", error);
        }
    }
}
