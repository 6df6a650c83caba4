use crate::{core::VulkanContext, resource::Buffer};
use ash::vk;
use std::{mem, sync::Arc};
use voortman3d_core::visibility::MaskSink;

type Result<T, E = crate::resource::buffer::Error> = std::result::Result<T, E>;

/// Device copy of the visibility mask. Conditional rendering reads the
/// 32-bit flag of each node straight out of this buffer.
pub struct VisibilityBuffer {
    buffer: Buffer,
    node_count: usize,
}

impl VisibilityBuffer {
    pub fn new(context: Arc<VulkanContext>, node_count: usize) -> Result<Self> {
        let mut usage = vk::BufferUsageFlags::TRANSFER_DST;
        if context.conditional_rendering_supported() {
            usage |= vk::BufferUsageFlags::CONDITIONAL_RENDERING_EXT;
        }

        let size = (node_count.max(1) * mem::size_of::<i32>()) as vk::DeviceSize;
        let buffer = Buffer::new_mapped_basic(context, size, usage)?;

        Ok(Self { buffer, node_count })
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer.buffer()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }
}

impl MaskSink for VisibilityBuffer {
    fn write_mask(&mut self, flags: &[i32]) {
        if flags.len() != self.node_count {
            log::warn!(
                "Visibility mask has {} flags but the buffer holds {}",
                flags.len(),
                self.node_count
            );
        }
        let count = flags.len().min(self.node_count);
        if count > 0 {
            self.buffer.upload_to_buffer(&flags[..count], 0);
        }
    }
}
