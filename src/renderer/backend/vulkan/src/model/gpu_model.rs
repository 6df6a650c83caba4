use crate::{
    core::VulkanContext,
    pipelines::MeshUniform,
    resource::{Buffer, CommandPool, DescriptorPool, DescriptorSetLayout},
};
use ash::{version::DeviceV1_0, vk};
use nalgebra_glm as glm;
use std::{error::Error, mem, sync::Arc};
use voortman3d_core::scene::{Mesh, Model, TransformSink};

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

/// Device resources of a loaded model: the shared vertex and index buffers
/// and one dynamic uniform slot per mesh.
pub struct GpuModel {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub mesh_uniforms: Buffer,
    pub descriptor_set: vk::DescriptorSet,
    _descriptor_pool: DescriptorPool,
    uniform_stride: vk::DeviceSize,
    index_count: usize,
}

impl GpuModel {
    pub fn new(
        context: Arc<VulkanContext>,
        command_pool: &CommandPool,
        model: &Model,
        mesh_layout: &DescriptorSetLayout,
    ) -> Result<Self> {
        let vertex_buffer = command_pool
            .create_device_local_buffer(vk::BufferUsageFlags::VERTEX_BUFFER, model.vertices())?;
        let index_buffer = command_pool
            .create_device_local_buffer(vk::BufferUsageFlags::INDEX_BUFFER, model.indices())?;

        let alignment = context
            .physical_device_properties()
            .limits
            .min_uniform_buffer_offset_alignment;
        let uniform_stride = aligned_stride(mem::size_of::<MeshUniform>() as _, alignment);
        let mesh_uniforms = Buffer::new_mapped_basic(
            context.clone(),
            uniform_stride * model.mesh_count().max(1) as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let pool_size = vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .descriptor_count(1)
            .build();
        let pool_sizes = [pool_size];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(1)
            .build();
        let descriptor_pool = DescriptorPool::new(context.clone(), pool_info)?;
        let descriptor_set = descriptor_pool
            .allocate_descriptor_sets(mesh_layout.layout(), 1)?
            .remove(0);

        let buffer_info = vk::DescriptorBufferInfo::builder()
            .buffer(mesh_uniforms.buffer())
            .offset(0)
            .range(mem::size_of::<MeshUniform>() as _)
            .build();
        let buffer_infos = [buffer_info];

        let descriptor_write = vk::WriteDescriptorSet::builder()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .buffer_info(&buffer_infos)
            .build();

        unsafe {
            context
                .logical_device()
                .logical_device()
                .update_descriptor_sets(&[descriptor_write], &[])
        }

        let mut gpu_model = Self {
            vertex_buffer,
            index_buffer,
            mesh_uniforms,
            descriptor_set,
            _descriptor_pool: descriptor_pool,
            uniform_stride,
            index_count: model.indices().len(),
        };
        model.update_all(&mut gpu_model);

        Ok(gpu_model)
    }

    pub fn has_geometry(&self) -> bool {
        self.index_count > 0
    }

    /// Offset of the mesh's uniform slot, passed when binding the descriptor set.
    pub fn dynamic_offset(&self, mesh: &Mesh) -> u32 {
        (mesh.id as vk::DeviceSize * self.uniform_stride) as u32
    }

    pub fn bind_geometry(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        let offsets = [0];
        let vertex_buffers = [self.vertex_buffer.buffer()];
        unsafe {
            device.cmd_bind_vertex_buffers(command_buffer, 0, &vertex_buffers, &offsets);
            device.cmd_bind_index_buffer(
                command_buffer,
                self.index_buffer.buffer(),
                0,
                vk::IndexType::UINT32,
            );
        }
    }
}

impl TransformSink for GpuModel {
    fn write_transform(&mut self, mesh: &Mesh, world: &glm::Mat4) {
        let uniform = MeshUniform { matrix: *world };
        let offset = mesh.id as vk::DeviceSize * self.uniform_stride;
        if offset >= self.mesh_uniforms.size() {
            log::warn!("Mesh '{}' has no uniform slot", mesh.name);
            return;
        }
        self.mesh_uniforms.upload_to_buffer(&[uniform], offset as usize);
    }
}

/// Rounds `size` up to the next multiple of `alignment`.
pub fn aligned_stride(size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
    if alignment == 0 {
        return size;
    }
    (size + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(64, 256), 256);
        assert_eq!(aligned_stride(64, 64), 64);
        assert_eq!(aligned_stride(80, 64), 128);
        assert_eq!(aligned_stride(64, 0), 64);
    }
}
