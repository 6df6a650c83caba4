use crate::{model::GpuModel, pipelines::MaterialPushConstant, render::ConditionalRendering};
use ash::{version::DeviceV1_0, vk};
use voortman3d_core::{
    byte_slice_from,
    scene::{DrawRecorder, Material, Mesh, Primitive},
};

/// Records scene traversal commands into a secondary command buffer.
pub struct CommandBufferRecorder<'a> {
    pub device: &'a ash::Device,
    pub command_buffer: vk::CommandBuffer,
    pub pipeline_layout: vk::PipelineLayout,
    pub global_descriptor_set: vk::DescriptorSet,
    pub gpu_model: &'a GpuModel,
    pub visibility_buffer: vk::Buffer,
    pub conditional_rendering: Option<&'a ConditionalRendering>,
    bound_mesh: Option<usize>,
}

impl<'a> CommandBufferRecorder<'a> {
    pub fn new(
        device: &'a ash::Device,
        command_buffer: vk::CommandBuffer,
        pipeline_layout: vk::PipelineLayout,
        global_descriptor_set: vk::DescriptorSet,
        gpu_model: &'a GpuModel,
        visibility_buffer: vk::Buffer,
        conditional_rendering: Option<&'a ConditionalRendering>,
    ) -> Self {
        Self {
            device,
            command_buffer,
            pipeline_layout,
            global_descriptor_set,
            gpu_model,
            visibility_buffer,
            conditional_rendering,
            bound_mesh: None,
        }
    }
}

impl<'a> DrawRecorder for CommandBufferRecorder<'a> {
    fn bind_mesh(&mut self, mesh: &Mesh) {
        if self.bound_mesh == Some(mesh.id) {
            return;
        }
        let descriptor_sets = [self.global_descriptor_set, self.gpu_model.descriptor_set];
        let dynamic_offsets = [self.gpu_model.dynamic_offset(mesh)];
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &descriptor_sets,
                &dynamic_offsets,
            );
        }
        self.bound_mesh = Some(mesh.id);
    }

    fn push_material(&mut self, material: &Material) {
        let push_constant = MaterialPushConstant {
            base_color_factor: material.base_color_factor,
        };
        unsafe {
            self.device.cmd_push_constants(
                self.command_buffer,
                self.pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                byte_slice_from(&push_constant),
            );
        }
    }

    fn begin_conditional(&mut self, offset: u64) {
        if let Some(conditional_rendering) = self.conditional_rendering {
            conditional_rendering.begin(self.command_buffer, self.visibility_buffer, offset);
        }
    }

    fn end_conditional(&mut self) {
        if let Some(conditional_rendering) = self.conditional_rendering {
            conditional_rendering.end(self.command_buffer);
        }
    }

    fn draw_indexed(&mut self, primitive: &Primitive) {
        if primitive.index_count == 0 {
            return;
        }
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                primitive.index_count,
                1,
                primitive.first_index,
                0,
                0,
            );
        }
    }
}
