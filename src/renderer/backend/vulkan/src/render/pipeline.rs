use crate::core::VulkanContext;
use ash::{version::DeviceV1_0, vk};
use snafu::Snafu;
use std::sync::Arc;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create graphics pipeline: {}", result))]
    GraphicsPipelineCreation { result: vk::Result },
}

/// A graphics pipeline. The layout it was created with is owned by the caller.
pub struct GraphicsPipeline {
    pipeline: vk::Pipeline,
    context: Arc<VulkanContext>,
}

impl GraphicsPipeline {
    pub fn new(
        context: Arc<VulkanContext>,
        create_info: vk::GraphicsPipelineCreateInfo,
    ) -> Result<Self> {
        let pipeline_create_info_arr = [create_info];
        let pipelines = unsafe {
            context
                .logical_device()
                .logical_device()
                .create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    &pipeline_create_info_arr,
                    None,
                )
                .map_err(|(_, result)| Error::GraphicsPipelineCreation { result })?
        };

        Ok(GraphicsPipeline {
            pipeline: pipelines[0],
            context,
        })
    }

    pub fn bind(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline,
            );
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .destroy_pipeline(self.pipeline, None);
        }
    }
}
