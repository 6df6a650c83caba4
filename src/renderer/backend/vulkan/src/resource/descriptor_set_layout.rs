use crate::core::VulkanContext;
use ash::{version::DeviceV1_0, vk};
use snafu::{ResultExt, Snafu};
use std::sync::Arc;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    #[snafu(display("Failed to create descriptor set layout: {}", source))]
    DescriptorSetLayoutCreation { source: vk::Result },
}

pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    context: Arc<VulkanContext>,
}

impl DescriptorSetLayout {
    pub fn new(
        context: Arc<VulkanContext>,
        create_info: vk::DescriptorSetLayoutCreateInfo,
    ) -> Result<Self> {
        let layout = unsafe {
            context
                .logical_device()
                .logical_device()
                .create_descriptor_set_layout(&create_info, None)
                .context(DescriptorSetLayoutCreation)?
        };

        Ok(DescriptorSetLayout { layout, context })
    }

    /// A layout holding a single descriptor at binding zero.
    pub fn single_binding(
        context: Arc<VulkanContext>,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let binding = vk::DescriptorSetLayoutBinding::builder()
            .binding(0)
            .descriptor_count(1)
            .descriptor_type(descriptor_type)
            .stage_flags(stage_flags)
            .build();
        let bindings = [binding];

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .bindings(&bindings)
            .build();
        Self::new(context, create_info)
    }

    pub fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
