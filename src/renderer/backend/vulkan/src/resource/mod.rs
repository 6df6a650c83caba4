pub use self::{
    buffer::Buffer,
    command_pool::CommandPool,
    descriptor_pool::DescriptorPool,
    descriptor_set_layout::DescriptorSetLayout,
    pipeline_layout::PipelineLayout,
    sampler::Sampler,
    shader::Shader,
    texture::{Dimension, Texture, TextureDescription},
};

pub mod buffer;
pub mod command_pool;
pub mod descriptor_pool;
pub mod descriptor_set_layout;
pub mod pipeline_layout;
pub mod sampler;
pub mod shader;
pub mod texture;
