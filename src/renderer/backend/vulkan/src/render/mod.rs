pub use self::{
    conditional::ConditionalRendering,
    framebuffer::Framebuffer,
    pipeline::GraphicsPipeline,
    recorder::CommandBufferRecorder,
    renderer::{Renderer, RendererSettings},
    renderpass::RenderPass,
    vulkan_swapchain::VulkanSwapchain,
};

pub mod conditional;
pub mod framebuffer;
pub mod pipeline;
pub mod recorder;
pub mod renderer;
pub mod renderpass;
pub mod vulkan_swapchain;
