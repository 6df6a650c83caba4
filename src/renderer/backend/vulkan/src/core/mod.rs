pub use self::{
    context::VulkanContext,
    debug_layer::{DebugLayer, LayerName, LayerNameVec},
    image_view::ImageView,
    instance::Instance,
    logical_device::LogicalDevice,
    physical_device::PhysicalDevice,
    queue_family_index_set::QueueFamilyIndexSet,
    surface::Surface,
    swapchain::{Swapchain, SwapchainProperties},
};

pub mod context;
pub mod debug_layer;
pub mod image_view;
pub mod instance;
pub mod logical_device;
pub mod physical_device;
pub mod queue_family_index_set;
pub mod surface;
pub mod swapchain;
