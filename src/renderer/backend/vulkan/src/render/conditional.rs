use crate::core::VulkanContext;
use ash::{
    version::{DeviceV1_0, InstanceV1_0},
    vk,
};
use std::{ffi::CStr, mem};

/// Device-level entry points of `VK_EXT_conditional_rendering`.
pub struct ConditionalRendering {
    functions: vk::ExtConditionalRenderingFn,
}

impl ConditionalRendering {
    /// Loads the extension's commands. Returns `None` when the extension was not enabled
    /// or the driver does not expose its commands.
    pub fn new(context: &VulkanContext) -> Option<Self> {
        if !context.conditional_rendering_supported() {
            return None;
        }

        let instance = context.instance();
        let device = context.logical_device().logical_device().handle();

        let begin_name = CStr::from_bytes_with_nul(b"vkCmdBeginConditionalRenderingEXT\0").ok()?;
        let begin_address = unsafe { instance.get_device_proc_addr(device, begin_name.as_ptr()) };
        if begin_address.is_none() {
            log::warn!("Failed to resolve vkCmdBeginConditionalRenderingEXT");
            return None;
        }

        let functions = vk::ExtConditionalRenderingFn::load(|name| unsafe {
            mem::transmute(instance.get_device_proc_addr(device, name.as_ptr()))
        });

        log::info!("Conditional rendering enabled");
        Some(Self { functions })
    }

    /// Opens a scope that discards its draws when the 32-bit value at `offset` is zero.
    pub fn begin(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        let begin_info = vk::ConditionalRenderingBeginInfoEXT::builder()
            .buffer(buffer)
            .offset(offset)
            .build();
        unsafe {
            self.functions
                .cmd_begin_conditional_rendering_ext(command_buffer, &begin_info);
        }
    }

    pub fn end(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.functions
                .cmd_end_conditional_rendering_ext(command_buffer);
        }
    }
}
