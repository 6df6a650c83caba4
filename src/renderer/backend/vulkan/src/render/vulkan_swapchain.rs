use crate::{
    core::{ImageView, Swapchain, SwapchainProperties, VulkanContext},
    render::{Framebuffer, RenderPass},
    resource::Texture,
};
use ash::vk;
use std::{error::Error, sync::Arc};

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

/// Multisampled color target that resolves into the swapchain image.
pub struct ColorTarget {
    pub view: ImageView,
    pub texture: Texture,
}

/// The swapchain together with everything sized after it. Rebuilt as a
/// whole whenever the surface changes.
pub struct VulkanSwapchain {
    pub framebuffers: Vec<Framebuffer>,
    pub depth_texture_view: ImageView,
    pub depth_texture: Texture,
    pub color_target: Option<ColorTarget>,
    pub render_pass: RenderPass,
    pub swapchain: Swapchain,
}

impl VulkanSwapchain {
    pub fn new(context: Arc<VulkanContext>, dimensions: [u32; 2]) -> Result<Self> {
        let depth_format = context.determine_depth_format(
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let swapchain = Swapchain::new(context.clone(), dimensions)?;
        let samples = context.max_usable_samples();
        let render_pass = Self::create_render_pass(
            context.clone(),
            swapchain.properties(),
            depth_format,
            samples,
        )?;

        let swapchain_extent = swapchain.properties().extent;

        let depth_texture = Self::create_attachment_texture(
            context.clone(),
            swapchain_extent,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let depth_texture_view = ImageView::new_2d(
            context.clone(),
            depth_texture.image(),
            depth_format,
            vk::ImageAspectFlags::DEPTH,
        )?;

        let color_target = if samples == vk::SampleCountFlags::TYPE_1 {
            None
        } else {
            let color_format = swapchain.properties().format.format;
            let texture = Self::create_attachment_texture(
                context.clone(),
                swapchain_extent,
                color_format,
                vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            )?;
            let view = ImageView::new_2d(
                context.clone(),
                texture.image(),
                color_format,
                vk::ImageAspectFlags::COLOR,
            )?;
            Some(ColorTarget { view, texture })
        };

        let framebuffers = Self::create_framebuffers(
            context,
            &swapchain,
            color_target.as_ref(),
            &depth_texture_view,
            &render_pass,
        )?;

        log::debug!(
            "Created swapchain of {}x{} with {} images",
            swapchain_extent.width,
            swapchain_extent.height,
            swapchain.images().len()
        );

        Ok(VulkanSwapchain {
            framebuffers,
            depth_texture_view,
            depth_texture,
            color_target,
            render_pass,
            swapchain,
        })
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.images().len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.properties().extent
    }

    /// With more than one sample the scene renders into a transient color
    /// target that resolves into the swapchain image. Otherwise it renders
    /// into the swapchain image directly.
    pub fn create_render_pass(
        context: Arc<VulkanContext>,
        swapchain_properties: &SwapchainProperties,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Result<RenderPass> {
        let multisampled = samples != vk::SampleCountFlags::TYPE_1;
        let color_format = swapchain_properties.format.format;

        let color_attachment_description = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(if multisampled {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::PRESENT_SRC_KHR
            })
            .build();

        let depth_attachment_description = vk::AttachmentDescription::builder()
            .format(depth_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let resolve_attachment_description = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .build();

        let mut attachment_descriptions =
            vec![color_attachment_description, depth_attachment_description];
        if multisampled {
            attachment_descriptions.push(resolve_attachment_description);
        }

        let color_attachment_reference = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let color_attachment_references = [color_attachment_reference];

        let depth_attachment_reference = vk::AttachmentReference::builder()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let resolve_attachment_reference = vk::AttachmentReference::builder()
            .attachment(2)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let resolve_attachment_references = [resolve_attachment_reference];

        let mut subpass_description = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_references)
            .depth_stencil_attachment(&depth_attachment_reference);
        if multisampled {
            subpass_description =
                subpass_description.resolve_attachments(&resolve_attachment_references);
        }
        let subpass_descriptions = [subpass_description.build()];

        let subpass_dependency = vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ
                    | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .build();
        let subpass_dependencies = [subpass_dependency];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachment_descriptions)
            .subpasses(&subpass_descriptions)
            .dependencies(&subpass_dependencies)
            .build();

        Ok(RenderPass::new(context, &create_info)?)
    }

    fn create_framebuffers(
        context: Arc<VulkanContext>,
        swapchain: &Swapchain,
        color_target: Option<&ColorTarget>,
        depth_texture_view: &ImageView,
        render_pass: &RenderPass,
    ) -> Result<Vec<Framebuffer>> {
        let extent = swapchain.properties().extent;
        let mut framebuffers = Vec::with_capacity(swapchain.image_views().len());
        for view in swapchain.image_views().iter() {
            let attachments = match color_target {
                Some(color_target) => vec![
                    color_target.view.view(),
                    depth_texture_view.view(),
                    view.view(),
                ],
                None => vec![view.view(), depth_texture_view.view()],
            };
            let create_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass.render_pass())
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1)
                .build();
            framebuffers.push(Framebuffer::new(context.clone(), create_info)?);
        }
        Ok(framebuffers)
    }

    fn create_attachment_texture(
        context: Arc<VulkanContext>,
        swapchain_extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> Result<Texture> {
        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: swapchain_extent.width,
                height: swapchain_extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(context.max_usable_samples())
            .flags(vk::ImageCreateFlags::empty())
            .build();

        let image_allocation_create_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::GpuOnly,
            ..Default::default()
        };
        Ok(Texture::new(
            context,
            &image_allocation_create_info,
            &image_create_info,
        )?)
    }
}
