use crate::{
    core::VulkanContext,
    render::GraphicsPipeline,
    resource::{DescriptorSetLayout, PipelineLayout, Shader},
};
use ash::vk;
use nalgebra_glm as glm;
use std::{error::Error, mem, path::Path, sync::Arc};

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PushConstantBlock {
    pub orthographic: glm::Mat4,
}

impl PushConstantBlock {
    /// Maps imgui display coordinates onto Vulkan clip space.
    pub fn new(display_position: [f32; 2], display_size: [f32; 2]) -> Self {
        let left = display_position[0];
        let right = display_position[0] + display_size[0];
        let top = display_position[1];
        let bottom = display_position[1] + display_size[1];
        Self {
            orthographic: glm::ortho_zo(left, right, top, bottom, -1.0, 1.0),
        }
    }
}

/// The font sampler layout and the pipeline layout of the overlay.
pub struct GuiLayouts {
    pub pipeline_layout: PipelineLayout,
    pub descriptor_set_layout: DescriptorSetLayout,
}

impl GuiLayouts {
    pub fn new(context: Arc<VulkanContext>) -> Result<Self> {
        let descriptor_set_layout = DescriptorSetLayout::single_binding(
            context.clone(),
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        )?;

        let push_constant_range = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .size(mem::size_of::<PushConstantBlock>() as u32)
            .build();

        let pipeline_layout = PipelineLayout::new(
            context,
            &[descriptor_set_layout.layout()],
            &[push_constant_range],
        )?;

        Ok(Self {
            pipeline_layout,
            descriptor_set_layout,
        })
    }
}

pub struct GuiPipeline {
    pub pipeline: GraphicsPipeline,
}

impl GuiPipeline {
    pub fn new(
        context: Arc<VulkanContext>,
        render_pass: vk::RenderPass,
        layouts: &GuiLayouts,
        shader_directory: &Path,
    ) -> Result<Self> {
        let vertex_shader = Shader::from_file(
            context.clone(),
            shader_directory.join("gui.vert.spv"),
            vk::ShaderStageFlags::VERTEX,
        )?;
        let fragment_shader = Shader::from_file(
            context.clone(),
            shader_directory.join("gui.frag.spv"),
            vk::ShaderStageFlags::FRAGMENT,
        )?;
        let shader_state_info = [vertex_shader.state_info(), fragment_shader.state_info()];

        let descriptions = Self::create_vertex_input_descriptions();
        let attributes = Self::create_vertex_attributes();
        let vertex_input_create_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&descriptions)
            .vertex_attribute_descriptions(&attributes)
            .build();

        let input_assembly_create_info = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
            .build();

        let rasterizer_create_info = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .build();

        let multisampling_create_info = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(context.max_usable_samples())
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
            .build();

        // The overlay always draws on top of the scene
        let depth_stencil_info = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(vk::CompareOp::ALWAYS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .front(Default::default())
            .back(Default::default())
            .build();

        let color_blend_attachments = Self::create_color_blend_attachments();
        let color_blending_info = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0])
            .build();

        let mut viewport_create_info = vk::PipelineViewportStateCreateInfo::default();
        viewport_create_info.viewport_count = 1;
        viewport_create_info.scissor_count = 1;

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state_create_info = vk::PipelineDynamicStateCreateInfo::builder()
            .flags(vk::PipelineDynamicStateCreateFlags::empty())
            .dynamic_states(&dynamic_states)
            .build();

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_state_info)
            .vertex_input_state(&vertex_input_create_info)
            .input_assembly_state(&input_assembly_create_info)
            .rasterization_state(&rasterizer_create_info)
            .multisample_state(&multisampling_create_info)
            .depth_stencil_state(&depth_stencil_info)
            .color_blend_state(&color_blending_info)
            .viewport_state(&viewport_create_info)
            .dynamic_state(&dynamic_state_create_info)
            .layout(layouts.pipeline_layout.layout())
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipeline = GraphicsPipeline::new(context, pipeline_create_info)?;

        Ok(Self { pipeline })
    }

    pub fn create_vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
        let float_size = mem::size_of::<f32>();
        let position_description = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(0)
            .build();

        let tex_coord_description = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32_SFLOAT)
            .offset((2 * float_size) as _)
            .build();

        let color_description = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(2)
            .format(vk::Format::R8G8B8A8_UNORM)
            .offset((4 * float_size) as _)
            .build();

        [
            position_description,
            tex_coord_description,
            color_description,
        ]
    }

    pub fn create_vertex_input_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        let vertex_input_binding_description = vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(mem::size_of::<imgui::DrawVert>() as _)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build();
        [vertex_input_binding_description]
    }

    pub fn create_color_blend_attachments() -> [vk::PipelineColorBlendAttachmentState; 1] {
        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build();
        [color_blend_attachment]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imgui_vertices_are_twenty_bytes() {
        let descriptions = GuiPipeline::create_vertex_input_descriptions();
        assert_eq!(descriptions[0].stride, 20);
    }

    #[test]
    fn orthographic_projection_maps_display_corners() {
        let block = PushConstantBlock::new([0.0, 0.0], [800.0, 600.0]);
        let top_left = block.orthographic * glm::vec4(0.0, 0.0, 0.0, 1.0);
        let bottom_right = block.orthographic * glm::vec4(800.0, 600.0, 0.0, 1.0);

        assert!((top_left.x + 1.0).abs() < 1e-5);
        assert!((top_left.y + 1.0).abs() < 1e-5);
        assert!((bottom_right.x - 1.0).abs() < 1e-5);
        assert!((bottom_right.y - 1.0).abs() < 1e-5);
    }
}
