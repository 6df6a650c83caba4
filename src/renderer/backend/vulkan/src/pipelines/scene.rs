use crate::{
    core::VulkanContext,
    render::GraphicsPipeline,
    resource::{DescriptorSetLayout, PipelineLayout, Shader},
};
use ash::vk;
use nalgebra_glm as glm;
use std::{error::Error, mem, path::Path, sync::Arc};
use voortman3d_core::scene::Vertex;

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

/// Set 0, shared by every draw of a swapchain image.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SceneUniform {
    pub projection: glm::Mat4,
    pub view: glm::Mat4,
    pub model: glm::Mat4,
}

/// Set 1, the world matrix of one mesh's node. All meshes share one
/// dynamic uniform buffer, addressed by `Mesh::id`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MeshUniform {
    pub matrix: glm::Mat4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MaterialPushConstant {
    pub base_color_factor: glm::Vec4,
}

/// Descriptor and pipeline layouts of the scene pipelines. These outlive
/// swapchain rebuilds so descriptor sets stay valid across them.
pub struct SceneLayouts {
    pub pipeline_layout: PipelineLayout,
    pub mesh: DescriptorSetLayout,
    pub global: DescriptorSetLayout,
}

impl SceneLayouts {
    pub fn new(context: Arc<VulkanContext>) -> Result<Self> {
        let global = DescriptorSetLayout::single_binding(
            context.clone(),
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX,
        )?;

        let mesh = DescriptorSetLayout::single_binding(
            context.clone(),
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            vk::ShaderStageFlags::VERTEX,
        )?;

        let push_constant_range = vk::PushConstantRange::builder()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .size(mem::size_of::<MaterialPushConstant>() as u32)
            .build();

        let pipeline_layout = PipelineLayout::new(
            context,
            &[global.layout(), mesh.layout()],
            &[push_constant_range],
        )?;

        Ok(Self {
            pipeline_layout,
            mesh,
            global,
        })
    }
}

pub struct ScenePipeline {
    solid: GraphicsPipeline,
    wireframe: Option<GraphicsPipeline>,
}

impl ScenePipeline {
    pub fn new(
        context: Arc<VulkanContext>,
        render_pass: vk::RenderPass,
        layouts: &SceneLayouts,
        shader_directory: &Path,
    ) -> Result<Self> {
        let vertex_shader = Shader::from_file(
            context.clone(),
            shader_directory.join("model.vert.spv"),
            vk::ShaderStageFlags::VERTEX,
        )?;
        let fragment_shader = Shader::from_file(
            context.clone(),
            shader_directory.join("model.frag.spv"),
            vk::ShaderStageFlags::FRAGMENT,
        )?;
        let shader_state_info = [vertex_shader.state_info(), fragment_shader.state_info()];

        let solid = Self::create_pipeline(
            context.clone(),
            render_pass,
            layouts,
            &shader_state_info,
            vk::PolygonMode::FILL,
        )?;

        let wireframe = if context.wireframe_supported() {
            Some(Self::create_pipeline(
                context,
                render_pass,
                layouts,
                &shader_state_info,
                vk::PolygonMode::LINE,
            )?)
        } else {
            None
        };

        Ok(Self { solid, wireframe })
    }

    /// The wireframe pipeline when requested and available, the solid one otherwise.
    pub fn pipeline(&self, wireframe: bool) -> &GraphicsPipeline {
        match (&self.wireframe, wireframe) {
            (Some(pipeline), true) => pipeline,
            _ => &self.solid,
        }
    }

    fn create_pipeline(
        context: Arc<VulkanContext>,
        render_pass: vk::RenderPass,
        layouts: &SceneLayouts,
        shader_state_info: &[vk::PipelineShaderStageCreateInfo],
        polygon_mode: vk::PolygonMode,
    ) -> Result<GraphicsPipeline> {
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
            .polygon_mode(polygon_mode)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false)
            .build();

        let multisampling_create_info = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(context.sample_rate_shading_supported())
            .rasterization_samples(context.max_usable_samples())
            .min_sample_shading(0.2)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
            .build();

        let depth_stencil_info = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false)
            .front(Default::default())
            .back(Default::default())
            .build();

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false)
            .build();
        let color_blend_attachments = [color_blend_attachment];
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
            .dynamic_states(&dynamic_states)
            .build();

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(shader_state_info)
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

        Ok(GraphicsPipeline::new(context, pipeline_create_info)?)
    }

    pub fn create_vertex_input_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        let vertex_input_binding_description = vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(mem::size_of::<Vertex>() as _)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build();
        [vertex_input_binding_description]
    }

    pub fn create_vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
        let float_size = mem::size_of::<f32>();
        let position_description = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)
            .build();

        let normal_description = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(1)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset((3 * float_size) as _)
            .build();

        let color_description = vk::VertexInputAttributeDescription::builder()
            .binding(0)
            .location(2)
            .format(vk::Format::R32G32B32A32_SFLOAT)
            .offset((6 * float_size) as _)
            .build();

        [position_description, normal_description, color_description]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_vertex_struct() {
        let descriptions = ScenePipeline::create_vertex_input_descriptions();
        assert_eq!(descriptions[0].stride as usize, mem::size_of::<Vertex>());

        let attributes = ScenePipeline::create_vertex_attributes();
        let offsets = attributes
            .iter()
            .map(|attribute| attribute.offset)
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(mem::size_of::<Vertex>(), 40);
    }

    #[test]
    fn uniform_blocks_match_std140_sizes() {
        assert_eq!(mem::size_of::<SceneUniform>(), 3 * 64);
        assert_eq!(mem::size_of::<MeshUniform>(), 64);
        assert_eq!(mem::size_of::<MaterialPushConstant>(), 16);
    }
}
