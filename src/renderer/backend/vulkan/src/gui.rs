use crate::{
    core::{ImageView, VulkanContext},
    pipelines::{GuiLayouts, GuiPipeline, PushConstantBlock},
    resource::{Buffer, CommandPool, DescriptorPool, Sampler, Texture, TextureDescription},
};
use ash::{version::DeviceV1_0, vk};
use imgui::{DrawCmd, DrawCmdParams, DrawData, DrawIdx, DrawVert};
use std::{error::Error, mem, path::Path, sync::Arc};
use voortman3d_core::byte_slice_from;

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

struct GeometryBuffers {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
}

/// Draws imgui's draw data with a single font texture.
pub struct GuiRenderer {
    frame_buffers: Vec<Option<GeometryBuffers>>,
    pipeline: Option<GuiPipeline>,
    descriptor_set: vk::DescriptorSet,
    _descriptor_pool: DescriptorPool,
    layouts: GuiLayouts,
    _sampler: Sampler,
    _font_view: ImageView,
    _font_texture: Texture,
    context: Arc<VulkanContext>,
}

impl GuiRenderer {
    pub fn new(
        context: Arc<VulkanContext>,
        command_pool: &CommandPool,
        imgui: &mut imgui::Context,
        render_pass: vk::RenderPass,
        shader_directory: &Path,
        image_count: usize,
    ) -> Result<Self> {
        let description = {
            let mut fonts = imgui.fonts();
            let atlas = fonts.build_rgba32_texture();
            TextureDescription::from_rgba(atlas.width, atlas.height, atlas.data)
        };

        let font_texture = Texture::from_description(context.clone(), command_pool, &description)?;
        let font_view = ImageView::new_2d(
            context.clone(),
            font_texture.image(),
            description.format,
            vk::ImageAspectFlags::COLOR,
        )?;
        let sampler = Sampler::linear_clamped(context.clone())?;

        let layouts = GuiLayouts::new(context.clone())?;

        let pool_size = vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .build();
        let pool_sizes = [pool_size];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(1)
            .build();
        let descriptor_pool = DescriptorPool::new(context.clone(), pool_info)?;
        let descriptor_set = descriptor_pool
            .allocate_descriptor_sets(layouts.descriptor_set_layout.layout(), 1)?
            .remove(0);

        let image_info = vk::DescriptorImageInfo::builder()
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_view(font_view.view())
            .sampler(sampler.sampler())
            .build();
        let image_infos = [image_info];

        let sampler_descriptor_write = vk::WriteDescriptorSet::builder()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos)
            .build();

        unsafe {
            context
                .logical_device()
                .logical_device()
                .update_descriptor_sets(&[sampler_descriptor_write], &[])
        }

        let mut renderer = Self {
            frame_buffers: Vec::new(),
            pipeline: None,
            descriptor_set,
            _descriptor_pool: descriptor_pool,
            layouts,
            _sampler: sampler,
            _font_view: font_view,
            _font_texture: font_texture,
            context,
        };
        renderer.recreate_pipeline(render_pass, shader_directory, image_count)?;
        Ok(renderer)
    }

    /// Rebuilds the pipeline against a new render pass. Geometry buffers
    /// are dropped and grown again on demand.
    pub fn recreate_pipeline(
        &mut self,
        render_pass: vk::RenderPass,
        shader_directory: &Path,
        image_count: usize,
    ) -> Result<()> {
        self.pipeline = None;
        self.pipeline = Some(GuiPipeline::new(
            self.context.clone(),
            render_pass,
            &self.layouts,
            shader_directory,
        )?);
        self.frame_buffers = (0..image_count).map(|_| None).collect();
        Ok(())
    }

    /// Records the overlay into a command buffer that is already inside the render pass.
    pub fn record(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: usize,
        draw_data: &DrawData,
    ) -> Result<()> {
        if draw_data.total_vtx_count <= 0 || draw_data.total_idx_count <= 0 {
            return Ok(());
        }

        let framebuffer_width = draw_data.display_size[0] * draw_data.framebuffer_scale[0];
        let framebuffer_height = draw_data.display_size[1] * draw_data.framebuffer_scale[1];
        if framebuffer_width <= 0.0 || framebuffer_height <= 0.0 {
            return Ok(());
        }

        let mut vertices: Vec<DrawVert> = Vec::with_capacity(draw_data.total_vtx_count as usize);
        let mut indices: Vec<DrawIdx> = Vec::with_capacity(draw_data.total_idx_count as usize);
        for draw_list in draw_data.draw_lists() {
            vertices.extend_from_slice(draw_list.vtx_buffer());
            indices.extend_from_slice(draw_list.idx_buffer());
        }

        self.ensure_buffers(
            image_index,
            mem::size_of_val(vertices.as_slice()) as _,
            mem::size_of_val(indices.as_slice()) as _,
        )?;

        let (vertex_buffer, index_buffer) = match self.frame_buffers[image_index].as_ref() {
            Some(buffers) => (&buffers.vertex_buffer, &buffers.index_buffer),
            None => return Ok(()),
        };
        vertex_buffer.upload_to_buffer(&vertices, 0);
        index_buffer.upload_to_buffer(&indices, 0);

        let pipeline = match self.pipeline.as_ref() {
            Some(pipeline) => pipeline,
            None => return Ok(()),
        };

        let device = self.context.logical_device().logical_device();
        let pipeline_layout = self.layouts.pipeline_layout.layout();

        pipeline.pipeline.bind(device, command_buffer);

        let push_constants =
            PushConstantBlock::new(draw_data.display_pos, draw_data.display_size);

        unsafe {
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer.buffer()], &[0]);
            device.cmd_bind_index_buffer(
                command_buffer,
                index_buffer.buffer(),
                0,
                vk::IndexType::UINT16,
            );

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: framebuffer_width,
                height: framebuffer_height,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);

            device.cmd_push_constants(
                command_buffer,
                pipeline_layout,
                vk::ShaderStageFlags::VERTEX,
                0,
                byte_slice_from(&push_constants),
            );
        }

        let mut index_offset = 0;
        let mut vertex_offset = 0;
        for draw_list in draw_data.draw_lists() {
            for command in draw_list.commands() {
                if let DrawCmd::Elements {
                    count,
                    cmd_params: DrawCmdParams { clip_rect, .. },
                } = command
                {
                    if let Some(scissor) = scissor_from_clip_rect(
                        clip_rect,
                        draw_data.display_pos,
                        draw_data.framebuffer_scale,
                    ) {
                        unsafe {
                            device.cmd_set_scissor(command_buffer, 0, &[scissor]);
                            device.cmd_draw_indexed(
                                command_buffer,
                                count as _,
                                1,
                                index_offset,
                                vertex_offset,
                                0,
                            );
                        }
                    }
                    index_offset += count as u32;
                }
            }
            vertex_offset += draw_list.vtx_buffer().len() as i32;
        }

        Ok(())
    }

    fn ensure_buffers(
        &mut self,
        image_index: usize,
        vertex_size: vk::DeviceSize,
        index_size: vk::DeviceSize,
    ) -> Result<()> {
        if image_index >= self.frame_buffers.len() {
            self.frame_buffers.resize_with(image_index + 1, || None);
        }

        let large_enough = self.frame_buffers[image_index]
            .as_ref()
            .map_or(false, |buffers| {
                buffers.vertex_buffer.size() >= vertex_size
                    && buffers.index_buffer.size() >= index_size
            });
        if large_enough {
            return Ok(());
        }

        // Grow with headroom
        let vertex_buffer = Buffer::new_mapped_basic(
            self.context.clone(),
            vertex_size.next_power_of_two(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = Buffer::new_mapped_basic(
            self.context.clone(),
            index_size.next_power_of_two(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        self.frame_buffers[image_index] = Some(GeometryBuffers {
            vertex_buffer,
            index_buffer,
        });
        Ok(())
    }
}

/// Converts an imgui clip rectangle to a framebuffer scissor, or `None` when it is empty.
fn scissor_from_clip_rect(
    clip_rect: [f32; 4],
    display_position: [f32; 2],
    framebuffer_scale: [f32; 2],
) -> Option<vk::Rect2D> {
    let min_x = ((clip_rect[0] - display_position[0]) * framebuffer_scale[0]).max(0.0);
    let min_y = ((clip_rect[1] - display_position[1]) * framebuffer_scale[1]).max(0.0);
    let max_x = (clip_rect[2] - display_position[0]) * framebuffer_scale[0];
    let max_y = (clip_rect[3] - display_position[1]) * framebuffer_scale[1];

    if max_x <= min_x || max_y <= min_y {
        return None;
    }

    Some(vk::Rect2D {
        offset: vk::Offset2D {
            x: min_x as i32,
            y: min_y as i32,
        },
        extent: vk::Extent2D {
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scissor_is_clamped_to_the_framebuffer_origin() {
        let scissor = scissor_from_clip_rect([-10.0, 5.0, 100.0, 50.0], [0.0, 0.0], [1.0, 1.0])
            .expect("non-empty clip rect");
        assert_eq!(scissor.offset.x, 0);
        assert_eq!(scissor.offset.y, 5);
        assert_eq!(scissor.extent.width, 100);
        assert_eq!(scissor.extent.height, 45);
    }

    #[test]
    fn scissor_follows_framebuffer_scale() {
        let scissor = scissor_from_clip_rect([10.0, 10.0, 20.0, 30.0], [0.0, 0.0], [2.0, 2.0])
            .expect("non-empty clip rect");
        assert_eq!(scissor.offset.x, 20);
        assert_eq!(scissor.extent.width, 20);
        assert_eq!(scissor.extent.height, 40);
    }

    #[test]
    fn empty_clip_rects_are_skipped() {
        assert!(scissor_from_clip_rect([10.0, 10.0, 10.0, 30.0], [0.0, 0.0], [1.0, 1.0]).is_none());
        assert!(scissor_from_clip_rect([-20.0, 0.0, -5.0, 30.0], [0.0, 0.0], [1.0, 1.0]).is_none());
    }
}
