use crate::{
    core::VulkanContext,
    gui::GuiRenderer,
    model::{GpuModel, VisibilityBuffer},
    pipelines::{SceneLayouts, ScenePipeline, SceneUniform},
    render::{CommandBufferRecorder, ConditionalRendering, VulkanSwapchain},
    resource::{Buffer, CommandPool, DescriptorPool},
    sync::SynchronizationSet,
};
use ash::{version::DeviceV1_0, vk};
use nalgebra_glm as glm;
use std::{error::Error, mem, path::PathBuf, sync::Arc};
use voortman3d_core::{
    camera::Camera,
    scene::{record_scene, ConditionalScope, Model, VisibilityTest},
    visibility::VisibilityMask,
};
use winit::window::Window;

type Result<T, E = Box<dyn Error>> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// Directory holding the compiled `*.spv` shaders.
    pub shader_directory: PathBuf,
    pub conditional_scope: ConditionalScope,
    pub clear_color: [f32; 4],
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            shader_directory: PathBuf::from("assets/shaders"),
            conditional_scope: ConditionalScope::default(),
            clear_color: [0.39, 0.58, 0.93, 1.0],
        }
    }
}

struct LoadedScene {
    visibility_buffer: VisibilityBuffer,
    gpu_model: GpuModel,
    mask: VisibilityMask,
    model: Model,
}

/// Everything owned by one swapchain image.
struct ImageResources {
    global_uniform: Buffer,
    global_descriptor_set: vk::DescriptorSet,
    scene_command_buffer: vk::CommandBuffer,
    gui_command_buffer: vk::CommandBuffer,
    primary_command_buffer: vk::CommandBuffer,
    scene_dirty: bool,
}

pub struct Renderer {
    images: Vec<ImageResources>,
    global_descriptor_pool: Option<DescriptorPool>,
    gui: GuiRenderer,
    scene: LoadedScene,
    scene_pipeline: Option<ScenePipeline>,
    scene_layouts: SceneLayouts,
    conditional_rendering: Option<ConditionalRendering>,
    vulkan_swapchain: Option<VulkanSwapchain>,
    synchronization_set: SynchronizationSet,
    command_pool: CommandPool,
    transient_command_pool: CommandPool,
    settings: RendererSettings,
    scene_uniform: SceneUniform,
    wireframe: bool,
    current_frame: usize,
    context: Arc<VulkanContext>,
}

impl Renderer {
    pub fn new(
        window: &Window,
        imgui: &mut imgui::Context,
        settings: RendererSettings,
    ) -> Result<Self> {
        let context = Arc::new(VulkanContext::new(window)?);

        let command_pool = CommandPool::new(
            context.clone(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let transient_command_pool =
            CommandPool::new(context.clone(), vk::CommandPoolCreateFlags::TRANSIENT)?;

        let window_size = window.inner_size();
        let dimensions = [window_size.width.max(1), window_size.height.max(1)];
        let vulkan_swapchain = VulkanSwapchain::new(context.clone(), dimensions)?;
        let image_count = vulkan_swapchain.image_count();

        let synchronization_set = SynchronizationSet::new(context.clone(), image_count)?;
        let conditional_rendering = ConditionalRendering::new(&context);
        if conditional_rendering.is_none() {
            log::warn!("Hidden nodes will be filtered while recording command buffers");
        }

        let scene_layouts = SceneLayouts::new(context.clone())?;
        let scene_pipeline = ScenePipeline::new(
            context.clone(),
            vulkan_swapchain.render_pass.render_pass(),
            &scene_layouts,
            &settings.shader_directory,
        )?;

        let gui = GuiRenderer::new(
            context.clone(),
            &transient_command_pool,
            imgui,
            vulkan_swapchain.render_pass.render_pass(),
            &settings.shader_directory,
            image_count,
        )?;

        let scene = Self::load_scene(
            context.clone(),
            &transient_command_pool,
            &scene_layouts,
            Model::default(),
        )?;

        let mut renderer = Self {
            images: Vec::new(),
            global_descriptor_pool: None,
            gui,
            scene,
            scene_pipeline: Some(scene_pipeline),
            scene_layouts,
            conditional_rendering,
            vulkan_swapchain: Some(vulkan_swapchain),
            synchronization_set,
            command_pool,
            transient_command_pool,
            settings,
            scene_uniform: SceneUniform {
                projection: glm::Mat4::identity(),
                view: glm::Mat4::identity(),
                model: glm::Mat4::identity(),
            },
            wireframe: false,
            current_frame: 0,
            context,
        };
        renderer.create_image_resources()?;
        Ok(renderer)
    }

    pub fn model(&self) -> &Model {
        &self.scene.model
    }

    pub fn visibility(&self) -> &VisibilityMask {
        &self.scene.mask
    }

    pub fn conditional_rendering_enabled(&self) -> bool {
        self.conditional_rendering.is_some()
    }

    pub fn supports_wireframe(&self) -> bool {
        self.context.wireframe_supported()
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        let wireframe = wireframe && self.supports_wireframe();
        if self.wireframe != wireframe {
            self.wireframe = wireframe;
            self.mark_scene_dirty();
        }
    }

    /// Replaces the scene. The new mask starts fully visible.
    pub fn load_model(&mut self, model: Model) -> Result<()> {
        self.context.wait_idle();
        let scene = Self::load_scene(
            self.context.clone(),
            &self.transient_command_pool,
            &self.scene_layouts,
            model,
        )?;
        self.scene = scene;
        self.scene_uniform.model = glm::translate(
            &glm::Mat4::identity(),
            &self.scene.model.dimensions().min,
        );
        self.mark_scene_dirty();
        Ok(())
    }

    pub fn show_all_nodes(&mut self) {
        self.scene.mask.show_all();
        self.synchronize_visibility();
    }

    pub fn hide_all_nodes(&mut self) {
        self.scene.mask.hide_all();
        self.synchronize_visibility();
    }

    /// Returns false when the index is outside the mask.
    pub fn set_node_visible(&mut self, index: usize, visible: bool) -> bool {
        if !self.scene.mask.set_visible(index, visible) {
            return false;
        }
        self.synchronize_visibility();
        true
    }

    pub fn update_camera(&mut self, camera: &Camera) {
        self.scene_uniform.projection = *camera.perspective();
        self.scene_uniform.view = glm::scale(camera.view(), &glm::vec3(0.1, -0.1, 0.1));
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.vulkan_swapchain
            .as_ref()
            .map_or(1.0, |swapchain| swapchain.swapchain.properties().aspect_ratio())
    }

    pub fn recreate_swapchain(&mut self, dimensions: [u32; 2]) -> Result<()> {
        if dimensions[0] == 0 || dimensions[1] == 0 {
            return Ok(());
        }

        self.context.wait_idle();

        self.free_image_resources();
        self.scene_pipeline = None;
        self.vulkan_swapchain = None;

        let vulkan_swapchain = VulkanSwapchain::new(self.context.clone(), dimensions)?;
        let render_pass = vulkan_swapchain.render_pass.render_pass();
        let image_count = vulkan_swapchain.image_count();

        self.scene_pipeline = Some(ScenePipeline::new(
            self.context.clone(),
            render_pass,
            &self.scene_layouts,
            &self.settings.shader_directory,
        )?);
        self.gui
            .recreate_pipeline(render_pass, &self.settings.shader_directory, image_count)?;
        self.vulkan_swapchain = Some(vulkan_swapchain);
        self.synchronization_set.reset_images_in_flight(image_count);

        self.create_image_resources()
    }

    /// Renders one frame. A zero-sized window renders nothing.
    pub fn render(&mut self, dimensions: [u32; 2], draw_data: &imgui::DrawData) {
        if dimensions[0] == 0 || dimensions[1] == 0 {
            return;
        }

        let frame = self.current_frame;
        let in_flight = self.synchronization_set.in_flight(frame);
        self.context.logical_device().wait_for_fences(&[in_flight]);

        let acquired = match self.vulkan_swapchain.as_ref() {
            Some(vulkan_swapchain) => vulkan_swapchain.swapchain.acquire_next_image(
                self.synchronization_set.image_available(frame),
                vk::Fence::null(),
            ),
            None => return,
        };

        let image_index = match acquired {
            Ok((image_index, _)) => image_index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain(dimensions)
                    .expect("Failed to recreate the swapchain");
                return;
            }
            Err(error) => panic!("Error while acquiring next image. Cause: {}", error),
        };
        let image = image_index as usize;

        if let Some(fence) = self.synchronization_set.image_in_flight(image) {
            self.context.logical_device().wait_for_fences(&[fence]);
        }
        self.synchronization_set.set_image_in_flight(image, frame);

        if self.scene.mask.take_rebuild_request() {
            self.mark_scene_dirty();
        }

        if self.images[image].scene_dirty {
            self.record_scene_commands(image);
            self.images[image].scene_dirty = false;
        }
        self.images[image]
            .global_uniform
            .upload_to_buffer(&[self.scene_uniform], 0);
        self.record_gui_commands(image, draw_data);
        self.record_primary_commands(image);

        self.context.logical_device().reset_fences(&[in_flight]);

        let device = self.context.logical_device().logical_device();
        let wait_semaphores = [self.synchronization_set.image_available(frame)];
        let signal_semaphores = [self.synchronization_set.render_finished(frame)];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.images[image].primary_command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device
                .queue_submit(self.context.graphics_queue(), &[submit_info], in_flight)
                .expect("Failed to submit command buffer to the graphics queue!")
        };

        let presented = match self.vulkan_swapchain.as_ref() {
            Some(vulkan_swapchain) => vulkan_swapchain.swapchain.present_rendered_image(
                &signal_semaphores,
                &[image_index],
                self.context.present_queue(),
            ),
            None => return,
        };

        self.current_frame = SynchronizationSet::next_frame(frame);

        match presented {
            Ok(false) => {}
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain(dimensions)
                    .expect("Failed to recreate the swapchain");
            }
            Err(error) => panic!("Failed to present queue. Cause: {}", error),
        }
    }

    pub fn wait_idle(&self) {
        self.context.wait_idle();
    }

    fn load_scene(
        context: Arc<VulkanContext>,
        command_pool: &CommandPool,
        scene_layouts: &SceneLayouts,
        model: Model,
    ) -> Result<LoadedScene> {
        let gpu_model = GpuModel::new(context.clone(), command_pool, &model, &scene_layouts.mesh)?;
        let mut visibility_buffer = VisibilityBuffer::new(context, model.node_count())?;
        let mut mask = VisibilityMask::new(model.node_count());
        mask.synchronize(&mut visibility_buffer);

        Ok(LoadedScene {
            visibility_buffer,
            gpu_model,
            mask,
            model,
        })
    }

    fn synchronize_visibility(&mut self) {
        let scene = &mut self.scene;
        scene.mask.synchronize(&mut scene.visibility_buffer);
    }

    fn mark_scene_dirty(&mut self) {
        for image in self.images.iter_mut() {
            image.scene_dirty = true;
        }
    }

    fn create_image_resources(&mut self) -> Result<()> {
        let image_count = match self.vulkan_swapchain.as_ref() {
            Some(vulkan_swapchain) => vulkan_swapchain.image_count(),
            None => return Ok(()),
        };

        let pool_size = vk::DescriptorPoolSize::builder()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(image_count as _)
            .build();
        let pool_sizes = [pool_size];
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(image_count as _)
            .build();
        let descriptor_pool = DescriptorPool::new(self.context.clone(), pool_info)?;
        let descriptor_sets = descriptor_pool
            .allocate_descriptor_sets(self.scene_layouts.global.layout(), image_count as _)?;

        let scene_command_buffers = self
            .command_pool
            .allocate_command_buffers(image_count, vk::CommandBufferLevel::SECONDARY)?;
        let gui_command_buffers = self
            .command_pool
            .allocate_command_buffers(image_count, vk::CommandBufferLevel::SECONDARY)?;
        let primary_command_buffers = self
            .command_pool
            .allocate_command_buffers(image_count, vk::CommandBufferLevel::PRIMARY)?;

        let mut images = Vec::with_capacity(image_count);
        for (index, descriptor_set) in descriptor_sets.into_iter().enumerate() {
            let global_uniform = Buffer::new_mapped_basic(
                self.context.clone(),
                mem::size_of::<SceneUniform>() as _,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
            )?;

            let buffer_info = vk::DescriptorBufferInfo::builder()
                .buffer(global_uniform.buffer())
                .offset(0)
                .range(mem::size_of::<SceneUniform>() as _)
                .build();
            let buffer_infos = [buffer_info];

            let descriptor_write = vk::WriteDescriptorSet::builder()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&buffer_infos)
                .build();

            unsafe {
                self.context
                    .logical_device()
                    .logical_device()
                    .update_descriptor_sets(&[descriptor_write], &[])
            }

            images.push(ImageResources {
                global_uniform,
                global_descriptor_set: descriptor_set,
                scene_command_buffer: scene_command_buffers[index],
                gui_command_buffer: gui_command_buffers[index],
                primary_command_buffer: primary_command_buffers[index],
                scene_dirty: true,
            });
        }

        self.images = images;
        self.global_descriptor_pool = Some(descriptor_pool);
        Ok(())
    }

    fn free_image_resources(&mut self) {
        let command_buffers = self
            .images
            .iter()
            .flat_map(|image| {
                vec![
                    image.scene_command_buffer,
                    image.gui_command_buffer,
                    image.primary_command_buffer,
                ]
            })
            .collect::<Vec<_>>();
        self.command_pool.free_command_buffers(&command_buffers);
        self.images.clear();
        self.global_descriptor_pool = None;
    }

    fn begin_secondary(&self, command_buffer: vk::CommandBuffer, image: usize) {
        let vulkan_swapchain = match self.vulkan_swapchain.as_ref() {
            Some(vulkan_swapchain) => vulkan_swapchain,
            None => return,
        };

        let inheritance_info = vk::CommandBufferInheritanceInfo::builder()
            .render_pass(vulkan_swapchain.render_pass.render_pass())
            .subpass(0)
            .framebuffer(vulkan_swapchain.framebuffers[image].framebuffer())
            .build();

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE)
            .inheritance_info(&inheritance_info)
            .build();

        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .begin_command_buffer(command_buffer, &begin_info)
                .expect("Failed to begin a secondary command buffer!")
        };
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.context
                .logical_device()
                .logical_device()
                .end_command_buffer(command_buffer)
                .expect("Failed to end a command buffer!")
        };
    }

    fn record_scene_commands(&self, image: usize) {
        let command_buffer = self.images[image].scene_command_buffer;
        self.begin_secondary(command_buffer, image);

        let device = self.context.logical_device().logical_device();
        self.update_viewport(command_buffer);

        let scene = &self.scene;
        if let Some(scene_pipeline) = self.scene_pipeline.as_ref() {
            if scene.gpu_model.has_geometry() {
                scene_pipeline
                    .pipeline(self.wireframe)
                    .bind(device, command_buffer);
                scene.gpu_model.bind_geometry(device, command_buffer);

                let test = match self.conditional_rendering {
                    Some(_) => VisibilityTest::Device(self.settings.conditional_scope),
                    None => VisibilityTest::Host(&scene.mask),
                };

                let mut recorder = CommandBufferRecorder::new(
                    device,
                    command_buffer,
                    self.scene_layouts.pipeline_layout.layout(),
                    self.images[image].global_descriptor_set,
                    &scene.gpu_model,
                    scene.visibility_buffer.buffer(),
                    self.conditional_rendering.as_ref(),
                );
                record_scene(&scene.model, &test, &mut recorder);
            }
        }

        self.end_command_buffer(command_buffer);
    }

    fn record_gui_commands(&mut self, image: usize, draw_data: &imgui::DrawData) {
        let command_buffer = self.images[image].gui_command_buffer;
        self.begin_secondary(command_buffer, image);
        if let Err(error) = self.gui.record(command_buffer, image, draw_data) {
            log::error!("Failed to record the overlay: {}", error);
        }
        self.end_command_buffer(command_buffer);
    }

    fn record_primary_commands(&self, image: usize) {
        let vulkan_swapchain = match self.vulkan_swapchain.as_ref() {
            Some(vulkan_swapchain) => vulkan_swapchain,
            None => return,
        };
        let device = self.context.logical_device().logical_device();
        let resources = &self.images[image];
        let command_buffer = resources.primary_command_buffer;

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)
            .build();
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .expect("Failed to begin command buffer for the render pass!")
        };

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.settings.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(vulkan_swapchain.render_pass.render_pass())
            .framebuffer(vulkan_swapchain.framebuffers[image].framebuffer())
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vulkan_swapchain.extent(),
            })
            .clear_values(&clear_values)
            .build();

        let secondary_command_buffers = [
            resources.scene_command_buffer,
            resources.gui_command_buffer,
        ];

        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
            );
            device.cmd_execute_commands(command_buffer, &secondary_command_buffers);
            device.cmd_end_render_pass(command_buffer);
        }

        self.end_command_buffer(command_buffer);
    }

    fn update_viewport(&self, command_buffer: vk::CommandBuffer) {
        let extent = match self.vulkan_swapchain.as_ref() {
            Some(vulkan_swapchain) => vulkan_swapchain.extent(),
            None => return,
        };
        let device = self.context.logical_device().logical_device();

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as _,
            height: extent.height as _,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let viewports = [viewport];

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let scissors = [scissor];

        unsafe {
            device.cmd_set_viewport(command_buffer, 0, &viewports);
            device.cmd_set_scissor(command_buffer, 0, &scissors);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.context.wait_idle();
    }
}
