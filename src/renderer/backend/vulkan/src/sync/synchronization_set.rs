use crate::{
    core::VulkanContext,
    sync::{Fence, Semaphore},
};
use ash::vk;
use std::sync::Arc;

pub trait SynchronizationSetConstants {
    // The maximum number of frames that can be rendered simultaneously
    const MAX_FRAMES_IN_FLIGHT: usize;
}

impl SynchronizationSetConstants for SynchronizationSet {
    const MAX_FRAMES_IN_FLIGHT: usize = 2;
}

/// Per-frame semaphores and fences, plus the fence last submitted for each
/// swapchain image so that an image's command buffers are never re-recorded
/// while the GPU still reads them.
pub struct SynchronizationSet {
    image_available_semaphores: Vec<Semaphore>,
    render_finished_semaphores: Vec<Semaphore>,
    in_flight_fences: Vec<Fence>,
    images_in_flight: Vec<vk::Fence>,
}

impl SynchronizationSet {
    pub fn new(
        context: Arc<VulkanContext>,
        number_of_images: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut image_available_semaphores = Vec::new();
        let mut render_finished_semaphores = Vec::new();
        let mut in_flight_fences = Vec::new();
        for _ in 0..SynchronizationSet::MAX_FRAMES_IN_FLIGHT {
            let image_available_semaphore = Semaphore::new(context.clone())?;
            image_available_semaphores.push(image_available_semaphore);

            let render_finished_semaphore = Semaphore::new(context.clone())?;
            render_finished_semaphores.push(render_finished_semaphore);

            let in_flight_fence = Fence::new(context.clone(), vk::FenceCreateFlags::SIGNALED)?;
            in_flight_fences.push(in_flight_fence);
        }

        Ok(SynchronizationSet {
            image_available_semaphores,
            render_finished_semaphores,
            in_flight_fences,
            images_in_flight: vec![vk::Fence::null(); number_of_images],
        })
    }

    pub fn image_available(&self, frame: usize) -> vk::Semaphore {
        self.image_available_semaphores[frame].semaphore()
    }

    pub fn render_finished(&self, frame: usize) -> vk::Semaphore {
        self.render_finished_semaphores[frame].semaphore()
    }

    pub fn in_flight(&self, frame: usize) -> vk::Fence {
        self.in_flight_fences[frame].fence()
    }

    /// The fence of the frame that last rendered to `image_index`, if any.
    pub fn image_in_flight(&self, image_index: usize) -> Option<vk::Fence> {
        let fence = self.images_in_flight[image_index];
        if fence == vk::Fence::null() {
            None
        } else {
            Some(fence)
        }
    }

    pub fn set_image_in_flight(&mut self, image_index: usize, frame: usize) {
        self.images_in_flight[image_index] = self.in_flight(frame);
    }

    /// Forgets image ownership after the swapchain has been rebuilt.
    pub fn reset_images_in_flight(&mut self, number_of_images: usize) {
        self.images_in_flight = vec![vk::Fence::null(); number_of_images];
    }

    pub fn next_frame(frame: usize) -> usize {
        (frame + 1) % Self::MAX_FRAMES_IN_FLIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cycle_through_every_slot() {
        let mut frame = 0;
        let mut visited = Vec::new();
        for _ in 0..(SynchronizationSet::MAX_FRAMES_IN_FLIGHT * 2) {
            visited.push(frame);
            frame = SynchronizationSet::next_frame(frame);
        }
        assert_eq!(visited, vec![0, 1, 0, 1]);
    }
}
