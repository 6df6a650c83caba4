pub use self::{gpu_model::GpuModel, visibility_buffer::VisibilityBuffer};

pub mod gpu_model;
pub mod visibility_buffer;
