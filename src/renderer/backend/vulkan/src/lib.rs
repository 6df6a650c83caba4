pub mod core;
pub mod gui;
pub mod model;
pub mod pipelines;
pub mod render;
pub mod resource;
pub mod sync;

pub use crate::render::{Renderer, RendererSettings};
