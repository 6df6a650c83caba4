pub use self::{
    gui::{GuiLayouts, GuiPipeline, PushConstantBlock},
    scene::{MaterialPushConstant, MeshUniform, SceneLayouts, ScenePipeline, SceneUniform},
};

pub mod gui;
pub mod scene;
