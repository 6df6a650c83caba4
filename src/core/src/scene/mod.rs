mod draw;
mod loader;
mod mesh;
mod model;
mod node;

pub use self::{
    draw::{record_scene, ConditionalScope, DrawRecorder, VisibilityTest},
    loader::{Error, LoadOptions},
    mesh::{Dimensions, Material, Mesh, Primitive, Vertex},
    model::{Model, SceneGraph, TransformSink},
    node::{Node, Transform},
};

#[cfg(test)]
pub(crate) mod fixtures;
