use crate::scene::{Dimensions, Material, Mesh, Model, Node, Primitive, Transform};
use nalgebra_glm as glm;
use petgraph::graph::NodeIndex;

pub fn assert_matrix_eq(left: &glm::Mat4, right: &glm::Mat4) {
    for (l, r) in left.iter().zip(right.iter()) {
        assert!((l - r).abs() < 1e-5, "{} != {}", left, right);
    }
}

fn unit_mesh(model: &mut Model, name: &str, primitive_count: u32) -> Mesh {
    let id = model.mesh_count;
    model.mesh_count += 1;
    let primitives = (0..primitive_count)
        .map(|primitive| Primitive {
            first_index: (id as u32 * 10 + primitive) * 6,
            index_count: 6,
            first_vertex: 0,
            vertex_count: 4,
            material: 0,
            bounds: Dimensions::new(glm::vec3(-1.0, -1.0, -1.0), glm::vec3(1.0, 1.0, 1.0)),
        })
        .collect();
    Mesh {
        id,
        name: name.to_string(),
        primitives,
    }
}

fn translated(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_decomposed(
        glm::vec3(x, y, z),
        glm::quat_identity(),
        glm::vec3(1.0, 1.0, 1.0),
    )
}

fn push(
    model: &mut Model,
    parent: Option<NodeIndex>,
    name: &str,
    transform: Transform,
    primitives: u32,
) -> NodeIndex {
    let mesh = if primitives > 0 {
        Some(unit_mesh(model, name, primitives))
    } else {
        None
    };
    model.add_node(parent, Node::new(name, transform, mesh))
}

/// base(0) -> column(1) -> blade(2), base(0) -> arm(3, no mesh)
pub fn branching_model() -> Model {
    let mut model = Model::default();
    model.materials.push(Material::default());

    let base = push(&mut model, None, "base", translated(1.0, 0.0, 0.0), 1);
    let column = push(&mut model, Some(base), "column", translated(0.0, 1.0, 0.0), 2);
    let blade_transform = Transform::from_decomposed(
        glm::vec3(0.0, 0.5, 0.25),
        glm::quat_angle_axis(0.5, &glm::vec3(0.0, 0.0, 1.0)),
        glm::vec3(2.0, 1.0, 1.0),
    );
    push(&mut model, Some(column), "blade", blade_transform, 1);
    push(&mut model, Some(base), "arm", translated(0.0, 0.0, 3.0), 0);
    model
}

/// root(0, no mesh) -> a(1, two primitives) -> b(2)
pub fn chain_model() -> Model {
    let mut model = Model::default();
    model.materials.push(Material::default());

    let root = push(&mut model, None, "root", Transform::default(), 0);
    let a = push(&mut model, Some(root), "a", translated(0.0, 1.0, 0.0), 2);
    push(&mut model, Some(a), "b", translated(0.0, 1.0, 0.0), 1);
    model
}
