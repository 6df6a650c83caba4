use crate::{
    scene::{Material, Mesh, Model, Primitive},
    visibility::VisibilityMask,
};
use petgraph::graph::NodeIndex;

/// Command sink for scene traversal. The Vulkan backend records into a command
/// buffer; tests record into a list.
pub trait DrawRecorder {
    /// Binds the global descriptor set together with the mesh's own set.
    fn bind_mesh(&mut self, mesh: &Mesh);
    fn push_material(&mut self, material: &Material);
    /// Opens a scope that is skipped when the flag at `offset` is zero.
    fn begin_conditional(&mut self, offset: u64);
    fn end_conditional(&mut self);
    fn draw_indexed(&mut self, primitive: &Primitive);
}

/// Granularity of the device-side visibility test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalScope {
    /// One scope around each primitive's draw.
    Primitive,
    /// One scope around all of a node's draws.
    Node,
}

impl Default for ConditionalScope {
    fn default() -> Self {
        ConditionalScope::Primitive
    }
}

/// Where the visibility flags are evaluated.
pub enum VisibilityTest<'a> {
    /// By the GPU through conditional rendering.
    Device(ConditionalScope),
    /// While recording, when conditional rendering is unavailable.
    Host(&'a VisibilityMask),
}

/// Visits the roots depth first and records every meshed node's primitives.
/// Children are visited whether or not their parent has a mesh or is hidden.
pub fn record_scene<R: DrawRecorder>(model: &Model, test: &VisibilityTest, recorder: &mut R) {
    for root in model.roots.iter() {
        record_node(model, *root, test, recorder);
    }
}

fn record_node<R: DrawRecorder>(
    model: &Model,
    node_index: NodeIndex,
    test: &VisibilityTest,
    recorder: &mut R,
) {
    let node = &model.graph[node_index];
    if let Some(mesh) = node.mesh.as_ref() {
        let offset = VisibilityMask::byte_offset(node.index);
        match test {
            VisibilityTest::Device(ConditionalScope::Primitive) => {
                for primitive in mesh.primitives.iter() {
                    bind_primitive(model, mesh, primitive, recorder);
                    recorder.begin_conditional(offset);
                    recorder.draw_indexed(primitive);
                    recorder.end_conditional();
                }
            }
            VisibilityTest::Device(ConditionalScope::Node) if !mesh.primitives.is_empty() => {
                recorder.begin_conditional(offset);
                for primitive in mesh.primitives.iter() {
                    bind_primitive(model, mesh, primitive, recorder);
                    recorder.draw_indexed(primitive);
                }
                recorder.end_conditional();
            }
            VisibilityTest::Device(ConditionalScope::Node) => {}
            VisibilityTest::Host(mask) => {
                if mask.is_visible(node.index) {
                    for primitive in mesh.primitives.iter() {
                        bind_primitive(model, mesh, primitive, recorder);
                        recorder.draw_indexed(primitive);
                    }
                }
            }
        }
    }

    for child in model.children(node_index.index()) {
        record_node(model, NodeIndex::new(child), test, recorder);
    }
}

fn bind_primitive<R: DrawRecorder>(
    model: &Model,
    mesh: &Mesh,
    primitive: &Primitive,
    recorder: &mut R,
) {
    recorder.bind_mesh(mesh);
    if let Some(material) = model.shading_material(primitive) {
        recorder.push_material(material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{fixtures, LoadOptions};
    use nalgebra_glm as glm;
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        Bind(usize),
        Push(glm::Vec4),
        Begin(u64),
        End,
        Draw { first_index: u32, index_count: u32 },
    }

    #[derive(Default)]
    struct CommandList {
        commands: Vec<Command>,
    }

    impl DrawRecorder for CommandList {
        fn bind_mesh(&mut self, mesh: &Mesh) {
            self.commands.push(Command::Bind(mesh.id));
        }

        fn push_material(&mut self, material: &Material) {
            self.commands.push(Command::Push(material.base_color_factor));
        }

        fn begin_conditional(&mut self, offset: u64) {
            self.commands.push(Command::Begin(offset));
        }

        fn end_conditional(&mut self) {
            self.commands.push(Command::End);
        }

        fn draw_indexed(&mut self, primitive: &Primitive) {
            self.commands.push(Command::Draw {
                first_index: primitive.first_index,
                index_count: primitive.index_count,
            });
        }
    }

    impl CommandList {
        /// Replays the list the way the device would, returning the draws that execute.
        fn execute(&self, device_mask: &[i32]) -> Vec<u32> {
            let mut executed = Vec::new();
            let mut enabled = true;
            for command in self.commands.iter() {
                match command {
                    Command::Begin(offset) => {
                        enabled = device_mask[*offset as usize / std::mem::size_of::<i32>()] != 0
                    }
                    Command::End => enabled = true,
                    Command::Draw { first_index, .. } if enabled => executed.push(*first_index),
                    _ => {}
                }
            }
            executed
        }

        fn draws(&self) -> usize {
            self.commands
                .iter()
                .filter(|command| matches!(command, Command::Draw { .. }))
                .count()
        }
    }

    fn record(model: &Model, test: VisibilityTest) -> CommandList {
        let mut list = CommandList::default();
        record_scene(model, &test, &mut list);
        list
    }

    fn first_index_of(model: &Model, index: usize) -> Vec<u32> {
        model
            .node_from_index(index)
            .and_then(|node| node.mesh.as_ref())
            .map(|mesh| mesh.primitives.iter().map(|p| p.first_index).collect())
            .unwrap_or_default()
    }

    #[test]
    fn each_primitive_gets_its_own_scope_keyed_by_node_index() {
        let model = fixtures::chain_model();
        let list = record(&model, VisibilityTest::Device(ConditionalScope::Primitive));

        let white = glm::vec4(1.0, 1.0, 1.0, 1.0);
        let a = first_index_of(&model, 1);
        let b = first_index_of(&model, 2);
        let expected = vec![
            Command::Bind(0),
            Command::Push(white),
            Command::Begin(4),
            Command::Draw {
                first_index: a[0],
                index_count: 6,
            },
            Command::End,
            Command::Bind(0),
            Command::Push(white),
            Command::Begin(4),
            Command::Draw {
                first_index: a[1],
                index_count: 6,
            },
            Command::End,
            Command::Bind(1),
            Command::Push(white),
            Command::Begin(8),
            Command::Draw {
                first_index: b[0],
                index_count: 6,
            },
            Command::End,
        ];
        assert_eq!(list.commands, expected);
    }

    #[test]
    fn hiding_a_parent_leaves_its_child_drawing() {
        let model = fixtures::chain_model();
        let mut mask = VisibilityMask::new(model.node_count());
        assert_eq!(mask.flags(), &[1, 1, 1]);

        let mut device = Vec::new();
        mask.set_visible(1, false);
        mask.synchronize(&mut device);
        assert!(mask.take_rebuild_request());

        let list = record(&model, VisibilityTest::Device(ConditionalScope::Primitive));
        assert_eq!(list.draws(), 3);
        assert_eq!(list.execute(&device), first_index_of(&model, 2));
    }

    #[test]
    fn node_scope_wraps_all_primitives_once() {
        let model = fixtures::chain_model();
        let list = record(&model, VisibilityTest::Device(ConditionalScope::Node));

        let scopes = list
            .commands
            .iter()
            .filter(|command| matches!(command, Command::Begin(_)))
            .count();
        assert_eq!(scopes, 2);
        assert_eq!(list.draws(), 3);

        let mut device = Vec::new();
        let mut mask = VisibilityMask::new(model.node_count());
        mask.set_visible(1, false);
        mask.synchronize(&mut device);
        assert_eq!(list.execute(&device), first_index_of(&model, 2));
    }

    #[test]
    fn host_test_skips_hidden_nodes_while_recording() {
        let model = fixtures::chain_model();
        let mut mask = VisibilityMask::new(model.node_count());
        mask.set_visible(2, false);

        let list = record(&model, VisibilityTest::Host(&mask));
        assert!(!list
            .commands
            .iter()
            .any(|command| matches!(command, Command::Begin(_))));
        assert_eq!(list.execute(&[]), first_index_of(&model, 1));
    }

    #[test]
    fn traversal_is_depth_first_in_child_order() {
        let model = fixtures::branching_model();
        let list = record(&model, VisibilityTest::Device(ConditionalScope::Node));
        let bound = list
            .commands
            .iter()
            .filter_map(|command| match command {
                Command::Bind(mesh) => Some(*mesh),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(bound, vec![0, 1, 1, 2]);
    }

    fn pushed_colors(model: &Model) -> Vec<glm::Vec4> {
        record(model, VisibilityTest::Device(ConditionalScope::Primitive))
            .commands
            .into_iter()
            .filter_map(|command| match command {
                Command::Push(color) => Some(color),
                _ => None,
            })
            .collect()
    }

    fn saw_station(pre_multiply_vertex_colors: bool) -> Model {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/models/saw_station.gltf");
        let options = LoadOptions {
            pre_multiply_vertex_colors,
            ..Default::default()
        };
        Model::load(path, options).expect("Failed to load test asset")
    }

    #[test]
    fn base_color_is_applied_once() {
        let steel = glm::vec4(0.6, 0.62, 0.65, 1.0);
        let white = glm::vec4(1.0, 1.0, 1.0, 1.0);

        let plain = saw_station(false);
        assert_eq!(pushed_colors(&plain)[0], steel);

        let baked = saw_station(true);
        let (_, frame) = baked.meshes().next().unwrap();
        let vertex = baked.vertices()[frame.primitives[0].first_vertex as usize];
        let pushed = pushed_colors(&baked);
        assert!(pushed.iter().all(|color| *color == white));

        let shaded = glm::Vec4::from(vertex.color).component_mul(&pushed[0]);
        assert!(glm::distance(&shaded, &steel) < 1e-5);
    }

    #[test]
    fn empty_model_records_nothing() {
        let model = Model::default();
        let list = record(&model, VisibilityTest::Device(ConditionalScope::Primitive));
        assert!(list.commands.is_empty());
    }
}
