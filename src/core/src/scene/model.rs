use crate::scene::{Dimensions, Material, Mesh, Node, Primitive, Transform, Vertex};
use nalgebra_glm as glm;
use petgraph::{graph::NodeIndex, prelude::*};

/// Nodes in load order. Edges point from parent to child.
pub type SceneGraph = Graph<Node, ()>;

/// Receives a mesh's composed world matrix, typically a mapped uniform buffer.
pub trait TransformSink {
    fn write_transform(&mut self, mesh: &Mesh, world: &glm::Mat4);
}

/// A loaded scene: node hierarchy, shared geometry and materials.
#[derive(Default)]
pub struct Model {
    pub(crate) graph: SceneGraph,
    pub(crate) roots: Vec<NodeIndex>,
    pub(crate) materials: Vec<Material>,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) indices: Vec<u32>,
    pub(crate) mesh_count: usize,
    pub(crate) dimensions: Dimensions,
    pub(crate) colors_pre_multiplied: bool,
}

impl Model {
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn roots(&self) -> Vec<usize> {
        self.roots.iter().map(|root| root.index()).collect()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    /// The material whose base colour the shader applies to `primitive`.
    /// Pre-multiplied vertex colours already carry it, so the white default
    /// material stands in for them.
    pub fn shading_material(&self, primitive: &Primitive) -> Option<&Material> {
        if self.colors_pre_multiplied {
            self.materials.last()
        } else {
            self.materials.get(primitive.material)
        }
    }

    pub fn node_from_index(&self, index: usize) -> Option<&Node> {
        self.graph.node_weight(NodeIndex::new(index))
    }

    /// Every node in index order.
    pub fn linear_nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph
            .node_indices()
            .map(move |node_index| &self.graph[node_index])
    }

    pub fn meshes(&self) -> impl Iterator<Item = (&Node, &Mesh)> {
        self.linear_nodes()
            .filter_map(|node| node.mesh.as_ref().map(|mesh| (node, mesh)))
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.graph
            .neighbors_directed(NodeIndex::new(index), Incoming)
            .next()
            .map(|parent| parent.index())
    }

    /// Children in the order they were added.
    pub fn children(&self, index: usize) -> Vec<usize> {
        let mut children = self
            .graph
            .neighbors_directed(NodeIndex::new(index), Outgoing)
            .map(|child| child.index())
            .collect::<Vec<_>>();
        children.reverse();
        children
    }

    pub fn local_matrix(&self, index: usize) -> Option<glm::Mat4> {
        self.node_from_index(index).map(Node::local_matrix)
    }

    /// `local(node) * world(parent)`, or just the local matrix for a root.
    pub fn world_matrix(&self, index: usize) -> Option<glm::Mat4> {
        let mut matrix = self.local_matrix(index)?;
        let mut ancestor = self.parent(index);
        while let Some(parent) = ancestor {
            matrix *= self.graph[NodeIndex::new(parent)].local_matrix();
            ancestor = self.parent(parent);
        }
        Some(matrix)
    }

    pub fn set_local_transform(&mut self, index: usize, transform: Transform) -> bool {
        match self.graph.node_weight_mut(NodeIndex::new(index)) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Writes the world matrix of `index` and of every descendant into the sink.
    /// Call this on the topmost edited node after changing transforms.
    pub fn update<S: TransformSink>(&self, index: usize, sink: &mut S) {
        let world = match self.world_matrix(index) {
            Some(world) => world,
            None => return,
        };
        self.update_subtree(NodeIndex::new(index), &world, sink);
    }

    pub fn update_all<S: TransformSink>(&self, sink: &mut S) {
        for root in self.roots.iter() {
            self.update(root.index(), sink);
        }
    }

    fn update_subtree<S: TransformSink>(
        &self,
        node_index: NodeIndex,
        world: &glm::Mat4,
        sink: &mut S,
    ) {
        if let Some(mesh) = self.graph[node_index].mesh.as_ref() {
            sink.write_transform(mesh, world);
        }
        for child in self.children(node_index.index()) {
            let child_world = self.graph[NodeIndex::new(child)].local_matrix() * world;
            self.update_subtree(NodeIndex::new(child), &child_world, sink);
        }
    }

    pub(crate) fn add_node(&mut self, parent: Option<NodeIndex>, mut node: Node) -> NodeIndex {
        node.index = self.graph.node_count();
        let node_index = self.graph.add_node(node);
        match parent {
            Some(parent) => {
                self.graph.add_edge(parent, node_index, ());
            }
            None => self.roots.push(node_index),
        }
        node_index
    }

    pub(crate) fn calculate_dimensions(&mut self) {
        let mut dimensions = Dimensions::default();
        for (node, mesh) in self.meshes() {
            let world = match self.world_matrix(node.index) {
                Some(world) => world,
                None => continue,
            };
            for primitive in mesh.primitives.iter() {
                dimensions.merge(&primitive.bounds.transformed(&world));
            }
        }

        if dimensions.is_empty() {
            dimensions = Dimensions::new(glm::vec3(0.0, 0.0, 0.0), glm::vec3(0.0, 0.0, 0.0));
        }
        self.dimensions = dimensions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::fixtures;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingSink {
        transforms: HashMap<usize, glm::Mat4>,
        writes: usize,
    }

    impl TransformSink for RecordingSink {
        fn write_transform(&mut self, mesh: &Mesh, world: &glm::Mat4) {
            self.transforms.insert(mesh.id, *world);
            self.writes += 1;
        }
    }

    #[test]
    fn node_indices_are_dense_and_unique() {
        let model = fixtures::branching_model();
        let indices = model.linear_nodes().map(|node| node.index).collect::<Vec<_>>();
        assert_eq!(indices, (0..model.node_count()).collect::<Vec<_>>());
    }

    #[test]
    fn navigation_follows_the_hierarchy() {
        let model = fixtures::branching_model();
        assert_eq!(model.roots(), vec![0]);
        assert_eq!(model.children(0), vec![1, 3]);
        assert_eq!(model.children(1), vec![2]);
        assert_eq!(model.parent(2), Some(1));
        assert_eq!(model.parent(0), None);
        assert_eq!(model.node_from_index(3).map(|node| node.name.as_str()), Some("arm"));
        assert!(model.node_from_index(4).is_none());
    }

    #[test]
    fn world_matrix_composes_local_with_parent_world() {
        let model = fixtures::branching_model();
        for node in model.linear_nodes() {
            let local = model.local_matrix(node.index).unwrap();
            let world = model.world_matrix(node.index).unwrap();
            match model.parent(node.index) {
                Some(parent) => {
                    let expected = local * model.world_matrix(parent).unwrap();
                    fixtures::assert_matrix_eq(&world, &expected);
                }
                None => assert_eq!(world, local),
            }
        }
    }

    #[test]
    fn update_writes_every_meshed_descendant() {
        let model = fixtures::branching_model();
        let mut sink = RecordingSink::default();
        model.update_all(&mut sink);

        assert_eq!(sink.writes, model.mesh_count());
        for (node, mesh) in model.meshes() {
            fixtures::assert_matrix_eq(
                &sink.transforms[&mesh.id],
                &model.world_matrix(node.index).unwrap(),
            );
        }
    }

    #[test]
    fn children_observe_an_edited_parent_after_update() {
        let mut model = fixtures::branching_model();
        let moved = Transform::from_decomposed(
            glm::vec3(0.0, 10.0, 0.0),
            glm::quat_identity(),
            glm::vec3(1.0, 1.0, 1.0),
        );
        assert!(model.set_local_transform(1, moved));

        let mut sink = RecordingSink::default();
        model.update(1, &mut sink);

        let child_mesh = model.node_from_index(2).unwrap().mesh.as_ref().unwrap();
        fixtures::assert_matrix_eq(
            &sink.transforms[&child_mesh.id],
            &model.world_matrix(2).unwrap(),
        );
        assert_eq!(sink.transforms.len(), 2);
    }

    #[test]
    fn dimensions_cover_transformed_primitive_bounds() {
        let mut model = fixtures::branching_model();
        model.calculate_dimensions();
        let dimensions = model.dimensions();
        assert!(!dimensions.is_empty());
        assert!(dimensions.max.x >= 2.0);
    }

    #[test]
    fn empty_model_reports_zero_dimensions() {
        let mut model = Model::default();
        model.calculate_dimensions();
        assert!(model.is_empty());
        assert_eq!(model.dimensions().size(), glm::vec3(0.0, 0.0, 0.0));
    }
}
