use crate::scene::{Dimensions, Material, Mesh, Model, Node, Primitive, Transform, Vertex};
use gltf::buffer::Data;
use nalgebra_glm as glm;
use petgraph::graph::NodeIndex;
use snafu::{OptionExt, ResultExt, Snafu};
use std::path::{Path, PathBuf};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to import glTF asset '{}': {}", path.display(), source))]
    Import { path: PathBuf, source: gltf::Error },

    #[snafu(display("The glTF document does not contain a scene"))]
    MissingScene,

    #[snafu(display(
        "Primitive {} of mesh '{}' has no POSITION attribute",
        primitive,
        mesh
    ))]
    MissingPositions { mesh: String, primitive: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Bakes world matrices into vertex data and resets node transforms to identity.
    pub pre_transform_vertices: bool,
    pub pre_multiply_vertex_colors: bool,
    pub flip_y: bool,
}

impl Model {
    pub fn load<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let (document, buffers, _) = gltf::import(path).context(Import { path })?;
        Self::from_gltf(&document, &buffers, options)
    }

    /// Loads the asset, logging and returning an empty model on failure.
    pub fn load_or_empty<P: AsRef<Path>>(path: P, options: LoadOptions) -> Self {
        match Self::load(path.as_ref(), options) {
            Ok(model) => {
                log::info!(
                    "Loaded '{}': {} nodes, {} meshes",
                    path.as_ref().display(),
                    model.node_count(),
                    model.mesh_count()
                );
                let dimensions = model.dimensions();
                log::debug!(
                    "Model bounds: center {:?}, radius {}",
                    dimensions.center().as_slice(),
                    dimensions.radius()
                );
                model
            }
            Err(error) => {
                log::error!("{}", error);
                Self::default()
            }
        }
    }

    pub fn from_gltf(
        document: &gltf::Document,
        buffers: &[Data],
        options: LoadOptions,
    ) -> Result<Self> {
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context(MissingScene)?;

        let mut builder = ModelBuilder {
            buffers,
            options,
            model: Model {
                colors_pre_multiplied: options.pre_multiply_vertex_colors,
                ..Model::default()
            },
        };
        builder.load_materials(document);
        for node in scene.nodes() {
            builder.load_node(&node, None)?;
        }
        Ok(builder.finish())
    }
}

struct ModelBuilder<'a> {
    buffers: &'a [Data],
    options: LoadOptions,
    model: Model,
}

impl<'a> ModelBuilder<'a> {
    fn load_materials(&mut self, document: &gltf::Document) {
        self.model.materials = document
            .materials()
            .map(|material| Material {
                name: material.name().unwrap_or("Unnamed").to_string(),
                base_color_factor: glm::Vec4::from(
                    material.pbr_metallic_roughness().base_color_factor(),
                ),
            })
            .collect();
        self.model.materials.push(Material::default());
    }

    fn default_material(&self) -> usize {
        self.model.materials.len() - 1
    }

    fn load_node(&mut self, node: &gltf::Node, parent: Option<NodeIndex>) -> Result<()> {
        let mesh = match node.mesh() {
            Some(mesh) => Some(self.load_mesh(&mesh)?),
            None => None,
        };
        let name = node.name().unwrap_or("Unnamed");
        let node_index = self
            .model
            .add_node(parent, Node::new(name, Transform::from(node.transform()), mesh));
        for child in node.children() {
            self.load_node(&child, Some(node_index))?;
        }
        Ok(())
    }

    fn load_mesh(&mut self, mesh: &gltf::Mesh) -> Result<Mesh> {
        let name = mesh.name().unwrap_or("Unnamed").to_string();
        let buffers = self.buffers;
        let mut primitives = Vec::new();

        for primitive in mesh.primitives() {
            if primitive.indices().is_none() {
                log::debug!(
                    "Skipping non-indexed primitive {} of mesh '{}'",
                    primitive.index(),
                    name
                );
                continue;
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions = reader
                .read_positions()
                .context(MissingPositions {
                    mesh: name.as_str(),
                    primitive: primitive.index(),
                })?
                .collect::<Vec<_>>();
            let normals = reader
                .read_normals()
                .map(|normals| normals.collect::<Vec<_>>())
                .unwrap_or_default();
            let colors = reader
                .read_colors(0)
                .map(|colors| colors.into_rgba_f32().collect::<Vec<_>>())
                .unwrap_or_default();

            let material = primitive
                .material()
                .index()
                .unwrap_or_else(|| self.default_material());
            let base_color = self.model.materials[material].base_color_factor;

            let first_vertex = self.model.vertices.len() as u32;
            let first_index = self.model.indices.len() as u32;

            for (index, position) in positions.iter().enumerate() {
                let normal = normals.get(index).copied().unwrap_or([0.0; 3]);
                let mut color = colors.get(index).copied().unwrap_or([1.0; 4]);
                if self.options.pre_multiply_vertex_colors {
                    for (channel, factor) in color.iter_mut().zip(base_color.iter()) {
                        *channel *= factor;
                    }
                }
                self.model.vertices.push(Vertex {
                    position: *position,
                    normal,
                    color,
                });
            }

            let indices = reader
                .read_indices()
                .map(|indices| indices.into_u32().collect::<Vec<_>>())
                .unwrap_or_default();
            self.model
                .indices
                .extend(indices.iter().map(|index| index + first_vertex));

            let bounds = primitive.bounding_box();
            primitives.push(Primitive {
                first_index,
                index_count: indices.len() as u32,
                first_vertex,
                vertex_count: positions.len() as u32,
                material,
                bounds: Dimensions::new(
                    glm::Vec3::from(bounds.min),
                    glm::Vec3::from(bounds.max),
                ),
            });
        }

        let id = self.model.mesh_count;
        self.model.mesh_count += 1;

        Ok(Mesh {
            id,
            name,
            primitives,
        })
    }

    fn finish(mut self) -> Model {
        if self.options.pre_transform_vertices || self.options.flip_y {
            self.transform_vertices();
        }
        self.model.calculate_dimensions();
        self.model
    }

    fn transform_vertices(&mut self) {
        let flip = if self.options.flip_y {
            glm::scaling(&glm::vec3(1.0, -1.0, 1.0))
        } else {
            glm::Mat4::identity()
        };

        let transforms = self
            .model
            .meshes()
            .map(|(node, _)| {
                let world = if self.options.pre_transform_vertices {
                    self.model
                        .world_matrix(node.index)
                        .unwrap_or_else(glm::Mat4::identity)
                } else {
                    glm::Mat4::identity()
                };
                (NodeIndex::new(node.index), flip * world)
            })
            .collect::<Vec<_>>();

        for (node_index, matrix) in transforms {
            let normal_matrix = glm::mat4_to_mat3(&matrix);
            let model = &mut self.model;
            let mesh = match model.graph[node_index].mesh.as_mut() {
                Some(mesh) => mesh,
                None => continue,
            };
            for primitive in mesh.primitives.iter_mut() {
                let start = primitive.first_vertex as usize;
                let end = start + primitive.vertex_count as usize;
                for vertex in model.vertices[start..end].iter_mut() {
                    let position = matrix
                        * glm::vec4(
                            vertex.position[0],
                            vertex.position[1],
                            vertex.position[2],
                            1.0,
                        );
                    let mut normal = normal_matrix * glm::Vec3::from(vertex.normal);
                    if normal != glm::vec3(0.0, 0.0, 0.0) {
                        normal = glm::normalize(&normal);
                    }
                    vertex.position = [position.x, position.y, position.z];
                    vertex.normal = [normal.x, normal.y, normal.z];
                }
                primitive.bounds = primitive.bounds.transformed(&matrix);
            }
        }

        if self.options.pre_transform_vertices {
            let node_indices = self.model.graph.node_indices().collect::<Vec<_>>();
            for node_index in node_indices {
                self.model.graph[node_index].transform = Transform::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::VisibilityMask;
    use std::path::PathBuf;

    fn asset_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/models/saw_station.gltf")
    }

    fn load(options: LoadOptions) -> Model {
        Model::load(asset_path(), options).expect("Failed to load test asset")
    }

    fn topology(model: &Model) -> Vec<(usize, Option<usize>, Vec<usize>)> {
        model
            .linear_nodes()
            .map(|node| (node.index, model.parent(node.index), model.children(node.index)))
            .collect()
    }

    #[test]
    fn loads_hierarchy_in_creation_order() {
        let model = load(LoadOptions::default());
        let names = model
            .linear_nodes()
            .map(|node| node.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Frame", "Carriage", "Saw", "Blade", "Table"]);
        assert_eq!(model.roots(), vec![0, 4]);
        assert_eq!(model.children(1), vec![2]);
        assert_eq!(model.parent(3), Some(2));
    }

    #[test]
    fn nodes_without_meshes_are_kept() {
        let model = load(LoadOptions::default());
        let carriage = model.node_from_index(1).unwrap();
        assert!(carriage.mesh.is_none());
        assert_eq!(model.mesh_count(), 4);
        let ids = model.meshes().map(|(_, mesh)| mesh.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn primitives_reference_shared_buffers() {
        let model = load(LoadOptions::default());
        for (_, mesh) in model.meshes() {
            for primitive in mesh.primitives.iter() {
                assert_eq!(primitive.index_count, 36);
                assert_eq!(primitive.vertex_count, 24);
                let start = primitive.first_index as usize;
                let end = start + primitive.index_count as usize;
                let first_vertex = primitive.first_vertex;
                let last_vertex = first_vertex + primitive.vertex_count;
                assert!(model.indices()[start..end]
                    .iter()
                    .all(|index| *index >= first_vertex && *index < last_vertex));
                assert!(!primitive.bounds.is_empty());
            }
        }
        assert_eq!(model.vertices().len(), 24 * 4);
    }

    #[test]
    fn materials_fall_back_to_the_default() {
        let model = load(LoadOptions::default());
        let default_material = model.materials().len() - 1;
        assert_eq!(model.materials()[default_material], Material::default());

        let table = model.node_from_index(4).unwrap().mesh.as_ref().unwrap();
        assert_eq!(table.primitives[0].material, default_material);

        let frame = model.node_from_index(0).unwrap().mesh.as_ref().unwrap();
        let frame_material = &model.materials()[frame.primitives[0].material];
        assert_eq!(frame_material.name, "Steel");
    }

    #[test]
    fn loading_twice_yields_identical_trees() {
        let first = load(LoadOptions::default());
        let second = load(LoadOptions::default());
        assert_eq!(topology(&first), topology(&second));
        for (left, right) in first.linear_nodes().zip(second.linear_nodes()) {
            assert_eq!(left.transform, right.transform);
        }
        assert_eq!(first.node_count(), second.node_count());

        let first_mask = VisibilityMask::new(first.node_count());
        let second_mask = VisibilityMask::new(second.node_count());
        assert_eq!(first_mask.len(), first.node_count());
        assert_eq!(first_mask.len(), second_mask.len());
        assert_eq!(first_mask.flags(), second_mask.flags());
    }

    #[test]
    fn pre_transformed_vertices_leave_identity_world_matrices() {
        let plain = load(LoadOptions::default());
        let baked = load(LoadOptions {
            pre_transform_vertices: true,
            ..Default::default()
        });

        for node in baked.linear_nodes() {
            assert_eq!(baked.world_matrix(node.index), Some(glm::Mat4::identity()));
        }

        let (blade, mesh) = plain.meshes().find(|(node, _)| node.name == "Blade").unwrap();
        let world = plain.world_matrix(blade.index).unwrap();
        let vertex = plain.vertices()[mesh.primitives[0].first_vertex as usize];
        let expected = world
            * glm::vec4(
                vertex.position[0],
                vertex.position[1],
                vertex.position[2],
                1.0,
            );
        let actual = baked.vertices()[mesh.primitives[0].first_vertex as usize].position;
        assert!((expected.x - actual[0]).abs() < 1e-4);
        assert!((expected.y - actual[1]).abs() < 1e-4);
        assert!((expected.z - actual[2]).abs() < 1e-4);
        let plain_min = plain.dimensions().min;
        let baked_min = baked.dimensions().min;
        assert!(glm::distance(&plain_min, &baked_min) < 1e-4);
    }

    #[test]
    fn flip_y_negates_vertical_components() {
        let plain = load(LoadOptions::default());
        let flipped = load(LoadOptions {
            flip_y: true,
            ..Default::default()
        });
        for (left, right) in plain.vertices().iter().zip(flipped.vertices()) {
            assert_eq!(left.position[1], -right.position[1]);
        }
    }

    #[test]
    fn dimensions_enclose_every_vertex() {
        let model = load(LoadOptions {
            pre_transform_vertices: true,
            ..Default::default()
        });
        let dimensions = model.dimensions();
        let center = dimensions.center();
        assert!(dimensions.radius() > 0.0);
        assert!(glm::distance(&(dimensions.min + dimensions.size() * 0.5), &center) < 1e-5);
        for vertex in model.vertices() {
            let position = glm::Vec3::from(vertex.position);
            assert!(glm::distance(&position, &center) <= dimensions.radius() + 1e-4);
        }
    }

    #[test]
    fn missing_file_yields_an_empty_model() {
        let model = Model::load_or_empty("does/not/exist.gltf", LoadOptions::default());
        assert!(model.is_empty());
        assert_eq!(model.node_count(), 0);
    }
}
