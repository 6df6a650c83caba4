use crate::scene::Mesh;
use nalgebra_glm as glm;

/// Local transform of a node.
///
/// glTF nodes carry either translation/rotation/scale or a raw matrix.
/// Both are kept so the local matrix is `T * R * S * M`, where the unused half stays identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
    pub matrix: glm::Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: glm::vec3(0.0, 0.0, 0.0),
            rotation: glm::quat_identity(),
            scale: glm::vec3(1.0, 1.0, 1.0),
            matrix: glm::Mat4::identity(),
        }
    }
}

impl Transform {
    pub fn from_matrix(matrix: glm::Mat4) -> Self {
        Self {
            matrix,
            ..Default::default()
        }
    }

    pub fn from_decomposed(translation: glm::Vec3, rotation: glm::Quat, scale: glm::Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> glm::Mat4 {
        glm::translation(&self.translation)
            * glm::quat_to_mat4(&self.rotation)
            * glm::scaling(&self.scale)
            * self.matrix
    }
}

impl From<gltf::scene::Transform> for Transform {
    fn from(transform: gltf::scene::Transform) -> Self {
        match transform {
            gltf::scene::Transform::Matrix { matrix } => Self::from_matrix(glm::Mat4::from(matrix)),
            gltf::scene::Transform::Decomposed {
                translation,
                rotation: [x, y, z, w],
                scale,
            } => Self::from_decomposed(
                glm::Vec3::from(translation),
                glm::quat(x, y, z, w),
                glm::Vec3::from(scale),
            ),
        }
    }
}

/// One entry of the scene hierarchy.
///
/// `index` is assigned in load order, is dense over the model's nodes
/// and addresses the node's slot in the visibility mask.
#[derive(Debug, Clone)]
pub struct Node {
    pub index: usize,
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
}

impl Node {
    pub fn new(name: &str, transform: Transform, mesh: Option<Mesh>) -> Self {
        Self {
            index: 0,
            name: name.to_string(),
            transform,
            mesh,
        }
    }

    pub fn local_matrix(&self) -> glm::Mat4 {
        self.transform.matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposed_transform_applies_scale_then_rotation_then_translation() {
        let rotation = glm::quat_angle_axis(
            std::f32::consts::FRAC_PI_2,
            &glm::vec3(0.0, 0.0, 1.0),
        );
        let transform = Transform::from_decomposed(
            glm::vec3(1.0, 0.0, 0.0),
            rotation,
            glm::vec3(2.0, 2.0, 2.0),
        );

        let point = transform.matrix() * glm::vec4(1.0, 0.0, 0.0, 1.0);
        assert!((point.x - 1.0).abs() < 1e-5);
        assert!((point.y - 2.0).abs() < 1e-5);
        assert!(point.z.abs() < 1e-5);
    }

    #[test]
    fn raw_matrix_is_used_verbatim() {
        let matrix = glm::translation(&glm::vec3(3.0, 4.0, 5.0));
        assert_eq!(Transform::from_matrix(matrix).matrix(), matrix);
    }

    #[test]
    fn gltf_matrix_is_column_major() {
        let mut columns = [[0.0; 4]; 4];
        for (index, column) in columns.iter_mut().enumerate() {
            column[index] = 1.0;
        }
        columns[3] = [7.0, 8.0, 9.0, 1.0];

        let transform = Transform::from(gltf::scene::Transform::Matrix { matrix: columns });
        assert_eq!(
            transform.matrix(),
            glm::translation(&glm::vec3(7.0, 8.0, 9.0))
        );
    }
}
