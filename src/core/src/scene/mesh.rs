use nalgebra_glm as glm;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color_factor: glm::Vec4,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            base_color_factor: glm::vec4(1.0, 1.0, 1.0, 1.0),
        }
    }
}

/// Axis-aligned bounds. A default value is empty and absorbs the first point merged into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub min: glm::Vec3,
    pub max: glm::Vec3,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            min: glm::vec3(std::f32::MAX, std::f32::MAX, std::f32::MAX),
            max: glm::vec3(std::f32::MIN, std::f32::MIN, std::f32::MIN),
        }
    }
}

impl Dimensions {
    pub fn new(min: glm::Vec3, max: glm::Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: &glm::Vec3) {
        self.min = glm::min2(&self.min, point);
        self.max = glm::max2(&self.max, point);
    }

    pub fn merge(&mut self, other: &Dimensions) {
        if other.is_empty() {
            return;
        }
        self.extend(&other.min);
        self.extend(&other.max);
    }

    /// Bounds of the eight transformed corners.
    pub fn transformed(&self, matrix: &glm::Mat4) -> Dimensions {
        let mut result = Dimensions::default();
        if self.is_empty() {
            return result;
        }
        for corner in 0..8 {
            let x = if corner & 1 == 0 { self.min.x } else { self.max.x };
            let y = if corner & 2 == 0 { self.min.y } else { self.max.y };
            let z = if corner & 4 == 0 { self.min.z } else { self.max.z };
            let point = matrix * glm::vec4(x, y, z, 1.0);
            result.extend(&glm::vec3(point.x, point.y, point.z));
        }
        result
    }

    pub fn size(&self) -> glm::Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> glm::Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn radius(&self) -> f32 {
        glm::distance(&self.min, &self.max) * 0.5
    }
}

/// A drawable range of the model's shared vertex and index buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub first_index: u32,
    pub index_count: u32,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub material: usize,
    pub bounds: Dimensions,
}

/// Geometry owned by a single node.
///
/// `id` is dense over the meshes of a model and selects the mesh's uniform slot on the GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub id: usize,
    pub name: String,
    pub primitives: Vec<Primitive>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bounds_absorb_first_point() {
        let mut dimensions = Dimensions::default();
        assert!(dimensions.is_empty());

        dimensions.extend(&glm::vec3(1.0, 2.0, 3.0));
        assert!(!dimensions.is_empty());
        assert_eq!(dimensions.min, glm::vec3(1.0, 2.0, 3.0));
        assert_eq!(dimensions.max, glm::vec3(1.0, 2.0, 3.0));
    }

    #[test]
    fn derived_measures() {
        let dimensions = Dimensions::new(glm::vec3(-1.0, 0.0, -2.0), glm::vec3(1.0, 4.0, 2.0));
        assert_eq!(dimensions.size(), glm::vec3(2.0, 4.0, 4.0));
        assert_eq!(dimensions.center(), glm::vec3(0.0, 2.0, 0.0));
        assert!((dimensions.radius() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn transformed_bounds_cover_rotated_corners() {
        let dimensions = Dimensions::new(glm::vec3(0.0, 0.0, 0.0), glm::vec3(2.0, 1.0, 1.0));
        let rotation = glm::rotate(
            &glm::Mat4::identity(),
            std::f32::consts::FRAC_PI_2,
            &glm::vec3(0.0, 0.0, 1.0),
        );
        let rotated = dimensions.transformed(&rotation);
        assert!((rotated.min.x + 1.0).abs() < 1e-5);
        assert!((rotated.max.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn merging_empty_bounds_is_a_no_op() {
        let mut dimensions = Dimensions::new(glm::vec3(0.0, 0.0, 0.0), glm::vec3(1.0, 1.0, 1.0));
        dimensions.merge(&Dimensions::default());
        assert_eq!(dimensions.max, glm::vec3(1.0, 1.0, 1.0));
    }
}
