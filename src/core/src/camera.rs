use crate::{input::Input, DeltaTime};
use nalgebra_glm as glm;
use winit::event::VirtualKeyCode;

// Mouse deltas are in physical pixels
const ZOOM_SENSITIVITY: f32 = 0.005;
const PAN_SENSITIVITY: f32 = 0.005;
const WHEEL_STEP: f32 = 0.6;

/// Orbit camera. The view matrix is `translate(position) * rotate(rotation)`,
/// with the rotation given as euler angles in degrees.
pub struct Camera {
    pub rotation: glm::Vec3,
    pub position: glm::Vec3,
    pub rotation_speed: f32,
    pub movement_speed: f32,
    pub fov_degrees: f32,
    pub znear: f32,
    pub zfar: f32,
    pub flip_y: bool,
    aspect_ratio: f32,
    perspective: glm::Mat4,
    view: glm::Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            rotation: glm::vec3(0.0, 0.0, 0.0),
            position: glm::vec3(0.0, 0.0, 0.0),
            rotation_speed: 1.0,
            movement_speed: 1.0,
            fov_degrees: 45.0,
            znear: 0.1,
            zfar: 512.0,
            flip_y: false,
            aspect_ratio: 1.0,
            perspective: glm::Mat4::identity(),
            view: glm::Mat4::identity(),
        };
        camera.update_perspective();
        camera.update_view_matrix();
        camera
    }
}

impl Camera {
    pub fn set_perspective(&mut self, fov_degrees: f32, aspect_ratio: f32, znear: f32, zfar: f32) {
        self.fov_degrees = fov_degrees;
        self.aspect_ratio = aspect_ratio;
        self.znear = znear;
        self.zfar = zfar;
        self.update_perspective();
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.update_perspective();
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn set_rotation(&mut self, rotation: glm::Vec3) {
        self.rotation = rotation;
        self.update_view_matrix();
    }

    pub fn set_translation(&mut self, translation: glm::Vec3) {
        self.position = translation;
        self.update_view_matrix();
    }

    pub fn rotate(&mut self, delta: glm::Vec3) {
        self.rotation += delta;
        self.update_view_matrix();
    }

    pub fn translate(&mut self, delta: glm::Vec3) {
        self.position += delta;
        self.update_view_matrix();
    }

    pub fn view(&self) -> &glm::Mat4 {
        &self.view
    }

    pub fn perspective(&self) -> &glm::Mat4 {
        &self.perspective
    }

    pub fn front(&self) -> glm::Vec3 {
        let pitch = self.rotation.x.to_radians();
        let yaw = self.rotation.y.to_radians();
        glm::normalize(&glm::vec3(
            -pitch.cos() * yaw.sin(),
            pitch.sin(),
            pitch.cos() * yaw.cos(),
        ))
    }

    /// Applies mouse drags, the wheel and WASD movement for one frame.
    pub fn update(&mut self, input: &Input, delta_time: &DeltaTime) {
        let mouse = &input.mouse;
        let dx = mouse.position_delta.x;
        let dy = mouse.position_delta.y;

        if mouse.is_left_clicked && (dx != 0.0 || dy != 0.0) {
            self.rotate(glm::vec3(
                dy * self.rotation_speed,
                -dx * self.rotation_speed,
                0.0,
            ));
        }

        if mouse.is_right_clicked && dy != 0.0 {
            self.translate(glm::vec3(0.0, 0.0, dy * ZOOM_SENSITIVITY));
        }

        if mouse.is_middle_clicked && (dx != 0.0 || dy != 0.0) {
            self.translate(glm::vec3(-dx * PAN_SENSITIVITY, -dy * PAN_SENSITIVITY, 0.0));
        }

        if mouse.wheel_delta != 0.0 {
            self.translate(glm::vec3(0.0, 0.0, mouse.wheel_delta * WHEEL_STEP));
        }

        let velocity = self.movement_speed * delta_time.0 as f32;
        let front = self.front();
        let right = glm::normalize(&glm::cross(&front, &glm::vec3(0.0, 1.0, 0.0)));
        let mut movement = glm::vec3(0.0, 0.0, 0.0);

        if input.is_key_pressed(VirtualKeyCode::W) {
            movement += front * velocity;
        }

        if input.is_key_pressed(VirtualKeyCode::S) {
            movement -= front * velocity;
        }

        if input.is_key_pressed(VirtualKeyCode::A) {
            movement -= right * velocity;
        }

        if input.is_key_pressed(VirtualKeyCode::D) {
            movement += right * velocity;
        }

        if movement != glm::vec3(0.0, 0.0, 0.0) {
            self.translate(movement);
        }
    }

    fn update_perspective(&mut self) {
        self.perspective = glm::perspective_zo(
            self.aspect_ratio,
            self.fov_degrees.to_radians(),
            self.znear,
            self.zfar,
        );
        if self.flip_y {
            self.perspective[(1, 1)] *= -1.0;
        }
    }

    fn update_view_matrix(&mut self) {
        let pitch = if self.flip_y {
            -self.rotation.x
        } else {
            self.rotation.x
        };

        let mut rotation = glm::Mat4::identity();
        rotation = glm::rotate(&rotation, pitch.to_radians(), &glm::vec3(1.0, 0.0, 0.0));
        rotation = glm::rotate(
            &rotation,
            self.rotation.y.to_radians(),
            &glm::vec3(0.0, 1.0, 0.0),
        );
        rotation = glm::rotate(
            &rotation,
            self.rotation.z.to_radians(),
            &glm::vec3(0.0, 0.0, 1.0),
        );

        let mut translation = self.position;
        if self.flip_y {
            translation.y *= -1.0;
        }

        self.view = glm::translation(&translation) * rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::event::ElementState;

    #[test]
    fn unrotated_view_is_a_pure_translation() {
        let mut camera = Camera::default();
        camera.set_translation(glm::vec3(0.07, -0.06, -0.6));
        assert_eq!(
            *camera.view(),
            glm::translation(&glm::vec3(0.07, -0.06, -0.6))
        );
    }

    #[test]
    fn left_drag_rotates_by_rotation_speed() {
        let mut camera = Camera::default();
        camera.rotation_speed = 0.25;

        let mut input = Input::default();
        input.mouse.is_left_clicked = true;
        input.mouse.position_delta = glm::vec2(4.0, 8.0);
        camera.update(&input, &DeltaTime(0.0));

        assert_eq!(camera.rotation, glm::vec3(2.0, -1.0, 0.0));
    }

    #[test]
    fn wheel_zooms_along_view_axis() {
        let mut camera = Camera::default();
        let mut input = Input::default();
        input.mouse.wheel_delta = 1.0;
        camera.update(&input, &DeltaTime(0.0));
        assert!((camera.position.z - WHEEL_STEP).abs() < std::f32::EPSILON);
    }

    #[test]
    fn forward_key_moves_along_front() {
        let mut camera = Camera::default();
        camera.movement_speed = 2.0;
        let mut input = Input::default();
        input.set_key_state(VirtualKeyCode::W, ElementState::Pressed);
        camera.update(&input, &DeltaTime(0.5));
        assert!((camera.position.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn aspect_ratio_changes_projection() {
        let mut camera = Camera::default();
        camera.set_perspective(45.0, 1.0, 0.1, 512.0);
        let square = *camera.perspective();
        camera.update_aspect_ratio(2.0);
        assert_ne!(square, *camera.perspective());
        assert_eq!(square[(1, 1)], camera.perspective()[(1, 1)]);
    }
}
