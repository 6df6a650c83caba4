use nalgebra_glm as glm;
use std::collections::HashMap;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, VirtualKeyCode},
};

pub type KeyMap = HashMap<VirtualKeyCode, ElementState>;

pub struct MouseState {
    pub position: glm::Vec2,
    pub position_delta: glm::Vec2,
    pub is_left_clicked: bool,
    pub is_right_clicked: bool,
    pub is_middle_clicked: bool,
    pub wheel_delta: f32,
}

impl Default for MouseState {
    fn default() -> Self {
        Self {
            position: glm::vec2(0.0, 0.0),
            position_delta: glm::vec2(0.0, 0.0),
            is_left_clicked: false,
            is_right_clicked: false,
            is_middle_clicked: false,
            wheel_delta: 0.0,
        }
    }
}

#[derive(Default)]
pub struct Input {
    pub keystates: KeyMap,
    pub mouse: MouseState,
}

impl Input {
    pub fn is_key_pressed(&self, keycode: VirtualKeyCode) -> bool {
        self.keystates.get(&keycode) == Some(&ElementState::Pressed)
    }

    pub fn set_key_state(&mut self, keycode: VirtualKeyCode, state: ElementState) {
        *self.keystates.entry(keycode).or_insert(state) = state;
    }

    pub fn set_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        let clicked = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.mouse.is_left_clicked = clicked,
            MouseButton::Right => self.mouse.is_right_clicked = clicked,
            MouseButton::Middle => self.mouse.is_middle_clicked = clicked,
            _ => {}
        }
    }

    pub fn move_cursor(&mut self, position: PhysicalPosition<f64>) {
        let current_position = glm::vec2(position.x as f32, position.y as f32);
        self.mouse.position_delta += current_position - self.mouse.position;
        self.mouse.position = current_position;
    }

    pub fn scroll(&mut self, delta: MouseScrollDelta) {
        self.mouse.wheel_delta += match delta {
            MouseScrollDelta::LineDelta(_, v_lines) => v_lines,
            MouseScrollDelta::PixelDelta(position) => (position.y / 120.0) as f32,
        };
    }

    /// Clears the per-frame accumulators once the frame has consumed them.
    pub fn end_frame(&mut self) {
        self.mouse.position_delta = glm::vec2(0.0, 0.0);
        self.mouse.wheel_delta = 0.0;
    }

    /// Drops every held button and key, used when the overlay captures input.
    pub fn release_all(&mut self) {
        self.keystates.clear();
        self.mouse.is_left_clicked = false;
        self.mouse.is_right_clicked = false;
        self.mouse.is_middle_clicked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_state_follows_latest_event() {
        let mut input = Input::default();
        assert!(!input.is_key_pressed(VirtualKeyCode::W));

        input.set_key_state(VirtualKeyCode::W, ElementState::Pressed);
        assert!(input.is_key_pressed(VirtualKeyCode::W));

        input.set_key_state(VirtualKeyCode::W, ElementState::Released);
        assert!(!input.is_key_pressed(VirtualKeyCode::W));
    }

    #[test]
    fn cursor_deltas_accumulate_until_frame_end() {
        let mut input = Input::default();
        input.move_cursor(PhysicalPosition::new(10.0, 5.0));
        input.move_cursor(PhysicalPosition::new(12.0, 9.0));
        assert_eq!(input.mouse.position, glm::vec2(12.0, 9.0));
        assert_eq!(input.mouse.position_delta, glm::vec2(12.0, 9.0));

        input.scroll(MouseScrollDelta::LineDelta(0.0, 2.0));
        assert_eq!(input.mouse.wheel_delta, 2.0);

        input.end_frame();
        assert_eq!(input.mouse.position_delta, glm::vec2(0.0, 0.0));
        assert_eq!(input.mouse.wheel_delta, 0.0);
        assert_eq!(input.mouse.position, glm::vec2(12.0, 9.0));
    }

    #[test]
    fn mouse_buttons_are_tracked_independently() {
        let mut input = Input::default();
        input.set_mouse_button(MouseButton::Left, ElementState::Pressed);
        input.set_mouse_button(MouseButton::Middle, ElementState::Pressed);
        assert!(input.mouse.is_left_clicked);
        assert!(!input.mouse.is_right_clicked);
        assert!(input.mouse.is_middle_clicked);

        input.release_all();
        assert!(!input.mouse.is_left_clicked);
        assert!(!input.mouse.is_middle_clicked);
    }
}
